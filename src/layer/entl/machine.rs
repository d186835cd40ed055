use bitflags::bitflags;

use crate::managed::{Full, Ring, Slice};
use crate::time::Instant;
use crate::wire::{Address, Tag};

use super::identity::{Identity, Tie};
use super::state::{ErrorFlag, Latch, Progress, State, Status};
use super::Payload;

/// Suggested depth of the two AIT queues, matching the reference driver.
pub const QUEUE_DEPTH: usize = 32;

/// Hellos tolerated in `Wait` before falling back to `Hello`.
pub const RETRY_MAX: u32 = 10;

bitflags! {
    /// What the caller must do after an entry point returns.
    ///
    /// An empty mask means nothing; the flags combine, e.g. an AIT-bearing
    /// transmission is `SEND | SEND_AIT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Action: u8 {
        /// Transmit a frame with the returned destination address.
        const SEND = 0x01;
        /// The transmission carries the head of the outbound AIT queue;
        /// fetch it with `outbound_ait`.
        const SEND_AIT = 0x02;
        /// An inbound AIT payload arrived with this frame; extract it and
        /// stage it with `stage_inbound`.
        const PROC_AIT = 0x04;
        /// A completed inbound AIT payload is ready for `read_ait`; notify
        /// the administrative consumer.
        const SIG_AIT = 0x08;
        /// An abnormal condition latched; the caller should report it.
        const ERROR = 0x10;
    }
}

/// One end of an entangled link.
///
/// A machine is created once per physical link and driven entirely by its
/// caller: `received` for inbound frames, `next_send`/`next_send_on_data`
/// from the transmit path, `get_hello` from the periodic retransmission
/// driver, `error`/`link_up`/`link_down` from the carrier watcher. The
/// machine itself never blocks, sleeps or touches hardware.
///
/// All methods take `&mut self`; callers that reach a machine from more
/// than one execution context wrap it in [`Shared`].
///
/// [`Shared`]: struct.Shared.html
#[derive(Debug)]
pub struct Machine<'a> {
    identity: Identity,
    progress: Progress,
    latch: Latch,
    /// Hellos seen while in `Wait`.
    retries: u32,
    /// In-flight inbound payload, staged between `PROC_AIT` and the closing
    /// acknowledgement.
    staged: Option<Payload>,
    send_queue: Ring<'a, Payload>,
    recv_queue: Ring<'a, Payload>,
}

impl<'a> Machine<'a> {
    /// Create a machine over caller-provided queue storage.
    ///
    /// Both queues should offer [`QUEUE_DEPTH`] slots; smaller storage
    /// merely applies back-pressure earlier.
    ///
    /// [`QUEUE_DEPTH`]: constant.QUEUE_DEPTH.html
    pub fn new<S, R>(send_storage: S, recv_storage: R) -> Self
    where
        S: Into<Slice<'a, Payload>>,
        R: Into<Slice<'a, Payload>>,
    {
        Machine {
            identity: Identity::new(),
            progress: Progress::default(),
            latch: Latch::default(),
            retries: 0,
            staged: None,
            send_queue: Ring::new(send_storage),
            recv_queue: Ring::new(recv_storage),
        }
    }

    /// Create a machine with heap-allocated queues of [`QUEUE_DEPTH`].
    ///
    /// [`QUEUE_DEPTH`]: constant.QUEUE_DEPTH.html
    #[cfg(any(feature = "std", test))]
    pub fn with_default_queues() -> Machine<'static> {
        Machine::new(
            vec![Payload::default(); QUEUE_DEPTH],
            vec![Payload::default(); QUEUE_DEPTH],
        )
    }

    /// Assign the local identity.
    ///
    /// Must happen before the handshake can complete; until then every
    /// received message is dropped. May be re-called, which invalidates a
    /// captured peer hello.
    pub fn set_my_address(&mut self, addr: Address) {
        net_debug!("set my address {}", addr);
        self.identity.set(addr);
    }

    /// The current protocol state.
    pub fn state(&self) -> State {
        self.progress.state
    }

    /// The protocol state with the error latch folded in.
    pub fn status(&self) -> Status {
        if self.latch.is_latched() {
            Status::Error
        } else {
            Status::State(self.progress.state)
        }
    }

    /// Non-destructive copy of the live record and the latch.
    pub fn current_state(&self) -> (Progress, Latch) {
        (self.progress, self.latch)
    }

    /// Copy of the live record, draining the latch.
    pub fn read_and_drain_error(&mut self) -> (Progress, Latch) {
        (self.progress, self.latch.drain())
    }

    /// Process one received message, given the source and destination
    /// address fields of the frame.
    ///
    /// Returns the action mask; the returned `SEND` asks the caller to run
    /// its transmit path (which will consult `next_send`).
    pub fn received(&mut self, src_addr: Address, dst_addr: Address, now: Instant) -> Action {
        if dst_addr.tag() == Tag::Nop {
            return Action::empty();
        }

        if !self.identity.is_valid() {
            net_debug!("message {} received without my address set", dst_addr);
            return Action::empty();
        }

        if self.latch.is_latched() {
            net_debug!("message {} received with {} undrained errors",
                dst_addr, self.latch.count());
            return Action::empty();
        }

        match self.progress.state {
            State::Idle => {
                net_debug!("message {} received in idle state at {}", dst_addr, now);
                Action::empty()
            }
            State::Hello => self.received_in_hello(src_addr, dst_addr, now),
            State::Wait => self.received_in_wait(dst_addr, now),
            State::Send => match dst_addr.tag() {
                Tag::Event | Tag::Ack if dst_addr.seq() == self.progress.event_i_know => {
                    net_trace!("duplicate {} in send state", dst_addr);
                    Action::empty()
                }
                _ => self.sequence_error(dst_addr, now),
            },
            State::Receive => self.received_in_receive(dst_addr, now),
            State::AitSendWait => self.received_in_ait_send_wait(dst_addr, now),
            State::AitSendAck => match dst_addr.tag() {
                Tag::Ack if dst_addr.seq() == self.progress.event_i_know => {
                    net_trace!("duplicate {} in Bm state", dst_addr);
                    Action::empty()
                }
                _ => self.sequence_error(dst_addr, now),
            },
            State::AitRecvWait => match dst_addr.tag() {
                Tag::Ait if dst_addr.seq() == self.progress.event_i_know => {
                    net_trace!("duplicate {} in Ah state", dst_addr);
                    Action::empty()
                }
                _ => self.sequence_error(dst_addr, now),
            },
            State::AitRecvAck => self.received_in_ait_recv_ack(dst_addr, now),
        }
    }

    fn received_in_hello(&mut self, src_addr: Address, dst_addr: Address, now: Instant) -> Action {
        match dst_addr.tag() {
            Tag::Hello => {
                self.identity.capture_peer(src_addr);
                match self.identity.tie_break(src_addr) {
                    Some(Tie::Win) => {
                        self.progress.reset_events();
                        self.progress.state = State::Wait;
                        self.progress.stamp(now);
                        self.progress.intervals.clear();
                        self.retries = 0;
                        net_debug!("hello from {} lost the tie-break, entering wait", src_addr);
                        Action::SEND
                    }
                    Some(Tie::Same) => {
                        net_debug!("fatal: hello with our own address {} received", src_addr);
                        self.latch.record(&self.progress, ErrorFlag::SAME_ADDRESS, now);
                        self.progress.state = State::Idle;
                        self.progress.stamp(now);
                        Action::empty()
                    }
                    Some(Tie::Lose) | None => {
                        net_debug!("hello from {} wins the tie-break, staying in hello", src_addr);
                        Action::empty()
                    }
                }
            }
            Tag::Event => {
                // The tie-break winner proceeded; its readiness beacon
                // always carries sequence zero.
                if dst_addr.seq() == 0 {
                    self.progress.observe(0);
                    self.progress.state = State::Send;
                    self.progress.mark(now);
                    net_debug!("event 0 received in hello, entering send");
                    Action::SEND
                } else {
                    net_debug!("out of sequence {} received in hello", dst_addr);
                    Action::empty()
                }
            }
            _ => {
                net_debug!("unexpected {} received in hello", dst_addr);
                Action::empty()
            }
        }
    }

    fn received_in_wait(&mut self, dst_addr: Address, now: Instant) -> Action {
        match dst_addr.tag() {
            Tag::Hello => {
                // The peer keeps announcing instead of answering our
                // beacon: after enough repeats restart the handshake.
                self.retries += 1;
                if self.retries > RETRY_MAX {
                    net_debug!("hello overflow ({}) in wait, back to hello", self.retries);
                    self.progress.reset_events();
                    self.progress.state = State::Hello;
                    self.progress.stamp(now);
                }
                Action::empty()
            }
            Tag::Event if dst_addr.seq() == self.progress.event_i_sent + 1 => {
                self.progress.observe(dst_addr.seq());
                self.progress.state = State::Send;
                self.progress.stamp(now);
                self.progress.intervals.clear();
                net_debug!("event {} received in wait, entering send", dst_addr.seq());
                Action::SEND
            }
            _ => {
                net_debug!("unexpected {} received in wait, back to hello", dst_addr);
                self.latch.record(&self.progress, ErrorFlag::SEQUENCE, now);
                self.progress.reset_events();
                self.progress.state = State::Hello;
                self.progress.stamp(now);
                self.progress.intervals.clear();
                Action::empty()
            }
        }
    }

    fn received_in_receive(&mut self, dst_addr: Address, now: Instant) -> Action {
        let expected = self.progress.event_i_know.wrapping_add(2);
        match dst_addr.tag() {
            Tag::Event if dst_addr.seq() == expected => {
                self.progress.observe(dst_addr.seq());
                self.progress.state = State::Send;
                self.progress.stamp(now);
                Action::SEND
            }
            Tag::Ait if dst_addr.seq() == expected => {
                self.progress.observe(dst_addr.seq());
                self.progress.state = State::AitRecvWait;
                self.progress.stamp(now);
                net_debug!("ait {} received, entering Ah", dst_addr.seq());
                if self.recv_queue.is_full() {
                    // Hold the acknowledgement until a consumer makes room.
                    Action::PROC_AIT
                } else {
                    Action::SEND | Action::PROC_AIT
                }
            }
            Tag::Event | Tag::Ait if dst_addr.seq() == self.progress.event_i_know => {
                net_trace!("duplicate {} in receive state", dst_addr);
                Action::empty()
            }
            _ => self.sequence_error(dst_addr, now),
        }
    }

    fn received_in_ait_send_wait(&mut self, dst_addr: Address, now: Instant) -> Action {
        match dst_addr.tag() {
            Tag::Ack if dst_addr.seq() == self.progress.event_i_know.wrapping_add(2) => {
                self.progress.observe(dst_addr.seq());
                self.progress.state = State::AitSendAck;
                self.progress.stamp(now);
                net_debug!("ack {} received, entering Bm", dst_addr.seq());
                Action::SEND
            }
            Tag::Event if dst_addr.seq() == self.progress.event_i_know => {
                net_trace!("duplicate {} in Am state", dst_addr);
                Action::empty()
            }
            _ => self.sequence_error(dst_addr, now),
        }
    }

    fn received_in_ait_recv_ack(&mut self, dst_addr: Address, now: Instant) -> Action {
        match dst_addr.tag() {
            Tag::Ack if dst_addr.seq() == self.progress.event_i_know.wrapping_add(2) => {
                self.progress.observe(dst_addr.seq());
                self.progress.state = State::Send;
                self.progress.stamp(now);
                // The transfer is complete; the staged payload becomes
                // visible to the administrative consumer.
                if let Some(payload) = self.staged.take() {
                    if self.recv_queue.push(payload).is_err() {
                        net_debug!("inbound queue rejected a completed transfer");
                    }
                }
                net_debug!("ack {} received, transfer complete", dst_addr.seq());
                Action::SEND | Action::SIG_AIT
            }
            Tag::Ait if dst_addr.seq() == self.progress.event_i_know => {
                net_trace!("duplicate {} in Bh state", dst_addr);
                Action::empty()
            }
            Tag::Hello => {
                // A late hello repeat from before the handshake completed.
                net_trace!("duplicate hello in Bh state");
                Action::empty()
            }
            _ => self.sequence_error(dst_addr, now),
        }
    }

    /// Common out-of-sequence fallback: latch, restart the handshake.
    fn sequence_error(&mut self, dst_addr: Address, now: Instant) -> Action {
        net_debug!("out of sequence {} in {} state, back to hello",
            dst_addr, self.progress.state);
        self.latch.record(&self.progress, ErrorFlag::SEQUENCE, now);
        self.progress.reset_events();
        self.progress.state = State::Hello;
        self.progress.stamp(now);
        Action::ERROR
    }

    /// Decide the next transmission and advance the state accordingly.
    ///
    /// Returns the destination address to stamp into the outgoing frame.
    /// When the action contains `SEND_AIT` the caller must also fetch the
    /// payload with `outbound_ait` and carry it in the same frame.
    pub fn next_send(&mut self, now: Instant) -> (Action, Address) {
        self.next_send_inner(now, true)
    }

    /// Like [`next_send`], for frames that already carry user payload.
    ///
    /// A single frame cannot carry both a data payload and an AIT exchange,
    /// so this variant never opens one: in `Send` it always proceeds to
    /// `Receive` with a plain event message.
    ///
    /// [`next_send`]: #method.next_send
    pub fn next_send_on_data(&mut self, now: Instant) -> (Action, Address) {
        self.next_send_inner(now, false)
    }

    fn next_send_inner(&mut self, now: Instant, may_open_ait: bool) -> (Action, Address) {
        if self.latch.is_latched() {
            net_debug!("send requested with {} undrained errors", self.latch.count());
            return (Action::empty(), Address::nop());
        }

        match self.progress.state {
            State::Idle => {
                net_debug!("send requested in idle state");
                (Action::empty(), Address::nop())
            }
            State::Hello => (Action::SEND, Address::hello()),
            State::Wait => (Action::SEND, Address::event(0)),
            State::Send => {
                self.progress.advance_sent();
                self.progress.mark(now);
                let seq = self.progress.event_i_sent;
                if may_open_ait && !self.send_queue.is_empty() {
                    self.progress.state = State::AitSendWait;
                    net_debug!("ait {} requested, entering Am", seq);
                    (Action::SEND | Action::SEND_AIT, Address::ait(seq))
                } else {
                    self.progress.state = State::Receive;
                    (Action::SEND, Address::event(seq))
                }
            }
            State::Receive | State::AitSendWait | State::AitRecvAck => {
                (Action::empty(), Address::nop())
            }
            State::AitSendAck => {
                self.progress.advance_sent();
                self.progress.mark(now);
                self.progress.state = State::Receive;
                // The closing acknowledgement: the payload is delivered.
                let _ = self.send_queue.pop();
                let seq = self.progress.event_i_sent;
                net_debug!("ait ack {} requested, transfer delivered", seq);
                (Action::SEND, Address::ack(seq))
            }
            State::AitRecvWait => {
                if self.recv_queue.is_full() {
                    (Action::empty(), Address::nop())
                } else {
                    self.progress.advance_sent();
                    self.progress.mark(now);
                    self.progress.state = State::AitRecvAck;
                    let seq = self.progress.event_i_sent;
                    net_debug!("ait ack {} requested, entering Bh", seq);
                    (Action::SEND, Address::ack(seq))
                }
            }
        }
    }

    /// Decide the periodic retransmission, if any.
    ///
    /// Idempotent: repeats the last state-appropriate message without
    /// advancing any counter. The external scheduler calls this at its own
    /// cadence; the machine only decides *what* to retransmit, never when.
    pub fn get_hello(&mut self, _now: Instant) -> (Action, Address) {
        if self.latch.is_latched() {
            net_debug!("retransmission requested with {} undrained errors",
                self.latch.count());
            return (Action::empty(), Address::nop());
        }

        match self.progress.state {
            State::Hello => (Action::SEND, Address::hello()),
            State::Wait => (Action::SEND, Address::event(0)),
            State::Receive => {
                net_trace!("repeating event {} in receive state", self.progress.event_i_sent);
                (Action::SEND, Address::event(self.progress.event_i_sent))
            }
            State::AitSendWait => {
                net_trace!("repeating ait {} in Am state", self.progress.event_i_sent);
                (Action::SEND | Action::SEND_AIT, Address::ait(self.progress.event_i_sent))
            }
            State::AitRecvAck => {
                if self.recv_queue.is_full() {
                    (Action::empty(), Address::nop())
                } else {
                    net_trace!("repeating ack {} in Bh state", self.progress.event_i_sent);
                    (Action::SEND, Address::ack(self.progress.event_i_sent))
                }
            }
            _ => (Action::empty(), Address::nop()),
        }
    }

    /// Report an abnormal condition into the latch.
    ///
    /// `LINK_DOWN` forces `Idle`; `SEQUENCE` forces `Hello` with a full
    /// counter and statistics reset. Every other flag only latches.
    pub fn error(&mut self, flag: ErrorFlag, now: Instant) {
        if flag == ErrorFlag::LINK_DOWN && self.progress.state == State::Idle {
            return;
        }

        self.latch.record(&self.progress, flag, now);

        if flag == ErrorFlag::LINK_DOWN {
            self.progress.state = State::Idle;
        } else if flag == ErrorFlag::SEQUENCE {
            self.progress.state = State::Hello;
            self.progress.stamp(now);
            self.progress.restart();
        }
        net_debug!("error {:?} latched in {} state", flag, self.progress.state);
    }

    /// Report physical link loss. Sugar for `error(LINK_DOWN)`.
    pub fn link_down(&mut self, now: Instant) {
        self.error(ErrorFlag::LINK_DOWN, now);
    }

    /// Start the handshake after the physical link came up.
    ///
    /// Only effective in `Idle` with a drained latch; otherwise ignored.
    pub fn link_up(&mut self, now: Instant) {
        if self.progress.state != State::Idle {
            net_debug!("unexpected link up in {} state ignored", self.progress.state);
            return;
        }
        if self.latch.is_latched() {
            net_debug!("link up with {} undrained errors ignored", self.latch.count());
            return;
        }
        net_debug!("link up, entering hello");
        self.progress.state = State::Hello;
        self.progress.stamp(now);
        self.progress.restart();
        self.retries = 0;
    }

    /// Queue a payload for transfer to the peer.
    ///
    /// On success returns the remaining free queue capacity. A full queue
    /// rejects the payload and hands it back.
    pub fn send_ait(&mut self, payload: Payload) -> Result<usize, Full<Payload>> {
        self.send_queue.push(payload)
    }

    /// The payload the next AIT-bearing transmission must carry.
    ///
    /// Valid whenever the returned action contains `SEND_AIT`; the payload
    /// stays queued until the peer's acknowledgement completes the round.
    pub fn outbound_ait(&self) -> Option<&Payload> {
        self.send_queue.peek()
    }

    /// Stage the payload extracted from an AIT-bearing frame.
    ///
    /// Called by the receive path in response to `PROC_AIT`. The payload
    /// stays staged until the closing acknowledgement, replacing any
    /// previously staged one (a duplicate of the same transfer).
    pub fn stage_inbound(&mut self, payload: Payload) {
        self.staged = Some(payload);
    }

    /// Retrieve one completed inbound payload.
    ///
    /// Returns the payload and the number still queued behind it.
    pub fn read_ait(&mut self) -> Option<(Payload, usize)> {
        let payload = self.recv_queue.pop()?;
        Some((payload, self.recv_queue.len()))
    }

    /// Number of payloads waiting in the outbound queue.
    pub fn outbound_queued(&self) -> usize {
        self.send_queue.len()
    }

    /// Number of completed inbound payloads awaiting retrieval.
    pub fn inbound_queued(&self) -> usize {
        self.recv_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: Instant = Instant::from_millis(1_000);

    fn fresh(addr: Address) -> Machine<'static> {
        let mut machine = Machine::with_default_queues();
        machine.set_my_address(addr);
        machine.link_up(NOW);
        machine
    }

    #[test]
    fn idle_until_link_up() {
        let mut machine = Machine::with_default_queues();
        machine.set_my_address(Address::new(1, 1));
        assert_eq!(machine.state(), State::Idle);
        let (action, addr) = machine.next_send(NOW);
        assert_eq!(action, Action::empty());
        assert_eq!(addr, Address::nop());
        machine.link_up(NOW);
        assert_eq!(machine.state(), State::Hello);
    }

    #[test]
    fn messages_dropped_without_address() {
        let mut machine = Machine::with_default_queues();
        let action = machine.received(Address::new(1, 50), Address::hello(), NOW);
        assert_eq!(action, Action::empty());
        assert_eq!(machine.state(), State::Idle);
    }

    #[test]
    fn nop_is_ignored_everywhere() {
        let mut machine = fresh(Address::new(1, 100));
        let action = machine.received(Address::new(1, 50), Address::nop(), NOW);
        assert_eq!(action, Action::empty());
        assert_eq!(machine.state(), State::Hello);
    }

    #[test]
    fn tie_break_win_enters_wait() {
        let mut machine = fresh(Address::new(1, 100));
        let action = machine.received(Address::new(1, 50), Address::hello(), NOW);
        assert!(action.contains(Action::SEND));
        assert_eq!(machine.state(), State::Wait);
    }

    #[test]
    fn tie_break_loss_stays_in_hello() {
        let mut machine = fresh(Address::new(1, 50));
        let action = machine.received(Address::new(1, 100), Address::hello(), NOW);
        assert_eq!(action, Action::empty());
        assert_eq!(machine.state(), State::Hello);
    }

    #[test]
    fn same_address_is_fatal() {
        let mut machine = fresh(Address::new(0, 1));
        let action = machine.received(Address::new(0, 1), Address::hello(), NOW);
        assert_eq!(action, Action::empty());
        assert_eq!(machine.state(), State::Idle);
        assert_eq!(machine.status(), Status::Error);
        let (_, latch) = machine.current_state();
        assert_eq!(latch.flag(), ErrorFlag::SAME_ADDRESS);
    }

    #[test]
    fn wait_hello_overflow_restarts_handshake() {
        let mut machine = fresh(Address::new(1, 100));
        machine.received(Address::new(1, 50), Address::hello(), NOW);
        assert_eq!(machine.state(), State::Wait);
        for _ in 0..RETRY_MAX {
            machine.received(Address::new(1, 50), Address::hello(), NOW);
            assert_eq!(machine.state(), State::Wait);
        }
        machine.received(Address::new(1, 50), Address::hello(), NOW);
        assert_eq!(machine.state(), State::Hello);
        // No error latched by the storm fallback.
        assert_eq!(machine.status(), Status::State(State::Hello));
    }

    #[test]
    fn link_down_forces_idle_and_latches() {
        let mut machine = fresh(Address::new(1, 100));
        machine.link_down(NOW);
        assert_eq!(machine.state(), State::Idle);
        assert_eq!(machine.status(), Status::Error);
        // Ignored while the latch is undrained.
        machine.link_up(NOW);
        assert_eq!(machine.state(), State::Idle);
        let (_, latch) = machine.read_and_drain_error();
        assert_eq!(latch.flag(), ErrorFlag::LINK_DOWN);
        machine.link_up(NOW);
        assert_eq!(machine.state(), State::Hello);
    }

    #[test]
    fn link_down_in_idle_is_noop() {
        let mut machine = Machine::with_default_queues();
        machine.set_my_address(Address::new(1, 1));
        machine.link_down(NOW);
        assert_eq!(machine.status(), Status::State(State::Idle));
    }

    #[test]
    fn entry_points_blocked_while_latched() {
        let mut machine = fresh(Address::new(1, 100));
        machine.error(ErrorFlag::TIMEOUT, NOW);
        assert_eq!(machine.get_hello(NOW).0, Action::empty());
        assert_eq!(machine.next_send(NOW).0, Action::empty());
        let action = machine.received(Address::new(1, 50), Address::hello(), NOW);
        assert_eq!(action, Action::empty());
    }
}
