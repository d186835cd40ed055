use core::fmt;

use bitflags::bitflags;

use crate::time::{Duration, Instant};

/// The protocol state of one end of the link.
///
/// `Idle` through `Wait` are the handshake, `Send`/`Receive` the steady
/// alternation, and the four `Ait*` states the nested payload handshake:
/// the sending side walks `Send → AitSendWait → AitSendAck → Receive`, the
/// receiving side `Receive → AitRecvWait → AitRecvAck → Send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Link down or not yet started.
    Idle,
    /// Announcing ourselves, waiting for the peer's hello.
    Hello,
    /// Won the tie-break, beaconing readiness until the peer answers.
    Wait,
    /// Holding the send turn.
    Send,
    /// Peer holds the send turn.
    Receive,
    /// Sent an AIT payload, awaiting the peer's acknowledgement.
    AitSendWait,
    /// Acknowledgement received, about to confirm and finish the transfer.
    AitSendAck,
    /// Received an AIT payload, must acknowledge it.
    AitRecvWait,
    /// Acknowledgement sent, awaiting the closing confirmation.
    AitRecvAck,
}

impl Default for State {
    fn default() -> State {
        State::Idle
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            State::Idle => "Idle",
            State::Hello => "Hello",
            State::Wait => "Wait",
            State::Send => "Send",
            State::Receive => "Receive",
            State::AitSendWait => "Am",
            State::AitSendAck => "Bm",
            State::AitRecvWait => "Ah",
            State::AitRecvAck => "Bh",
        };
        f.write_str(name)
    }
}

/// Answer of a status query, with the error latch folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The live protocol state; no undrained fault.
    State(State),
    /// At least one fault is latched and has not been drained yet.
    Error,
}

bitflags! {
    /// Causes of latched faults, one bit per cause.
    ///
    /// The values match the reference driver's control interface so that an
    /// administrative consumer sees the familiar mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ErrorFlag: u32 {
        /// A message arrived out of the expected order or value.
        const SEQUENCE = 0x0001;
        /// Physical link loss.
        const LINK_DOWN = 0x0002;
        /// The external scheduler reported a timeout.
        const TIMEOUT = 0x0004;
        /// Both peers claim the same identity.
        const SAME_ADDRESS = 0x0008;
        /// An unknown administrative command was issued.
        const UNKNOWN_CMD = 0x0010;
        /// Internal state corruption was detected.
        const UNKNOWN_STATE = 0x0020;
        /// Link-up was signalled in a state that cannot accept it.
        const UNEXPECTED_LINK_UP = 0x0040;
    }
}

/// Spacing statistics of counter-advancing transitions.
///
/// `min` is unset (zero) until the first sample; all three clear on a
/// handshake restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Intervals {
    /// The most recent spacing.
    pub last: Duration,
    /// The smallest spacing observed since the last restart.
    pub min: Duration,
    /// The largest spacing observed since the last restart.
    pub max: Duration,
}

impl Intervals {
    pub(crate) fn clear(&mut self) {
        *self = Intervals::default();
    }

    pub(crate) fn update(&mut self, sample: Duration) {
        self.last = sample;
        if self.max < sample {
            self.max = sample;
        }
        if self.min == Duration::ZERO || self.min > sample {
            self.min = sample;
        }
    }
}

/// The live protocol record of one machine.
///
/// `event_send_next` stays exactly two ahead of `event_i_sent` once the
/// first send happened, and `event_i_know` tracks the last value seen from
/// the peer; a snapshot of this record is what the error latch preserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// The current protocol state.
    pub state: State,
    /// Last sequence value acknowledged or observed from the peer.
    pub event_i_know: u32,
    /// Last sequence value we sent.
    pub event_i_sent: u32,
    /// Sequence value the next send will carry.
    pub event_send_next: u32,
    /// Time of the last transition that touched this record.
    pub update_at: Instant,
    /// Spacing statistics of counter-advancing transitions.
    pub intervals: Intervals,
}

impl Progress {
    /// Zero the three event counters.
    ///
    /// All three zero together means "fresh out of the hello handshake".
    pub(crate) fn reset_events(&mut self) {
        self.event_i_know = 0;
        self.event_i_sent = 0;
        self.event_send_next = 0;
    }

    /// Record a sequence value observed from the peer.
    pub(crate) fn observe(&mut self, seq: u32) {
        self.event_i_know = seq;
        self.event_send_next = seq.wrapping_add(1);
    }

    /// Claim the next send slot: two per round, per side.
    pub(crate) fn advance_sent(&mut self) {
        self.event_i_sent = self.event_send_next;
        self.event_send_next = self.event_send_next.wrapping_add(2);
    }

    /// Stamp the record without taking an interval sample.
    pub(crate) fn stamp(&mut self, now: Instant) {
        self.update_at = now;
    }

    /// Take an interval sample against the previous stamp, then stamp.
    pub(crate) fn mark(&mut self, now: Instant) {
        if self.update_at > Instant::from_millis(0) {
            self.intervals.update(now - self.update_at);
        }
        self.update_at = now;
    }

    /// Full reset: counters and interval statistics, as on a handshake
    /// restart after a sequence error.
    pub(crate) fn restart(&mut self) {
        self.reset_events();
        self.intervals.clear();
    }
}

/// First-occurrence-preserving fault accumulator.
///
/// The first `record` after a drain snapshots the live record; every later
/// `record` only ORs its cause into the subsequent-fault mask and counts.
/// Draining returns the accumulated contents and re-arms the snapshot by
/// resetting the count alone, so the drained copy stays inspectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Latch {
    snapshot: Progress,
    flag: ErrorFlag,
    later: ErrorFlag,
    count: u32,
    at: Instant,
}

impl Latch {
    /// Record a fault against the given live record.
    pub(crate) fn record(&mut self, live: &Progress, flag: ErrorFlag, now: Instant) {
        if self.count == 0 {
            self.snapshot = *live;
            self.flag = flag;
            self.later = ErrorFlag::empty();
            self.at = now;
        } else {
            self.later |= flag;
        }
        self.count += 1;
    }

    /// Check if at least one undrained fault is recorded.
    pub fn is_latched(&self) -> bool {
        self.count > 0
    }

    /// Return the latch contents and re-arm for the next first fault.
    pub(crate) fn drain(&mut self) -> Latch {
        let copy = *self;
        self.count = 0;
        copy
    }

    /// The live record as it was when the first fault hit.
    pub fn snapshot(&self) -> &Progress {
        &self.snapshot
    }

    /// The cause of the first fault.
    pub fn flag(&self) -> ErrorFlag {
        self.flag
    }

    /// OR of the causes of all faults after the first.
    pub fn later(&self) -> ErrorFlag {
        self.later
    }

    /// Number of faults recorded since the last drain.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Time of the first fault.
    pub fn at(&self) -> Instant {
        self.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fault_snapshots_later_faults_accumulate() {
        let mut latch = Latch::default();
        let mut live = Progress::default();
        live.state = State::Send;
        live.event_i_know = 4;

        latch.record(&live, ErrorFlag::SEQUENCE, Instant::from_millis(10));
        live.state = State::Hello;
        live.event_i_know = 0;
        latch.record(&live, ErrorFlag::TIMEOUT, Instant::from_millis(20));

        assert_eq!(latch.count(), 2);
        assert_eq!(latch.flag(), ErrorFlag::SEQUENCE);
        assert_eq!(latch.later(), ErrorFlag::TIMEOUT);
        assert_eq!(latch.snapshot().state, State::Send);
        assert_eq!(latch.snapshot().event_i_know, 4);
        assert_eq!(latch.at(), Instant::from_millis(10));
    }

    #[test]
    fn drain_rearms_the_snapshot() {
        let mut latch = Latch::default();
        let live = Progress::default();

        latch.record(&live, ErrorFlag::LINK_DOWN, Instant::from_millis(1));
        let drained = latch.drain();
        assert!(drained.is_latched());
        assert!(!latch.is_latched());
        // The drained copy stays inspectable.
        assert_eq!(latch.flag(), ErrorFlag::LINK_DOWN);

        latch.record(&live, ErrorFlag::SEQUENCE, Instant::from_millis(2));
        assert_eq!(latch.flag(), ErrorFlag::SEQUENCE);
        assert_eq!(latch.later(), ErrorFlag::empty());
        assert_eq!(latch.count(), 1);
    }

    #[test]
    fn interval_statistics() {
        let mut intervals = Intervals::default();
        intervals.update(Duration::from_millis(5));
        intervals.update(Duration::from_millis(2));
        intervals.update(Duration::from_millis(9));
        assert_eq!(intervals.last, Duration::from_millis(9));
        assert_eq!(intervals.min, Duration::from_millis(2));
        assert_eq!(intervals.max, Duration::from_millis(9));
        intervals.clear();
        assert_eq!(intervals, Intervals::default());
    }

    #[test]
    fn sequence_arithmetic() {
        let mut progress = Progress::default();
        progress.observe(0);
        assert_eq!(progress.event_send_next, 1);
        progress.advance_sent();
        assert_eq!(progress.event_i_sent, 1);
        assert_eq!(progress.event_send_next, 3);
        progress.observe(2);
        progress.advance_sent();
        assert_eq!(progress.event_i_sent, 3);
        assert_eq!(progress.event_send_next, progress.event_i_sent + 2);
    }
}
