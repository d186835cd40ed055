use spin::Mutex;

use crate::managed::Full;
use crate::time::Instant;
use crate::wire::{link_frame, Address, Repr};

use super::machine::{Action, Machine};
use super::state::{ErrorFlag, Latch, Progress, State, Status};
use super::{Payload, Result, Transmit};

/// A machine shared between concurrent driver contexts.
///
/// The reference environment reaches the state machine from three places at
/// once: the receive completion path, the transmit path and an
/// administrative control path. `Shared` serializes them with one spinlock,
/// taken per call and never held across a transmit: the helpers below copy
/// everything the transmission needs out of the machine first and call the
/// [`Transmit`] implementation with the lock already released.
///
/// [`Transmit`]: trait.Transmit.html
#[derive(Debug)]
pub struct Shared<'a> {
    inner: Mutex<Machine<'a>>,
}

impl<'a> Shared<'a> {
    /// Wrap a machine for shared use.
    pub fn new(machine: Machine<'a>) -> Self {
        Shared { inner: Mutex::new(machine) }
    }

    /// Unwrap the machine again.
    pub fn into_inner(self) -> Machine<'a> {
        self.inner.into_inner()
    }

    /// See [`Machine::set_my_address`].
    ///
    /// [`Machine::set_my_address`]: struct.Machine.html#method.set_my_address
    pub fn set_my_address(&self, addr: Address) {
        self.inner.lock().set_my_address(addr)
    }

    /// See [`Machine::state`].
    ///
    /// [`Machine::state`]: struct.Machine.html#method.state
    pub fn state(&self) -> State {
        self.inner.lock().state()
    }

    /// See [`Machine::status`].
    ///
    /// [`Machine::status`]: struct.Machine.html#method.status
    pub fn status(&self) -> Status {
        self.inner.lock().status()
    }

    /// See [`Machine::current_state`].
    ///
    /// [`Machine::current_state`]: struct.Machine.html#method.current_state
    pub fn current_state(&self) -> (Progress, Latch) {
        self.inner.lock().current_state()
    }

    /// See [`Machine::read_and_drain_error`].
    ///
    /// [`Machine::read_and_drain_error`]:
    /// struct.Machine.html#method.read_and_drain_error
    pub fn read_and_drain_error(&self) -> (Progress, Latch) {
        self.inner.lock().read_and_drain_error()
    }

    /// Report one received message by its address fields.
    pub fn received(&self, src_addr: Address, dst_addr: Address, now: Instant) -> Action {
        self.inner.lock().received(src_addr, dst_addr, now)
    }

    /// Report one received carrier frame.
    ///
    /// Convenience over [`received`] for callers holding the frame bytes.
    /// When the returned action contains `PROC_AIT` the caller extracts the
    /// payload from the frame body and hands it to [`stage_inbound`].
    ///
    /// [`received`]: #method.received
    /// [`stage_inbound`]: #method.stage_inbound
    pub fn frame_received(&self, frame: &link_frame, now: Instant) -> Action {
        let repr = Repr::parse(frame);
        self.received(repr.src_addr, repr.dst_addr, now)
    }

    /// See [`Machine::next_send`].
    ///
    /// [`Machine::next_send`]: struct.Machine.html#method.next_send
    pub fn next_send(&self, now: Instant) -> (Action, Address) {
        self.inner.lock().next_send(now)
    }

    /// See [`Machine::next_send_on_data`].
    ///
    /// [`Machine::next_send_on_data`]:
    /// struct.Machine.html#method.next_send_on_data
    pub fn next_send_on_data(&self, now: Instant) -> (Action, Address) {
        self.inner.lock().next_send_on_data(now)
    }

    /// See [`Machine::get_hello`].
    ///
    /// [`Machine::get_hello`]: struct.Machine.html#method.get_hello
    pub fn get_hello(&self, now: Instant) -> (Action, Address) {
        self.inner.lock().get_hello(now)
    }

    /// See [`Machine::error`].
    ///
    /// [`Machine::error`]: struct.Machine.html#method.error
    pub fn error(&self, flag: ErrorFlag, now: Instant) {
        self.inner.lock().error(flag, now)
    }

    /// See [`Machine::link_up`].
    ///
    /// [`Machine::link_up`]: struct.Machine.html#method.link_up
    pub fn link_up(&self, now: Instant) {
        self.inner.lock().link_up(now)
    }

    /// See [`Machine::link_down`].
    ///
    /// [`Machine::link_down`]: struct.Machine.html#method.link_down
    pub fn link_down(&self, now: Instant) {
        self.inner.lock().link_down(now)
    }

    /// See [`Machine::send_ait`].
    ///
    /// [`Machine::send_ait`]: struct.Machine.html#method.send_ait
    pub fn send_ait(&self, payload: Payload) -> core::result::Result<usize, Full<Payload>> {
        self.inner.lock().send_ait(payload)
    }

    /// See [`Machine::stage_inbound`].
    ///
    /// [`Machine::stage_inbound`]: struct.Machine.html#method.stage_inbound
    pub fn stage_inbound(&self, payload: Payload) {
        self.inner.lock().stage_inbound(payload)
    }

    /// See [`Machine::read_ait`].
    ///
    /// [`Machine::read_ait`]: struct.Machine.html#method.read_ait
    pub fn read_ait(&self) -> Option<(Payload, usize)> {
        self.inner.lock().read_ait()
    }

    /// Drive one regular transmission through the adapter.
    ///
    /// Asks the machine for the next message and, when one is due, hands it
    /// to `tx` with the lock released. The machine advances before the
    /// transmission; a frame the adapter loses is repeated by the
    /// retransmission driver, never re-decided here.
    pub fn transmit_next<T: Transmit>(&self, tx: &mut T, now: Instant) -> Result<Action> {
        let (action, addr, ait) = {
            let mut machine = self.inner.lock();
            let (action, addr) = machine.next_send(now);
            let ait = if action.contains(Action::SEND_AIT) {
                machine.outbound_ait().cloned()
            } else {
                None
            };
            (action, addr, ait)
        };

        if action.contains(Action::SEND) {
            tx.transmit(addr, ait.as_ref())?;
        }
        Ok(action)
    }

    /// Drive one periodic retransmission through the adapter.
    ///
    /// The idempotent counterpart of [`transmit_next`], backed by
    /// [`Machine::get_hello`]. Safe to call at any cadence.
    ///
    /// [`transmit_next`]: #method.transmit_next
    /// [`Machine::get_hello`]: struct.Machine.html#method.get_hello
    pub fn retransmit<T: Transmit>(&self, tx: &mut T, now: Instant) -> Result<Action> {
        let (action, addr, ait) = {
            let mut machine = self.inner.lock();
            let (action, addr) = machine.get_hello(now);
            let ait = if action.contains(Action::SEND_AIT) {
                machine.outbound_ait().cloned()
            } else {
                None
            };
            (action, addr, ait)
        };

        if action.contains(Action::SEND) {
            tx.transmit(addr, ait.as_ref())?;
        }
        Ok(action)
    }
}

impl<'a> From<Machine<'a>> for Shared<'a> {
    fn from(machine: Machine<'a>) -> Self {
        Shared::new(machine)
    }
}
