//! The link entanglement layer.
//!
//! Two directly connected endpoints run this protocol to agree, at every
//! moment, on which of them holds the send turn. After a hello handshake
//! with an address tie-break, the two sides alternate `Send`/`Receive`
//! forever, each message carrying a sequence number that advances by two per
//! round and side so the numbers of the two sides never collide. An AIT
//! payload transfer nests a four-state acknowledge handshake into that
//! alternation and delivers each payload exactly once.
//!
//! The centre of the module is [`Machine`], the state machine proper. It is
//! purely reactive: inbound frames are reported through
//! [`Machine::received`], the transmit path asks [`Machine::next_send`]
//! which destination address to stamp on the next outgoing frame, and a
//! periodic driver asks [`Machine::get_hello`] what to retransmit. None of
//! these calls block and none of them perform I/O; they return an [`Action`]
//! mask telling the caller what to do next.
//!
//! [`Shared`] wraps a machine in the lock that makes this callable from an
//! interrupt-like receive context and a background context concurrently.
//!
//! [`Machine`]: struct.Machine.html
//! [`Machine::received`]: struct.Machine.html#method.received
//! [`Machine::next_send`]: struct.Machine.html#method.next_send
//! [`Machine::get_hello`]: struct.Machine.html#method.get_hello
//! [`Action`]: struct.Action.html
//! [`Shared`]: struct.Shared.html
use core::fmt;

use crate::layer::{Error, Result};
use crate::wire::{Address, MAX_PAYLOAD_SIZE};

mod identity;
mod machine;
mod shared;
mod state;


pub use self::identity::{Identity, Tie};
pub use self::machine::{Action, Machine, QUEUE_DEPTH, RETRY_MAX};
pub use self::shared::Shared;
pub use self::state::{ErrorFlag, Intervals, Latch, Progress, State, Status};

/// An opaque AIT payload.
///
/// The buffer is inline and capped at [`MAX_PAYLOAD_SIZE`] so that payloads
/// can live in preallocated queue slots and move by value; ownership
/// transfers into the machine on `send_ait`/`stage_inbound` and back out on
/// `read_ait`.
///
/// [`MAX_PAYLOAD_SIZE`]: ../../wire/constant.MAX_PAYLOAD_SIZE.html
#[derive(Clone)]
pub struct Payload {
    len: u16,
    data: [u8; MAX_PAYLOAD_SIZE],
}

impl Payload {
    /// Copy a byte slice into a new payload.
    ///
    /// Fails with `Error::BadSize` when the slice exceeds the cap.
    pub fn new(data: &[u8]) -> Result<Payload> {
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::BadSize);
        }
        let mut payload = Payload::default();
        payload.data[..data.len()].copy_from_slice(data);
        payload.len = data.len() as u16;
        Ok(payload)
    }

    /// The payload bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }

    /// The payload length in bytes.
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Payload {
    fn default() -> Payload {
        Payload {
            len: 0,
            data: [0; MAX_PAYLOAD_SIZE],
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Payload")
            .field("len", &self.len)
            .finish()
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Payload) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Payload {}

/// The transmit capability an adapter offers to the protocol.
///
/// This is the seam between the protocol core and the hardware-proximate
/// code: a driver implements it over its descriptor ring, a test harness
/// over an in-memory buffer. The implementation must only *enqueue* the
/// frame, never wait for its completion, because [`Shared`] calls it from
/// lock-adjacent paths. A transient lack of transmit resources is reported
/// as `Error::Exhausted`; the caller's scheduler retries later.
///
/// [`Shared`]: struct.Shared.html
pub trait Transmit {
    /// Enqueue one protocol frame with the given destination address field.
    ///
    /// `ait` is the payload to carry piggybacked when the machine requested
    /// an AIT-bearing transmission, `None` for plain control frames.
    fn transmit(&mut self, dst_addr: Address, ait: Option<&Payload>) -> Result<()>;
}

impl<T: Transmit> Transmit for &'_ mut T {
    fn transmit(&mut self, dst_addr: Address, ait: Option<&Payload>) -> Result<()> {
        (**self).transmit(dst_addr, ait)
    }
}
