//! A library implementation of the ENTL link entanglement protocol.
//!
//! ENTL runs between two directly connected endpoints and maintains an
//! exclusive, alternating token-passing discipline over the link: at any
//! moment exactly one side holds the send turn. A secondary reliable message
//! channel (AIT, *asynchronous information transfer*) is piggybacked on that
//! alternation and delivers opaque payloads exactly once per round.
//!
//! ## Design and relevant core concepts
//!
//! The crate contains no driver. It is the protocol brain that a network
//! adapter driver, a user-space packet engine or a test harness calls into:
//!
//! * [`wire`](wire/index.html) gives exact access to the two address fields
//!   the protocol reads and writes on each carrier frame.
//! * [`layer::entl`](layer/entl/index.html) is the state machine itself,
//!   together with the error latch and the lock wrapper that makes it safe
//!   to call from an interrupt-like receive context and a background
//!   context at the same time.
//! * [`managed`](managed/index.html) holds the caller-allocated storage
//!   types backing the AIT queues.
//!
//! Nothing within `entl` *ever* dynamically allocates memory. Setup code
//! passes in preallocated queue storage explicitly; the machine only moves
//! payloads between the slots it was given. Time is injected the same way:
//! every entry point takes the current [`time::Instant`] from the caller, so
//! the core stays free of clock syscalls and deterministic under test.
//!
//! [`time::Instant`]: time/struct.Instant.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

#[macro_use] mod macros;
pub mod layer;
pub mod managed;
pub mod time;
pub mod wire;
