//! An assortment of non-owning containers.
//!
//! All of these containers have some option to construct them from one (or
//! more) slices of the underlying types instead of allocating resources
//! dynamically. A strict `no_std` build of the protocol core passes queue
//! storage in from the outside; with the `std` feature, owned `Vec` backed
//! storage is available as a convenience.
mod ring;
mod slice;

pub use self::ring::{Full, Ring};
pub use self::slice::Slice;
