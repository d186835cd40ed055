use crate::wire::Address;

/// The local node identity and the staging slot for a peer's hello.
///
/// The identity must be set before the handshake can complete; a machine
/// drops every message that arrives earlier. Re-setting the identity
/// invalidates any captured peer address, since the capture was made
/// relative to the old tie-break position.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity {
    own: Option<Address>,
    peer_hello: Option<Address>,
}

/// Outcome of the hello tie-break against a peer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tie {
    /// Our address is greater; we become the initial sender.
    Win,
    /// Our address is lesser; the peer decides the handshake.
    Lose,
    /// Both ends claim the same address. Fatal misconfiguration.
    Same,
}

impl Identity {
    /// An identity with no address assigned yet.
    pub fn new() -> Identity {
        Identity::default()
    }

    /// Assign the local address, invalidating any captured peer hello.
    pub fn set(&mut self, addr: Address) {
        self.own = Some(addr);
        self.peer_hello = None;
    }

    /// Check if the local address has been assigned.
    pub fn is_valid(&self) -> bool {
        self.own.is_some()
    }

    /// The local address, if assigned.
    pub fn addr(&self) -> Option<Address> {
        self.own
    }

    /// Remember the peer address announced in a hello.
    ///
    /// The capture is non-authoritative: it is kept in case the peer
    /// proceeds with the handshake before we answered.
    pub fn capture_peer(&mut self, addr: Address) {
        self.peer_hello = Some(addr);
    }

    /// The captured peer hello address, if any.
    pub fn peer(&self) -> Option<Address> {
        self.peer_hello
    }

    /// Run the tie-break against a peer address.
    ///
    /// Lexicographic comparison, upper half first. Returns `None` while no
    /// local address is assigned.
    pub fn tie_break(&self, peer: Address) -> Option<Tie> {
        use core::cmp::Ordering;

        let own = self.own?;
        Some(match own.cmp(&peer) {
            Ordering::Greater => Tie::Win,
            Ordering::Less => Tie::Lose,
            Ordering::Equal => Tie::Same,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tie_break_is_total() {
        let mut us = Identity::new();
        us.set(Address::new(1, 100));
        assert_eq!(us.tie_break(Address::new(1, 50)), Some(Tie::Win));
        assert_eq!(us.tie_break(Address::new(1, 200)), Some(Tie::Lose));
        assert_eq!(us.tie_break(Address::new(2, 0)), Some(Tie::Lose));
        assert_eq!(us.tie_break(Address::new(1, 100)), Some(Tie::Same));
    }

    #[test]
    fn reassignment_clears_capture() {
        let mut us = Identity::new();
        assert_eq!(us.tie_break(Address::new(0, 1)), None);
        us.set(Address::new(0, 2));
        us.capture_peer(Address::new(0, 1));
        assert_eq!(us.peer(), Some(Address::new(0, 1)));
        us.set(Address::new(0, 3));
        assert_eq!(us.peer(), None);
    }
}
