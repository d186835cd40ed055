use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

/// Largest payload carried in one AIT exchange, in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 256;

/// The error type for parsing carrier frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer is too short to contain both address fields.
    Truncated,
}

/// The result type for parsing carrier frames.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated => f.write_str("truncated frame"),
        }
    }
}

enum_with_unknown! {
    /// Message tag carried in the upper half of a link address.
    pub enum Tag(u16) {
        Hello = 0x0000,
        Event = 0x0001,
        Nop   = 0x0002,
        Ait   = 0x0003,
        Ack   = 0x0004,
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Tag::Hello => write!(f, "HELLO"),
            Tag::Event => write!(f, "EVENT"),
            Tag::Nop   => write!(f, "NOP"),
            Tag::Ait   => write!(f, "AIT"),
            Tag::Ack   => write!(f, "ACK"),
            Tag::Unknown(id) => write!(f, "0x{:04x}", id),
        }
    }
}

/// A 48-bit link address split into its protocol halves.
///
/// The upper 16 bits either identify a node (when comparing identities) or
/// carry a message tag (when stamped into the destination field of a carrier
/// frame); the lower 32 bits carry the rest of the identity or the sequence
/// number. The derived ordering is lexicographic, `upper` first, which is
/// exactly the total order the hello tie-break runs on.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address {
    /// Upper 16 bits: node identity half or message tag.
    pub upper: u16,
    /// Lower 32 bits: node identity half or sequence number.
    pub lower: u32,
}

impl Address {
    /// Bit in `upper` marking a control-only message that must not be
    /// forwarded to the upper layer.
    pub const CONTROL_ONLY: u16 = 0x8000;

    /// Mask selecting the message tag bits of `upper`.
    pub const TAG_MASK: u16 = 0x00ff;

    /// Construct an address from its halves.
    pub const fn new(upper: u16, lower: u32) -> Address {
        Address { upper, lower }
    }

    /// The hello beacon address.
    pub const fn hello() -> Address {
        Address::new(0x0000, 0)
    }

    /// An event message carrying a sequence number.
    pub const fn event(seq: u32) -> Address {
        Address::new(0x0001, seq)
    }

    /// The no-op message.
    pub const fn nop() -> Address {
        Address::new(0x0002, 0)
    }

    /// An AIT-carrying message with a sequence number.
    pub const fn ait(seq: u32) -> Address {
        Address::new(0x0003, seq)
    }

    /// An AIT acknowledgement with a sequence number.
    pub const fn ack(seq: u32) -> Address {
        Address::new(0x0004, seq)
    }

    /// The message tag encoded in the upper half.
    pub fn tag(&self) -> Tag {
        Tag::from(self.upper & Self::TAG_MASK)
    }

    /// The sequence number carried in the lower half.
    pub const fn seq(&self) -> u32 {
        self.lower
    }

    /// Query whether the control-only bit is set.
    pub const fn is_control_only(&self) -> bool {
        self.upper & Self::CONTROL_ONLY != 0
    }

    /// This address with the control-only bit set.
    pub const fn control_only(self) -> Address {
        Address::new(self.upper | Self::CONTROL_ONLY, self.lower)
    }

    /// Read an address from the six-octet link-layer field, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is shorter than six octets.
    pub fn from_bytes(data: &[u8]) -> Address {
        Address {
            upper: NetworkEndian::read_u16(&data[0..2]),
            lower: NetworkEndian::read_u32(&data[2..6]),
        }
    }

    /// Write the address into a six-octet link-layer field, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is shorter than six octets.
    pub fn write_bytes(&self, data: &mut [u8]) {
        NetworkEndian::write_u16(&mut data[0..2], self.upper);
        NetworkEndian::write_u32(&mut data[2..6], self.lower);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04x}:{:08x}", self.upper, self.lower)
    }
}

byte_wrapper! {
    /// A byte sequence representing the addressed head of a carrier frame.
    #[derive(Debug, PartialEq, Eq)]
    pub struct link_frame([u8]);
}

mod field {
    type Field = ::core::ops::Range<usize>;

    pub(crate) const DESTINATION: Field = 0..6;
    pub(crate) const SOURCE:      Field = 6..12;
}

impl link_frame {
    /// Length of the addressed frame head in octets.
    pub const HEADER_LEN: usize = field::SOURCE.end;

    /// Imbue a raw octet buffer with carrier frame structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with carrier frame structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Validate the buffer length and imbue it with frame structure.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::check_len(data)?;
        Ok(Self::new_unchecked(data))
    }

    /// Validate the buffer length and imbue it with mutable frame structure.
    pub fn new_checked_mut(data: &mut [u8]) -> Result<&mut Self> {
        Self::check_len(data)?;
        Ok(Self::new_unchecked_mut(data))
    }

    /// Ensure that no accessor on a buffer of this length will panic.
    pub fn check_len(data: &[u8]) -> Result<()> {
        if data.len() < Self::HEADER_LEN {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Unwrap the frame as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The destination address field.
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DESTINATION])
    }

    /// The source address field.
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SOURCE])
    }

    /// Set the destination address field.
    pub fn set_dst_addr(&mut self, addr: Address) {
        addr.write_bytes(&mut self.0[field::DESTINATION])
    }

    /// Set the source address field.
    pub fn set_src_addr(&mut self, addr: Address) {
        addr.write_bytes(&mut self.0[field::SOURCE])
    }
}

/// A high-level representation of the two frame address fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repr {
    /// The destination address, carrying the message for inbound frames.
    pub dst_addr: Address,
    /// The source address, identifying the sender.
    pub src_addr: Address,
}

impl Repr {
    /// Parse the address fields of a frame.
    pub fn parse(frame: &link_frame) -> Repr {
        Repr {
            dst_addr: frame.dst_addr(),
            src_addr: frame.src_addr(),
        }
    }

    /// Emit the address fields into a frame.
    pub fn emit(&self, frame: &mut link_frame) {
        frame.set_dst_addr(self.dst_addr);
        frame.set_src_addr(self.src_addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tie_break_order_is_lexicographic() {
        assert!(Address::new(1, 0) > Address::new(0, 0xffff_ffff));
        assert!(Address::new(1, 100) > Address::new(1, 50));
        assert_eq!(Address::new(0, 1), Address::new(0, 1));
    }

    #[test]
    fn tag_dispatch() {
        assert_eq!(Address::hello().tag(), Tag::Hello);
        assert_eq!(Address::event(7).tag(), Tag::Event);
        assert_eq!(Address::ait(9).tag(), Tag::Ait);
        assert_eq!(Address::ack(11).tag(), Tag::Ack);
        assert_eq!(Address::nop().tag(), Tag::Nop);
        // The tag survives the control-only marking.
        let addr = Address::event(7).control_only();
        assert!(addr.is_control_only());
        assert_eq!(addr.tag(), Tag::Event);
    }

    #[test]
    fn byte_round_trip() {
        let addr = Address::new(0x8003, 0xdead_beef);
        let mut data = [0u8; 6];
        addr.write_bytes(&mut data);
        assert_eq!(data, [0x80, 0x03, 0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(Address::from_bytes(&data), addr);
    }

    #[test]
    fn frame_fields() {
        let mut data = [0u8; 14];
        let frame = link_frame::new_unchecked_mut(&mut data);
        Repr {
            dst_addr: Address::event(4),
            src_addr: Address::new(1, 100),
        }.emit(frame);
        let parsed = Repr::parse(link_frame::new_checked(&data).unwrap());
        assert_eq!(parsed.dst_addr, Address::event(4));
        assert_eq!(parsed.src_addr, Address::new(1, 100));
    }

    #[test]
    fn frame_too_short() {
        let data = [0u8; 11];
        assert_eq!(link_frame::new_checked(&data), Err(Error::Truncated));
    }
}
