/*! Low-level access to the protocol's carrier frame fields.

The entanglement protocol does not define a frame format of its own. It
rides on the two link-layer address fields of whatever framing the adapter
uses: a 48-bit address is split into a 16-bit upper half carrying the
message tag and a 32-bit lower half carrying the sequence number or
payload value. This module provides:

 * [`Address`], the split representation, with the lexicographic ordering
   the hello tie-break depends on and constructors for each message kind.
 * [`Tag`], the reserved values of the upper half.
 * [`link_frame`], a byte wrapper giving checked access to the destination
   and source address fields of a raw frame, and [`Repr`], the parsed pair.

The byte wrapper follows the usual convention: `new_unchecked` never fails
but field accessors may panic on a short buffer, `new_checked` verifies the
length up front so that no accessor panics afterwards.

[`Address`]: struct.Address.html
[`Tag`]: enum.Tag.html
[`link_frame`]: struct.link_frame.html
[`Repr`]: struct.Repr.html
*/
mod link;

pub use self::link::{
    Address,
    Error,
    Repr,
    Result,
    Tag,
    link_frame,
    MAX_PAYLOAD_SIZE,
};
