mod checksum;
mod codec;
mod error;
mod frame;
pub mod message;

pub use crate::checksum::Checksum;
pub use crate::codec::MavlinkCodec;
pub use crate::error::CodecError;
pub use crate::frame::Frame;
pub use crate::message::Message;

pub const MAGIC_V2: u8 = 0xFD;
pub const HEADER_LEN: usize = 10;
pub const CHECKSUM_LEN: usize = 2;
pub const SIGNATURE_LEN: usize = 13;
pub const MAX_PAYLOAD_LEN: usize = 255;
pub const IFLAG_SIGNED: u8 = 0x01;
