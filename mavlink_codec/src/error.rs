use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("expected start marker 0xfd, found 0x{found:02x} (skipped {skipped} bytes)")]
    BadMagic { found: u8, skipped: usize },

    #[error("unsupported incompatibility flags 0x{0:02x}")]
    UnsupportedFlags(u8),

    #[error("checksum mismatch for message {id}: computed 0x{computed:04x}, received 0x{received:04x}")]
    ChecksumMismatch { id: u32, computed: u16, received: u16 },

    #[error("payload of {0} bytes does not fit into a frame")]
    PayloadTooLong(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
