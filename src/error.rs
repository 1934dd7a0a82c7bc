//! Decoder error type.

use thiserror::Error;

/// Error type for object stream decoding. The first error aborts the
/// parse; no partial tree is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObjectStreamError {
    #[error("invalid stream magic 0x{0:04x}, expected 0xaced")]
    BadMagic(u16),
    #[error("unsupported stream version {0}, expected 5")]
    BadVersion(u16),
    #[error("illegal content tag 0x{0:02x}")]
    BadTag(u8),
    #[error("illegal classDescFlags 0x{0:02x}")]
    BadClassDescFlags(u8),
    #[error("illegal field type code 0x{0:02x}")]
    BadTypeCode(u8),
    #[error("invalid reference handle 0x{0:08x}")]
    BadReference(u32),
    #[error("string length runs past end of input")]
    BadUtf,
    #[error("data block of {size} bytes exceeds limit of {limit}")]
    BlockTooLarge { size: usize, limit: usize },
    #[error("externalizable data written with protocol version 1 is not supported")]
    Protocol1External,
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("element requires a class descriptor but none was given")]
    MissingClassDesc,
    #[error("invalid array class: {0}")]
    BadArrayClass(String),
    #[error("invalid array length {0}")]
    BadArrayLength(i32),
    #[error("container reshape failed: {0}")]
    BadContainerShape(String),
}
