use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bad magic: expected {expected:#010x}, found {found:#010x}")]
    BadMagic { expected: u32, found: u32 },

    #[error("unsupported format version {found}, this codec speaks {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("truncated frame: expected {expected} more bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("delta base version {base} does not match local version {local}")]
    BaseVersionMismatch { base: u64, local: u64 },

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Engine(#[from] enginecore::EngineError),
}
