//thiserror-based error types
use std::path::PathBuf;
use thiserror::Error;

/// Failures inside the capture facility. These never leave `PacketLog`;
/// they are logged or counted at the point where they happen.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO: {0}")] Io(#[from] std::io::Error),
    #[error("open {}: {source}", path.display())]
    Open { path: PathBuf, source: std::io::Error },
    #[error("payload too large: {0} bytes")] PayloadTooLarge(usize),
}

/// Failures while decoding a capture file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("bad magic")] BadMagic,
    #[error("unsupported format version {0:#06x}")] UnsupportedVersion(u16),
    #[error("unknown direction tag {0}")] UnknownDirection(u8),
    #[error("bad address length {0}")] BadAddressLength(u8),
    #[error("truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config: {0}")] Load(#[from] ::config::ConfigError),
}
