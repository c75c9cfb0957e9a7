//! Error types for vpipe-encode.

use thiserror::Error;

/// Result type alias for encode operations.
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// Encoder configuration and packetization errors.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Encoder settings out of range.
    #[error("invalid encoder settings: {0}")]
    InvalidDesc(String),

    /// Sample rate has no ADTS frequency index.
    #[error("unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    /// Channel count not expressible in an ADTS header.
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    /// Payload exceeds the 13-bit ADTS frame length.
    #[error("payload of {0} bytes does not fit an ADTS frame")]
    PayloadTooLarge(usize),

    /// PCM block is not a whole number of sample frames.
    #[error("pcm length {len} is not a multiple of {channels} channels")]
    PartialSampleFrame { len: usize, channels: u16 },

    /// Failure reported by the underlying codec.
    #[error("codec error: {0}")]
    Codec(String),
}
