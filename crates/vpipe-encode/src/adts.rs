//! ADTS framing for raw AAC-LC payloads.
//!
//! Header layout (7 bytes, no CRC):
//!
//! ```text
//! syncword(12) id(1) layer(2) protection_absent(1)
//! profile(2) freq_index(4) private(1) channel_config(3)
//! original(1) home(1) copyright_id(1) copyright_start(1) frame_length(13)
//! buffer_fullness(11) raw_blocks(2)
//! ```

use crate::error::{EncodeError, EncodeResult};

/// Header length in bytes.
pub const HEADER_LEN: usize = 7;

/// Largest frame (header included) the 13-bit length field can describe.
pub const MAX_FRAME_LEN: usize = (1 << 13) - 1;

/// AAC Low Complexity object type.
const PROFILE_AAC_LC: u8 = 2;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// MPEG-4 sampling frequency index of `sample_rate`.
pub fn sample_rate_index(sample_rate: u32) -> EncodeResult<u8> {
    SAMPLE_RATES
        .iter()
        .position(|&r| r == sample_rate)
        .map(|i| i as u8)
        .ok_or(EncodeError::UnsupportedSampleRate(sample_rate))
}

/// Sample rate of an MPEG-4 frequency index.
pub fn sample_rate_of(index: u8) -> Option<u32> {
    SAMPLE_RATES.get(index as usize).copied()
}

/// Builds the header for a `payload_len` byte AAC-LC payload.
pub fn write_header(payload_len: usize, sample_rate: u32, channels: u16) -> EncodeResult<[u8; HEADER_LEN]> {
    let freq = sample_rate_index(sample_rate)?;
    if channels == 0 || channels > 7 {
        return Err(EncodeError::UnsupportedChannels(channels));
    }
    let len = payload_len + HEADER_LEN;
    if len > MAX_FRAME_LEN {
        return Err(EncodeError::PayloadTooLarge(payload_len));
    }
    let chan = channels as u8;
    Ok([
        0xFF,
        0xF1,
        ((PROFILE_AAC_LC - 1) << 6) | (freq << 2) | (chan >> 2),
        ((chan & 3) << 6) | (len >> 11) as u8,
        ((len & 0x7FF) >> 3) as u8,
        (((len & 7) << 5) as u8) | 0x1F,
        0xFC,
    ])
}

/// Header followed by `payload`.
pub fn frame(payload: &[u8], sample_rate: u32, channels: u16) -> EncodeResult<Vec<u8>> {
    let header = write_header(payload.len(), sample_rate, channels)?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Fields recovered from a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    pub sample_rate: u32,
    pub channels: u16,
    /// Whole frame length, header included.
    pub frame_len: usize,
}

impl AdtsHeader {
    /// Parses the first seven bytes of `bytes`. None if there is no syncword.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let h = bytes.get(..HEADER_LEN)?;
        if h[0] != 0xFF || h[1] & 0xF0 != 0xF0 {
            return None;
        }
        let sample_rate = sample_rate_of((h[2] >> 2) & 0x0F)?;
        let channels = (((h[2] & 1) << 2) | (h[3] >> 6)) as u16;
        let frame_len = (((h[3] & 3) as usize) << 11) | ((h[4] as usize) << 3) | ((h[5] >> 5) as usize);
        Some(Self {
            sample_rate,
            channels,
            frame_len,
        })
    }
}
