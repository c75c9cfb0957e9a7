//! Audio encoder boundary.
//!
//! The codec itself is external. [`AdtsEncoder`] takes care of everything
//! around it: buffering interleaved PCM into codec-sized frames, stamping
//! presentation times and wrapping raw payloads in ADTS headers.

use tracing::{debug, trace};

use crate::adts;
use crate::error::{EncodeError, EncodeResult};

/// Encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioEncoderDesc {
    /// Target bitrate in bits per second.
    pub bitrate: u32,
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// 1 (mono) or 2 (stereo).
    pub channels: u16,
}

impl Default for AudioEncoderDesc {
    fn default() -> Self {
        Self {
            bitrate: 128_000,
            sample_rate: 44_100,
            channels: 2,
        }
    }
}

impl AudioEncoderDesc {
    /// Checks the settings against what the ADTS sink can carry.
    pub fn validate(&self) -> EncodeResult<()> {
        if self.bitrate == 0 {
            return Err(EncodeError::InvalidDesc("bitrate must be positive".into()));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(EncodeError::UnsupportedChannels(self.channels));
        }
        adts::sample_rate_index(self.sample_rate)?;
        Ok(())
    }
}

/// One encoded, framed access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    /// ADTS header plus payload.
    pub data: Vec<u8>,
    /// Presentation time in milliseconds.
    pub pts: u64,
}

/// Consumes interleaved 16-bit PCM and produces packets.
pub trait AudioEncoder: Send {
    /// Active settings.
    fn desc(&self) -> &AudioEncoderDesc;

    /// Feeds PCM captured at `timestamp` (ms); returns packets completed so far.
    fn encode(&mut self, pcm: &[i16], timestamp: u64) -> EncodeResult<Vec<EncodedPacket>>;

    /// Drains buffered audio and any packets held by the codec.
    fn flush(&mut self) -> EncodeResult<Vec<EncodedPacket>>;
}

/// Raw AAC codec: one PCM frame in, zero or more raw payloads out.
pub trait FrameCodec: Send {
    /// Samples per channel the codec consumes per call.
    fn frame_size(&self) -> usize;

    /// Encodes exactly `frame_size() * channels` interleaved samples.
    fn encode_frame(&mut self, pcm: &[i16]) -> EncodeResult<Vec<Vec<u8>>>;

    /// Returns payloads still held after the last frame.
    fn drain(&mut self) -> EncodeResult<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }
}

/// [`AudioEncoder`] over a [`FrameCodec`] producing ADTS-framed packets.
pub struct AdtsEncoder<C> {
    desc: AudioEncoderDesc,
    codec: C,
    pending: Vec<i16>,
    /// Timestamp of the first buffered sample.
    base_pts: u64,
    /// Frames emitted since `base_pts`.
    emitted: u64,
}

impl<C: FrameCodec> AdtsEncoder<C> {
    /// Validates `desc` and wraps `codec`.
    pub fn new(desc: AudioEncoderDesc, codec: C) -> EncodeResult<Self> {
        desc.validate()?;
        if codec.frame_size() == 0 {
            return Err(EncodeError::InvalidDesc("codec frame size must be positive".into()));
        }
        debug!(
            bitrate = desc.bitrate,
            sample_rate = desc.sample_rate,
            channels = desc.channels,
            frame_size = codec.frame_size(),
            "audio encoder opened"
        );
        Ok(Self {
            desc,
            codec,
            pending: Vec::new(),
            base_pts: 0,
            emitted: 0,
        })
    }

    /// Interleaved samples per codec frame.
    fn frame_samples(&self) -> usize {
        self.codec.frame_size() * self.desc.channels as usize
    }

    /// Presentation time of the next frame in milliseconds.
    fn next_pts(&self) -> u64 {
        let samples = self.emitted * self.codec.frame_size() as u64;
        self.base_pts + samples * 1000 / self.desc.sample_rate as u64
    }

    /// Wrapped codec.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Buffered samples not yet handed to the codec.
    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }

    fn wrap(&self, payloads: Vec<Vec<u8>>, pts: u64) -> EncodeResult<Vec<EncodedPacket>> {
        payloads
            .into_iter()
            .map(|payload| {
                Ok(EncodedPacket {
                    data: adts::frame(&payload, self.desc.sample_rate, self.desc.channels)?,
                    pts,
                })
            })
            .collect()
    }
}

impl<C: FrameCodec> AudioEncoder for AdtsEncoder<C> {
    fn desc(&self) -> &AudioEncoderDesc {
        &self.desc
    }

    fn encode(&mut self, pcm: &[i16], timestamp: u64) -> EncodeResult<Vec<EncodedPacket>> {
        let channels = self.desc.channels;
        if pcm.len() % channels as usize != 0 {
            return Err(EncodeError::PartialSampleFrame { len: pcm.len(), channels });
        }
        if self.pending.is_empty() {
            self.base_pts = timestamp;
            self.emitted = 0;
        }
        self.pending.extend_from_slice(pcm);

        let step = self.frame_samples();
        let mut packets = Vec::new();
        let mut consumed = 0;
        while self.pending.len() - consumed >= step {
            let payloads = self.codec.encode_frame(&self.pending[consumed..consumed + step])?;
            packets.extend(self.wrap(payloads, self.next_pts())?);
            consumed += step;
            self.emitted += 1;
        }
        self.pending.drain(..consumed);
        trace!(packets = packets.len(), pending = self.pending.len(), "pcm encoded");
        Ok(packets)
    }

    fn flush(&mut self) -> EncodeResult<Vec<EncodedPacket>> {
        let mut packets = Vec::new();
        if !self.pending.is_empty() {
            let mut last = std::mem::take(&mut self.pending);
            last.resize(self.frame_samples(), 0);
            let payloads = self.codec.encode_frame(&last)?;
            packets.extend(self.wrap(payloads, self.next_pts())?);
            self.emitted += 1;
        }
        let drained = self.codec.drain()?;
        packets.extend(self.wrap(drained, self.next_pts())?);
        debug!(packets = packets.len(), "audio encoder flushed");
        Ok(packets)
    }
}
