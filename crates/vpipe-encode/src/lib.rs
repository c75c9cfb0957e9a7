//! Audio encode sink boundary for vpipe.
//!
//! The AAC codec lives outside this workspace; this crate defines the
//! contract it plugs into ([`FrameCodec`]) and the packetization around it.
//!
//! # Example
//!
//! ```
//! use vpipe_encode::{AdtsEncoder, AudioEncoder, AudioEncoderDesc, EncodeResult, FrameCodec};
//!
//! /// Emits the first byte of each frame as a one-byte payload.
//! struct Probe;
//!
//! impl FrameCodec for Probe {
//!     fn frame_size(&self) -> usize { 1024 }
//!     fn encode_frame(&mut self, pcm: &[i16]) -> EncodeResult<Vec<Vec<u8>>> {
//!         Ok(vec![vec![pcm[0] as u8]])
//!     }
//! }
//!
//! let mut enc = AdtsEncoder::new(AudioEncoderDesc::default(), Probe).unwrap();
//! let packets = enc.encode(&vec![1i16; 2048], 0).unwrap();
//! assert_eq!(packets.len(), 1);
//! assert_eq!(packets[0].data.len(), 8);
//! ```

pub mod adts;
pub mod encoder;
pub mod error;

pub use adts::AdtsHeader;
pub use encoder::{AdtsEncoder, AudioEncoder, AudioEncoderDesc, EncodedPacket, FrameCodec};
pub use error::{EncodeError, EncodeResult};
