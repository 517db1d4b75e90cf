//! H.264 decoding for live camera streams.
//!
//! A [`DecoderSession`](session::DecoderSession) owns a decode engine, splices parameter-set
//! updates into the running stream, follows resolution changes and keeps exactly one RGB24
//! frame around for the caller. The engine itself sits behind the
//! [`DecodeEngine`](engine::DecodeEngine) trait: libavcodec with the `ffmpeg` feature, a scripted
//! fake with `fake-engine`.

pub mod annexb;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod frame;
pub mod params;
pub mod processor;
pub mod session;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

#[cfg(any(test, feature = "fake-engine"))]
pub mod fake;

pub use config::DecoderConfig;
pub use engine::{DecodeEngine, EngineOptions, EngineStep, Picture, PixelFormat};
pub use error::{AllocationError, ConvertError, DecodeError, EngineError, InitError, ParameterError};
pub use frame::{CompressedFrame, DecodedFrame, Geometry};
pub use session::{DecodeOutcome, DecoderSession, SessionPhase, SessionStats};
