//! The seam between a [`DecoderSession`](crate::session::DecoderSession) and the codec
//! library doing the actual bitstream work.

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Once,
    },
};

use crate::{error::EngineError, frame::Geometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineOptions {
    pub error_concealment: bool,
    pub accept_truncated: bool,
}

/// Result of feeding one chunk of compressed data to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStep {
    pub consumed: usize,
    pub picture_complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Planar 4:2:0, limited (video) range.
    Yuv420p,
    /// Planar 4:2:0, full (JPEG) range.
    Yuvj420p,
    /// Anything else, tagged with the engine's own format id.
    Unknown(i32),
}

impl PixelFormat {
    pub fn is_planar_420(&self) -> bool {
        matches!(self, PixelFormat::Yuv420p | PixelFormat::Yuvj420p)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Yuv420p => write!(f, "yuv420p"),
            PixelFormat::Yuvj420p => write!(f, "yuvj420p"),
            PixelFormat::Unknown(id) => write!(f, "unknown({})", id),
        }
    }
}

/// A decoded picture in the engine's native planar layout, borrowed from the engine.
#[derive(Debug, Clone, Copy)]
pub struct Picture<'a> {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub planes: [&'a [u8]; 3],
    pub strides: [usize; 3],
}

impl<'a> Picture<'a> {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.width, self.height)
    }
}

/// One-time, process-wide setup of a codec library.
pub struct GlobalRegistration {
    once: Once,
    runs: AtomicUsize,
}

impl GlobalRegistration {
    pub const fn new() -> Self {
        Self {
            once: Once::new(),
            runs: AtomicUsize::new(0),
        }
    }

    pub fn ensure<R: FnOnce()>(&self, register: R) {
        self.once.call_once(|| {
            register();
            self.runs.fetch_add(1, Ordering::SeqCst);
        });
    }

    pub fn is_registered(&self) -> bool {
        self.once.is_completed()
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Default for GlobalRegistration {
    fn default() -> Self {
        Self::new()
    }
}

pub trait DecodeEngine {
    /// The registration guard shared by every instance of this engine type.
    fn registration() -> &'static GlobalRegistration;

    /// Library-wide setup. Runs at most once per process, before the first `open`.
    fn register_globals() {}

    /// Opens the decoder with unknown geometry and allocates its working picture.
    fn open(&mut self, options: &EngineOptions) -> Result<(), EngineError>;

    /// Releases everything `open` acquired. Must tolerate being called when not open.
    fn close(&mut self);

    /// Feeds `data` to the decoder and reports how much of it was consumed.
    fn decode_step(&mut self, data: &[u8]) -> Result<EngineStep, EngineError>;

    /// The most recently completed picture.
    fn picture(&self) -> Option<Picture<'_>>;
}
