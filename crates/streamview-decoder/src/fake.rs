//! A scripted [`DecodeEngine`] for exercising sessions without a codec library.
//!
//! The fake understands a tiny synthetic bitstream:
//!
//! - `[PICTURE_MARKER, w_hi, w_lo, h_hi, h_lo, len_hi, len_lo, ..]` is one picture unit of
//!   `len` bytes (header included) describing a `w` x `h` gray picture;
//! - the same header led by [`FULL_RANGE_PICTURE_MARKER`] describes a `yuvj420p` picture;
//! - a unit starting with [`ERROR_MARKER`] makes the step fail;
//! - a unit starting with [`STALL_MARKER`] is never consumed;
//! - anything else (parameter sets included) is swallowed whole without producing a picture.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::{
    engine::{DecodeEngine, EngineOptions, EngineStep, GlobalRegistration, Picture, PixelFormat},
    error::EngineError,
};

pub const PICTURE_MARKER: u8 = 0xFA;
pub const FULL_RANGE_PICTURE_MARKER: u8 = 0xFB;
pub const ERROR_MARKER: u8 = 0xEE;
pub const STALL_MARKER: u8 = 0x5A;

const PICTURE_HEADER_LEN: usize = 7;

static REGISTRATION: GlobalRegistration = GlobalRegistration::new();

/// Builds a `len` bytes picture unit for a `width` x `height` picture.
pub fn picture_unit(width: u16, height: u16, len: usize) -> Vec<u8> {
    unit_with_marker(PICTURE_MARKER, width, height, len)
}

/// Like [`picture_unit`], for a full-range picture.
pub fn full_range_picture_unit(width: u16, height: u16, len: usize) -> Vec<u8> {
    unit_with_marker(FULL_RANGE_PICTURE_MARKER, width, height, len)
}

fn unit_with_marker(marker: u8, width: u16, height: u16, len: usize) -> Vec<u8> {
    let len = len.max(PICTURE_HEADER_LEN);
    let declared = u16::try_from(len).unwrap_or(u16::MAX);

    let mut unit = vec![0u8; len];
    unit[0] = marker;
    unit[1..3].copy_from_slice(&width.to_be_bytes());
    unit[3..5].copy_from_slice(&height.to_be_bytes());
    unit[5..7].copy_from_slice(&declared.to_be_bytes());
    unit
}

/// Counters shared between a test and the engines it hands out.
#[derive(Debug, Default)]
pub struct FakeProbe {
    open_attempts: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
    steps: AtomicUsize,
    bytes: AtomicUsize,
}

impl FakeProbe {
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    /// Total bytes consumed by every step so far.
    pub fn bytes(&self) -> usize {
        self.bytes.load(Ordering::SeqCst)
    }
}

struct FakePicture {
    format: PixelFormat,
    width: u32,
    height: u32,
    strides: [usize; 3],
    planes: [Vec<u8>; 3],
}

pub struct FakeEngine {
    probe: Arc<FakeProbe>,
    failing_opens: usize,
    max_step: Option<usize>,
    luma: u8,
    padding: usize,
    format: PixelFormat,

    open: bool,
    options: Option<EngineOptions>,
    picture: Option<FakePicture>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(FakeProbe::default()),
            failing_opens: 0,
            max_step: None,
            luma: 235,
            padding: 8,
            format: PixelFormat::Yuv420p,
            open: false,
            options: None,
            picture: None,
        }
    }

    // Building functions
    pub fn probe(mut self, probe: Arc<FakeProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// The first `count` calls to `open` fail.
    pub fn failing_opens(mut self, count: usize) -> Self {
        self.failing_opens = count;
        self
    }

    /// Caps how many bytes of non-picture data a single step swallows.
    pub fn max_step(mut self, bytes: usize) -> Self {
        self.max_step = Some(bytes);
        self
    }

    pub fn luma(mut self, luma: u8) -> Self {
        self.luma = luma;
        self
    }

    pub fn format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn shared_probe(&self) -> Arc<FakeProbe> {
        self.probe.clone()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn options(&self) -> Option<EngineOptions> {
        self.options
    }

    fn render(&mut self, format: PixelFormat, width: u32, height: u32) {
        let chroma_width = (width as usize + 1) / 2;
        let chroma_height = (height as usize + 1) / 2;
        let strides = [
            width as usize + self.padding,
            chroma_width + self.padding,
            chroma_width + self.padding,
        ];

        self.picture = Some(FakePicture {
            format,
            width,
            height,
            strides,
            planes: [
                vec![self.luma; strides[0] * height as usize],
                vec![128; strides[1] * chroma_height],
                vec![128; strides[2] * chroma_height],
            ],
        });
    }
}

impl DecodeEngine for FakeEngine {
    fn registration() -> &'static GlobalRegistration {
        &REGISTRATION
    }

    fn open(&mut self, options: &EngineOptions) -> Result<(), EngineError> {
        self.probe.open_attempts.fetch_add(1, Ordering::SeqCst);

        if self.failing_opens > 0 {
            self.failing_opens -= 1;
            return Err(EngineError::Open("scripted failure".to_string()));
        }

        self.open = true;
        self.options = Some(*options);
        self.picture = None;
        self.probe.opens.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
        }

        self.open = false;
        self.picture = None;
    }

    fn decode_step(&mut self, data: &[u8]) -> Result<EngineStep, EngineError> {
        if !self.open {
            return Err(EngineError::NotOpen);
        }

        self.probe.steps.fetch_add(1, Ordering::SeqCst);

        let step = match data.first() {
            None => EngineStep::default(),
            Some(&ERROR_MARKER) => return Err(EngineError::Decode("corrupted slice".to_string())),
            Some(&STALL_MARKER) => EngineStep::default(),
            Some(&marker)
                if (marker == PICTURE_MARKER || marker == FULL_RANGE_PICTURE_MARKER)
                    && data.len() >= PICTURE_HEADER_LEN =>
            {
                let format = if marker == FULL_RANGE_PICTURE_MARKER {
                    PixelFormat::Yuvj420p
                } else {
                    self.format
                };

                let width = u16::from_be_bytes([data[1], data[2]]) as u32;
                let height = u16::from_be_bytes([data[3], data[4]]) as u32;
                let declared = u16::from_be_bytes([data[5], data[6]]) as usize;

                self.render(format, width, height);

                EngineStep {
                    consumed: declared.clamp(PICTURE_HEADER_LEN, data.len()),
                    picture_complete: true,
                }
            }
            Some(_) => EngineStep {
                consumed: self.max_step.map_or(data.len(), |max| max.min(data.len())),
                picture_complete: false,
            },
        };

        self.probe.bytes.fetch_add(step.consumed, Ordering::SeqCst);

        Ok(step)
    }

    fn picture(&self) -> Option<Picture<'_>> {
        let picture = self.picture.as_ref()?;

        Some(Picture {
            format: picture.format,
            width: picture.width,
            height: picture.height,
            planes: [
                picture.planes[0].as_slice(),
                picture.planes[1].as_slice(),
                picture.planes[2].as_slice(),
            ],
            strides: picture.strides,
        })
    }
}
