use std::fmt;

use serde::{Deserialize, Serialize};

/// Frame dimensions. Either both sides are zero (unknown) or both are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Geometry {
    width: u32,
    height: u32,
}

impl Geometry {
    pub const UNKNOWN: Geometry = Geometry {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            Self::UNKNOWN
        } else {
            Self { width, height }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_known(&self) -> bool {
        self.width > 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn rgb24_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(3)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.width, self.height)
    }
}

/// A compressed frame as handed over by the transport: a buffer that may be missing and
/// the number of bytes of it actually in use.
#[derive(Debug, Clone, Copy)]
pub struct CompressedFrame<'a> {
    data: Option<&'a [u8]>,
    used: usize,
}

impl<'a> CompressedFrame<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data: Some(data),
            used: data.len(),
        }
    }

    pub fn from_parts(data: Option<&'a [u8]>, used: usize) -> Self {
        Self { data, used }
    }

    pub fn missing() -> Self {
        Self {
            data: None,
            used: 0,
        }
    }

    /// The bytes to decode, or `None` when the frame is missing, empty or claims more bytes
    /// than its buffer holds.
    pub fn payload(&self) -> Option<&'a [u8]> {
        if self.used == 0 {
            return None;
        }

        self.data?.get(..self.used)
    }
}

impl<'a> From<&'a [u8]> for CompressedFrame<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

/// Read-only view of the packed RGB24 frame retained by a session.
#[derive(Debug, Clone, Copy)]
pub struct DecodedFrame<'a> {
    data: &'a [u8],
    geometry: Geometry,
}

impl<'a> DecodedFrame<'a> {
    pub fn new(data: &'a [u8], geometry: Geometry) -> Self {
        Self { data, geometry }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.geometry.width()
    }

    pub fn height(&self) -> u32 {
        self.geometry.height()
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn stride(&self) -> usize {
        self.geometry.width() as usize * 3
    }

    pub fn row(&self, y: u32) -> Option<&'a [u8]> {
        let stride = self.stride();
        let start = y as usize * stride;
        self.data.get(start..start + stride)
    }
}
