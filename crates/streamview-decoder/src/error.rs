use std::{collections::TryReserveError, fmt};

use streamview_core::error::DropReason;
use thiserror::Error;

use crate::{engine::PixelFormat, frame::Geometry};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Codec {0} not found")]
    CodecNotFound(&'static str),

    #[error("Can not open the decoder: {0}")]
    Open(String),

    #[error("Can not allocate memory for frames")]
    FrameAllocation,

    #[error("Decoder is not open")]
    NotOpen,

    #[error("Decode error: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum InitError {
    #[error("Codec initialization failed")]
    Open(#[source] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterRecord {
    Sps,
    Pps,
}

impl fmt::Display for ParameterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterRecord::Sps => write!(f, "SPS"),
            ParameterRecord::Pps => write!(f, "PPS"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("Missing {0} record")]
    Missing(ParameterRecord),

    #[error("Empty {0} record")]
    Empty(ParameterRecord),

    #[error("{record} record too large: {size} bytes (must be below {limit})")]
    Oversized {
        record: ParameterRecord,
        size: usize,
        limit: usize,
    },
}

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("Invalid frame size: {width} x {height}")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("Frame size {width} x {height} exceeds the limit of {limit} pixels")]
    TooLarge { width: u32, height: u32, limit: u64 },

    #[error("Can not allocate memory for the buffer: {bytes}")]
    OutOfMemory {
        bytes: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("No conversion from {0} to RGB24")]
    UnsupportedFormat(PixelFormat),

    #[error("Scaling from {source_geometry} to {target_geometry} is not supported")]
    Resize {
        source_geometry: Geometry,
        target_geometry: Geometry,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("No conversion buffers allocated")]
    NoBuffers,

    #[error("Buffers allocated for {expected}, picture is {actual}")]
    GeometryMismatch { expected: Geometry, actual: Geometry },

    #[error("Picture format {actual} does not match the conversion context ({expected})")]
    FormatMismatch {
        expected: PixelFormat,
        actual: PixelFormat,
    },

    #[error("Plane {plane} stride is {stride} bytes, {required} required")]
    StrideTooSmall {
        plane: usize,
        stride: usize,
        required: usize,
    },

    #[error("Plane {plane} holds {len} bytes, {required} required")]
    PlaneTooShort {
        plane: usize,
        len: usize,
        required: usize,
    },

    #[error("Rows {start}..{end} outside of a {height} rows picture")]
    InvalidSlice { start: u32, end: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    NotInitialized(#[from] InitError),

    #[error("Codec parameters update consumed {consumed} of {expected} bytes")]
    Priming { consumed: usize, expected: usize },

    #[error("Codec parameters update failed")]
    PrimingFailed(#[source] EngineError),

    #[error("Invalid frame data")]
    InvalidFrame,

    #[error("Decode failed at offset {offset}")]
    Engine {
        offset: usize,
        #[source]
        source: EngineError,
    },

    #[error("Decoder made no progress at offset {offset} ({remaining} bytes left)")]
    Stalled { offset: usize, remaining: usize },
}

impl DecodeError {
    pub fn drop_reason(&self) -> DropReason {
        match self {
            DecodeError::NotInitialized(_) => DropReason::CodecNotInitialized,
            DecodeError::Priming { .. } | DecodeError::PrimingFailed(_) => {
                DropReason::CodecParametersError
            }
            DecodeError::InvalidFrame => DropReason::InvalidFrame,
            DecodeError::Engine { .. } | DecodeError::Stalled { .. } => DropReason::CodecError,
        }
    }
}
