//! The decoder state machine: initialization, parameter injection, decode and reset.
//!
//! A session is single-writer. Every call, including parameter staging, has to come from the
//! same thread or be serialized by the caller.

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::{
    config::DecoderConfig,
    convert::FormatConverter,
    engine::DecodeEngine,
    error::{DecodeError, InitError, ParameterError},
    frame::{CompressedFrame, DecodedFrame, Geometry},
    params::ParameterStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    /// Engine open, no picture decoded yet.
    PartiallyInitialized,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionStats {
    pub init_attempts: u64,
    pub parameter_updates: u64,
    pub decoded_pictures: u64,
    pub converted_pictures: u64,
    pub reallocations: u64,
    pub failed_reallocations: u64,
    pub failed_decodes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOutcome {
    pub pictures: usize,
    pub converted: usize,
    pub reallocated: bool,
}

impl DecodeOutcome {
    /// Whether the retained RGB frame was refreshed by this call.
    pub fn has_frame(&self) -> bool {
        self.converted > 0
    }
}

/// Walks a compressed buffer as the engine consumes it.
struct PacketCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PacketCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    fn is_exhausted(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Moves forward by at most the remaining length and returns how far it moved.
    fn advance(&mut self, consumed: usize) -> usize {
        let step = consumed.min(self.data.len() - self.offset);
        self.offset += step;
        step
    }
}

pub struct DecoderSession<E: DecodeEngine> {
    engine: E,
    config: DecoderConfig,
    phase: SessionPhase,
    geometry: Geometry,
    parameters: ParameterStore,
    converter: FormatConverter,
    stats: SessionStats,
}

impl<E: DecodeEngine> DecoderSession<E> {
    pub fn new(engine: E, config: DecoderConfig) -> Self {
        Self {
            engine,
            phase: SessionPhase::Uninitialized,
            geometry: Geometry::UNKNOWN,
            parameters: ParameterStore::new(config.max_parameter_record_size),
            converter: FormatConverter::new(config.max_frame_area),
            stats: SessionStats::default(),
            config,
        }
    }

    pub fn initialize(&mut self) -> Result<(), InitError> {
        if self.is_initialized() {
            return Ok(());
        }

        self.stats.init_attempts += 1;

        E::registration().ensure(E::register_globals);

        if let Err(error) = self.engine.open(&self.config.engine_options()) {
            error!("{}", error);
            self.reset();
            return Err(InitError::Open(error));
        }

        self.phase = SessionPhase::PartiallyInitialized;
        self.geometry = Geometry::UNKNOWN;

        info!("H264 codec is partially initialized!");

        Ok(())
    }

    /// Stages a new SPS/PPS pair for the next [`decode`](Self::decode). The live engine is
    /// left untouched.
    pub fn set_parameters(
        &mut self,
        sps: Option<&[u8]>,
        pps: Option<&[u8]>,
    ) -> Result<(), ParameterError> {
        self.parameters.stage(sps, pps)?;
        self.stats.parameter_updates += 1;
        Ok(())
    }

    pub fn decode(&mut self, frame: &CompressedFrame<'_>) -> Result<DecodeOutcome, DecodeError> {
        let result = self.decode_frame(frame);

        if let Err(error) = &result {
            self.stats.failed_decodes += 1;
            debug!("Decode failed: {}", error);
        }

        result
    }

    fn decode_frame(&mut self, frame: &CompressedFrame<'_>) -> Result<DecodeOutcome, DecodeError> {
        // Rejected before the engine, or the staged parameters, are touched.
        let payload = match frame.payload() {
            Some(payload) => payload,
            None => {
                error!("Invalid frame data. Skipping.");
                return Err(DecodeError::InvalidFrame);
            }
        };

        if !self.is_initialized() {
            if let Err(error) = self.initialize() {
                warn!("Codec initialization failed!");
                return Err(error.into());
            }
        }

        self.apply_pending_parameters()?;

        let geometry_before = self.geometry;
        let mut outcome = DecodeOutcome::default();
        let mut cursor = PacketCursor::new(payload);

        while !cursor.is_exhausted() {
            let offset = cursor.offset();
            let step = self
                .engine
                .decode_step(cursor.remaining())
                .map_err(|source| DecodeError::Engine { offset, source })?;

            if step.picture_complete {
                self.complete_picture(geometry_before, &mut outcome);
            }

            if cursor.advance(step.consumed) == 0 {
                return Err(DecodeError::Stalled {
                    offset,
                    remaining: payload.len() - offset,
                });
            }
        }

        Ok(outcome)
    }

    fn apply_pending_parameters(&mut self) -> Result<(), DecodeError> {
        let blob = match self.parameters.pending() {
            Some(blob) => blob,
            None => return Ok(()),
        };

        let expected = blob.len();
        info!("Updating H264 codec parameters (Buffer Size: {}) ...", expected);

        match self.engine.decode_step(blob) {
            Ok(step) if step.consumed == expected => {
                self.parameters.mark_consumed();
                Ok(())
            }
            Ok(step) => {
                error!("Unexpected error while updating H264 parameters.");
                Err(DecodeError::Priming {
                    consumed: step.consumed,
                    expected,
                })
            }
            Err(source) => {
                error!("Unexpected error while updating H264 parameters.");
                Err(DecodeError::PrimingFailed(source))
            }
        }
    }

    fn complete_picture(&mut self, geometry_before: Geometry, outcome: &mut DecodeOutcome) {
        let Self {
            engine,
            phase,
            geometry,
            converter,
            stats,
            ..
        } = self;

        let picture = match engine.picture() {
            Some(picture) => picture,
            None => {
                warn!("Decoder reported a finished picture without exposing it");
                return;
            }
        };

        stats.decoded_pictures += 1;
        outcome.pictures += 1;

        let current = picture.geometry();
        *geometry = current;
        if current.is_known() {
            *phase = SessionPhase::Ready;
        }

        let changed = current != geometry_before;
        if !converter.matches(current, picture.format) && (changed || current.is_known()) {
            if changed {
                info!("Frame size changed to {} x {}", picture.width, picture.height);
            }

            if let Some(previous) = converter.source_format() {
                if previous != picture.format {
                    info!("Pixel format changed from {} to {}", previous, picture.format);
                }
            }

            match converter.reallocate_buffers(picture.width, picture.height, picture.format) {
                Ok(_) => {
                    stats.reallocations += 1;
                    outcome.reallocated = true;
                }
                Err(error) => {
                    stats.failed_reallocations += 1;
                    error!("Buffer reallocation failed! {}", error);
                }
            }
        }

        match converter.convert_frame_to_rgb(&picture) {
            Ok(true) => {
                stats.converted_pictures += 1;
                outcome.converted += 1;
            }
            Ok(false) => (),
            Err(error) => warn!("Frame conversion failed! {}", error),
        }
    }

    /// Releases the engine and every conversion buffer. Staged parameters survive.
    pub fn reset(&mut self) {
        self.engine.close();
        self.converter.release();
        self.geometry = Geometry::UNKNOWN;
        self.phase = SessionPhase::Uninitialized;

        info!("Reset!");
    }

    pub fn is_initialized(&self) -> bool {
        self.phase != SessionPhase::Uninitialized
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn width(&self) -> u32 {
        self.geometry.width()
    }

    pub fn height(&self) -> u32 {
        self.geometry.height()
    }

    /// The retained RGB24 frame, when conversion buffers match the current geometry.
    pub fn frame(&self) -> Option<DecodedFrame<'_>> {
        if !self.geometry.is_known() || self.converter.geometry() != self.geometry {
            return None;
        }

        self.converter.frame()
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: DecodeEngine> Drop for DecoderSession<E> {
    fn drop(&mut self) {
        if self.is_initialized() {
            self.reset();
        }
    }
}
