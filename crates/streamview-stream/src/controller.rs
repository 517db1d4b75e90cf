//! Entry points for the transport driver.
//!
//! The driver calls [`StreamController::on_codec_parameters`] and
//! [`StreamController::on_frame`] from its own delivery thread, possibly from more than one. Both
//! paths run under a single lock, so the decoder session keeps a single writer and the user
//! callback never runs concurrently with itself.

use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use streamview_core::error::DropReason;
use streamview_decoder::{
    CompressedFrame, DecodeEngine, DecodedFrame, DecoderConfig, DecoderSession, Geometry,
    ParameterError, SessionStats,
};

use crate::device::{DeviceControl, DeviceError};

pub type FrameCallback = Box<dyn FnMut(&DecodedFrame<'_>) + Send>;

type EngineFactory<E> = Box<dyn Fn() -> E + Send + Sync>;

/// Out-of-band SPS/PPS notification, records passed as received.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecParameters<'a> {
    pub sps: Option<&'a [u8]>,
    pub pps: Option<&'a [u8]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterDisposition {
    /// Staged for the next frame; carries the staged blob size.
    Staged(usize),
    Rejected(ParameterError),
    /// No decoder yet.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// A picture was converted and handed to the callback.
    Delivered(Geometry),
    /// Consumed without anything to deliver.
    Decoded,
    Dropped(DropReason),
    /// No decoder yet.
    Ignored,
}

struct Delivery<E: DecodeEngine> {
    session: DecoderSession<E>,
    callback: Option<FrameCallback>,
}

pub struct StreamController<E: DecodeEngine, D: DeviceControl> {
    device: Mutex<D>,
    delivery: Mutex<Option<Delivery<E>>>,
    engine_factory: EngineFactory<E>,
    config: DecoderConfig,
}

impl<E: DecodeEngine, D: DeviceControl> StreamController<E, D> {
    pub fn new<F>(device: D, config: DecoderConfig, engine_factory: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        Self {
            device: Mutex::new(device),
            delivery: Mutex::new(None),
            engine_factory: Box::new(engine_factory),
            config,
        }
    }

    /// Asks the device to start sending video.
    pub fn start_streaming(&self) -> Result<(), DeviceError> {
        info!("Starting video streaming");
        self.device.lock().set_video_streaming(true)
    }

    /// Registers `callback` for decoded frames, building the decoder session on first use, and
    /// starts streaming. A later call replaces the callback and keeps the session.
    pub fn start_streaming_with<C>(&self, callback: C) -> Result<(), DeviceError>
    where
        C: FnMut(&DecodedFrame<'_>) + Send + 'static,
    {
        {
            let mut delivery = self.delivery.lock();
            match delivery.as_mut() {
                Some(delivery) => delivery.callback = Some(Box::new(callback)),
                None => {
                    debug!("Creating decoder session");
                    *delivery = Some(Delivery {
                        session: DecoderSession::new((self.engine_factory)(), self.config.clone()),
                        callback: Some(Box::new(callback)),
                    });
                }
            }
        }

        self.start_streaming()
    }

    /// Like [`start_streaming_with`](Self::start_streaming_with), with a context value handed
    /// to every invocation of `callback`.
    pub fn start_streaming_with_context<T>(
        &self,
        callback: fn(&DecodedFrame<'_>, &mut T),
        mut context: T,
    ) -> Result<(), DeviceError>
    where
        T: Send + 'static,
    {
        self.start_streaming_with(move |frame: &DecodedFrame<'_>| callback(frame, &mut context))
    }

    /// Asks the device to stop sending video. Decoder state is kept.
    pub fn stop_streaming(&self) -> Result<(), DeviceError> {
        info!("Stopping video streaming");
        self.device.lock().set_video_streaming(false)
    }

    pub fn on_codec_parameters(&self, parameters: &CodecParameters<'_>) -> ParameterDisposition {
        let mut delivery = self.delivery.lock();
        let session = match delivery.as_mut() {
            Some(delivery) => &mut delivery.session,
            None => {
                debug!("Codec parameters received before streaming started, ignoring");
                return ParameterDisposition::Ignored;
            }
        };

        match session.set_parameters(parameters.sps, parameters.pps) {
            Ok(()) => ParameterDisposition::Staged(session.parameters().staged_len()),
            Err(error) => ParameterDisposition::Rejected(error),
        }
    }

    /// Decodes `frame` and, when it completes a picture, hands the RGB frame to the callback.
    ///
    /// The callback runs under the controller lock and must not call back into the controller.
    pub fn on_frame(&self, frame: &CompressedFrame<'_>) -> FrameDisposition {
        let mut delivery = self.delivery.lock();
        let Delivery { session, callback } = match delivery.as_mut() {
            Some(delivery) => delivery,
            None => {
                debug!("Frame received before streaming started, ignoring");
                return FrameDisposition::Ignored;
            }
        };

        let outcome = match session.decode(frame) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!("Dropping frame: {}", error);
                return FrameDisposition::Dropped(error.drop_reason());
            }
        };

        if !outcome.has_frame() {
            return FrameDisposition::Decoded;
        }

        let (frame, callback) = match (session.frame(), callback.as_mut()) {
            (Some(frame), Some(callback)) => (frame, callback),
            _ => return FrameDisposition::Decoded,
        };

        if panic::catch_unwind(AssertUnwindSafe(|| callback(&frame))).is_err() {
            error!("Frame callback panicked");
            return FrameDisposition::Decoded;
        }

        FrameDisposition::Delivered(frame.geometry())
    }

    pub fn is_decoding(&self) -> bool {
        self.delivery.lock().is_some()
    }

    pub fn stats(&self) -> Option<SessionStats> {
        self.with_session(DecoderSession::stats)
    }

    pub fn with_session<R>(&self, f: impl FnOnce(&DecoderSession<E>) -> R) -> Option<R> {
        self.delivery.lock().as_ref().map(|delivery| f(&delivery.session))
    }

    pub fn with_device<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        f(&mut self.device.lock())
    }
}

impl<E: DecodeEngine, D: DeviceControl> Drop for StreamController<E, D> {
    fn drop(&mut self) {
        if let Err(error) = self.stop_streaming() {
            warn!("Unable to stop video streaming: {}", error);
        }
    }
}
