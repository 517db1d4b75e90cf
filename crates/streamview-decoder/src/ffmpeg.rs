//! libavcodec-backed [`DecodeEngine`].

use cstr::cstr;
use log::debug;
use rsmpeg::{
    avcodec::{AVCodec, AVCodecContext, AVPacket},
    avutil::AVFrame,
    error::RsmpegError,
    ffi, UnsafeDerefMut,
};

use crate::{
    engine::{DecodeEngine, EngineOptions, EngineStep, GlobalRegistration, Picture, PixelFormat},
    error::EngineError,
};

static REGISTRATION: GlobalRegistration = GlobalRegistration::new();

const DECODER_NAME: &str = "h264";

/// Feeds every chunk to libavcodec as one packet and keeps the last picture it returned.
#[derive(Default)]
pub struct FfmpegEngine {
    decode_context: Option<AVCodecContext>,
    last_frame: Option<AVFrame>,
}

// TODO: Fix all those unsafe impl
unsafe impl Send for FfmpegEngine {}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn packet_from(data: &[u8]) -> Result<AVPacket, EngineError> {
        let size = i32::try_from(data.len())
            .map_err(|_| EngineError::Decode(format!("packet of {} bytes", data.len())))?;

        let mut packet = AVPacket::new();

        // av_new_packet zero-fills the input padding the bitstream reader relies on.
        let result = unsafe { ffi::av_new_packet(packet.as_mut_ptr(), size) };
        if result < 0 {
            return Err(EngineError::FrameAllocation);
        }

        if !data.is_empty() {
            let payload = unsafe { std::slice::from_raw_parts_mut(packet.data, data.len()) };
            payload.copy_from_slice(data);
        }

        Ok(packet)
    }
}

impl DecodeEngine for FfmpegEngine {
    fn registration() -> &'static GlobalRegistration {
        &REGISTRATION
    }

    fn register_globals() {
        unsafe { ffi::av_log_set_level(ffi::AV_LOG_QUIET) };
    }

    fn open(&mut self, options: &EngineOptions) -> Result<(), EngineError> {
        self.close();

        let decoder = AVCodec::find_decoder_by_name(cstr!("h264"))
            .ok_or(EngineError::CodecNotFound(DECODER_NAME))?;

        let mut decode_context = AVCodecContext::new(&decoder);

        unsafe {
            if options.error_concealment {
                decode_context.deref_mut().error_concealment =
                    (ffi::FF_EC_GUESS_MVS | ffi::FF_EC_DEBLOCK) as i32;
            }

            if options.accept_truncated {
                decode_context.deref_mut().flags2 |= ffi::AV_CODEC_FLAG2_CHUNKS as i32;
            }
        }

        decode_context
            .open(None)
            .map_err(|error| EngineError::Open(error.to_string()))?;

        self.decode_context = Some(decode_context);

        Ok(())
    }

    fn close(&mut self) {
        self.last_frame = None;
        self.decode_context = None;
    }

    fn decode_step(&mut self, data: &[u8]) -> Result<EngineStep, EngineError> {
        let decode_context = self.decode_context.as_mut().ok_or(EngineError::NotOpen)?;

        let packet = Self::packet_from(data)?;

        debug!("Sending packet (size: {})", data.len());

        decode_context
            .send_packet(Some(&packet))
            .map_err(|error| EngineError::Decode(error.to_string()))?;

        let mut picture_complete = false;
        loop {
            match decode_context.receive_frame() {
                Ok(frame) => {
                    self.last_frame = Some(frame);
                    picture_complete = true;
                }
                Err(RsmpegError::DecoderDrainError) | Err(RsmpegError::DecoderFlushedError) => {
                    break
                }
                Err(error) => return Err(EngineError::Decode(error.to_string())),
            }
        }

        Ok(EngineStep {
            consumed: data.len(),
            picture_complete,
        })
    }

    fn picture(&self) -> Option<Picture<'_>> {
        let frame = self.last_frame.as_ref()?;

        let format = match frame.format {
            ffi::AVPixelFormat_AV_PIX_FMT_YUV420P => PixelFormat::Yuv420p,
            ffi::AVPixelFormat_AV_PIX_FMT_YUVJ420P => PixelFormat::Yuvj420p,
            other => PixelFormat::Unknown(other),
        };

        let width = u32::try_from(frame.width).ok()?;
        let height = u32::try_from(frame.height).ok()?;
        let chroma_height = (height as usize + 1) / 2;

        let mut strides = [0usize; 3];
        let mut planes: [&[u8]; 3] = [&[], &[], &[]];

        if format.is_planar_420() {
            let rows = [height as usize, chroma_height, chroma_height];
            for plane in 0..3 {
                let stride = usize::try_from(frame.linesize[plane]).ok()?;
                if frame.data[plane].is_null() {
                    return None;
                }

                strides[plane] = stride;
                planes[plane] =
                    unsafe { std::slice::from_raw_parts(frame.data[plane], stride * rows[plane]) };
            }
        }

        Some(Picture {
            format,
            width,
            height,
            planes,
            strides,
        })
    }
}
