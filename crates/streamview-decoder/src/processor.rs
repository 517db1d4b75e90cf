use std::fmt::Debug;

use async_trait::async_trait;
use bytes::BytesMut;
use log::debug;

use streamview_core::{
    error::DropReason,
    traits::{FrameError, FrameProcessor, PullableFrameProperties},
};

use crate::{engine::DecodeEngine, frame::CompressedFrame, session::DecoderSession};

/// Runs a [`DecoderSession`] as a pipeline stage: the compressed buffer stored under
/// `encoded_buffer_key` is decoded and the RGB24 frame is written to `rgb_buffer_key`.
pub struct DecodeProcessor<E: DecodeEngine, K> {
    session: DecoderSession<E>,
    encoded_buffer_key: K,
    rgb_buffer_key: K,
}

impl<E: DecodeEngine, K> DecodeProcessor<E, K> {
    pub fn new(session: DecoderSession<E>, encoded_buffer_key: K, rgb_buffer_key: K) -> Self {
        Self {
            session,
            encoded_buffer_key,
            rgb_buffer_key,
        }
    }

    pub fn session(&self) -> &DecoderSession<E> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DecoderSession<E> {
        &mut self.session
    }
}

#[async_trait]
impl<F, E, K> FrameProcessor<F> for DecodeProcessor<E, K>
where
    F: PullableFrameProperties<K, BytesMut> + FrameError<DropReason> + Send + 'static,
    E: DecodeEngine + Send,
    K: Copy + Debug + Send,
{
    async fn process(&mut self, mut frame_data: F) -> Option<F> {
        let encoded_buffer = match frame_data.pull(&self.encoded_buffer_key) {
            Some(buffer) => buffer,
            None => {
                debug!("Missing {:?} buffer", self.encoded_buffer_key);
                frame_data.report_error(DropReason::InvalidFrame);
                return Some(frame_data);
            }
        };

        let decode_result = self.session.decode(&CompressedFrame::new(&encoded_buffer[..]));
        frame_data.push(self.encoded_buffer_key, encoded_buffer);

        match decode_result {
            Ok(outcome) if outcome.has_frame() => {
                if let Some(frame) = self.session.frame() {
                    let mut rgb_buffer = frame_data.pull(&self.rgb_buffer_key).unwrap_or_default();
                    rgb_buffer.clear();
                    rgb_buffer.extend_from_slice(frame.data());
                    frame_data.push(self.rgb_buffer_key, rgb_buffer);
                }
            }
            Ok(_) => frame_data.report_error(DropReason::NoDecodedFrames),
            Err(error) => frame_data.report_error(error.drop_reason()),
        }

        Some(frame_data)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bytes::BytesMut;
    use streamview_core::{
        error::DropReason,
        traits::{FrameError, FrameProcessor, PullableFrameProperties},
    };

    use crate::{
        config::DecoderConfig,
        fake::{picture_unit, FakeEngine, ERROR_MARKER},
        session::DecoderSession,
    };

    use super::DecodeProcessor;

    #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
    enum BufferType {
        Encoded,
        Rgb,
    }

    #[derive(Default)]
    struct TestFrameData {
        buffers: HashMap<BufferType, BytesMut>,
        error: Option<DropReason>,
    }

    impl PullableFrameProperties<BufferType, BytesMut> for TestFrameData {
        fn push(&mut self, key: BufferType, value: BytesMut) {
            self.buffers.insert(key, value);
        }

        fn pull(&mut self, key: &BufferType) -> Option<BytesMut> {
            self.buffers.remove(key)
        }
    }

    impl FrameError<DropReason> for TestFrameData {
        fn report_error(&mut self, error: DropReason) {
            self.error = Some(error);
        }

        fn get_error(&self) -> Option<DropReason> {
            self.error
        }
    }

    fn processor() -> DecodeProcessor<FakeEngine, BufferType> {
        let session = DecoderSession::new(FakeEngine::new(), DecoderConfig::default());
        DecodeProcessor::new(session, BufferType::Encoded, BufferType::Rgb)
    }

    fn frame_data(encoded: &[u8]) -> TestFrameData {
        let mut dto = TestFrameData::default();
        dto.push(BufferType::Encoded, BytesMut::from(encoded));
        dto
    }

    #[tokio::test]
    async fn test_decoded_frame() {
        let mut processor = processor();

        let mut dto = processor.process(frame_data(&picture_unit(4, 2, 32))).await.unwrap();

        assert!(dto.get_error().is_none());
        assert_eq!(dto.pull(&BufferType::Rgb).unwrap().len(), 4 * 2 * 3);
        assert_eq!(dto.pull(&BufferType::Encoded).unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_no_decoded_frames() {
        let mut processor = processor();

        let mut dto = processor.process(frame_data(&[0x01, 0x02, 0x03])).await.unwrap();

        assert_eq!(dto.get_error(), Some(DropReason::NoDecodedFrames));
        assert!(dto.pull(&BufferType::Rgb).is_none());
    }

    #[tokio::test]
    async fn test_missing_buffer() {
        let mut processor = processor();

        let dto = processor.process(TestFrameData::default()).await.unwrap();

        assert_eq!(dto.get_error(), Some(DropReason::InvalidFrame));
        assert!(!processor.session().is_initialized());
    }

    #[tokio::test]
    async fn test_codec_error() {
        let mut processor = processor();

        let dto = processor.process(frame_data(&[ERROR_MARKER, 0, 0])).await.unwrap();

        assert_eq!(dto.get_error(), Some(DropReason::CodecError));
    }
}
