use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use streamview_core::error::DropReason;
use streamview_decoder::{
    error::{ParameterError, ParameterRecord},
    fake::{picture_unit, FakeEngine, FakeProbe},
    CompressedFrame, DecodedFrame, DecoderConfig, Geometry,
};

use crate::{
    controller::{CodecParameters, FrameDisposition, ParameterDisposition, StreamController},
    device::{DeviceControl, DeviceError, NullDevice},
};

type Seen = Arc<Mutex<Vec<(u32, u32, usize)>>>;

struct Fixture {
    controller: StreamController<FakeEngine, NullDevice>,
    probe: Arc<FakeProbe>,
    engines: Arc<AtomicUsize>,
}

fn fixture() -> Fixture {
    let probe = Arc::new(FakeProbe::default());
    let engines = Arc::new(AtomicUsize::new(0));

    let factory_probe = probe.clone();
    let factory_engines = engines.clone();
    let controller = StreamController::new(NullDevice::new(), DecoderConfig::default(), move || {
        factory_engines.fetch_add(1, Ordering::SeqCst);
        FakeEngine::new().probe(factory_probe.clone())
    });

    Fixture {
        controller,
        probe,
        engines,
    }
}

fn record(frame: &DecodedFrame<'_>, seen: &mut Seen) {
    seen.lock().push((frame.width(), frame.height(), frame.data().len()));
}

fn start_recording(controller: &StreamController<FakeEngine, NullDevice>) -> Seen {
    let seen = Seen::default();
    controller.start_streaming_with_context(record, seen.clone()).unwrap();
    seen
}

fn parameters() -> (Vec<u8>, Vec<u8>) {
    let mut sps = vec![0, 0, 0, 1, 0x67];
    sps.resize(20, 0x42);
    let mut pps = vec![0, 0, 0, 1, 0x68];
    pps.resize(24, 0xCE);
    (sps, pps)
}

#[test]
fn callbacks_before_start_are_ignored_test() {
    let Fixture {
        controller,
        probe,
        engines,
    } = fixture();
    let (sps, pps) = parameters();

    let disposition = controller.on_codec_parameters(&CodecParameters {
        sps: Some(&sps[..]),
        pps: Some(&pps[..]),
    });
    assert_eq!(disposition, ParameterDisposition::Ignored);

    let unit = picture_unit(64, 48, 100);
    assert_eq!(
        controller.on_frame(&CompressedFrame::new(&unit[..])),
        FrameDisposition::Ignored
    );

    assert!(!controller.is_decoding());
    assert!(controller.stats().is_none());
    assert_eq!(engines.load(Ordering::SeqCst), 0);
    assert_eq!(probe.steps(), 0);
}

#[test]
fn parameters_then_frame_delivers_once_test() {
    let Fixture { controller, .. } = fixture();
    let seen = start_recording(&controller);
    let (sps, pps) = parameters();

    let disposition = controller.on_codec_parameters(&CodecParameters {
        sps: Some(&sps[..]),
        pps: Some(&pps[..]),
    });
    assert_eq!(disposition, ParameterDisposition::Staged(44));

    let unit = picture_unit(64, 48, 100);
    let disposition = controller.on_frame(&CompressedFrame::new(&unit[..]));

    assert_eq!(disposition, FrameDisposition::Delivered(Geometry::new(64, 48)));
    assert_eq!(*seen.lock(), vec![(64, 48, 9216)]);
    assert_eq!(
        controller.with_session(|session| session.parameters().is_pending()),
        Some(false)
    );
    assert_eq!(
        controller.with_session(|session| session.geometry()),
        Some(Geometry::new(64, 48))
    );
}

#[test]
fn geometry_change_reallocates_once_test() {
    let Fixture { controller, .. } = fixture();
    let seen = start_recording(&controller);

    let small = picture_unit(64, 48, 100);
    let large = picture_unit(128, 96, 100);

    controller.on_frame(&CompressedFrame::new(&small[..]));
    let before = controller.stats().unwrap().reallocations;

    let disposition = controller.on_frame(&CompressedFrame::new(&large[..]));
    let after = controller.stats().unwrap().reallocations;

    assert_eq!(disposition, FrameDisposition::Delivered(Geometry::new(128, 96)));
    assert_eq!(after - before, 1);
    assert_eq!(
        *seen.lock(),
        vec![(64, 48, 64 * 48 * 3), (128, 96, 128 * 96 * 3)]
    );
}

#[test]
fn invalid_frames_are_dropped_test() {
    let Fixture { controller, probe, .. } = fixture();
    let seen = start_recording(&controller);
    let unit = picture_unit(64, 48, 100);

    let frames = [
        CompressedFrame::missing(),
        CompressedFrame::new(&[]),
        CompressedFrame::from_parts(Some(&unit[..]), 0),
    ];

    for frame in frames.iter() {
        assert_eq!(
            controller.on_frame(frame),
            FrameDisposition::Dropped(DropReason::InvalidFrame)
        );
    }

    assert!(seen.lock().is_empty());
    assert_eq!(probe.steps(), 0);
}

#[test]
fn frame_without_picture_is_decoded_test() {
    let Fixture { controller, .. } = fixture();
    let seen = start_recording(&controller);

    let disposition = controller.on_frame(&CompressedFrame::new(&[0x01, 0x02, 0x03][..]));

    assert_eq!(disposition, FrameDisposition::Decoded);
    assert!(seen.lock().is_empty());
}

#[test]
fn oversized_parameters_are_rejected_test() {
    let Fixture { controller, .. } = fixture();
    start_recording(&controller);

    let (_, pps) = parameters();
    let oversized = vec![0x67; 32];

    let disposition = controller.on_codec_parameters(&CodecParameters {
        sps: Some(&oversized[..]),
        pps: Some(&pps[..]),
    });

    assert_eq!(
        disposition,
        ParameterDisposition::Rejected(ParameterError::Oversized {
            record: ParameterRecord::Sps,
            size: 32,
            limit: 32,
        })
    );
    assert_eq!(
        controller.with_session(|session| session.parameters().staged_len()),
        Some(0)
    );
}

#[test]
fn session_is_built_once_test() {
    let Fixture {
        controller,
        engines,
        ..
    } = fixture();

    start_recording(&controller);
    let seen = start_recording(&controller);

    assert_eq!(engines.load(Ordering::SeqCst), 1);
    assert!(controller.with_device(|device| device.is_streaming()));
    assert_eq!(controller.with_device(|device| device.requests()), 2);

    let unit = picture_unit(16, 16, 32);
    controller.on_frame(&CompressedFrame::new(&unit[..]));

    // Only the latest callback is invoked.
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn stop_keeps_decoder_state_test() {
    let Fixture { controller, .. } = fixture();
    start_recording(&controller);

    let unit = picture_unit(64, 48, 100);
    controller.on_frame(&CompressedFrame::new(&unit[..]));

    controller.stop_streaming().unwrap();

    assert!(!controller.with_device(|device| device.is_streaming()));
    assert!(controller.is_decoding());
    assert_eq!(
        controller.with_session(|session| session.geometry()),
        Some(Geometry::new(64, 48))
    );
}

#[test]
fn panicking_callback_is_contained_test() {
    let Fixture { controller, .. } = fixture();
    let calls = Arc::new(AtomicUsize::new(0));

    let callback_calls = calls.clone();
    controller
        .start_streaming_with(move |_: &DecodedFrame<'_>| {
            if callback_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first frame");
            }
        })
        .unwrap();

    let unit = picture_unit(32, 32, 64);

    assert_eq!(
        controller.on_frame(&CompressedFrame::new(&unit[..])),
        FrameDisposition::Decoded
    );
    assert_eq!(
        controller.on_frame(&CompressedFrame::new(&unit[..])),
        FrameDisposition::Delivered(Geometry::new(32, 32))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

struct SharedDevice {
    streaming: Arc<AtomicBool>,
}

impl DeviceControl for SharedDevice {
    fn set_video_streaming(&mut self, enabled: bool) -> Result<(), DeviceError> {
        self.streaming.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn drop_stops_streaming_test() {
    let streaming = Arc::new(AtomicBool::new(false));
    let device = SharedDevice {
        streaming: streaming.clone(),
    };

    let controller = StreamController::new(device, DecoderConfig::default(), FakeEngine::new);
    controller.start_streaming().unwrap();
    assert!(streaming.load(Ordering::SeqCst));

    drop(controller);
    assert!(!streaming.load(Ordering::SeqCst));
}

#[test]
fn concurrent_drivers_test() {
    let Fixture { controller, .. } = fixture();
    let seen = start_recording(&controller);
    let controller = Arc::new(controller);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let controller = controller.clone();
            std::thread::spawn(move || {
                let unit = picture_unit(16, 8, 32);
                for _ in 0..25 {
                    controller.on_frame(&CompressedFrame::new(&unit[..]));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(seen.lock().len(), 100);
    assert_eq!(controller.stats().unwrap().converted_pictures, 100);
}
