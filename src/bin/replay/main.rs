use std::{fs, path::PathBuf};

use clap::Parser;
use log::{info, warn};

use streamview::{
    decoder::{annexb::access_units, ffmpeg::FfmpegEngine, CompressedFrame, DecodedFrame, DecoderConfig},
    stream::{CodecParameters, FrameDisposition, NullDevice, ParameterDisposition, StreamController},
};

#[derive(Parser)]
#[clap(version = "0.1.0")]
struct Options {
    /// Annex B elementary stream to replay.
    #[clap(short, long)]
    input: PathBuf,

    #[clap(long, default_value = "32")]
    max_parameter_record_size: usize,

    #[clap(long)]
    no_error_concealment: bool,

    #[clap(long)]
    no_accept_truncated: bool,

    /// Stop after this many access units.
    #[clap(short, long)]
    limit: Option<usize>,
}

impl Options {
    fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig::new()
            .max_parameter_record_size(self.max_parameter_record_size)
            .error_concealment(!self.no_error_concealment)
            .accept_truncated(!self.no_accept_truncated)
    }
}

#[derive(Default)]
struct ReplayStats {
    delivered: usize,
    decoded: usize,
    dropped: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let options = Options::parse();
    let stream = fs::read(&options.input)?;

    let config = options.decoder_config();

    let controller = StreamController::new(NullDevice::new(), config, FfmpegEngine::new);
    controller.start_streaming_with(|frame: &DecodedFrame<'_>| {
        info!("Delivered frame {} ({} bytes)", frame.geometry(), frame.data().len());
    })?;

    let units = access_units(&stream);
    let limit = options.limit.unwrap_or(units.len());
    info!("Replaying {} of {} access units", limit.min(units.len()), units.len());

    let mut stats = ReplayStats::default();
    for (index, unit) in units.iter().take(limit).enumerate() {
        let (sps, pps) = unit.parameter_sets();
        if sps.is_some() || pps.is_some() {
            if let ParameterDisposition::Rejected(error) =
                controller.on_codec_parameters(&CodecParameters { sps, pps })
            {
                warn!("Access unit {}: codec parameters rejected: {}", index, error);
            }
        }

        if !unit.has_picture() {
            continue;
        }

        let frame = unit.frame_bytes();
        match controller.on_frame(&CompressedFrame::new(&frame[..])) {
            FrameDisposition::Delivered(_) => stats.delivered += 1,
            FrameDisposition::Decoded => stats.decoded += 1,
            FrameDisposition::Dropped(reason) => {
                warn!("Access unit {}: dropped ({})", index, reason);
                stats.dropped += 1;
            }
            FrameDisposition::Ignored => (),
        }
    }

    controller.stop_streaming()?;

    info!(
        "Replay finished: {} delivered, {} decoded without output, {} dropped",
        stats.delivered, stats.decoded, stats.dropped
    );

    if let Some(session_stats) = controller.stats() {
        info!("Session stats: {:?}", session_stats);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use streamview::decoder::DecoderConfig;

    use super::Options;

    #[test]
    fn default_options_keep_decoder_defaults_test() {
        let options = Options::parse_from(["streamview-replay", "--input", "camera.h264"]);
        assert_eq!(options.decoder_config(), DecoderConfig::default());
    }

    #[test]
    fn negated_flags_test() {
        let options = Options::parse_from([
            "streamview-replay",
            "--input",
            "camera.h264",
            "--no-accept-truncated",
            "--no-error-concealment",
        ]);

        let config = options.decoder_config();
        assert!(!config.accept_truncated);
        assert!(!config.error_concealment);
    }
}
