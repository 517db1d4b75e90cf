use log::info;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device is not connected")]
    Disconnected,

    #[error("Device rejected the streaming request: {0}")]
    Rejected(String),
}

/// Command channel towards the camera.
pub trait DeviceControl {
    fn set_video_streaming(&mut self, enabled: bool) -> Result<(), DeviceError>;
}

/// Stand-in for builds without a device attached. Accepts every request.
#[derive(Debug, Default)]
pub struct NullDevice {
    streaming: bool,
    requests: usize,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn requests(&self) -> usize {
        self.requests
    }
}

impl DeviceControl for NullDevice {
    fn set_video_streaming(&mut self, enabled: bool) -> Result<(), DeviceError> {
        info!("Video streaming {} (no device attached)", if enabled { "enabled" } else { "disabled" });

        self.streaming = enabled;
        self.requests += 1;

        Ok(())
    }
}
