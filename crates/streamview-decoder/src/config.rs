use serde::{Deserialize, Serialize};

use crate::engine::EngineOptions;

/// Parameter records are accepted only when strictly smaller than this.
pub const DEFAULT_MAX_PARAMETER_RECORD_SIZE: usize = 32;

/// 8K UHD.
pub const DEFAULT_MAX_FRAME_AREA: u64 = 7680 * 4320;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub max_parameter_record_size: usize,
    pub error_concealment: bool,
    pub accept_truncated: bool,
    pub max_frame_area: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_parameter_record_size: DEFAULT_MAX_PARAMETER_RECORD_SIZE,
            error_concealment: true,
            accept_truncated: true,
            max_frame_area: DEFAULT_MAX_FRAME_AREA,
        }
    }
}

impl DecoderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // Building functions
    pub fn max_parameter_record_size(mut self, size: usize) -> Self {
        self.max_parameter_record_size = size;
        self
    }

    pub fn error_concealment(mut self, enabled: bool) -> Self {
        self.error_concealment = enabled;
        self
    }

    pub fn accept_truncated(mut self, enabled: bool) -> Self {
        self.accept_truncated = enabled;
        self
    }

    pub fn max_frame_area(mut self, area: u64) -> Self {
        self.max_frame_area = area;
        self
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            error_concealment: self.error_concealment,
            accept_truncated: self.accept_truncated,
        }
    }
}
