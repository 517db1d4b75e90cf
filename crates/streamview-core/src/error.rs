use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Copy, Hash)]
pub enum DropReason {
    #[error("Invalid frame")]
    InvalidFrame,

    #[error("Codec not initialized")]
    CodecNotInitialized,

    #[error("Codec parameters update failed")]
    CodecParametersError,

    #[error("Generic codec error")]
    CodecError,

    #[error("No decoded frames available")]
    NoDecodedFrames,
}
