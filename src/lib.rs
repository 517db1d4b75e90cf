pub use streamview_core::*;

#[cfg(feature = "decoder")]
pub use streamview_decoder as decoder;

#[cfg(feature = "stream")]
pub use streamview_stream as stream;
