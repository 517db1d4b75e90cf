//! Shared building blocks of streamview: the frame-processing traits used to plug decoding
//! into a frame pipeline and the reasons a frame can be dropped on its way to the user.

pub mod error;
pub mod traits;

#[cfg(test)]
mod tests;
