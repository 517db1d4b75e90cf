//! The driver-facing side of streamview: a [`StreamController`](controller::StreamController)
//! receives parameter notifications and frame arrivals from a transport and hands decoded RGB
//! frames to user code.

pub mod controller;
pub mod device;

#[cfg(test)]
mod tests;

pub use controller::{CodecParameters, FrameDisposition, ParameterDisposition, StreamController};
pub use device::{DeviceControl, DeviceError, NullDevice};
