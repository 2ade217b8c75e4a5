//! rollcall-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera access with YUYV-to-RGB conversion.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use frame::Frame;
