//! Body tracking
//!
//! Locates and segments the person in each frame. Model execution sits behind
//! the [`BodyTracker`] trait and runs on a dedicated worker thread.

pub mod body;
pub mod landmarks;
pub mod onnx;
pub mod worker;

use image::RgbImage;

use crate::error::Result;

pub use body::{BodyData, MaskParams, SegmentationMask, VisibleLandmark};
pub use landmarks::{Landmark, PoseLandmark, POSE_CONNECTIONS, TORSO};
pub use onnx::OnnxBodyTracker;
pub use worker::TrackerWorker;

/// Produces body tracking data for a frame
pub trait BodyTracker: Send {
    fn process_frame(&mut self, frame: &RgbImage) -> Result<BodyData>;
}
