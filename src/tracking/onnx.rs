//! ONNX Runtime body tracker
//!
//! Runs a 33-point pose landmark model and a selfie segmentation model on
//! each frame. Both models take a 256x256 NHWC float input in [0, 1].

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;

use super::body::{BodyData, SegmentationMask};
use super::landmarks::{Landmark, PoseLandmark};
use super::BodyTracker;
use crate::error::{PrismaError, Result};
use crate::settings::TrackingSection;

/// Model input resolution
pub const MODEL_INPUT_SIZE: u32 = 256;

/// Pose model file name inside the model directory
pub const POSE_MODEL_FILE: &str = "pose_landmark.onnx";

/// Segmentation model file name inside the model directory
pub const SEGMENTATION_MODEL_FILE: &str = "selfie_segmentation.onnx";

/// Values per landmark in the pose model output (x, y, z, visibility, presence)
const LANDMARK_STRIDE: usize = 5;

/// Body tracker backed by ONNX Runtime sessions
pub struct OnnxBodyTracker {
    pose: Session,
    segmentation: Session,
    mask_threshold: f32,
    min_pose_confidence: f32,
}

impl OnnxBodyTracker {
    /// Load both models from `model_dir`
    pub fn load(model_dir: &Path, config: &TrackingSection) -> Result<Self> {
        let pose_path = model_file(model_dir, POSE_MODEL_FILE)?;
        let seg_path = model_file(model_dir, SEGMENTATION_MODEL_FILE)?;

        ort::init().with_name("PrismaServer").commit()?;

        let pose = Session::builder()?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&pose_path)?;
        tracing::info!(path = %pose_path.display(), "Loaded pose landmark model");

        let segmentation = Session::builder()?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&seg_path)?;
        tracing::info!(path = %seg_path.display(), "Loaded segmentation model");

        Ok(Self {
            pose,
            segmentation,
            mask_threshold: config.mask_threshold,
            min_pose_confidence: config.min_pose_confidence,
        })
    }

    fn run_pose(&mut self, input: &Array4<f32>) -> Result<Option<Vec<Landmark>>> {
        let tensor = ort::value::Tensor::from_array(input.clone())?;
        let outputs = self.pose.run(ort::inputs![tensor])?;

        let mut values = outputs.iter().map(|(_, value)| value);
        let landmarks = values
            .next()
            .ok_or_else(|| PrismaError::Model("pose model produced no output".to_string()))?;
        let (_shape, raw) = landmarks.try_extract_tensor::<f32>()?;

        // Second output is the pose presence score
        let presence = match values.next() {
            Some(flag) => {
                let (_shape, data) = flag.try_extract_tensor::<f32>()?;
                data.first().copied().unwrap_or(0.0)
            }
            None => 1.0,
        };

        Ok(decode_pose_landmarks(raw, MODEL_INPUT_SIZE, presence, self.min_pose_confidence))
    }

    fn run_segmentation(&mut self, input: &Array4<f32>) -> Result<SegmentationMask> {
        let tensor = ort::value::Tensor::from_array(input.clone())?;
        let outputs = self.segmentation.run(ort::inputs![tensor])?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| PrismaError::Model("segmentation model produced no output".to_string()))?;
        let (_shape, data) = output.1.try_extract_tensor::<f32>()?;

        let expected = (MODEL_INPUT_SIZE * MODEL_INPUT_SIZE) as usize;
        if data.len() < expected {
            return Err(PrismaError::Model(format!(
                "segmentation output has {} values, expected {}",
                data.len(),
                expected
            )));
        }

        let mask = data[..expected].iter().map(|&v| v.clamp(0.0, 1.0)).collect();
        Ok(SegmentationMask::new(mask, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE))
    }
}

impl BodyTracker for OnnxBodyTracker {
    fn process_frame(&mut self, frame: &RgbImage) -> Result<BodyData> {
        let input = preprocess_nhwc(frame, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE);
        let pose = self.run_pose(&input)?;
        let segmentation = self.run_segmentation(&input)?;
        Ok(BodyData::from_outputs(pose, Some(segmentation), self.mask_threshold))
    }
}

fn model_file(model_dir: &Path, name: &str) -> Result<PathBuf> {
    let path = model_dir.join(name);
    if !path.exists() {
        return Err(PrismaError::Model(format!("model not found: {}", path.display())));
    }
    Ok(path)
}

/// Resize a frame and lay it out as a (1, H, W, 3) tensor in [0, 1]
pub fn preprocess_nhwc(frame: &RgbImage, width: u32, height: u32) -> Array4<f32> {
    let resized = if frame.dimensions() == (width, height) {
        frame.clone()
    } else {
        imageops::resize(frame, width, height, FilterType::Triangle)
    };

    let mut input = Array4::<f32>::zeros((1, height as usize, width as usize, 3));
    for (x, y, px) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, y as usize, x as usize, c]] = px[c] as f32 / 255.0;
        }
    }
    input
}

/// Decode raw pose output (pixel coordinates of the model input, visibility
/// logits) into normalized landmarks. `None` when the presence score is
/// below `min_confidence` or the output is too short.
pub fn decode_pose_landmarks(
    raw: &[f32],
    input_size: u32,
    presence: f32,
    min_confidence: f32,
) -> Option<Vec<Landmark>> {
    if !presence.is_finite() || presence.clamp(0.0, 1.0) < min_confidence {
        return None;
    }
    let count = PoseLandmark::COUNT * LANDMARK_STRIDE;
    if raw.len() < count {
        return None;
    }
    // x, y, z and visibility logit of every landmark must be usable
    if raw[..count]
        .chunks_exact(LANDMARK_STRIDE)
        .any(|v| v[..4].iter().any(|f| !f.is_finite()))
    {
        return None;
    }

    let size = input_size as f32;
    let landmarks = raw
        .chunks_exact(LANDMARK_STRIDE)
        .take(PoseLandmark::COUNT)
        .map(|v| Landmark::new(v[0] / size, v[1] / size, v[2] / size, sigmoid(v[3])))
        .collect();
    Some(landmarks)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_layout() {
        let frame = RgbImage::from_pixel(2, 2, Rgb([255, 0, 51]));
        let input = preprocess_nhwc(&frame, 2, 2);
        assert_eq!(input.shape(), &[1, 2, 2, 3]);
        assert_eq!(input[[0, 1, 1, 0]], 1.0);
        assert_eq!(input[[0, 1, 1, 1]], 0.0);
        assert!((input[[0, 0, 0, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_resizes() {
        let frame = RgbImage::from_pixel(640, 480, Rgb([10, 20, 30]));
        let input = preprocess_nhwc(&frame, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE);
        assert_eq!(input.shape(), &[1, 256, 256, 3]);
    }

    #[test]
    fn test_decode_pose_landmarks() {
        let mut raw = vec![0.0f32; 39 * LANDMARK_STRIDE];
        // left shoulder at (64, 128) px, very visible
        raw[11 * LANDMARK_STRIDE] = 64.0;
        raw[11 * LANDMARK_STRIDE + 1] = 128.0;
        raw[11 * LANDMARK_STRIDE + 3] = 10.0;

        let landmarks = decode_pose_landmarks(&raw, 256, 0.9, 0.5).unwrap();
        assert_eq!(landmarks.len(), 33);
        assert_eq!(landmarks[11].x, 0.25);
        assert_eq!(landmarks[11].y, 0.5);
        assert!(landmarks[11].visibility > 0.99);
        assert!((landmarks[0].visibility - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_low_presence_and_short_output() {
        let raw = vec![0.0f32; 33 * LANDMARK_STRIDE];
        assert!(decode_pose_landmarks(&raw, 256, 0.2, 0.5).is_none());
        assert!(decode_pose_landmarks(&raw[..10], 256, 0.9, 0.5).is_none());
        assert!(decode_pose_landmarks(&raw, 256, f32::NAN, 0.5).is_none());
    }

    #[test]
    fn test_decode_rejects_non_finite_values() {
        let mut raw = vec![0.0f32; 33 * LANDMARK_STRIDE];
        raw[0] = f32::INFINITY;
        assert!(decode_pose_landmarks(&raw, 256, 0.9, 0.5).is_none());

        raw[0] = 0.0;
        raw[20 * LANDMARK_STRIDE + 3] = f32::NAN;
        assert!(decode_pose_landmarks(&raw, 256, 0.9, 0.5).is_none());

        // The fifth value (presence) is not used and may be anything
        raw[20 * LANDMARK_STRIDE + 3] = 0.0;
        raw[4] = f32::NAN;
        assert!(decode_pose_landmarks(&raw, 256, 0.9, 0.5).is_some());
    }
}
