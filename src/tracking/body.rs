//! Per-frame body tracking results and their post-processing

use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::Serialize;

use super::landmarks::{Landmark, POSE_CONNECTIONS};
use crate::raster;

/// Foreground probability grid from the segmentation model
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
    /// Probabilities (0.0 = background, 1.0 = person), row-major
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl SegmentationMask {
    pub fn new(data: Vec<f32>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self { data, width, height }
    }

    /// Highest probability in the grid
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }

    /// Bilinear sample at normalized coordinates (pixel centres)
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let fx = (x * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let fy = (y * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);
        let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
        let (x1, y1) = ((x0 + 1).min(self.width - 1), (y0 + 1).min(self.height - 1));
        let (tx, ty) = (fx - x0 as f32, fy - y0 as f32);

        let at = |x: u32, y: u32| self.data.get((y * self.width + x) as usize).copied().unwrap_or(0.0);
        let top = at(x0, y0) * (1.0 - tx) + at(x1, y0) * tx;
        let bottom = at(x0, y1) * (1.0 - tx) + at(x1, y1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

/// Mask cleanup parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskParams {
    /// Probabilities strictly above this become foreground
    pub threshold: f32,
    /// Square kernel for close then open
    pub kernel: u32,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            kernel: 5,
        }
    }
}

/// Landmark reported to viewers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisibleLandmark {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub visibility: f32,
}

/// Container for body tracking data of one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyData {
    /// Pose landmarks when the pose model found a body
    pub pose_landmarks: Option<Vec<Landmark>>,
    /// Foreground probabilities
    pub segmentation: Option<SegmentationMask>,
    /// Whether a person is in frame
    pub is_person_detected: bool,
}

impl BodyData {
    /// Combine model outputs, applying the detection rule: a pose, or any
    /// mask probability above `mask_threshold`, means a person is present.
    pub fn from_outputs(
        pose_landmarks: Option<Vec<Landmark>>,
        segmentation: Option<SegmentationMask>,
        mask_threshold: f32,
    ) -> Self {
        let pose_found = pose_landmarks.is_some();
        let mask_found = segmentation
            .as_ref()
            .map(|m| m.max() > mask_threshold)
            .unwrap_or(false);
        Self {
            pose_landmarks,
            segmentation,
            is_person_detected: pose_found || mask_found,
        }
    }

    /// Landmark at `index` when present
    pub fn landmark(&self, index: usize) -> Option<&Landmark> {
        self.pose_landmarks.as_ref().and_then(|l| l.get(index))
    }

    /// Landmarks with visibility strictly above `threshold`
    pub fn visible_landmarks(&self, threshold: f32) -> Vec<VisibleLandmark> {
        self.pose_landmarks
            .iter()
            .flatten()
            .enumerate()
            .filter(|(_, lm)| lm.is_visible(threshold))
            .map(|(index, lm)| VisibleLandmark {
                index,
                x: lm.x,
                y: lm.y,
                visibility: lm.visibility,
            })
            .collect()
    }

    /// Binary person mask (0/255) at frame resolution, cleaned with a
    /// morphological close followed by an open
    pub fn person_mask(&self, width: u32, height: u32, params: &MaskParams) -> Option<GrayImage> {
        let seg = self.segmentation.as_ref()?;

        let mut binary = GrayImage::new(width, height);
        for (x, y, px) in binary.enumerate_pixels_mut() {
            let p = seg.sample((x as f32 + 0.5) / width as f32, (y as f32 + 0.5) / height as f32);
            *px = Luma([if p > params.threshold { 255 } else { 0 }]);
        }

        let closed = raster::close(&binary, params.kernel);
        Some(raster::open(&closed, params.kernel))
    }

    /// Skeleton overlay: green 2px bones and red landmark dots on black
    pub fn skeleton_image(&self, width: u32, height: u32) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        let landmarks = match (&self.pose_landmarks, self.is_person_detected) {
            (Some(landmarks), true) => landmarks,
            _ => return img,
        };

        let bone = Rgb([0, 255, 0]);
        let joint = Rgb([255, 0, 0]);

        for (start, end) in POSE_CONNECTIONS {
            if let (Some(a), Some(b)) = (landmarks.get(start), landmarks.get(end)) {
                raster::draw_line(&mut img, a.to_pixel(width, height), b.to_pixel(width, height), 2, bone);
            }
        }
        for lm in landmarks {
            let (x, y) = lm.to_pixel(width, height);
            raster::fill_circle(&mut img, x, y, 5, joint);
        }
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> SegmentationMask {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        SegmentationMask::new(data, width, height)
    }

    #[test]
    fn test_detection_rule() {
        let faint = grid(4, 4, |_, _| 0.3);
        assert!(!BodyData::from_outputs(None, Some(faint.clone()), 0.5).is_person_detected);

        let strong = grid(4, 4, |x, _| if x == 2 { 0.9 } else { 0.0 });
        assert!(BodyData::from_outputs(None, Some(strong), 0.5).is_person_detected);

        let pose = vec![Landmark::default(); 33];
        assert!(BodyData::from_outputs(Some(pose), Some(faint), 0.5).is_person_detected);
        assert!(!BodyData::from_outputs(None, None, 0.5).is_person_detected);
    }

    #[test]
    fn test_mask_none_without_segmentation() {
        let body = BodyData::default();
        assert!(body.person_mask(10, 10, &MaskParams::default()).is_none());
    }

    #[test]
    fn test_mask_threshold_is_strict() {
        let seg = grid(8, 8, |_, _| 0.5);
        let body = BodyData::from_outputs(None, Some(seg), 0.5);
        let mask = body.person_mask(8, 8, &MaskParams { threshold: 0.5, kernel: 1 }).unwrap();
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_mask_cleanup_fills_holes_and_drops_specks() {
        // 20x20 block with a one-pixel hole, plus an isolated speck
        let seg = grid(40, 40, |x, y| {
            let in_block = (10..30).contains(&x) && (10..30).contains(&y);
            let hole = x == 20 && y == 20;
            let speck = x == 3 && y == 3;
            if (in_block && !hole) || speck { 0.95 } else { 0.05 }
        });
        let body = BodyData::from_outputs(None, Some(seg), 0.5);
        let mask = body.person_mask(40, 40, &MaskParams::default()).unwrap();

        assert_eq!(mask.get_pixel(20, 20)[0], 255);
        assert_eq!(mask.get_pixel(3, 3)[0], 0);
        assert_eq!(mask.get_pixel(15, 15)[0], 255);
        assert_eq!(mask.get_pixel(35, 35)[0], 0);
    }

    #[test]
    fn test_mask_upscales_to_frame() {
        let seg = grid(4, 4, |x, _| if x < 2 { 1.0 } else { 0.0 });
        let body = BodyData::from_outputs(None, Some(seg), 0.5);
        let mask = body.person_mask(64, 32, &MaskParams { threshold: 0.5, kernel: 1 }).unwrap();
        assert_eq!(mask.dimensions(), (64, 32));
        assert_eq!(mask.get_pixel(5, 16)[0], 255);
        assert_eq!(mask.get_pixel(60, 16)[0], 0);
    }

    #[test]
    fn test_visible_landmarks_filter() {
        let mut pose = vec![Landmark::new(0.1, 0.2, 0.0, 0.2); 33];
        pose[11] = Landmark::new(0.4, 0.3, 0.0, 0.9);
        pose[12] = Landmark::new(0.6, 0.3, 0.0, 0.51);
        let body = BodyData::from_outputs(Some(pose), None, 0.5);

        let visible = body.visible_landmarks(0.5);
        let indices: Vec<usize> = visible.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![11, 12]);
        assert_eq!(visible[0].x, 0.4);
    }

    #[test]
    fn test_skeleton_blank_without_person() {
        let body = BodyData::default();
        let img = body.skeleton_image(16, 16);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_skeleton_draws_joints_and_bones() {
        let mut pose = vec![Landmark::new(0.5, 0.5, 0.0, 1.0); 33];
        pose[11] = Landmark::new(0.25, 0.5, 0.0, 1.0);
        pose[12] = Landmark::new(0.75, 0.5, 0.0, 1.0);
        let body = BodyData::from_outputs(Some(pose), None, 0.5);
        let img = body.skeleton_image(100, 100);

        // Joint dots are drawn last
        assert_eq!(img.get_pixel(25, 50), &Rgb([255, 0, 0]));
        // Shoulder-to-shoulder bone between the dots
        assert_eq!(img.get_pixel(37, 50), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_skeleton_survives_wild_landmarks() {
        let mut pose = vec![Landmark::new(0.5, 0.5, 0.0, 1.0); 33];
        pose[0] = Landmark::new(f32::INFINITY, f32::NEG_INFINITY, 0.0, 1.0);
        pose[11] = Landmark::new(-1.0e12, 0.5, 0.0, 1.0);
        pose[12] = Landmark::new(1.0e12, 0.5, 0.0, 1.0);
        pose[23] = Landmark::new(f32::NAN, f32::NAN, 0.0, 1.0);
        let body = BodyData::from_outputs(Some(pose), None, 0.5);
        let img = body.skeleton_image(40, 30);

        // Shoulder bone is clipped to a full-width row
        assert_eq!(img.get_pixel(0, 15), &Rgb([0, 255, 0]));
        assert_eq!(img.get_pixel(39, 15), &Rgb([0, 255, 0]));
    }
}
