//! Pose-aware composite construction
//!
//! Builds the image handed to the diffusion model: the segmented person,
//! tinted and outlined, placed over Vitruvian-style guide circles centred
//! on the torso.

use image::{GrayImage, Rgb, RgbImage};

use crate::raster;
use crate::tracking::{BodyData, TORSO};

/// Torso landmarks at or below this visibility are ignored
const TORSO_VISIBILITY: f32 = 0.5;

const OUTER_CIRCLE: Rgb<u8> = Rgb([80, 40, 0]);
const INNER_CIRCLE: Rgb<u8> = Rgb([120, 60, 0]);
const GUIDE_LINE: Rgb<u8> = Rgb([60, 30, 0]);
const PERSON_TINT: Rgb<u8> = Rgb([20, 50, 120]);
const EDGE_HIGHLIGHT: Rgb<u8> = Rgb([50, 200, 200]);

/// Opacity of the person layer over the guide canvas
const PERSON_ALPHA: f32 = 0.8;

/// Pixel centre of the body: mean of visible torso landmarks, or the frame centre
pub fn body_center(body: &BodyData, width: u32, height: u32) -> (i32, i32) {
    let fallback = ((width / 2) as i32, (height / 2) as i32);

    let visible: Vec<(f32, f32)> = TORSO
        .iter()
        .filter_map(|l| body.landmark(l.index()))
        .filter(|lm| lm.is_visible(TORSO_VISIBILITY))
        .filter(|lm| lm.x.is_finite() && lm.y.is_finite())
        .map(|lm| (lm.x, lm.y))
        .collect();

    if visible.is_empty() {
        return fallback;
    }

    let n = visible.len() as f32;
    let avg_x = visible.iter().map(|p| p.0).sum::<f32>() / n;
    let avg_y = visible.iter().map(|p| p.1).sum::<f32>() / n;
    ((avg_x * width as f32) as i32, (avg_y * height as f32) as i32)
}

/// Build the composite for `frame` using the binary person `mask`
pub fn pose_aware_input(frame: &RgbImage, mask: &GrayImage, body: &BodyData) -> RgbImage {
    let (w, h) = frame.dimensions();
    let (cx, cy) = body_center(body, w, h);
    let (wi, hi) = (w as i32, h as i32);
    let short = wi.min(hi);

    let mut canvas = RgbImage::new(w, h);
    raster::draw_circle(&mut canvas, cx, cy, short / 2 - 20, 2, OUTER_CIRCLE);
    raster::draw_circle(&mut canvas, cx, cy, short / 3, 2, INNER_CIRCLE);
    raster::draw_line(
        &mut canvas,
        (cx.saturating_sub(wi / 2), cy),
        (cx.saturating_add(wi / 2), cy),
        1,
        GUIDE_LINE,
    );
    raster::draw_line(
        &mut canvas,
        (cx, cy.saturating_sub(hi / 2)),
        (cx, cy.saturating_add(hi / 2)),
        1,
        GUIDE_LINE,
    );

    // Person cut out of the frame, then tinted towards blue
    let mut person = RgbImage::new(w, h);
    let mut tint = RgbImage::new(w, h);
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] > 0 {
            person.put_pixel(x, y, *frame.get_pixel(x, y));
            tint.put_pixel(x, y, PERSON_TINT);
        }
    }
    let mut person = raster::add_weighted(&person, 0.7, &tint, 0.3);

    // Outline: morphological gradient of the mask
    let grown = raster::dilate(mask, 3);
    let shrunk = raster::erode(mask, 3);
    for (x, y, px) in person.enumerate_pixels_mut() {
        if grown.get_pixel(x, y)[0].saturating_sub(shrunk.get_pixel(x, y)[0]) > 0 {
            *px = EDGE_HIGHLIGHT;
        }
    }

    raster::add_weighted(&canvas, 1.0, &person, PERSON_ALPHA)
}
