//! Prompt shaping and working-size selection

use crate::tracking::{BodyData, PoseLandmark};

const FULL_BODY_SUFFIX: &str = ", full body shot, show entire body, no cropping, wider frame";
const STANDING_SUFFIX: &str = ", standing tall, full figure";
const CROUCHING_SUFFIX: &str = ", sitting or crouching position, full figure";

/// Extend the base prompt with hints derived from the tracked body
pub fn build_prompt(base: &str, body: Option<&BodyData>) -> String {
    let mut prompt = base.to_string();

    let Some(body) = body.filter(|b| b.is_person_detected) else {
        return prompt;
    };
    prompt.push_str(FULL_BODY_SUFFIX);

    let shoulders = (
        body.landmark(PoseLandmark::LeftShoulder.index()),
        body.landmark(PoseLandmark::RightShoulder.index()),
    );
    if let (Some(left), Some(right)) = shoulders {
        let shoulder_y = (left.y + right.y) / 2.0;
        if shoulder_y < 0.4 {
            prompt.push_str(STANDING_SUFFIX);
        } else if shoulder_y > 0.6 {
            prompt.push_str(CROUCHING_SUFFIX);
        }
    }
    prompt
}

/// Aspect-preserving size whose long side matches the working size.
/// Wide frames take the full width; tall and square frames the full height.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (max_width.max(1), max_height.max(1));
    }
    let aspect = width as f64 / height as f64;
    if aspect > 1.0 {
        (max_width.max(1), ((max_width as f64 / aspect) as u32).max(1))
    } else {
        (((max_height as f64 * aspect) as u32).max(1), max_height.max(1))
    }
}
