//! Generative image-to-image stage
//!
//! [`Stylizer`] prepares the composite for the generator and brings the
//! result back to frame size. The generator itself sits behind
//! [`ImageGenerator`] so it can be swapped for a local model or a mock.

pub mod http;
pub mod prompt;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::Result;
use crate::settings::DiffusionSection;
use crate::tracking::BodyData;

pub use http::HttpImageGenerator;
pub use prompt::{build_prompt, fit_within};

/// Parameters for a single image-to-image invocation
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub image: RgbImage,
    pub prompt: String,
    pub strength: f32,
    pub guidance_scale: f32,
    pub steps: u32,
}

/// Synthesizes an image from an input image and a prompt
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<RgbImage>;
}

/// Drives an [`ImageGenerator`] with the configured prompt and sizes
pub struct Stylizer {
    generator: Arc<dyn ImageGenerator>,
    config: DiffusionSection,
    first_run: AtomicBool,
}

impl Stylizer {
    pub fn new(generator: Arc<dyn ImageGenerator>, config: DiffusionSection) -> Self {
        Self {
            generator,
            config,
            first_run: AtomicBool::new(true),
        }
    }

    /// Step count for the next invocation; the first one runs shorter
    fn next_steps(&self) -> u32 {
        if self.first_run.swap(false, Ordering::AcqRel) {
            self.config.first_run_steps
        } else {
            self.config.steps
        }
    }

    /// Transform `input` and return an image the size of `input`
    pub async fn stylize(&self, input: &RgbImage, body: Option<&BodyData>) -> Result<RgbImage> {
        let (width, height) = input.dimensions();
        let (work_w, work_h) = fit_within(width, height, self.config.width, self.config.height);

        let working = if (work_w, work_h) == (width, height) {
            input.clone()
        } else {
            imageops::resize(input, work_w, work_h, FilterType::Lanczos3)
        };

        let request = GenerationRequest {
            image: working,
            prompt: build_prompt(&self.config.prompt, body),
            strength: self.config.strength,
            guidance_scale: self.config.guidance_scale,
            steps: self.next_steps(),
        };
        tracing::info!(
            width = work_w,
            height = work_h,
            steps = request.steps,
            "Starting image generation"
        );

        let generated = self.generator.generate(request).await?;
        if generated.dimensions() == (width, height) {
            Ok(generated)
        } else {
            Ok(imageops::resize(&generated, width, height, FilterType::Lanczos3))
        }
    }
}
