//! HTTP image-to-image client
//!
//! Speaks the img2img JSON API exposed by common Stable Diffusion servers:
//! base64 PNG in `init_images`, base64 images back in `images`.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::RgbImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GenerationRequest, ImageGenerator};
use crate::codec;
use crate::error::{PrismaError, Result};
use crate::settings::DiffusionSection;

#[derive(Debug, Serialize)]
struct Img2ImgPayload<'a> {
    init_images: Vec<String>,
    prompt: &'a str,
    denoising_strength: f32,
    cfg_scale: f32,
    steps: u32,
    width: u32,
    height: u32,
    override_settings: OverrideSettings<'a>,
}

#[derive(Debug, Serialize)]
struct OverrideSettings<'a> {
    sd_model_checkpoint: &'a str,
}

#[derive(Debug, Deserialize)]
struct Img2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

/// Diffusion service reached over HTTP
pub struct HttpImageGenerator {
    client: Client,
    endpoint: String,
    model_id: String,
}

impl HttpImageGenerator {
    pub fn new(config: &DiffusionSection) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model_id: config.model_id.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<RgbImage> {
        let payload = Img2ImgPayload {
            init_images: vec![codec::encode_png_base64(&request.image)?],
            prompt: &request.prompt,
            denoising_strength: request.strength,
            cfg_scale: request.guidance_scale,
            steps: request.steps,
            width: request.image.width(),
            height: request.image.height(),
            override_settings: OverrideSettings {
                sd_model_checkpoint: &self.model_id,
            },
        };

        tracing::debug!(endpoint = %self.endpoint, steps = request.steps, "Sending img2img request");

        let response = self.client.post(&self.endpoint).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PrismaError::Generation(format!(
                "diffusion service returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: Img2ImgResponse = response.json().await?;
        decode_first_image(body)
    }
}

fn decode_first_image(body: Img2ImgResponse) -> Result<RgbImage> {
    let first = body
        .images
        .into_iter()
        .next()
        .ok_or_else(|| PrismaError::Generation("diffusion service returned no images".to_string()))?;
    let bytes = STANDARD.decode(first.trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_payload_shape() {
        let payload = Img2ImgPayload {
            init_images: vec!["AAAA".to_string()],
            prompt: "neon",
            denoising_strength: 0.75,
            cfg_scale: 7.5,
            steps: 30,
            width: 512,
            height: 384,
            override_settings: OverrideSettings {
                sd_model_checkpoint: "runwayml/stable-diffusion-v1-5",
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["denoising_strength"], 0.75);
        assert_eq!(json["cfg_scale"], 7.5);
        assert_eq!(json["init_images"][0], "AAAA");
        assert_eq!(json["override_settings"]["sd_model_checkpoint"], "runwayml/stable-diffusion-v1-5");
    }

    #[test]
    fn test_decode_first_image() {
        let img = RgbImage::from_pixel(3, 2, Rgb([7, 8, 9]));
        let b64 = codec::encode_png_base64(&img).unwrap();
        let body: Img2ImgResponse = serde_json::from_value(serde_json::json!({
            "images": [b64],
            "info": "{}"
        }))
        .unwrap();
        assert_eq!(decode_first_image(body).unwrap(), img);
    }

    #[test]
    fn test_decode_empty_response() {
        let body: Img2ImgResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(decode_first_image(body), Err(PrismaError::Generation(_))));
    }
}
