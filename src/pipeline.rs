//! Frame processing pipeline
//!
//! decode -> track -> report -> (gate) -> composite -> stylize -> publish.
//! Tracking happens inline for every frame; stylization runs as a background
//! task holding the gate's permit.

use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, RgbImage};
use parking_lot::{Mutex, RwLock};

use crate::codec;
use crate::compose;
use crate::diffusion::Stylizer;
use crate::error::{PrismaError, Result};
use crate::events::{EventBus, ServerEvent};
use crate::regen::{Outcome, Refusal, RegenerationGate, TransformPermit};
use crate::settings::ServerSettings;
use crate::telemetry::{CounterSnapshot, PipelineCounters, ProcessingStats, ProcessingTimer};
use crate::tracking::{BodyData, MaskParams, TrackerWorker};

/// Tunables applied per frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub mask: MaskParams,
    /// Landmarks at or below this visibility are not reported
    pub visibility_threshold: f32,
    pub jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mask: MaskParams::default(),
            visibility_threshold: 0.5,
            jpeg_quality: 85,
        }
    }
}

impl PipelineConfig {
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            mask: MaskParams {
                threshold: settings.tracking.mask_threshold,
                kernel: settings.tracking.morph_kernel,
            },
            visibility_threshold: settings.tracking.visibility_threshold,
            jpeg_quality: settings.server.jpeg_quality,
        }
    }
}

/// What happened to a transformation request for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformDecision {
    /// Frame was only tracked
    NotRequested,
    /// Requested, but no person (or no usable mask) in the frame
    NoPerson,
    Refused(Refusal),
    /// A background transformation now holds the permit
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub person_detected: bool,
    pub transform: TransformDecision,
}

/// Latest tracked frame, kept for the inspection endpoints
#[derive(Debug, Clone)]
pub struct TrackingSnapshot {
    pub width: u32,
    pub height: u32,
    pub body: BodyData,
    pub tracked_at: Instant,
}

impl TrackingSnapshot {
    /// Binary person mask as PNG, if the tracker produced a segmentation
    pub fn mask_png(&self, params: &MaskParams) -> Result<Option<Vec<u8>>> {
        match self.body.person_mask(self.width, self.height, params) {
            Some(mask) => codec::encode_png(&DynamicImage::ImageLuma8(mask)).map(Some),
            None => Ok(None),
        }
    }

    /// Skeleton overlay as PNG
    pub fn skeleton_png(&self) -> Result<Vec<u8>> {
        let skeleton = self.body.skeleton_image(self.width, self.height);
        codec::encode_png(&DynamicImage::ImageRgb8(skeleton))
    }
}

/// Cheaply cloneable handle to the processing pipeline
#[derive(Clone)]
pub struct Pipeline {
    tracker: Arc<TrackerWorker>,
    stylizer: Arc<Stylizer>,
    gate: Arc<RegenerationGate>,
    bus: EventBus,
    counters: Arc<PipelineCounters>,
    generation_timer: Arc<Mutex<ProcessingTimer>>,
    latest: Arc<RwLock<Option<TrackingSnapshot>>>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        tracker: TrackerWorker,
        stylizer: Stylizer,
        gate: Arc<RegenerationGate>,
        bus: EventBus,
        config: PipelineConfig,
    ) -> Self {
        Self {
            tracker: Arc::new(tracker),
            stylizer: Arc::new(stylizer),
            gate,
            bus,
            counters: Arc::new(PipelineCounters::default()),
            generation_timer: Arc::new(Mutex::new(ProcessingTimer::new(20))),
            latest: Arc::new(RwLock::new(None)),
            config,
        }
    }

    pub fn gate(&self) -> &Arc<RegenerationGate> {
        &self.gate
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker_ready(&self) -> bool {
        self.tracker.is_ready()
    }

    pub fn tracking_stats(&self) -> ProcessingStats {
        self.tracker.stats()
    }

    pub fn generation_stats(&self) -> ProcessingStats {
        self.generation_timer.lock().stats()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn latest_tracking(&self) -> Option<TrackingSnapshot> {
        self.latest.read().clone()
    }

    /// Process one frame from a viewer. `for_regeneration` marks frames sent
    /// in answer to a transformation request.
    pub async fn process_frame(&self, data_url: &str, for_regeneration: bool) -> Result<FrameOutcome> {
        self.counters.frame();

        let frame = match codec::decode_data_url(data_url) {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                tracing::warn!("Failed to decode frame: {}", e);
                self.bus.broadcast(ServerEvent::ProcessingError { error: e.to_string() });
                return Err(e);
            }
        };

        let body = match self.tracker.track(frame.clone()).await {
            Ok(body) => body,
            Err(e @ PrismaError::TrackerUnavailable(_)) => {
                tracing::debug!("Frame skipped: {}", e);
                return Err(e);
            }
            Err(e) => {
                self.bus.broadcast(ServerEvent::ProcessingError { error: e.to_string() });
                return Err(e);
            }
        };

        let (width, height) = frame.dimensions();
        *self.latest.write() = Some(TrackingSnapshot {
            width,
            height,
            body: body.clone(),
            tracked_at: Instant::now(),
        });

        let person_detected = body.is_person_detected;
        let landmarks = match &body.pose_landmarks {
            Some(_) if person_detected => Some(body.visible_landmarks(self.config.visibility_threshold)),
            _ => None,
        };
        self.bus.broadcast(ServerEvent::TrackingResults {
            is_person_detected: person_detected,
            landmarks,
        });

        let transform = if !for_regeneration {
            TransformDecision::NotRequested
        } else if !person_detected || body.segmentation.is_none() {
            TransformDecision::NoPerson
        } else {
            self.begin_transform(frame, body)
        };

        Ok(FrameOutcome {
            person_detected,
            transform,
        })
    }

    fn begin_transform(&self, frame: Arc<RgbImage>, body: BodyData) -> TransformDecision {
        let permit = match self.gate.try_begin(Instant::now()) {
            Ok(permit) => permit,
            Err(refusal) => {
                tracing::debug!("Transformation refused: {}", refusal);
                self.counters.refused();
                return TransformDecision::Refused(refusal);
            }
        };

        self.counters.started();
        self.bus.broadcast(ServerEvent::TransformationStarted);

        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run_transform(permit, frame, body).await;
        });
        TransformDecision::Started
    }

    async fn run_transform(&self, permit: TransformPermit, frame: Arc<RgbImage>, body: BodyData) {
        let started = Instant::now();
        match self.stylize(frame, body).await {
            Ok(image) => {
                let took = started.elapsed();
                permit.complete(Instant::now(), Outcome::Succeeded);
                self.counters.completed(took);
                self.generation_timer.lock().record(took);
                tracing::info!(took_ms = took.as_millis() as u64, "Transformation complete");
                self.bus.broadcast(ServerEvent::TransformationResult { image });
            }
            Err(e) => {
                permit.complete(Instant::now(), Outcome::Failed);
                self.counters.failed();
                tracing::error!("Transformation failed: {}", e);
                self.bus.broadcast(ServerEvent::TransformationError { error: e.to_string() });
            }
        }
    }

    async fn stylize(&self, frame: Arc<RgbImage>, body: BodyData) -> Result<String> {
        let composite_body = body.clone();
        let params = self.config.mask;
        // Mask cleanup and compositing are both full-frame pixel passes
        let composite = tokio::task::spawn_blocking(move || -> Result<RgbImage> {
            let (width, height) = frame.dimensions();
            let mask = composite_body
                .person_mask(width, height, &params)
                .ok_or_else(|| PrismaError::Generation("frame has no segmentation mask".to_string()))?;
            Ok(compose::pose_aware_input(&frame, &mask, &composite_body))
        })
        .await
        .map_err(|e| PrismaError::Generation(format!("composite task failed: {}", e)))??;

        let styled = self.stylizer.stylize(&composite, Some(&body)).await?;
        codec::encode_jpeg_data_url(&styled, self.config.jpeg_quality)
    }
}
