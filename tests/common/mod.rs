//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tokio::sync::broadcast;

use prisma_server::codec;
use prisma_server::diffusion::{GenerationRequest, ImageGenerator, Stylizer};
use prisma_server::events::{EventBus, ServerEvent};
use prisma_server::pipeline::{Pipeline, PipelineConfig};
use prisma_server::regen::{RegenerationGate, RegenerationPolicy};
use prisma_server::settings::DiffusionSection;
use prisma_server::tracking::{BodyData, BodyTracker, Landmark, SegmentationMask, TrackerWorker};
use prisma_server::{PrismaError, Result};

/// Tracker that reports a centred person, or nobody
pub struct MockTracker {
    pub person: Arc<AtomicBool>,
    /// When cleared, a detected person comes without a segmentation mask
    pub with_mask: Arc<AtomicBool>,
}

impl MockTracker {
    pub fn new(person: bool) -> Self {
        Self {
            person: Arc::new(AtomicBool::new(person)),
            with_mask: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl BodyTracker for MockTracker {
    fn process_frame(&mut self, _frame: &RgbImage) -> Result<BodyData> {
        if !self.person.load(Ordering::SeqCst) {
            return Ok(BodyData::from_outputs(None, Some(SegmentationMask::new(vec![0.0; 64], 8, 8)), 0.5));
        }

        let mut pose = vec![Landmark::new(0.5, 0.5, 0.0, 0.9); 33];
        pose[11] = Landmark::new(0.4, 0.3, 0.0, 0.9);
        pose[12] = Landmark::new(0.6, 0.3, 0.0, 0.9);
        let mut mask = vec![0.0; 64];
        for y in 2..6 {
            for x in 2..6 {
                mask[y * 8 + x] = 1.0;
            }
        }
        let segmentation = self
            .with_mask
            .load(Ordering::SeqCst)
            .then(|| SegmentationMask::new(mask, 8, 8));
        Ok(BodyData::from_outputs(Some(pose), segmentation, 0.5))
    }
}

/// Generator that sleeps, records concurrency and returns a solid image
#[derive(Default)]
pub struct MockGenerator {
    pub delay: Duration,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub prompts: parking_lot::Mutex<Vec<String>>,
    /// Start and end of every call, in call order
    pub spans: parking_lot::Mutex<Vec<(Instant, Instant)>>,
}

impl MockGenerator {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ImageGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<RgbImage> {
        let start = Instant::now();
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());

        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.spans.lock().push((start, Instant::now()));

        if self.fail.load(Ordering::SeqCst) {
            return Err(PrismaError::Generation("model offline".to_string()));
        }
        let (w, h) = request.image.dimensions();
        Ok(RgbImage::from_pixel(w, h, Rgb([200, 100, 50])))
    }
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub gate: Arc<RegenerationGate>,
    pub bus: EventBus,
    pub generator: Arc<MockGenerator>,
    pub person: Arc<AtomicBool>,
    pub with_mask: Arc<AtomicBool>,
}

pub fn harness(interval: Duration, generator: MockGenerator) -> Harness {
    let tracker = MockTracker::new(true);
    let (person, with_mask) = (tracker.person.clone(), tracker.with_mask.clone());
    let worker = TrackerWorker::spawn(Box::new(tracker)).expect("tracker worker");
    let generator = Arc::new(generator);
    let stylizer = Stylizer::new(generator.clone(), DiffusionSection::default());
    let gate = RegenerationGate::new(RegenerationPolicy::new(interval, true));
    let bus = EventBus::new();
    let pipeline = Pipeline::new(worker, stylizer, gate.clone(), bus.clone(), PipelineConfig::default());
    Harness {
        pipeline,
        gate,
        bus,
        generator,
        person,
        with_mask,
    }
}

/// 64x48 grey frame as a JPEG data URL
pub fn frame_data_url() -> String {
    let frame = RgbImage::from_pixel(64, 48, Rgb([120, 120, 120]));
    codec::encode_jpeg_data_url(&frame, 90).expect("encode frame")
}

/// Wait for the next event matching `pred`, skipping others
pub async fn next_event<F>(rx: &mut broadcast::Receiver<ServerEvent>, pred: F) -> ServerEvent
where
    F: Fn(&ServerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
