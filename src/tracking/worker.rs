//! Tracker worker thread
//!
//! Model sessions are not shared between threads; the tracker lives on its own
//! named thread and receives frames through a bounded channel. Callers await
//! the reply on a oneshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use image::RgbImage;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{BodyData, BodyTracker};
use crate::error::{PrismaError, Result};
use crate::telemetry::{ProcessingStats, ProcessingTimer};

/// Frames waiting for the tracker beyond this are rejected
const QUEUE_DEPTH: usize = 2;

/// Frame submitted to the worker
struct TrackJob {
    frame: Arc<RgbImage>,
    reply: oneshot::Sender<Result<BodyData>>,
}

/// Runs a [`BodyTracker`] on a dedicated thread
pub struct TrackerWorker {
    /// Channel to send frames to the tracker thread
    job_sender: Option<Sender<TrackJob>>,
    /// Whether the tracker thread is running
    running: Arc<AtomicBool>,
    /// Tracker thread handle
    thread_handle: Option<std::thread::JoinHandle<()>>,
    /// Rolling tracking durations
    timer: Arc<Mutex<ProcessingTimer>>,
}

impl TrackerWorker {
    /// Start the worker thread with the given tracker
    pub fn spawn(tracker: Box<dyn BodyTracker>) -> Result<Self> {
        let (job_sender, job_receiver) = crossbeam_channel::bounded::<TrackJob>(QUEUE_DEPTH);
        let running = Arc::new(AtomicBool::new(true));
        let timer = Arc::new(Mutex::new(ProcessingTimer::default()));

        let running_clone = running.clone();
        let timer_clone = timer.clone();

        let thread_handle = std::thread::Builder::new()
            .name("body-tracker".to_string())
            .spawn(move || {
                Self::tracker_thread(tracker, job_receiver, running_clone, timer_clone);
            })?;

        Ok(Self {
            job_sender: Some(job_sender),
            running,
            thread_handle: Some(thread_handle),
            timer,
        })
    }

    /// Tracker thread main loop
    fn tracker_thread(
        mut tracker: Box<dyn BodyTracker>,
        job_receiver: Receiver<TrackJob>,
        running: Arc<AtomicBool>,
        timer: Arc<Mutex<ProcessingTimer>>,
    ) {
        tracing::info!("Body tracker thread started");

        while let Ok(job) = job_receiver.recv() {
            let started = Instant::now();
            let result = tracker.process_frame(&job.frame);
            timer.lock().record(started.elapsed());

            if let Err(e) = &result {
                tracing::warn!("Tracking error: {}", e);
            }
            // Caller may have gone away; nothing to do then
            let _ = job.reply.send(result);
        }

        running.store(false, Ordering::Release);
        tracing::info!("Body tracker thread stopped");
    }

    /// Track a frame. Fails fast when the worker is saturated.
    pub async fn track(&self, frame: Arc<RgbImage>) -> Result<BodyData> {
        let sender = self
            .job_sender
            .as_ref()
            .ok_or_else(|| PrismaError::TrackerUnavailable("tracker stopped".to_string()))?;

        let (reply, response) = oneshot::channel();
        sender.try_send(TrackJob { frame, reply }).map_err(|e| match e {
            TrySendError::Full(_) => PrismaError::TrackerUnavailable("tracker busy, frame dropped".to_string()),
            TrySendError::Disconnected(_) => PrismaError::TrackerUnavailable("tracker stopped".to_string()),
        })?;

        response
            .await
            .map_err(|_| PrismaError::TrackerUnavailable("tracker thread exited".to_string()))?
    }

    /// Tracking duration statistics
    pub fn stats(&self) -> ProcessingStats {
        self.timer.lock().stats()
    }

    /// Check if the tracker thread is alive
    pub fn is_ready(&self) -> bool {
        self.job_sender.is_some() && self.running.load(Ordering::Acquire)
    }

    /// Stop the tracker thread
    pub fn stop(&mut self) {
        // Drop sender to signal thread to stop
        self.job_sender = None;

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TrackerWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
