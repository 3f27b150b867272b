//! Prisma Server - pose-aware diffusion stylization for an interactive installation
//!
//! Receives webcam frames from viewers over WebSocket, segments the person in
//! each frame, and periodically restyles the frame through an image-to-image
//! diffusion service. Regeneration is throttled so the output stays stable
//! between expensive model calls.

pub mod api;
pub mod codec;
pub mod compose;
pub mod diffusion;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod raster;
pub mod regen;
pub mod settings;
pub mod telemetry;
pub mod tracking;

pub use error::{PrismaError, Result};
pub use pipeline::Pipeline;
