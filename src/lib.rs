//! Body-landmark gameplay pipeline.
//!
//! Head and hand positions come in once per tick; running intensity, jumps,
//! squats, momentum locomotion and session stats come out. Everything runs
//! synchronously inside [`pipeline::Pipeline::tick`].

pub mod analyzers;
pub mod calibration;
pub mod config;
pub mod error;
pub mod events;
pub mod health_monitor;
pub mod live_status;
pub mod locomotion;
pub mod pipeline;
pub mod recording;
pub mod rerun_logger;
pub mod session;
pub mod smoothing;
pub mod source;
pub mod types;

pub use config::PipelineConfig;
pub use error::{ConfigError, ConfigResult};
pub use events::{EventSink, PipelineEvent};
pub use locomotion::Displacement;
pub use pipeline::{Pipeline, TickReport};
pub use session::StatsSnapshot;
pub use types::{LandmarkSample, Vec3};
