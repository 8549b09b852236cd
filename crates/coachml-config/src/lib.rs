//! KDL configuration parsing for coachml.
//!
//! This crate handles parsing of the system configuration file
//! (coachml.kdl): queue backend, worker settings, and the transcription
//! provider.

pub mod error;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use system::{QueueConfig, SystemConfig, TranscriptionConfig, WorkerSettings, parse_system_config};
