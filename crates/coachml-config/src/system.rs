//! System configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};

/// System-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub queue: QueueConfig,
    pub worker: WorkerSettings,
    pub transcription: TranscriptionConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::Memory,
            worker: WorkerSettings::default(),
            transcription: TranscriptionConfig::default(),
        }
    }
}

/// Which queue backend to connect to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueueConfig {
    /// In-process store; only useful for a single-process deployment.
    Memory,
    /// Shared Postgres-backed queue.
    Postgres { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    pub count: usize,
    pub poll_interval_ms: u64,
    pub dependency_poll_ms: u64,
    /// Wall-clock limit per task execution; 0 disables the limit.
    pub task_timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            count: 2,
            poll_interval_ms: 500,
            dependency_poll_ms: 250,
            task_timeout_secs: 600,
        }
    }
}

/// Transcription provider settings for the audio sentiment task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    pub base_url: String,
    /// Environment variable holding the provider API key; the key itself is
    /// never written to the config file.
    pub api_key_env: String,
    pub poll_interval_ms: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.assemblyai.com".to_string(),
            api_key_env: "ASSEMBLYAI_API_KEY".to_string(),
            poll_interval_ms: 2000,
        }
    }
}

/// Parse a system configuration from KDL text. Every node is optional;
/// omitted nodes fall back to defaults.
pub fn parse_system_config(kdl: &str) -> ConfigResult<SystemConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = SystemConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "queue" => {
                config.queue = parse_queue(node)?;
            }
            "worker" => {
                config.worker = parse_worker(node)?;
            }
            "transcription" => {
                config.transcription = parse_transcription(node)?;
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

fn parse_queue(node: &KdlNode) -> ConfigResult<QueueConfig> {
    let backend = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("queue backend".to_string()))?;

    match backend.as_str() {
        "memory" => Ok(QueueConfig::Memory),
        "postgres" => {
            let url = get_string_prop(node, "url")
                .ok_or_else(|| ConfigError::MissingField("queue url".to_string()))?;
            Ok(QueueConfig::Postgres { url })
        }
        other => Err(ConfigError::InvalidValue {
            field: "queue backend".to_string(),
            message: format!("unknown backend: {other}"),
        }),
    }
}

fn parse_worker(node: &KdlNode) -> ConfigResult<WorkerSettings> {
    let mut settings = WorkerSettings::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "count" => {
                    settings.count = usize::try_from(get_int_arg(child, "worker count")?)
                        .map_err(|_| ConfigError::InvalidValue {
                            field: "worker count".to_string(),
                            message: "value is too large".to_string(),
                        })?;
                }
                "poll-interval-ms" => {
                    settings.poll_interval_ms = get_int_arg(child, "poll-interval-ms")?;
                }
                "dependency-poll-ms" => {
                    settings.dependency_poll_ms = get_int_arg(child, "dependency-poll-ms")?;
                }
                "task-timeout-secs" => {
                    settings.task_timeout_secs = get_int_arg(child, "task-timeout-secs")?;
                }
                _ => {}
            }
        }
    }

    if settings.count == 0 {
        return Err(ConfigError::InvalidValue {
            field: "worker count".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    Ok(settings)
}

fn parse_transcription(node: &KdlNode) -> ConfigResult<TranscriptionConfig> {
    let mut config = TranscriptionConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "base-url" => {
                    config.base_url = get_first_string_arg(child)
                        .ok_or_else(|| ConfigError::MissingField("transcription base-url".to_string()))?;
                }
                "api-key-env" => {
                    config.api_key_env = get_first_string_arg(child)
                        .ok_or_else(|| ConfigError::MissingField("transcription api-key-env".to_string()))?;
                }
                "poll-interval-ms" => {
                    config.poll_interval_ms = get_int_arg(child, "poll-interval-ms")?;
                }
                _ => {}
            }
        }
    }

    Ok(config)
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_int_arg(node: &KdlNode, field: &str) -> ConfigResult<u64> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| ConfigError::InvalidValue {
            field: field.to_string(),
            message: "expected a non-negative integer within range".to_string(),
        })
}
