//! Runtime-tunable knobs for the scheduler and tool dispatcher.
//!
//! Grounded in `aura-core/src/config/{loader,formats}.rs`'s file+env overlay
//! pattern, simplified to one error type folded into [`RuntimeError`](crate::RuntimeError)
//! since BTflow's config surface is much smaller than Aura's `AuraConfig` trait
//! hierarchy warrants.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};

/// Scheduler knobs for [`crate::runner::ReactiveRunner`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub max_fps: f64,
    pub checkpoint_interval: u64,
    /// Hot-loop warning fires once a rolling second sees more than
    /// `hot_loop_multiplier * max_fps` ticks.
    pub hot_loop_multiplier: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig { max_fps: 60.0, checkpoint_interval: 1, hot_loop_multiplier: 1.5 }
    }
}

impl RunnerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.max_fps)
    }

    pub fn hot_loop_threshold(&self) -> f64 {
        self.hot_loop_multiplier * self.max_fps
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationFormat {
    Text,
    Json,
}

impl Default for ObservationFormat {
    fn default() -> Self {
        ObservationFormat::Text
    }
}

/// Tool-call dispatch knobs for `tool_runtime`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolRuntimeConfig {
    pub max_retries: u32,
    #[serde(with = "duration_secs_f64")]
    pub retry_backoff: Duration,
    pub observation_format: ObservationFormat,
    /// When an injected-context key and an LLM-provided argument collide, prefer
    /// the injected value (trusted runtime context) over the model's.
    pub prefer_injected: bool,
}

impl Default for ToolRuntimeConfig {
    fn default() -> Self {
        ToolRuntimeConfig {
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
            observation_format: ObservationFormat::Text,
            prefer_injected: true,
        }
    }
}

mod duration_secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs_f64(f64::deserialize(d)?))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BtflowConfig {
    pub runner: RunnerConfig,
    pub tool_runtime: ToolRuntimeConfig,
}

impl BtflowConfig {
    /// Loads defaults, overlays a TOML file if present, then overlays
    /// `BTFLOW_*` environment variables (e.g. `BTFLOW_RUNNER_MAX_FPS=30`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut value = toml::Value::try_from(BtflowConfig::default())
            .map_err(|e| RuntimeError::Config(format!("failed to serialize defaults: {e}")))?;

        if let Some(path) = path {
            if path.exists() {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| RuntimeError::Config(format!("reading {}: {e}", path.display())))?;
                let file_value: toml::Value = toml::from_str(&text)
                    .map_err(|e| RuntimeError::Config(format!("parsing {}: {e}", path.display())))?;
                merge_toml(&mut value, &file_value);
            }
        }

        apply_env_overlay(&mut value, "BTFLOW");

        BtflowConfig::deserialize(value).map_err(|e| RuntimeError::Config(format!("invalid configuration: {e}")))
    }
}

fn merge_toml(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (k, v) in overlay {
                merge_toml(base.entry(k.clone()).or_insert(toml::Value::Table(Default::default())), v);
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// `BTFLOW_RUNNER_MAX_FPS=30` becomes `runner.max_fps = 30`, matching the
/// teacher's `AURA_*` dotted-path convention.
fn apply_env_overlay(value: &mut toml::Value, prefix: &str) {
    let env_prefix = format!("{prefix}_");
    for (key, raw) in std::env::vars() {
        let Some(path) = key.strip_prefix(&env_prefix) else { continue };
        let segments: Vec<String> = path.to_lowercase().split('__').map(str::to_string).collect();
        set_path(value, &segments, &raw);
    }
}

fn set_path(value: &mut toml::Value, segments: &[String], raw: &str) {
    let table = match value {
        toml::Value::Table(table) => table,
        _ => return,
    };
    match segments {
        [last] => {
            let parsed = raw
                .parse::<i64>()
                .map(toml::Value::Integer)
                .or_else(|_| raw.parse::<f64>().map(toml::Value::Float))
                .or_else(|_| raw.parse::<bool>().map(toml::Value::Boolean))
                .unwrap_or_else(|_| toml::Value::String(raw.to_string()));
            table.insert(last.clone(), parsed);
        }
        [head, tail @ ..] => {
            let entry = table.entry(head.clone()).or_insert(toml::Value::Table(Default::default()));
            set_path(entry, tail, raw);
        }
        [] => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RunnerConfig::default();
        assert_eq!(cfg.max_fps, 60.0);
        assert_eq!(cfg.hot_loop_threshold(), 90.0);
    }

    #[test]
    fn load_without_file_returns_defaults() {
        let cfg = BtflowConfig::load(None).unwrap();
        assert_eq!(cfg.runner.checkpoint_interval, 1);
        assert_eq!(cfg.tool_runtime.max_retries, 2);
    }
}
