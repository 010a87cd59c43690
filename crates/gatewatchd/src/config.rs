use std::path::PathBuf;
use std::time::Duration;

use gatewatch_core::DEFAULT_MATCH_THRESHOLD;

use crate::gate::{GateConfig, GateKind};

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Root directory of the enrollment photo store.
    pub labels_dir: PathBuf,
    /// Euclidean distance threshold for a positive match.
    pub match_threshold: f32,
    /// Default per-gate cooldown window in milliseconds.
    pub cooldown_ms: u64,
    /// Default detection period per gate in milliseconds.
    pub tick_ms: u64,
    /// Upper bound on a single detection call in milliseconds.
    pub detect_timeout_ms: u64,
    /// Overlay surface size bounding boxes are scaled to.
    pub display_width: u32,
    pub display_height: u32,
}

impl Config {
    /// Load configuration from `GATEWATCH_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            labels_dir: std::env::var("GATEWATCH_LABELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("labels")),
            match_threshold: env_f32("GATEWATCH_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
            cooldown_ms: env_u64("GATEWATCH_COOLDOWN_MS", 10_000),
            tick_ms: env_u64("GATEWATCH_TICK_MS", 100),
            detect_timeout_ms: env_u64("GATEWATCH_DETECT_TIMEOUT_MS", 2_000),
            display_width: env_u32("GATEWATCH_DISPLAY_WIDTH", 640),
            display_height: env_u32("GATEWATCH_DISPLAY_HEIGHT", 480),
        }
    }

    pub fn entrance_gate(&self) -> GateConfig {
        self.gate("entrance", GateKind::Entrance)
    }

    pub fn exit_gate(&self) -> GateConfig {
        self.gate("exit", GateKind::Exit)
    }

    /// Gate configuration with per-gate overrides, e.g.
    /// `GATEWATCH_EXIT_COOLDOWN_MS` beats `GATEWATCH_COOLDOWN_MS`.
    fn gate(&self, id: &str, kind: GateKind) -> GateConfig {
        let upper = id.to_uppercase();
        GateConfig {
            id: id.to_string(),
            kind,
            tick: Duration::from_millis(env_u64(
                &format!("GATEWATCH_{upper}_TICK_MS"),
                self.tick_ms,
            )),
            cooldown: Duration::from_millis(env_u64(
                &format!("GATEWATCH_{upper}_COOLDOWN_MS"),
                self.cooldown_ms,
            )),
            detect_timeout: Duration::from_millis(self.detect_timeout_ms),
            display: (self.display_width, self.display_height),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
