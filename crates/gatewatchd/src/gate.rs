//! Per-gate detection task.
//!
//! One gate per monitored feed: it polls frames on a fixed tick, runs
//! detection bounded by a timeout, queries the shared matcher snapshot
//! and pushes every face to the render overlay, then runs approved
//! matches through its own cooldown state before notifying. Ticks of a
//! single gate never overlap; distinct gates run as independent tasks.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, Instant, MissedTickBehavior};

use gatewatch_core::{BoundingBox, CooldownState, FaceMatcher};

use crate::notify::{EventKind, NotificationEvent};
use crate::providers::{FaceEngine, FrameSource, FrameStatus, NotificationSink};

/// Read side of the swappable matcher reference. `None` means no build
/// has completed yet and gates must stay idle.
pub type MatcherHandle = watch::Receiver<Option<Arc<FaceMatcher>>>;

/// Write side, held by the enrollment pipeline's caller.
pub type MatcherPublisher = watch::Sender<Option<Arc<FaceMatcher>>>;

/// A fresh matcher slot in its idle (unbuilt) state.
pub fn matcher_channel() -> (MatcherPublisher, MatcherHandle) {
    watch::channel(None)
}

/// Whether a gate watches people coming in or going out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    Entrance,
    Exit,
}

impl GateKind {
    pub fn event_kind(self) -> EventKind {
        match self {
            GateKind::Entrance => EventKind::Arrival,
            GateKind::Exit => EventKind::Departure,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub id: String,
    pub kind: GateKind,
    /// Detection period.
    pub tick: Duration,
    /// Minimum unseen time before the same identity notifies again.
    pub cooldown: Duration,
    /// Upper bound on one detection call; expiry skips the tick.
    pub detect_timeout: Duration,
    /// Overlay surface size the bounding boxes are scaled to.
    pub display: (u32, u32),
}

/// Render-only event: one per detected face per tick, matched or not.
/// Delivered best-effort to the overlay and never gated by the cooldown.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionEvent {
    pub gate_id: String,
    pub timestamp_ms: u64,
    pub bbox: BoundingBox,
    /// Matched label, or `"unknown"`.
    pub label: String,
    pub distance: f32,
}

/// One monitored doorway. Owns its cooldown state for the process
/// lifetime; nothing else mutates it.
pub struct Gate {
    config: GateConfig,
    state: CooldownState,
    epoch: Instant,
}

impl Gate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            state: CooldownState::new(),
            epoch: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Milliseconds since this gate started, on the runtime clock.
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Run this gate until process shutdown.
    ///
    /// Stays idle until the first matcher build is published, then ticks
    /// at the configured period. The tick body is awaited before the next
    /// tick fires, and missed ticks are skipped rather than bursted, so a
    /// gate can never race its own cooldown state.
    pub async fn run<F, E, N>(
        mut self,
        mut frames: F,
        engine: E,
        sink: N,
        mut matcher: MatcherHandle,
        overlay: mpsc::Sender<DetectionEvent>,
    ) where
        F: FrameSource,
        E: FaceEngine,
        N: NotificationSink,
    {
        while matcher.borrow_and_update().is_none() {
            if matcher.changed().await.is_err() {
                tracing::info!(gate = %self.config.id, "matcher publisher dropped before first build; gate exiting");
                return;
            }
        }
        tracing::info!(gate = %self.config.id, "matcher available; scanning");

        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.run_tick(&mut frames, &engine, &sink, &matcher, &overlay)
                .await;
        }
    }

    /// One detection pass. Any failure skips the tick and leaves the
    /// cooldown state untouched.
    async fn run_tick<F, E, N>(
        &mut self,
        frames: &mut F,
        engine: &E,
        sink: &N,
        matcher: &MatcherHandle,
        overlay: &mpsc::Sender<DetectionEvent>,
    ) where
        F: FrameSource,
        E: FaceEngine,
        N: NotificationSink,
    {
        let frame = match frames.current_frame() {
            Ok(FrameStatus::Active(frame)) => frame,
            Ok(FrameStatus::Paused) => return,
            Err(err) => {
                tracing::warn!(gate = %self.config.id, error = %err, "feed unavailable; tick skipped");
                return;
            }
        };

        let faces = match timeout(self.config.detect_timeout, engine.detect_all(&frame)).await {
            Ok(Ok(faces)) => faces,
            Ok(Err(err)) => {
                tracing::warn!(gate = %self.config.id, error = %err, "detection failed; tick skipped");
                return;
            }
            Err(_) => {
                tracing::warn!(
                    gate = %self.config.id,
                    timeout_ms = self.config.detect_timeout.as_millis() as u64,
                    "detection timed out; tick skipped"
                );
                return;
            }
        };

        let Some(snapshot) = matcher.borrow().as_ref().cloned() else {
            return;
        };
        let now_ms = self.now_ms();
        let cooldown_ms = self.config.cooldown.as_millis() as u64;

        for face in faces {
            let bbox = face
                .bbox
                .scaled_to((frame.width, frame.height), self.config.display);
            let result = snapshot.find_best_match(&face.descriptor);

            // Every face gets boxed and labeled on the overlay, matched
            // or not. Best-effort: a full overlay drops the event rather
            // than stalling the tick.
            let _ = overlay.try_send(DetectionEvent {
                gate_id: self.config.id.clone(),
                timestamp_ms: now_ms,
                bbox,
                label: result.display_label().to_string(),
                distance: result.distance,
            });

            if let Some(label) = result.label {
                if self.state.approve(&label, now_ms, cooldown_ms) {
                    let event = NotificationEvent::new(
                        self.config.id.as_str(),
                        self.config.kind.event_kind(),
                        label,
                    );
                    tracing::debug!(
                        gate = %self.config.id,
                        label = %event.label,
                        distance = result.distance,
                        "sighting approved"
                    );
                    sink.render(&event);
                }
            }
        }
    }
}
