//! Per-gate cooldown state machine.
//!
//! Decides whether a recognized face is a new sighting worth a
//! notification or a repeat to suppress. The suppression window is keyed
//! to the last *approved* identity: a different known identity always
//! passes immediately, and suppressed re-detections do not extend the
//! window.

/// Last approved sighting at one gate. Mutated only by that gate's
/// detection task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CooldownState {
    pub last_label: String,
    pub last_time_ms: u64,
}

impl CooldownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approve or suppress a detection of `label` at `now_ms`.
    ///
    /// Approves when the identity differs from the last approved one, or
    /// when more than `cooldown_ms` has passed since the last approval.
    /// On approval the state is updated; on suppression it is left
    /// untouched, so the window is measured from the last approved
    /// sighting rather than the last raw detection.
    pub fn approve(&mut self, label: &str, now_ms: u64, cooldown_ms: u64) -> bool {
        let elapsed = now_ms.saturating_sub(self.last_time_ms);
        if label != self.last_label || elapsed > cooldown_ms {
            self.last_label = label.to_string();
            self.last_time_ms = now_ms;
            return true;
        }
        false
    }
}
