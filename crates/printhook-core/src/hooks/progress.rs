//! Print progress milestone tracking.
//!
//! The host reports raw completion percentages. Each hook turns that stream
//! into milestone events at multiples of its configured interval. Values
//! skipped between two updates are replayed in ascending order, so a jump
//! from 10% to 80% with an interval of 25 still yields 25, 50 and 75.

use dashmap::DashMap;
use std::collections::HashSet;

use crate::error::HookError;
use crate::models::Hook;

/// Milestone state of one hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilestoneSlot {
    /// Last progress value seen, `-1` before the first update of a job.
    pub last_progress: i32,
    pub last_fired: Option<i32>,
}

impl Default for MilestoneSlot {
    fn default() -> Self {
        Self {
            last_progress: -1,
            last_fired: None,
        }
    }
}

/// Per-hook milestone tracker.
///
/// Slots are keyed by hook id; each update holds the slot's map entry for its
/// whole duration so concurrent updates of the same hook are serialized.
#[derive(Debug, Default)]
pub struct MilestoneTracker {
    slots: DashMap<String, MilestoneSlot>,
}

impl MilestoneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a new progress value and return the milestones crossed, ascending.
    ///
    /// A value lower than the previous one starts a new job. An unparsable
    /// interval is reported as a configuration error and leaves the slot
    /// untouched apart from that reset. Values outside `0..=100` are clamped.
    pub fn update(&self, hook: &Hook, progress: i32) -> Result<Vec<i32>, HookError> {
        let progress = progress.clamp(0, 100);
        let mut slot = self.slots.entry(hook.id.clone()).or_default();

        if progress < slot.last_progress {
            *slot = MilestoneSlot::default();
        }

        if !hook.events.print_progress.enabled {
            return Ok(Vec::new());
        }

        let interval = hook.progress_interval()?;
        let crossed = crossed_milestones(slot.last_progress, progress, interval);

        if let Some(last) = crossed.last() {
            slot.last_fired = Some(*last);
        }
        slot.last_progress = progress;

        Ok(crossed)
    }

    /// Last milestone fired for a hook in the current job.
    pub fn last_fired(&self, hook_id: &str) -> Option<i32> {
        self.slots.get(hook_id).and_then(|slot| slot.last_fired)
    }

    pub fn slot(&self, hook_id: &str) -> MilestoneSlot {
        self.slots
            .get(hook_id)
            .map(|slot| *slot)
            .unwrap_or_default()
    }

    /// Pretend `milestone` was just fired, for test deliveries.
    pub fn force_milestone(&self, hook_id: &str, milestone: i32) {
        self.slots
            .entry(hook_id.to_string())
            .or_default()
            .last_fired = Some(milestone);
    }

    /// Drop slots of hooks that no longer exist.
    pub fn retain(&self, hook_ids: &HashSet<String>) {
        self.slots.retain(|id, _| hook_ids.contains(id));
    }
}

/// Multiples of `interval` in `(last, progress]`, excluding 0 and 100.
fn crossed_milestones(last: i32, progress: i32, interval: i64) -> Vec<i32> {
    let start = i64::from(last) + 1;
    let end = i64::from(progress.min(100));
    if start > end {
        return Vec::new();
    }

    let first = if start <= 0 {
        0
    } else {
        ((start - 1) / interval + 1).saturating_mul(interval)
    };

    std::iter::successors(Some(first), |value| value.checked_add(interval))
        .take_while(|value| *value <= end)
        .filter(|value| *value != 0 && *value != 100)
        .filter_map(|value| i32::try_from(value).ok())
        .collect()
}
