//! Event pipeline: from a host event to one delivery per interested hook.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::HookError;
use crate::hooks::dispatcher::WebhookDispatcher;
use crate::hooks::notice::Notice;
use crate::hooks::progress::MilestoneTracker;
use crate::hooks::providers::{JobInfoProvider, SnapshotProvider};
use crate::hooks::registry::{HookRegistry, HookSnapshot};
use crate::models::{EventRoute, Hook, HookEvent};
use crate::template::resolve_text;

/// Serial output line the firmware prints while waiting for the user.
const PAUSED_FOR_USER: &str = "echo:busy: paused for user";

/// Milestone reported by test deliveries of the progress event.
const TEST_MILESTONE: i32 = 50;

/// Which hooks an event is delivered to.
#[derive(Debug, Clone)]
enum Target {
    /// Every hook, or only `payload.hook_index` when present.
    Payload,
    /// A single hook that crossed a progress milestone.
    Milestone { hook_id: String, milestone: i32 },
}

/// Milestones of one hook waiting for delivery.
#[derive(Debug, Default)]
struct ProgressQueue {
    pending: VecDeque<i32>,
    /// A task is delivering from this queue.
    draining: bool,
}

/// Routes host events to hooks.
///
/// Cheap to clone; clones share the registry, tracker and dispatcher.
#[derive(Clone)]
pub struct EventPipeline {
    registry: Arc<HookRegistry>,
    milestones: Arc<MilestoneTracker>,
    progress_queues: Arc<DashMap<String, ProgressQueue>>,
    dispatcher: WebhookDispatcher,
    job_info: Option<Arc<dyn JobInfoProvider>>,
    snapshots: Option<Arc<dyn SnapshotProvider>>,
    paused_for_user: Arc<AtomicBool>,
}

impl EventPipeline {
    pub fn new(registry: Arc<HookRegistry>, dispatcher: WebhookDispatcher) -> Self {
        Self {
            registry,
            milestones: Arc::new(MilestoneTracker::new()),
            progress_queues: Arc::new(DashMap::new()),
            dispatcher,
            job_info: None,
            snapshots: None,
            paused_for_user: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_job_info(mut self, provider: Arc<dyn JobInfoProvider>) -> Self {
        self.job_info = Some(provider);
        self
    }

    pub fn with_snapshot_provider(mut self, provider: Arc<dyn SnapshotProvider>) -> Self {
        self.snapshots = Some(provider);
        self
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    pub fn milestones(&self) -> &MilestoneTracker {
        &self.milestones
    }

    /// Fire a host event. Returns immediately; deliveries run in the background.
    pub fn fire(&self, event_name: &str, payload: Value) {
        let pipeline = self.clone();
        let event = HookEvent::from_name(event_name);
        self.dispatcher.spawn(async move {
            pipeline.run_event(event, payload, Target::Payload).await;
        });
    }

    /// Feed a print progress percentage to every hook's milestone tracker.
    ///
    /// Crossed milestones fire the progress event for that hook only. They
    /// join the hook's queue in the order they were crossed and a single task
    /// per hook delivers them, so they arrive in ascending order even across
    /// updates.
    pub fn update_progress(&self, progress: i32) {
        for hook in self.registry.snapshot().iter() {
            let crossed = match self.milestones.update(hook, progress) {
                Ok(crossed) => crossed,
                Err(error) => {
                    warn!(hook = %hook.label(), error = %error, "Progress milestone skipped");
                    self.dispatcher.notify(Notice::error(hook, error.to_string()));
                    continue;
                }
            };
            if crossed.is_empty() {
                continue;
            }

            let start_drain = {
                let mut queue = self.progress_queues.entry(hook.id.clone()).or_default();
                queue.pending.extend(crossed);
                !std::mem::replace(&mut queue.draining, true)
            };
            if start_drain {
                let pipeline = self.clone();
                let hook_id = hook.id.clone();
                self.dispatcher.spawn(async move {
                    pipeline.drain_progress(hook_id).await;
                });
            }
        }
    }

    async fn drain_progress(&self, hook_id: String) {
        while let Some(milestone) = self.next_milestone(&hook_id) {
            debug!(hook = %hook_id, milestone, "Progress milestone crossed");
            let target = Target::Milestone {
                hook_id: hook_id.clone(),
                milestone,
            };
            self.run_event(
                HookEvent::PrintProgress,
                json!({ "milestone": milestone }),
                target,
            )
            .await;
        }
    }

    /// Pop the next queued milestone, releasing the queue when it is empty.
    fn next_milestone(&self, hook_id: &str) -> Option<i32> {
        let mut queue = self.progress_queues.get_mut(hook_id)?;
        let next = queue.pending.pop_front();
        if next.is_none() {
            queue.draining = false;
        }
        next
    }

    /// Watch printer serial output for the firmware's user-action prompt.
    ///
    /// Fires the notify event once per prompt and re-arms on any other line.
    /// Returns whether an event was fired.
    pub fn observe_serial_line(&self, line: &str) -> bool {
        if !line.contains(PAUSED_FOR_USER) {
            self.paused_for_user.store(false, Ordering::SeqCst);
            return false;
        }
        if self.paused_for_user.swap(true, Ordering::SeqCst) {
            return false;
        }

        info!("Printer is waiting for user action");
        self.fire(HookEvent::NOTIFY_EVENT, json!({}));
        true
    }

    /// Run `event_name` with an example payload, optionally for one hook only.
    pub fn trigger_test(&self, event_name: &str, hook_index: Option<usize>) {
        if HookEvent::from_name(event_name) == HookEvent::PrintProgress {
            for hook in self.registry.snapshot().iter() {
                self.milestones.force_milestone(&hook.id, TEST_MILESTONE);
            }
        }

        let mut payload = json!({
            "name": "example.gcode",
            "path": "example.gcode",
            "origin": "local",
            "size": 242038,
            "owner": "example_user",
            "time": 50.237335886,
            "popup": true
        });
        if let Some(index) = hook_index {
            payload["hook_index"] = json!(index);
        }

        info!(event = %event_name, hook_index = ?hook_index, "Firing test event");
        self.fire(event_name, payload);
    }

    /// Replace the hook list and forget state of removed hooks.
    pub fn replace_hooks(&self, hooks: Vec<Hook>) -> HookSnapshot {
        let snapshot = self.registry.replace(hooks);
        let ids: HashSet<String> = snapshot.iter().map(|hook| hook.id.clone()).collect();
        self.milestones.retain(&ids);
        self.progress_queues.retain(|id, _| ids.contains(id));
        self.dispatcher.retain(&ids);
        info!(count = snapshot.len(), "Hooks updated");
        snapshot
    }

    /// Wait for all queued events and deliveries to finish.
    pub async fn wait_idle(&self) {
        self.dispatcher.wait_idle().await;
    }

    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }

    async fn run_event(&self, event: HookEvent, payload: Value, target: Target) {
        let hooks = self.registry.snapshot();
        let selected = select_hooks(&hooks, &event, &payload, &target);
        if selected.is_empty() {
            debug!(event = %event, "No hook handles event");
            return;
        }

        let wants_snapshot = selected.iter().any(|(hook, _)| hook.references("snapshot"));
        let base = self.base_context(&event, payload, wants_snapshot).await;

        for (hook, route) in selected {
            let milestone = match &target {
                Target::Milestone { milestone, .. } => Some(*milestone),
                Target::Payload => self.milestones.last_fired(&hook.id),
            };

            match hook_context(&base, &hook, &route, milestone) {
                Ok(context) if matches!(target, Target::Milestone { .. }) => {
                    self.dispatcher
                        .dispatch_in_order(&hook, event.name(), context)
                        .await;
                }
                Ok(context) => self.dispatcher.dispatch(hook, event.name(), context),
                Err(error) => {
                    warn!(hook = %hook.label(), event = %event, error = %error, "Hook message not resolved");
                    self.dispatcher.notify(Notice::error(&hook, error.to_string()));
                }
            }
        }
    }

    /// Context shared by every hook handling one event.
    async fn base_context(&self, event: &HookEvent, payload: Value, wants_snapshot: bool) -> Context {
        let mut context = Context::new();

        if let Value::Object(fields) = &payload {
            context.extend(fields.clone());
        }
        context.insert("extra", payload);
        context.insert("topic", event.topic());

        match &self.job_info {
            Some(provider) => match provider.current_job().await {
                Ok(info) => context.extend(info.context_entries()),
                Err(error) => {
                    warn!(error = %error, "Failed to read job information");
                    context.extend(empty_job_entries());
                }
            },
            None => context.extend(empty_job_entries()),
        }

        context.insert("currentTime", chrono::Utc::now().timestamp());

        if wants_snapshot && let Some(provider) = &self.snapshots {
            match provider.snapshot().await {
                Ok(Some(image)) => context.insert("snapshot", BASE64.encode(image)),
                Ok(None) => debug!("Webcam returned no snapshot"),
                Err(error) => warn!(error = %error, "Failed to fetch webcam snapshot"),
            }
        }

        context
    }
}

fn select_hooks(
    hooks: &HookSnapshot,
    event: &HookEvent,
    payload: &Value,
    target: &Target,
) -> Vec<(Arc<Hook>, EventRoute)> {
    let requested_index = payload
        .get("hook_index")
        .and_then(Value::as_u64)
        .and_then(|index| usize::try_from(index).ok());

    hooks
        .iter()
        .enumerate()
        .filter(|(_, hook)| hook.enabled)
        .filter(|(index, hook)| match target {
            Target::Payload => requested_index.is_none_or(|requested| requested == *index),
            Target::Milestone { hook_id, .. } => hook.id == *hook_id,
        })
        .filter_map(|(_, hook)| hook.route(event).map(|route| (Arc::clone(hook), route)))
        .collect()
}

/// Add hook-scoped fields and the resolved message to the shared context.
fn hook_context(
    base: &Context,
    hook: &Hook,
    route: &EventRoute,
    milestone: Option<i32>,
) -> Result<Context, HookError> {
    let mut context = base.clone();
    context.insert("topic", route.topic.clone());
    context.insert("apiSecret", hook.api_secret.clone());
    context.insert("deviceIdentifier", hook.device_identifier.clone());
    context.insert(
        "percentCompleteMilestone",
        milestone.map_or_else(|| Value::String(String::new()), Value::from),
    );

    let message = resolve_text(&route.message, &context)?;
    context.insert("message", message);
    Ok(context)
}

fn empty_job_entries() -> Map<String, Value> {
    crate::models::JobInfo::default().context_entries()
}
