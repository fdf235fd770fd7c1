//! Non-blocking webhook delivery.
//!
//! Every delivery runs on its own task, tracked so shutdown can drain it and
//! bounded by a semaphore. A delivery never reports back to its caller:
//! configuration problems become [`Notice`]s, transport problems are logged.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use url::Url;

use crate::context::Context;
use crate::error::{HookError, Result};
use crate::hooks::encoder::{encode_form, flatten_body};
use crate::hooks::headers::{normalize_header, resolve_headers};
use crate::hooks::notice::{Notice, Notifier};
use crate::models::{ContentType, Hook, RequestTemplate};
use crate::template::{resolve, resolve_url};

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum deliveries in flight at once.
    pub max_concurrent: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_concurrent: 32,
        }
    }
}

/// Outcome of a delivery that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent { status: u16 },
    /// Skipped because the hook's cooldown for this event is still running.
    Suppressed,
}

type CooldownKey = (String, String);

/// Delivers resolved hook requests in the background.
#[derive(Clone)]
pub struct WebhookDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
    cooldowns: DashMap<CooldownKey, Instant>,
    tracker: TaskTracker,
    /// Set once shut down; locked across close and wait so idle waits cannot reopen a shut tracker.
    lifecycle: tokio::sync::Mutex<bool>,
    permits: Arc<Semaphore>,
    notifier: Arc<dyn Notifier>,
}

impl WebhookDispatcher {
    pub fn new(config: DispatcherConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let insecure_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                client,
                insecure_client,
                cooldowns: DashMap::new(),
                tracker: TaskTracker::new(),
                lifecycle: tokio::sync::Mutex::new(false),
                permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
                notifier,
            }),
        })
    }

    /// Queue a delivery of `event` for `hook` and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, hook: Arc<Hook>, event: &str, context: Context) {
        let inner = Arc::clone(&self.inner);
        let event = event.to_string();

        self.inner.tracker.spawn(async move {
            inner.deliver_and_report(&hook, &event, context).await;
        });
    }

    /// Deliver in the caller's task, reporting failures like [`Self::dispatch`].
    ///
    /// Used where deliveries of one hook must go out in order.
    pub async fn dispatch_in_order(&self, hook: &Hook, event: &str, context: Context) {
        self.inner.deliver_and_report(hook, event, context).await;
    }

    /// Deliver in the caller's task and return the outcome.
    pub async fn deliver(&self, hook: &Hook, event: &str, context: Context) -> Result<Delivery> {
        self.inner.deliver(hook, event, context).await
    }

    /// Run a coordinating task on the same tracker as deliveries.
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.tracker.spawn(task);
    }

    pub(crate) fn notify(&self, notice: Notice) {
        self.inner.notifier.notify(notice);
    }

    /// Wait until every queued task has finished, then accept new ones.
    ///
    /// After [`Self::shutdown`] this only waits; the tracker stays closed.
    pub async fn wait_idle(&self) {
        let shut_down = self.inner.lifecycle.lock().await;
        let tracker = &self.inner.tracker;
        tracker.close();
        tracker.wait().await;
        if !*shut_down {
            tracker.reopen();
        }
    }

    /// Stop accepting work and drain in-flight deliveries.
    pub async fn shutdown(&self) {
        let mut shut_down = self.inner.lifecycle.lock().await;
        *shut_down = true;
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// Whether the task tracker is closed, as it stays after shutdown.
    pub fn is_closed(&self) -> bool {
        self.inner.tracker.is_closed()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Forget cooldown clocks of hooks that no longer exist.
    pub fn retain(&self, hook_ids: &HashSet<String>) {
        self.inner
            .cooldowns
            .retain(|(hook_id, _), _| hook_ids.contains(hook_id));
    }
}

impl DispatcherInner {
    async fn deliver_and_report(&self, hook: &Hook, event: &str, context: Context) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };
        let outcome = self.deliver(hook, event, context).await;
        self.report(hook, event, outcome);
    }

    async fn deliver(&self, hook: &Hook, event: &str, mut context: Context) -> Result<Delivery> {
        let url = parse_target(&resolve_url(&hook.url, &context)?)?;
        let cooldown = hook.cooldown_duration()?;

        let key = (hook.id.clone(), event.to_string());
        let Some(previous) = self.claim_cooldown(&key, cooldown) else {
            return Ok(Delivery::Suppressed);
        };

        let request = match self.prepare(hook, url, &mut context).await {
            Ok(request) => request,
            Err(error) => {
                // Nothing was sent, so the previous clock still applies.
                self.release_cooldown(&key, previous);
                return Err(error);
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(HookError::Status {
                status: status.as_u16(),
            });
        }

        Ok(Delivery::Sent {
            status: status.as_u16(),
        })
    }

    /// Atomically check the cooldown and claim it.
    ///
    /// Returns `None` when suppressed, otherwise the clock value it replaced.
    fn claim_cooldown(&self, key: &CooldownKey, cooldown: Duration) -> Option<Option<Instant>> {
        let now = Instant::now();
        match self.cooldowns.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < cooldown {
                    return None;
                }
                Some(Some(entry.insert(now)))
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                Some(None)
            }
        }
    }

    fn release_cooldown(&self, key: &CooldownKey, previous: Option<Instant>) {
        match previous {
            Some(at) => {
                self.cooldowns.insert(key.clone(), at);
            }
            None => {
                self.cooldowns.remove(key);
            }
        }
    }

    async fn prepare(&self, hook: &Hook, url: Url, context: &mut Context) -> Result<RequestBuilder> {
        if hook.oauth.enabled {
            let token = self.fetch_oauth(hook, context).await?;
            context.insert("oauth", token);
        }
        self.build_request(hook.request_template(), url, hook.verify_ssl, context)
    }

    /// Perform the hook's token request and return its parsed response.
    async fn fetch_oauth(&self, hook: &Hook, context: &Context) -> Result<Value> {
        let template = hook.oauth.request_template();
        let url = parse_target(&resolve_url(template.url, context)?)?;

        let response = self
            .build_request(template, url, hook.verify_ssl, context)?
            .send()
            .await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(HookError::Status {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        debug!(hook = %hook.label(), "OAuth token request completed");
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    fn build_request(
        &self,
        template: RequestTemplate<'_>,
        url: Url,
        verify_ssl: bool,
        context: &Context,
    ) -> Result<RequestBuilder> {
        let method = parse_method(template.http_method)?;
        let headers = normalize_header(
            resolve_headers(template.headers, context)?,
            "Content-Type",
            template.content_type.mime(),
        );

        let body = resolve(template.body, context)?;
        let payload = match template.content_type {
            ContentType::Json => serde_json::to_vec(&body)
                .map_err(|error| HookError::Encoding(error.to_string()))?,
            ContentType::Form => encode_form(&flatten_body(body)?).into_bytes(),
        };

        let client = if verify_ssl {
            &self.client
        } else {
            &self.insecure_client
        };
        Ok(client
            .request(method, url)
            .headers(header_map(&headers)?)
            .body(payload))
    }

    fn report(&self, hook: &Hook, event: &str, outcome: Result<Delivery>) {
        match outcome {
            Ok(Delivery::Sent { status }) => {
                info!(hook = %hook.label(), event = %event, status, "Webhook delivered");
            }
            Ok(Delivery::Suppressed) => {
                debug!(hook = %hook.label(), event = %event, "Webhook suppressed by cooldown");
            }
            Err(error) if error.is_config() => {
                warn!(hook = %hook.label(), event = %event, error = %error, "Webhook not sent");
                self.notifier.notify(Notice::error(hook, error.to_string()));
            }
            Err(HookError::Status { status }) => {
                warn!(hook = %hook.label(), event = %event, status, "Webhook endpoint rejected delivery");
                self.notifier.notify(Notice::warning(
                    hook,
                    format!("{event} delivery was rejected with HTTP {status}"),
                ));
            }
            Err(error) => {
                warn!(hook = %hook.label(), event = %event, error = %error, "Webhook delivery failed");
            }
        }
    }
}

/// Parse a resolved target URL, accepting only http(s) with a host.
pub fn parse_target(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|error| HookError::Config(format!("invalid URL {raw:?}: {error}")))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(HookError::Config(format!(
            "URL {raw:?} must use http or https and name a host"
        )));
    }
    Ok(url)
}

fn parse_method(raw: &str) -> Result<Method> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| HookError::Config(format!("invalid HTTP method {raw:?}")))
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| HookError::Config(format!("invalid header name {name:?}")))?;
        let header_value = HeaderValue::from_str(value.trim())
            .map_err(|_| HookError::Config(format!("invalid value for header {name:?}")))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
