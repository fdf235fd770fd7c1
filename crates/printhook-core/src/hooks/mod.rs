//! Hook routing, progress tracking and delivery.

pub mod dispatcher;
pub mod encoder;
pub mod headers;
pub mod notice;
pub mod pipeline;
pub mod progress;
pub mod providers;
pub mod registry;

pub use dispatcher::{Delivery, DispatcherConfig, WebhookDispatcher};
pub use notice::{LogNotifier, Notice, NoticeLevel, Notifier};
pub use pipeline::EventPipeline;
pub use progress::MilestoneTracker;
pub use providers::{HttpSnapshotProvider, JobInfoProvider, SharedJobInfo, SnapshotProvider};
pub use registry::{HookRegistry, HookSnapshot};
