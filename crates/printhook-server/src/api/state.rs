use crate::notices::RecentNotices;
use printhook_core::hooks::{EventPipeline, SharedJobInfo};
use printhook_core::storage::HookStorage;
use std::sync::Arc;

/// Everything the API handlers share.
pub struct AppContext {
    pub pipeline: EventPipeline,
    pub storage: HookStorage,
    pub job_info: Arc<SharedJobInfo>,
    pub notices: Arc<RecentNotices>,
    /// Serializes hook saves so the file and the registry agree.
    pub save_lock: tokio::sync::Mutex<()>,
}

pub type AppState = Arc<AppContext>;
