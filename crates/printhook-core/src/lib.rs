pub mod context;
pub mod error;
pub mod hooks;
pub mod models;
pub mod storage;
pub mod template;

pub use context::Context;
pub use error::{HookError, Result};
pub use models::*;
