mod hook;
mod job;

pub use hook::*;
pub use job::*;
