mod hook;

pub use hook::HookStorage;
