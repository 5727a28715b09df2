//! File-backed settings.
//!
//! Only the declarative options live on disk; handlers, runtimes and idling
//! resources are supplied in code through [`SettingsBuilder`](crate::SettingsBuilder).

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::SettingsFile;
