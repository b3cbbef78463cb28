//! # mtcard-settings
//!
//! Layered configuration for the multitenant card initializer.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`MtSettings::default()`]
//! 2. **Admin file**: `/etc/mtcard/settings.json`, or the path named by
//!    `MULTITENANT_SETTINGS` (deep-merged over defaults)
//! 3. **Environment variables**: `MULTITENANT_*` overrides (highest priority)
//!
//! `MULTITENANT_ENABLE` is the activation gate: the pipeline only runs when it
//! (or the file's `enabled` field) is truthy.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_overrides, deep_merge, load_settings, load_settings_from_path,
    load_settings_with, parse_bool, settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = MtSettings::default();
        let _path = settings_path();
        let _policy = CommandFailurePolicy::default();
    }
}
