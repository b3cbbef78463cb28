//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`MtSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `MULTITENANT_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{CommandFailurePolicy, MtSettings};

/// Environment variable naming an alternate settings file.
pub const SETTINGS_PATH_ENV: &str = "MULTITENANT_SETTINGS";

/// Settings file used when [`SETTINGS_PATH_ENV`] is unset.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/mtcard/settings.json";

/// Resolve the path to the settings file.
pub fn settings_path() -> PathBuf {
    std::env::var(SETTINGS_PATH_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH), PathBuf::from)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MtSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with process env overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<MtSettings> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, resolving overrides through `lookup`.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<MtSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(MtSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: MtSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `MULTITENANT_*` overrides resolved through `lookup`.
///
/// Empty values are treated as unset. Invalid values are ignored with a
/// warning and the file/default value is kept.
pub fn apply_overrides<F>(settings: &mut MtSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(val) = read("MULTITENANT_ENABLE") {
        match parse_bool(&val) {
            Some(v) => settings.enabled = v,
            None => {
                tracing::warn!(key = "MULTITENANT_ENABLE", value = %val, "invalid boolean env var, ignoring");
            }
        }
    }
    if let Some(v) = read("MULTITENANT_DATAROOT") {
        settings.dataroot = Some(v);
    }

    // ── Scheduler settings ──────────────────────────────────────────
    if let Some(v) = read("MULTITENANT_WCKEY") {
        settings.scheduler.workload_key = v;
    }
    if let Some(v) = read("MULTITENANT_SACCT_BIN") {
        settings.scheduler.sacct_bin = v;
    }
    if let Some(v) = read("MULTITENANT_SQUEUE_BIN") {
        settings.scheduler.squeue_bin = v;
    }
    if let Some(val) = read("MULTITENANT_NAME_WIDTH") {
        match parse_u16_range(&val, 16, 4096) {
            Some(v) => settings.scheduler.name_width = v,
            None => {
                tracing::warn!(key = "MULTITENANT_NAME_WIDTH", value = %val, "invalid u16 env var, ignoring");
            }
        }
    }
    if let Some(val) = read("MULTITENANT_ON_COMMAND_FAILURE") {
        match val.parse::<CommandFailurePolicy>() {
            Ok(policy) => settings.scheduler.on_command_failure = policy,
            Err(e) => {
                tracing::warn!(key = "MULTITENANT_ON_COMMAND_FAILURE", error = %e, "ignoring env var");
            }
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("MULTITENANT_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"scheduler": {"sacctBin": "/a", "squeueBin": "/b"}});
        let source = serde_json::json!({"scheduler": {"sacctBin": "/c"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["scheduler"]["sacctBin"], "/c");
        assert_eq!(merged["scheduler"]["squeueBin"], "/b");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"enabled": true});
        let source = serde_json::json!({"enabled": null});
        assert_eq!(deep_merge(target, source)["enabled"], true);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_with ──────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings =
            load_settings_with(Path::new("/nonexistent/settings.json"), env(&[])).unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.scheduler.name_width, 1024);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"enabled": true, "scheduler": {"workloadKey": "shared"}}"#,
        )
        .unwrap();

        let settings = load_settings_with(&path, env(&[])).unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.scheduler.workload_key, "shared");
        assert_eq!(settings.scheduler.sacct_bin, "/usr/bin/sacct");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_with(&path, env(&[]));
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"enabled": true, "dataroot": "/file"}"#).unwrap();

        let settings = load_settings_with(
            &path,
            env(&[("MULTITENANT_ENABLE", "false"), ("MULTITENANT_DATAROOT", "/env")]),
        )
        .unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.dataroot.as_deref(), Some("/env"));
    }

    // ── apply_overrides ─────────────────────────────────────────────

    #[test]
    fn overrides_scheduler_fields() {
        let mut settings = MtSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("MULTITENANT_WCKEY", "mt2"),
                ("MULTITENANT_SACCT_BIN", "/opt/slurm/bin/sacct"),
                ("MULTITENANT_SQUEUE_BIN", "/opt/slurm/bin/squeue"),
                ("MULTITENANT_NAME_WIDTH", "2048"),
                ("MULTITENANT_ON_COMMAND_FAILURE", "empty"),
                ("MULTITENANT_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.scheduler.workload_key, "mt2");
        assert_eq!(settings.scheduler.sacct_bin, "/opt/slurm/bin/sacct");
        assert_eq!(settings.scheduler.squeue_bin, "/opt/slurm/bin/squeue");
        assert_eq!(settings.scheduler.name_width, 2048);
        assert_eq!(
            settings.scheduler.on_command_failure,
            CommandFailurePolicy::Empty
        );
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = MtSettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("MULTITENANT_ENABLE", "maybe"),
                ("MULTITENANT_NAME_WIDTH", "3"),
                ("MULTITENANT_ON_COMMAND_FAILURE", "retry"),
            ]),
        );
        assert!(!settings.enabled);
        assert_eq!(settings.scheduler.name_width, 1024);
        assert_eq!(
            settings.scheduler.on_command_failure,
            CommandFailurePolicy::Fatal
        );
    }

    #[test]
    fn empty_values_count_as_unset() {
        let mut settings = MtSettings::default();
        apply_overrides(&mut settings, env(&[("MULTITENANT_DATAROOT", "")]));
        assert!(settings.dataroot.is_none());
    }

    // ── parse_bool / parse_u16_range ────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE", "On"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "off", "False"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn parse_u16_bounds() {
        assert_eq!(parse_u16_range("1024", 16, 4096), Some(1024));
        assert_eq!(parse_u16_range("8", 16, 4096), None);
        assert_eq!(parse_u16_range("99999", 16, 4096), None);
        assert_eq!(parse_u16_range("wide", 16, 4096), None);
    }
}
