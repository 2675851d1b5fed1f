use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::defaults::default_policy;
use crate::errors::ConfigError;
use crate::model::AgentPolicy;

const ENV_PREFIX: &str = "DROPCLICK_POLICY__";

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

/// Defaults, then `path` (YAML) when it exists, then `DROPCLICK_POLICY__*` variables.
pub fn load_policy(path: Option<&Path>) -> Result<AgentPolicy, ConfigError> {
    let mut options = LoadOptions {
        include_env: true,
        ..LoadOptions::default()
    };
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    load_policy_with_options(&options)
}

pub fn load_policy_with_options(options: &LoadOptions) -> Result<AgentPolicy, ConfigError> {
    let mut merged = serde_json::to_value(default_policy())
        .map_err(|err| ConfigError::Invalid(err.to_string()))?;

    for path in &options.paths {
        if path.exists() {
            let overlay = overlay_from_file(path)?;
            merge(&mut merged, overlay);
        }
    }

    if options.include_env {
        for (path, value) in overlays_from_env() {
            debug!(%path, "policy override from environment");
            set_path(&mut merged, &path, value)?;
        }
    }

    let policy: AgentPolicy =
        serde_json::from_value(merged).map_err(|err| ConfigError::Invalid(err.to_string()))?;
    policy.validate()?;
    Ok(policy)
}

fn overlay_from_file(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(format!("{}", err)))?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| ConfigError::Invalid(format!("{}", err)))?;
    serde_json::to_value(yaml_value).map_err(|err| ConfigError::Invalid(format!("{}", err)))
}

fn overlays_from_env() -> Vec<(String, Value)> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let path = stripped
                .split("__")
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_ascii_lowercase())
                .collect::<Vec<_>>()
                .join(".");
            if path.is_empty() {
                continue;
            }
            overlays.push((path, parse_env_value(&raw)));
        }
    }
    overlays.sort_by(|a, b| a.0.cmp(&b.0));
    overlays
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    Value::String(raw.to_string())
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), ConfigError> {
    let mut cursor = root;
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| ConfigError::Invalid(format!("empty policy path '{}'", path)))?;
    for segment in parents {
        let map = cursor.as_object_mut().ok_or_else(|| ConfigError::InvalidValue {
            path: path.to_string(),
            reason: format!("'{}' is not a section", segment),
        })?;
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let map = cursor.as_object_mut().ok_or_else(|| ConfigError::InvalidValue {
        path: path.to_string(),
        reason: "parent is not a section".into(),
    })?;
    if !map.contains_key(*last) {
        return Err(ConfigError::InvalidValue {
            path: path.to_string(),
            reason: "unknown policy field".into(),
        });
    }
    map.insert(last.to_string(), value);
    Ok(())
}
