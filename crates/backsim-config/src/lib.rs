//! Layered run configuration (YAML + `.env`), grounded on `mqk-config`'s
//! `load_layered_yaml`: later files deep-merge over earlier ones, the merged
//! document is canonicalized (keys sorted, compact JSON) and hashed so two
//! runs can be compared for config parity without diffing YAML files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use backsim_models::RiskConfig;

/// Everything a run needs besides the historical data itself: where the
/// database lives, the risk defaults applied to investors that don't carry
/// their own override, and the operator log filter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub database_url: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    pub risk_defaults: RiskConfig,
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// A [`RunConfig`] plus the canonicalized document it was parsed from and
/// that document's hash, for run-to-run config comparison.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub config: RunConfig,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Loads a `.env` file from the current directory, if present. Never fails:
/// a missing `.env` is the normal case outside local development, matching
/// `mqk-cli`'s best-effort `dotenvy::dotenv().ok()` bootstrap.
pub fn bootstrap_env() {
    let _ = dotenvy::dotenv();
}

/// Loads and deep-merges the YAML files at `paths`, in order (later files
/// override earlier ones), then parses the merged document into a
/// [`RunConfig`].
pub fn load_layered_yaml(paths: &[impl AsRef<Path>]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for p in paths {
        let p = p.as_ref();
        let raw = fs::read_to_string(p).with_context(|| format!("read config: {}", p.display()))?;
        let yaml_val: serde_yaml::Value = serde_yaml::from_str(&raw).with_context(|| format!("parse yaml: {}", p.display()))?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    let canonical = canonicalize_json(&merged);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let config_hash = hex::encode(hasher.finalize());

    let config: RunConfig = serde_json::from_str(&canonical).context("config document does not match RunConfig shape")?;

    Ok(LoadedConfig {
        config,
        canonical_json: canonical,
        config_hash,
    })
}

fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}
