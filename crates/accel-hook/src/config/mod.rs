use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use toml::Value;

use crate::error::{Error, Result};

/// Env var naming a config file when none is passed explicitly.
pub const CONFIG_ENV: &str = "ACCEL_HOOK_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Checkpoint binary invoked with `dump`.
    pub checkpoint_bin: PathBuf,
    /// Where the object-store CLI is installed.
    pub ossutil_install: PathBuf,
    /// Scratch location the CLI is copied to and run from.
    pub ossutil_scratch: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            checkpoint_bin: PathBuf::from("/code/srctl"),
            ossutil_install: PathBuf::from("/code/ossutil64"),
            ossutil_scratch: PathBuf::from("/tmp/ossutil64"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvConfig {
    pub work_dir_var: String,
    pub dump_cleared_vars: Vec<String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            work_dir_var: "SRPATH".into(),
            dump_cleared_vars: vec!["PYCDSMODE".into(), "PYCDSLIST".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub success_sentinel: String,
    pub bucket_scheme: String,
    /// Hold the dump lock through archive and upload too.
    pub serialize_dumps: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            success_sentinel: "success".into(),
            bucket_scheme: "oss://".into(),
            serialize_dumps: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AccelConfig {
    pub paths: PathsConfig,
    pub env: EnvConfig,
    pub dispatch: DispatchConfig,
}

impl AccelConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let value: Value = toml::from_str(raw)?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .try_into()
            .map_err(|e| Error::Config(format!("invalid accel-hook config: {e}")))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to encode config: {e}")))
    }
}

fn merge_values(base: &mut Value, child: Value) {
    match (base, child) {
        (Value::Table(base_tbl), Value::Table(child_tbl)) => {
            for (k, v) in child_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (base_slot, child_val) => {
            *base_slot = child_val;
        }
    }
}

fn resolve_ref_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        p
    } else {
        from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
    }
}

fn load_value_inner(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::Config(format!(
            "config extends cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read config {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display())))?;

    // A file may name one parent it overrides.
    let mut out = Value::Table(Default::default());
    if let Some(parent) = value.get("extends").and_then(Value::as_str) {
        out = load_value_inner(&resolve_ref_path(path, parent), stack)?;
    }
    if let Some(tbl) = value.as_table_mut() {
        tbl.remove("extends");
    }
    merge_values(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

pub fn load(path: &Path) -> Result<AccelConfig> {
    let mut stack = HashSet::<PathBuf>::new();
    let value = load_value_inner(path, &mut stack)?;
    let cfg = AccelConfig::from_value(value)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(cfg)
}

/// Explicit path, then `ACCEL_HOOK_CONFIG`, then built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<AccelConfig> {
    if let Some(p) = path {
        return load(p);
    }
    match std::env::var(CONFIG_ENV).ok().filter(|s| !s.trim().is_empty()) {
        Some(p) => load(Path::new(p.trim())),
        None => Ok(AccelConfig::default()),
    }
}
