//! Configuration loading.
//!
//! `config.json` is a loosely-typed map keyed by module instance name (`"demux"`,
//! `"stc"`, `"videoDecoder"`, ...) plus the two top-level keys `mainModel` and
//! `runTime`. Because each module's section has its own shape, this is modeled
//! as a `serde_json::Value` map with typed accessor helpers rather than one
//! rigid struct, mirroring the original's `rapidjson::Document` + per-module
//! `loadConfig()` validation.
//!
//! Loaded exactly once, in `main`, and handed to every module constructor as a
//! cloned `Rc<Config>` — explicit injection, never a process-wide singleton.

use crate::error::{Result, SimError};
use serde_json::Value;
use std::path::Path;

/// Parsed `<dir>/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: Value,
}

impl Config {
    /// Loads `<dir>/config.json`. Fatal (`ConfigMissing`) if the file is absent.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("config.json");
        let text = std::fs::read_to_string(&path).map_err(|_| SimError::ConfigMissing {
            module: "/simulator/main".to_string(),
        })?;
        let root: Value = serde_json::from_str(&text)?;
        Ok(Config { root })
    }

    /// The recognised top-level `mainModel` field.
    pub fn main_model(&self) -> Result<&str> {
        self.root
            .get("mainModel")
            .and_then(Value::as_str)
            .ok_or_else(|| SimError::ConfigMalformed {
                module: "/simulator/main".to_string(),
                detail: "\"mainModel\" is missing or no String".to_string(),
            })
    }

    /// The top-level `runTime` field, in seconds.
    pub fn run_time_secs(&self) -> Result<i64> {
        self.root
            .get("runTime")
            .and_then(Value::as_i64)
            .ok_or_else(|| SimError::ConfigMalformed {
                module: "/simulator/main".to_string(),
                detail: "\"runTime\" is missing or no Int".to_string(),
            })
    }

    /// The configuration section for a single module instance.
    pub fn module(&self, name: &str) -> Result<&Value> {
        self.root.get(name).ok_or_else(|| SimError::ConfigMalformed {
            module: name.to_string(),
            detail: "no configuration found for this module".to_string(),
        })
    }

    /// Reads a required string field from a module's section.
    pub fn require_str(&self, module: &str, key: &str) -> Result<String> {
        let section = self.module(module)?;
        section
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| malformed(module, key, "String"))
    }

    /// Reads a required i64 field from a module's section.
    pub fn require_i64(&self, module: &str, key: &str) -> Result<i64> {
        let section = self.module(module)?;
        section
            .get(key)
            .and_then(Value::as_i64)
            .ok_or_else(|| malformed(module, key, "Int64"))
    }

    /// Reads a required f64 field from a module's section.
    pub fn require_f64(&self, module: &str, key: &str) -> Result<f64> {
        let section = self.module(module)?;
        section
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| malformed(module, key, "Double"))
    }

    /// Reads an optional bool field, warning and defaulting to `false` if
    /// absent or mistyped (mirrors the original's `SC_REPORT_WARNING` +
    /// "this module will not be logged" fallback for `trace`).
    pub fn bool_or_warn(&self, module: &str, key: &str, default: bool) -> bool {
        match self.module(module).ok().and_then(|s| s.get(key)) {
            Some(Value::Bool(b)) => *b,
            _ => {
                log::warn!(
                    target: "simulator::config",
                    "[{module}] \"{key}\" is missing or no Bool, using default {default}"
                );
                default
            }
        }
    }
}

fn malformed(module: &str, key: &str, ty: &str) -> SimError {
    SimError::ConfigMalformed {
        module: module.to_string(),
        detail: format!("\"{key}\" is missing or no {ty}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            root: serde_json::json!({
                "mainModel": "ModelBasic",
                "runTime": 10,
                "demux": { "videoPid": 512, "audioPid": 650, "pcrPid": 256, "trace": true }
            }),
        }
    }

    #[test]
    fn reads_top_level_fields() {
        let c = sample();
        assert_eq!(c.main_model().unwrap(), "ModelBasic");
        assert_eq!(c.run_time_secs().unwrap(), 10);
    }

    #[test]
    fn reads_module_section_fields() {
        let c = sample();
        assert_eq!(c.require_i64("demux", "videoPid").unwrap(), 512);
        assert!(c.bool_or_warn("demux", "trace", false));
    }

    #[test]
    fn missing_module_is_malformed() {
        let c = sample();
        assert!(c.require_i64("nope", "videoPid").is_err());
    }
}
