use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SupervisorError};

/// Configuration of one node program, merged from up to three JSON layers:
/// cluster defaults, per-node override, and the state cached at the last
/// successful start. Later layers win; maps merge recursively, scalars and
/// arrays replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Program that runs the node.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Stable identity of the provisioned instance. Resolved from
    /// `instance_prefix` plus the node name when absent, then pinned in the
    /// cached state so later prefix changes cannot orphan it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub instance_prefix: String,
}

impl NodeConfig {
    /// Merge the configuration layers in `paths` order. Layers whose file
    /// does not exist are skipped; if none exists at all, the error lists
    /// every path that was tried.
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = Value::Object(serde_json::Map::new());
        let mut found = false;

        for path in paths {
            let text = match fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(SupervisorError::Config(format!(
                        "cannot read {}: {e}",
                        path.display()
                    )))
                }
            };
            let layer: Value = serde_json::from_str(&text).map_err(|e| {
                SupervisorError::Config(format!("cannot parse {}: {e}", path.display()))
            })?;
            merge_value(&mut merged, layer);
            found = true;
        }

        if !found {
            let tried: Vec<String> = paths.iter().map(|p| format!("  {}", p.display())).collect();
            return Err(SupervisorError::Config(format!(
                "no configuration file found, tried:\n{}",
                tried.join("\n")
            )));
        }

        let config: NodeConfig = serde_json::from_value(merged)
            .map_err(|e| SupervisorError::Config(format!("invalid configuration: {e}")))?;
        if config.command.is_empty() {
            return Err(SupervisorError::Config(
                "command must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    /// Instance name, resolved by the control layer before use.
    pub fn instance(&self) -> &str {
        self.instance_name.as_deref().unwrap_or_default()
    }

    /// Persist the merged configuration as a state layer.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

fn merge_value(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, layer) => *slot = layer,
    }
}
