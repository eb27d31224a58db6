//! Kconfig fragment emission: one `CONFIG_KEY=VALUE` line per setting,
//! booleans as `y`/`n`.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{ErrorKind, Result};
use crate::layout::LayoutDocument;
use crate::providers::KconfigOption;
use crate::bail;

/// Normalize a parameter name to its `CONFIG_` key.
fn config_key(name: &str) -> String {
    if name.starts_with("CONFIG_") {
        name.to_string()
    } else {
        format!("CONFIG_{name}")
    }
}

fn render_value(value: &Value) -> Result<String> {
    match value {
        Value::Bool(true) => Ok("y".to_string()),
        Value::Bool(false) => Ok("n".to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(format!("\"{s}\"")),
        other => bail!(
            ErrorKind::Generate,
            "kconfig values must be booleans, numbers or strings, got {other}"
        ),
    }
}

/// Emit the fragment text and the settings map behind it. `known` options
/// come from the profile; when non-empty, parameters outside it are
/// skipped with a warning log.
pub fn kconfig_fragment(
    doc: &LayoutDocument,
    known: &BTreeMap<String, KconfigOption>,
) -> Result<(String, BTreeMap<String, String>)> {
    let mut settings = BTreeMap::new();
    for param in &doc.config_parameters {
        let key = config_key(&param.param_name);
        if !known.is_empty() && !known.contains_key(&key) {
            log::warn!("skipping unknown kconfig setting {key}");
            continue;
        }
        settings.insert(key, render_value(&param.value)?);
    }
    let mut text = String::new();
    for (key, value) in &settings {
        text.push_str(&format!("{key}={value}\n"));
    }
    Ok((text, settings))
}
