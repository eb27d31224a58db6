//! The in-memory keymap model and its dictionary (JSON) surface.
//!
//! Documents are logically immutable: every mutation entry point returns a
//! new document value. The dictionary form serializes with camelCase keys
//! and accepts snake_case on input; null and empty collection keys are
//! dropped on output.

pub mod behaviors;
pub mod fluent;
pub mod validate;

use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::error::{ErrorKind, LayoutError, Result};

pub use behaviors::{
    Behavior, CapsWord, Combo, HoldTap, InputListener, ListenerNode, Macro, ModMorph, StickyKey,
    TapDance,
};
pub use fluent::{Behaviors, LayerProxy, Layers};

/// One kconfig setting carried in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigParameter {
    #[serde(alias = "param_name")]
    pub param_name: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDocument {
    #[serde(default)]
    pub keyboard: String,
    #[serde(default)]
    pub title: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "firmware_api_version"
    )]
    pub firmware_api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "parent_uuid")]
    pub parent_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub variables: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "base_version")]
    pub base_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "base_layout")]
    pub base_layout: Option<String>,
    #[serde(default, alias = "layer_names", skip_serializing_if = "Vec::is_empty")]
    pub layer_names: Vec<String>,
    #[serde(
        default,
        alias = "config_parameters",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub config_parameters: Vec<ConfigParameter>,
    /// `layers[i][k]` is the binding at physical key position `k` of layer
    /// `i`; `layer_names[i]` names it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<Vec<Binding>>,
    #[serde(default, alias = "hold_taps", skip_serializing_if = "Vec::is_empty")]
    pub hold_taps: Vec<HoldTap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combos: Vec<Combo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub macros: Vec<Macro>,
    #[serde(default, alias = "tap_dances", skip_serializing_if = "Vec::is_empty")]
    pub tap_dances: Vec<TapDance>,
    #[serde(default, alias = "sticky_keys", skip_serializing_if = "Vec::is_empty")]
    pub sticky_keys: Vec<StickyKey>,
    #[serde(default, alias = "caps_words", skip_serializing_if = "Vec::is_empty")]
    pub caps_words: Vec<CapsWord>,
    #[serde(default, alias = "mod_morphs", skip_serializing_if = "Vec::is_empty")]
    pub mod_morphs: Vec<ModMorph>,
    #[serde(
        default,
        alias = "input_listeners",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub input_listeners: Vec<InputListener>,
}

impl LayoutDocument {
    pub fn new(keyboard: impl Into<String>, title: impl Into<String>) -> Self {
        LayoutDocument {
            keyboard: keyboard.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// The fluent layer surface. Operations return new documents.
    pub fn layers(&self) -> Layers<'_> {
        Layers::new(self)
    }

    /// The fluent behavior surface. Operations return new documents.
    pub fn behaviors(&self) -> Behaviors<'_> {
        Behaviors::new(self)
    }

    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layer_names.iter().position(|n| n == name)
    }

    /// Look up a user-defined behavior by name (without the `&`).
    pub fn behavior(&self, name: &str) -> Option<Behavior> {
        if let Some(b) = self.hold_taps.iter().find(|b| b.name == name) {
            return Some(Behavior::HoldTap(b.clone()));
        }
        if let Some(b) = self.macros.iter().find(|b| b.name == name) {
            return Some(Behavior::Macro(b.clone()));
        }
        if let Some(b) = self.tap_dances.iter().find(|b| b.name == name) {
            return Some(Behavior::TapDance(b.clone()));
        }
        if let Some(b) = self.sticky_keys.iter().find(|b| b.name == name) {
            return Some(Behavior::StickyKey(b.clone()));
        }
        if let Some(b) = self.caps_words.iter().find(|b| b.name == name) {
            return Some(Behavior::CapsWord(b.clone()));
        }
        if let Some(b) = self.mod_morphs.iter().find(|b| b.name == name) {
            return Some(Behavior::ModMorph(b.clone()));
        }
        None
    }

    pub fn has_behavior(&self, name: &str) -> bool {
        self.behavior(name).is_some()
    }

    /// Deserialize from the dictionary form; both camelCase and snake_case
    /// keys are accepted.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| LayoutError::new(ErrorKind::Validate, format!("bad layout document: {e}")))
    }

    /// Serialize to the canonical dictionary form: camelCase keys, null and
    /// empty keys dropped.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| LayoutError::new(ErrorKind::Validate, format!("unserializable: {e}")))
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| LayoutError::new(ErrorKind::Validate, format!("bad layout document: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LayoutError::new(ErrorKind::Validate, format!("unserializable: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dictionary_output_uses_camel_case_and_drops_nulls() {
        let mut doc = LayoutDocument::new("corne", "My Layout");
        doc.layer_names = vec!["base".into()];
        doc.layers = vec![vec![Binding::parse("&kp A").unwrap()]];
        doc.hold_taps = vec![HoldTap::new("hm")];
        let v = doc.to_value().unwrap();
        let obj = v.as_object().unwrap();
        assert!(obj.contains_key("layerNames"));
        assert!(obj.contains_key("holdTaps"));
        assert!(!obj.contains_key("uuid"));
        assert!(!obj.contains_key("combos"));
    }

    #[test]
    fn dictionary_input_accepts_both_casings() {
        let camel = json!({
            "keyboard": "corne",
            "title": "t",
            "layerNames": ["base"],
            "layers": [[{"value": "&kp", "params": [{"value": "A"}]}]],
            "holdTaps": [{"name": "hm"}],
        });
        let snake = json!({
            "keyboard": "corne",
            "title": "t",
            "layer_names": ["base"],
            "layers": [[{"value": "&kp", "params": [{"value": "A"}]}]],
            "hold_taps": [{"name": "hm"}],
        });
        let a = LayoutDocument::from_value(camel).unwrap();
        let b = LayoutDocument::from_value(snake).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.layers[0][0].to_string(), "&kp A");
    }

    #[test]
    fn dictionary_round_trip_is_structural_identity() {
        let mut doc = LayoutDocument::new("planck", "rt");
        doc.layer_names = vec!["base".into(), "nav".into()];
        doc.layers = vec![
            vec![Binding::parse("&kp LC(LA(DEL))").unwrap()],
            vec![Binding::trans()],
        ];
        doc.combos = vec![Combo::new(
            "combo_esc",
            vec![0, 1],
            Binding::parse("&kp ESC").unwrap(),
        )];
        let back = LayoutDocument::from_value(doc.to_value().unwrap()).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn behavior_lookup_spans_every_kind() {
        let mut doc = LayoutDocument::new("kb", "t");
        doc.hold_taps = vec![HoldTap::new("hm")];
        doc.macros = vec![Macro::new("hello")];
        assert!(doc.has_behavior("hm"));
        assert!(doc.has_behavior("hello"));
        assert!(!doc.has_behavior("nope"));
    }
}
