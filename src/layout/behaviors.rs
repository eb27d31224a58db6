//! Typed records for user-defined ZMK behaviors. These are the extraction
//! targets and the generator inputs; their serde form is the camelCase
//! dictionary surface (snake_case is accepted on input via aliases).

use serde::{Deserialize, Serialize};

use crate::binding::Binding;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldTap {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "tapping_term_ms")]
    pub tapping_term_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "quick_tap_ms")]
    pub quick_tap_ms: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "require_prior_idle_ms"
    )]
    pub require_prior_idle_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "hold_trigger_key_positions"
    )]
    pub hold_trigger_key_positions: Option<Vec<u32>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "hold_trigger_on_release"
    )]
    pub hold_trigger_on_release: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "retro_tap")]
    pub retro_tap: Option<bool>,
    /// Exactly two inner behaviors: hold then tap.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

impl HoldTap {
    pub fn new(name: impl Into<String>) -> Self {
        HoldTap {
            name: name.into(),
            description: None,
            tapping_term_ms: Some(200),
            quick_tap_ms: None,
            require_prior_idle_ms: None,
            flavor: None,
            hold_trigger_key_positions: None,
            hold_trigger_on_release: None,
            retro_tap: None,
            bindings: vec![Binding::new("&kp", vec![]), Binding::new("&kp", vec![])],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(alias = "key_positions")]
    pub key_positions: Vec<u32>,
    pub bindings: Binding,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "timeout_ms")]
    pub timeout_ms: Option<u32>,
    /// Indices into `layer_names`; empty means all layers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<usize>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "require_prior_idle_ms"
    )]
    pub require_prior_idle_ms: Option<u32>,
}

impl Combo {
    pub fn new(name: impl Into<String>, key_positions: Vec<u32>, bindings: Binding) -> Self {
        Combo {
            name: name.into(),
            description: None,
            key_positions,
            bindings,
            timeout_ms: Some(50),
            layers: vec![],
            require_prior_idle_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Macro {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "wait_ms")]
    pub wait_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "tap_ms")]
    pub tap_ms: Option<u32>,
    /// 0, 1 or 2; selects the `zmk,behavior-macro[-one-param|-two-param]`
    /// compatible.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "param_count")]
    pub param_count: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

impl Macro {
    pub fn new(name: impl Into<String>) -> Self {
        Macro {
            name: name.into(),
            description: None,
            wait_ms: None,
            tap_ms: None,
            param_count: None,
            bindings: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TapDance {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "tapping_term_ms")]
    pub tapping_term_ms: Option<u32>,
    /// Between two and five bindings, by tap count.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

impl TapDance {
    pub fn new(name: impl Into<String>) -> Self {
        TapDance {
            name: name.into(),
            description: None,
            tapping_term_ms: Some(200),
            bindings: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyKey {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "release_after_ms")]
    pub release_after_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "quick_release")]
    pub quick_release: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        alias = "ignore_modifiers"
    )]
    pub ignore_modifiers: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapsWord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", alias = "continue_list")]
    pub continue_list: Vec<String>,
    /// Modifier expression as written in the source, e.g. `(MOD_LSFT)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mods: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModMorph {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The modifier expression exactly as written, e.g.
    /// `(MOD_LSFT|MOD_RSFT)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mods: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "keep_mods")]
    pub keep_mods: Option<String>,
    /// Exactly two: the base binding and the morphed binding.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerNode {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<usize>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        alias = "input_processors"
    )]
    pub input_processors: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputListener {
    /// The listener reference, e.g. `&zip_xy_listener`.
    pub code: String,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        alias = "input_processors"
    )]
    pub input_processors: Vec<Binding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<ListenerNode>,
}

/// A user-defined behavior of any kind, for name lookups across the
/// document.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    HoldTap(HoldTap),
    Combo(Combo),
    Macro(Macro),
    TapDance(TapDance),
    StickyKey(StickyKey),
    CapsWord(CapsWord),
    ModMorph(ModMorph),
    InputListener(InputListener),
}

impl Behavior {
    pub fn name(&self) -> &str {
        match self {
            Behavior::HoldTap(b) => &b.name,
            Behavior::Combo(b) => &b.name,
            Behavior::Macro(b) => &b.name,
            Behavior::TapDance(b) => &b.name,
            Behavior::StickyKey(b) => &b.name,
            Behavior::CapsWord(b) => &b.name,
            Behavior::ModMorph(b) => &b.name,
            Behavior::InputListener(b) => &b.code,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Behavior::HoldTap(_) => "hold-tap",
            Behavior::Combo(_) => "combo",
            Behavior::Macro(_) => "macro",
            Behavior::TapDance(_) => "tap-dance",
            Behavior::StickyKey(_) => "sticky-key",
            Behavior::CapsWord(_) => "caps-word",
            Behavior::ModMorph(_) => "mod-morph",
            Behavior::InputListener(_) => "input-listener",
        }
    }
}
