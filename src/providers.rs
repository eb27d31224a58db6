//! External collaborator contracts. The core never touches the filesystem,
//! a template engine or a logging backend; it talks to these narrow
//! interfaces and to the `log` facade.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::Result;

/// A behavior the firmware ships, usable without a definition in the
/// keymap, e.g. `&kp` or `&mo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemBehavior {
    /// Reference code without the `&`.
    pub code: &'static str,
    pub name: &'static str,
    /// How many parameters the behavior consumes in a bindings array.
    pub params: u8,
}

/// Bounds a keyboard profile puts on a document.
#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    /// Number of physical key positions; 0 disables position checks.
    pub key_count: usize,
    /// Maximum layer count; 0 disables the check.
    pub max_layers: usize,
    /// Behavior codes allowed in bindings, on top of the user-defined
    /// ones. Empty means the built-in table applies.
    pub allowed_behaviors: Vec<String>,
    /// Physical position numbering, for profiles with gaps.
    pub key_positions: Vec<u32>,
}

/// Formatting preferences for generated DTSI text.
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub indent_size: usize,
    /// One entry per keymap grid row; each entry is a whitespace-separated
    /// cell template whose token count is the row's key count, e.g.
    /// `"x x x x x x"`.
    pub rows: Vec<String>,
    /// Extra spaces between binding columns.
    pub key_gap: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        FormattingOptions {
            indent_size: 4,
            rows: vec![],
            key_gap: 1,
        }
    }
}

/// One kconfig option a profile understands.
#[derive(Debug, Clone, PartialEq)]
pub struct KconfigOption {
    /// Full key, e.g. `CONFIG_ZMK_SLEEP`.
    pub name: String,
    pub default: Value,
}

/// Keyboard-profile configuration consumed by extraction, validation and
/// generation.
pub trait ConfigurationProvider {
    fn behavior_definitions(&self) -> Vec<SystemBehavior>;
    fn include_files(&self) -> Vec<String>;
    fn validation_rules(&self) -> ValidationRules;
    fn template_context(&self) -> Map<String, Value>;
    fn kconfig_options(&self) -> BTreeMap<String, KconfigOption>;
    fn formatting_options(&self) -> FormattingOptions;
}

/// External template engine. `render` consumes a context dictionary
/// produced by the generator.
pub trait TemplateProvider {
    fn render(&self, template: &str, context: &Map<String, Value>) -> Result<String>;
    fn has_template_syntax(&self, content: &str) -> bool;
}

/// Behaviors every ZMK build understands without a keymap definition.
pub static BUILTIN_BEHAVIORS: Lazy<Vec<SystemBehavior>> = Lazy::new(|| {
    [
        ("kp", "key press", 1),
        ("mt", "mod-tap", 2),
        ("lt", "layer-tap", 2),
        ("mo", "momentary layer", 1),
        ("to", "to layer", 1),
        ("tog", "toggle layer", 1),
        ("sk", "sticky key", 1),
        ("sl", "sticky layer", 1),
        ("kt", "key toggle", 1),
        ("trans", "transparent", 0),
        ("none", "none", 0),
        ("gresc", "grave escape", 0),
        ("caps_word", "caps word", 0),
        ("key_repeat", "key repeat", 0),
        ("bt", "bluetooth", 1),
        ("out", "output selection", 1),
        ("rgb_ug", "rgb underglow", 1),
        ("bl", "backlight", 1),
        ("ext_power", "external power", 1),
        ("sys_reset", "system reset", 0),
        ("bootloader", "bootloader", 0),
        ("soft_off", "soft off", 0),
        ("studio_unlock", "studio unlock", 0),
        ("msc", "mouse scroll", 1),
        ("mmv", "mouse move", 1),
        ("mkp", "mouse key press", 1),
    ]
    .iter()
    .map(|&(code, name, params)| SystemBehavior { code, name, params })
    .collect()
});

/// Stock includes a standalone keymap needs.
pub static DEFAULT_INCLUDES: &[&str] = &[
    "behaviors.dtsi",
    "dt-bindings/zmk/keys.h",
    "dt-bindings/zmk/bt.h",
];

/// A profile-less configuration: built-in behaviors, stock includes,
/// permissive validation and default formatting. Useful on its own and as
/// the base for tests.
#[derive(Debug, Clone, Default)]
pub struct DefaultConfiguration {
    pub rules: ValidationRules,
    pub formatting: FormattingOptions,
}

impl DefaultConfiguration {
    pub fn with_key_count(key_count: usize) -> Self {
        DefaultConfiguration {
            rules: ValidationRules {
                key_count,
                ..Default::default()
            },
            formatting: FormattingOptions::default(),
        }
    }
}

impl ConfigurationProvider for DefaultConfiguration {
    fn behavior_definitions(&self) -> Vec<SystemBehavior> {
        BUILTIN_BEHAVIORS.clone()
    }

    fn include_files(&self) -> Vec<String> {
        DEFAULT_INCLUDES.iter().map(|s| s.to_string()).collect()
    }

    fn validation_rules(&self) -> ValidationRules {
        self.rules.clone()
    }

    fn template_context(&self) -> Map<String, Value> {
        Map::new()
    }

    fn kconfig_options(&self) -> BTreeMap<String, KconfigOption> {
        BTreeMap::new()
    }

    fn formatting_options(&self) -> FormattingOptions {
        self.formatting.clone()
    }
}

/// True when `code` (without `&`) is in the allowed set for the rules, or
/// in the built-in table when the rules leave the set open.
pub fn is_builtin_behavior(rules: &ValidationRules, code: &str) -> bool {
    if rules.allowed_behaviors.is_empty() {
        BUILTIN_BEHAVIORS.iter().any(|b| b.code == code)
    } else {
        rules.allowed_behaviors.iter().any(|b| b == code)
    }
}
