//! The parse pipeline: source text -> tokens -> AST -> extraction ->
//! validation, in one of two modes. Full mode treats the input as a
//! standalone keymap; template-aware mode treats it as a user fragment
//! rendered into a known template and drops the boilerplate the template
//! contributes.

use std::collections::BTreeMap;

use crate::dts::{find_nodes_compatible, find_nodes_named, parse_source_safe, Node};
use crate::error::{LayoutError, Result};
use crate::extract::{extract_layout, COMBOS_COMPATIBLE, KEYMAP_COMPATIBLE};
use crate::generate::{full_keymap, template_context, FormatContext};
use crate::layout::validate::validate;
use crate::layout::LayoutDocument;
use crate::providers::{ConfigurationProvider, TemplateProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Full,
    Template,
}

#[derive(Debug)]
pub struct ParseResult {
    pub success: bool,
    pub layout: Option<LayoutDocument>,
    pub errors: Vec<LayoutError>,
    pub warnings: Vec<LayoutError>,
    pub mode: ParseMode,
    /// Source text of the recognized top-level sections, by section name.
    pub extracted_sections: BTreeMap<String, String>,
}

pub struct KeymapProcessor<'a> {
    config: &'a dyn ConfigurationProvider,
}

impl<'a> KeymapProcessor<'a> {
    pub fn new(config: &'a dyn ConfigurationProvider) -> Self {
        KeymapProcessor { config }
    }

    /// Parse a standalone keymap file.
    pub fn parse_full(&self, source: &str, file_name: &str) -> ParseResult {
        self.run(source, file_name, ParseMode::Full)
    }

    /// Parse a user fragment that lives inside a known template: include
    /// boilerplate and redefinitions of stock behaviors are dropped.
    pub fn parse_template_aware(&self, source: &str, file_name: &str) -> ParseResult {
        self.run(source, file_name, ParseMode::Template)
    }

    fn run(&self, source: &str, file_name: &str, mode: ParseMode) -> ParseResult {
        log::debug!("parsing {file_name} in {mode:?} mode");
        let (roots, mut errors) = parse_source_safe(source, file_name);
        let extracted_sections = section_slices(&roots);

        let (layout, warnings) = match extract_layout(&roots) {
            Ok(extraction) => (Some(extraction.layout), extraction.warnings),
            Err(e) => {
                errors.push(e);
                (None, vec![])
            }
        };

        let layout = match (mode, layout) {
            (ParseMode::Template, Some(doc)) => Some(self.strip_template_boilerplate(doc)),
            (_, layout) => layout,
        };

        if let Some(doc) = &layout {
            let mut rules = self.config.validation_rules();
            if rules.allowed_behaviors.is_empty() {
                rules.allowed_behaviors = self
                    .config
                    .behavior_definitions()
                    .iter()
                    .map(|b| b.code.to_string())
                    .collect();
            }
            errors.extend(validate(doc, &rules));
        }

        let success = errors.is_empty();
        if !success {
            log::debug!("{file_name}: {} errors, {} warnings", errors.len(), warnings.len());
        }
        ParseResult {
            success,
            layout,
            errors,
            warnings,
            mode,
            extracted_sections,
        }
    }

    /// Template-provided includes define the stock behaviors; definitions
    /// that merely restate them are not the user's.
    fn strip_template_boilerplate(&self, mut doc: LayoutDocument) -> LayoutDocument {
        let stock: Vec<String> = self
            .config
            .behavior_definitions()
            .iter()
            .map(|b| b.code.to_string())
            .collect();
        let is_stock = |name: &str| stock.iter().any(|s| s == name);
        doc.hold_taps.retain(|b| !is_stock(&b.name));
        doc.macros.retain(|b| !is_stock(&b.name));
        doc.tap_dances.retain(|b| !is_stock(&b.name));
        doc.sticky_keys.retain(|b| !is_stock(&b.name));
        doc.caps_words.retain(|b| !is_stock(&b.name));
        doc.mod_morphs.retain(|b| !is_stock(&b.name));
        doc
    }

    /// Generate the standalone keymap text for a document.
    pub fn compose(&self, doc: &LayoutDocument) -> Result<String> {
        let ctx = FormatContext::from_provider(self.config);
        full_keymap(doc, &ctx)
    }

    /// Generate the kconfig fragment and its settings map.
    pub fn kconfig(&self, doc: &LayoutDocument) -> Result<(String, BTreeMap<String, String>)> {
        crate::generate::kconfig_fragment(doc, &self.config.kconfig_options())
    }

    /// Render a document through an external template.
    pub fn compose_with_template(
        &self,
        doc: &LayoutDocument,
        templates: &dyn TemplateProvider,
        template: &str,
    ) -> Result<String> {
        let ctx = FormatContext::from_provider(self.config);
        let mut context = template_context(doc, &ctx)?;
        for (k, v) in self.config.template_context() {
            context.entry(k).or_insert(v);
        }
        if !templates.has_template_syntax(template) {
            // Static text needs no rendering.
            return Ok(template.to_string());
        }
        templates.render(template, &context)
    }
}

/// Slice the source text of recognized sections out of the AST spans.
fn section_slices(roots: &[Node]) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();
    let mut put = |key: &str, node: Option<&&Node>| {
        if let Some(node) = node {
            let span = &node.span;
            let text = span.file_content()[span.clone()].to_string();
            sections.insert(key.to_string(), text);
        }
    };
    put("keymap", find_nodes_compatible(roots, KEYMAP_COMPATIBLE).first());
    put("combos", find_nodes_compatible(roots, COMBOS_COMPATIBLE).first());
    put("macros", find_nodes_named(roots, "macros").first());
    put("behaviors", find_nodes_named(roots, "behaviors").first());
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::providers::DefaultConfiguration;

    const KEYMAP: &str = r#"
#define BASE 0
/ {
    keymap {
        compatible = "zmk,keymap";
        base {
            bindings = <&kp A &kp B &mo BASE>;
        };
    };
};
"#;

    #[test]
    fn full_mode_parses_a_standalone_keymap() {
        let config = DefaultConfiguration::default();
        let result = KeymapProcessor::new(&config).parse_full(KEYMAP, "test.keymap");
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.mode, ParseMode::Full);
        let doc = result.layout.unwrap();
        assert_eq!(doc.layer_names, vec!["base"]);
        assert_eq!(doc.layers[0].len(), 3);
        assert_eq!(doc.layers[0][2].to_string(), "&mo 0");
        assert!(result.extracted_sections.contains_key("keymap"));
    }

    #[test]
    fn parse_errors_fail_the_result_but_keep_the_partial_layout() {
        let config = DefaultConfiguration::default();
        let broken = "/ { keymap { compatible = \"zmk,keymap\"; base { bindings = ; x { }; }; }; };";
        let result = KeymapProcessor::new(&config).parse_full(broken, "test.keymap");
        assert!(!result.success);
        assert!(!result.errors.is_empty());
        assert!(result.layout.is_some());
    }

    #[test]
    fn validation_errors_are_reported() {
        let config = DefaultConfiguration::default();
        let bad = r#"/ { keymap { compatible = "zmk,keymap"; base { bindings = <&undefined_thing>; }; }; };"#;
        let result = KeymapProcessor::new(&config).parse_full(bad, "test.keymap");
        assert!(!result.success);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::Validate));
    }

    #[test]
    fn template_mode_drops_stock_behavior_redefinitions() {
        let config = DefaultConfiguration::default();
        let src = r#"
/ {
    behaviors {
        kp: kp { compatible = "zmk,behavior-hold-tap"; bindings = <&kp>, <&kp>; };
        my_ht: my_ht { compatible = "zmk,behavior-hold-tap"; bindings = <&kp>, <&kp>; };
    };
    keymap {
        compatible = "zmk,keymap";
        base { bindings = <&my_ht LCTRL ESC>; };
    };
};
"#;
        let processor = KeymapProcessor::new(&config);
        let full = processor.parse_full(src, "test.keymap").layout.unwrap();
        assert_eq!(full.hold_taps.len(), 2);
        let tpl = processor.parse_template_aware(src, "test.keymap").layout.unwrap();
        assert_eq!(tpl.hold_taps.len(), 1);
        assert_eq!(tpl.hold_taps[0].name, "my_ht");
    }

    #[test]
    fn compose_then_parse_is_stable() {
        let config = DefaultConfiguration::default();
        let processor = KeymapProcessor::new(&config);
        let doc = processor.parse_full(KEYMAP, "test.keymap").layout.unwrap();
        let text = processor.compose(&doc).unwrap();
        let again = processor.parse_full(&text, "generated.keymap");
        assert!(again.success, "{:?}", again.errors);
        let doc2 = again.layout.unwrap();
        assert_eq!(doc2.layer_names, doc.layer_names);
        assert_eq!(doc2.layers, doc.layers);
    }

    #[test]
    fn kconfig_goes_through_the_profile_options() {
        use crate::layout::ConfigParameter;
        let config = DefaultConfiguration::default();
        let processor = KeymapProcessor::new(&config);
        let mut doc = LayoutDocument::new("kb", "t");
        doc.config_parameters = vec![ConfigParameter {
            param_name: "CONFIG_ZMK_SLEEP".into(),
            value: serde_json::Value::Bool(true),
            description: None,
        }];
        let (text, settings) = processor.kconfig(&doc).unwrap();
        assert_eq!(text, "CONFIG_ZMK_SLEEP=y\n");
        assert_eq!(settings.len(), 1);
    }

    #[test]
    fn warnings_do_not_fail_the_result() {
        let config = DefaultConfiguration::default();
        // combo without key-positions extracts as a warning
        let src = r#"
/ {
    combos {
        compatible = "zmk,combos";
        broken { bindings = <&kp ESC>; };
    };
    keymap { compatible = "zmk,keymap"; base { bindings = <&kp A>; }; };
};
"#;
        let result = KeymapProcessor::new(&config).parse_full(src, "test.keymap");
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.warnings.len(), 1);
        let doc = result.layout.unwrap();
        assert!(doc.combos.is_empty());
        assert_eq!(doc.layer_names, vec!["base"]);
    }
}
