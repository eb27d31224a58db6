//! DTSI text generation from a [`LayoutDocument`]: layer defines, the
//! behaviors / combos / macros nodes, the keymap node with its formatted
//! binding grid, and the kconfig fragment. Output is deterministic for a
//! given document and format context.

pub mod kconfig;

use itertools::Itertools;
use serde_json::{Map, Value};

use crate::error::{ErrorKind, Result};
use crate::layout::validate::is_c_identifier;
use crate::layout::{HoldTap, LayoutDocument, Macro};
use crate::providers::ConfigurationProvider;
use crate::{bail, binding::Binding};

pub use kconfig::kconfig_fragment;

/// Keys per row when the profile supplies no row layout.
const FALLBACK_ROW_WIDTH: usize = 10;

/// Formatting inputs, usually derived from a profile's
/// `FormattingOptions`.
#[derive(Debug, Clone)]
pub struct FormatContext {
    pub indent_size: usize,
    /// Key count of each keymap grid row, top to bottom.
    pub keys_per_row: Vec<usize>,
    /// Extra spaces between binding columns.
    pub key_gap: usize,
    /// `#include` lines for a standalone keymap file.
    pub includes: Vec<String>,
}

impl Default for FormatContext {
    fn default() -> Self {
        FormatContext {
            indent_size: 4,
            keys_per_row: vec![],
            key_gap: 1,
            includes: crate::providers::DEFAULT_INCLUDES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl FormatContext {
    pub fn from_provider(config: &dyn ConfigurationProvider) -> Self {
        let fo = config.formatting_options();
        FormatContext {
            indent_size: fo.indent_size.max(1),
            keys_per_row: fo
                .rows
                .iter()
                .map(|r| r.split_whitespace().count())
                .filter(|&c| c > 0)
                .collect(),
            key_gap: fo.key_gap.max(1),
            includes: config.include_files(),
        }
    }

    fn indent(&self, level: usize) -> String {
        " ".repeat(self.indent_size * level)
    }
}

/// `my_layer` -> `MY_LAYER`, for layer `#define`s and behavior labels.
pub fn upper_snake(name: &str) -> String {
    name.to_ascii_uppercase()
}

fn check_identifier(name: &str) -> Result<()> {
    if !is_c_identifier(name) {
        bail!(
            ErrorKind::InvalidIdentifier,
            "{name:?} is not a valid C identifier"
        );
    }
    Ok(())
}

/// One `#define <UPPER_SNAKE(name)> <index>` per layer, in order.
pub fn layer_defines(doc: &LayoutDocument) -> Result<String> {
    let mut out = String::new();
    for (idx, name) in doc.layer_names.iter().enumerate() {
        check_identifier(name)?;
        out.push_str(&format!("#define {} {}\n", upper_snake(name), idx));
    }
    Ok(out)
}

fn prop_line(out: &mut String, ctx: &FormatContext, level: usize, text: &str) {
    out.push_str(&ctx.indent(level));
    out.push_str(text);
    out.push('\n');
}

fn binding_group(b: &Binding) -> String {
    format!("<{b}>")
}

fn binding_groups(bindings: &[Binding]) -> String {
    bindings.iter().map(binding_group).join(", ")
}

fn u32_prop(out: &mut String, ctx: &FormatContext, level: usize, name: &str, v: Option<u32>) {
    if let Some(v) = v {
        prop_line(out, ctx, level, &format!("{name} = <{v}>;"));
    }
}

fn flag_prop(out: &mut String, ctx: &FormatContext, level: usize, name: &str, v: Option<bool>) {
    if v == Some(true) {
        prop_line(out, ctx, level, &format!("{name};"));
    }
}

fn open_behavior(
    out: &mut String,
    ctx: &FormatContext,
    level: usize,
    name: &str,
    compatible: &str,
    binding_cells: u8,
) -> Result<()> {
    check_identifier(name)?;
    prop_line(out, ctx, level, &format!("{name}: {name} {{"));
    prop_line(out, ctx, level + 1, &format!("compatible = \"{compatible}\";"));
    prop_line(
        out,
        ctx,
        level + 1,
        &format!("label = \"{}\";", upper_snake(name)),
    );
    prop_line(
        out,
        ctx,
        level + 1,
        &format!("#binding-cells = <{binding_cells}>;"),
    );
    Ok(())
}

fn hold_tap_node(out: &mut String, ctx: &FormatContext, level: usize, ht: &HoldTap) -> Result<()> {
    open_behavior(out, ctx, level, &ht.name, super::extract::HOLD_TAP_COMPATIBLE, 2)?;
    let bindings = if ht.bindings.is_empty() {
        binding_groups(&[Binding::new("&kp", vec![]), Binding::new("&kp", vec![])])
    } else {
        binding_groups(&ht.bindings)
    };
    prop_line(out, ctx, level + 1, &format!("bindings = {bindings};"));
    u32_prop(out, ctx, level + 1, "tapping-term-ms", ht.tapping_term_ms);
    u32_prop(out, ctx, level + 1, "quick-tap-ms", ht.quick_tap_ms);
    u32_prop(
        out,
        ctx,
        level + 1,
        "require-prior-idle-ms",
        ht.require_prior_idle_ms,
    );
    if let Some(flavor) = &ht.flavor {
        prop_line(out, ctx, level + 1, &format!("flavor = \"{flavor}\";"));
    }
    if let Some(positions) = &ht.hold_trigger_key_positions {
        prop_line(
            out,
            ctx,
            level + 1,
            &format!(
                "hold-trigger-key-positions = <{}>;",
                positions.iter().join(" ")
            ),
        );
    }
    flag_prop(
        out,
        ctx,
        level + 1,
        "hold-trigger-on-release",
        ht.hold_trigger_on_release,
    );
    flag_prop(out, ctx, level + 1, "retro-tap", ht.retro_tap);
    prop_line(out, ctx, level, "};");
    Ok(())
}

/// The `behaviors { ... };` node with every bindable user behavior.
pub fn behaviors_dtsi(doc: &LayoutDocument, ctx: &FormatContext) -> Result<String> {
    let mut out = String::new();
    prop_line(&mut out, ctx, 0, "behaviors {");
    for ht in &doc.hold_taps {
        hold_tap_node(&mut out, ctx, 1, ht)?;
    }
    for td in &doc.tap_dances {
        open_behavior(&mut out, ctx, 1, &td.name, super::extract::TAP_DANCE_COMPATIBLE, 0)?;
        u32_prop(&mut out, ctx, 2, "tapping-term-ms", td.tapping_term_ms);
        prop_line(
            &mut out,
            ctx,
            2,
            &format!("bindings = {};", binding_groups(&td.bindings)),
        );
        prop_line(&mut out, ctx, 1, "};");
    }
    for sk in &doc.sticky_keys {
        open_behavior(&mut out, ctx, 1, &sk.name, super::extract::STICKY_KEY_COMPATIBLE, 1)?;
        prop_line(
            &mut out,
            ctx,
            2,
            &format!("bindings = {};", binding_groups(&sk.bindings)),
        );
        u32_prop(&mut out, ctx, 2, "release-after-ms", sk.release_after_ms);
        flag_prop(&mut out, ctx, 2, "quick-release", sk.quick_release);
        flag_prop(&mut out, ctx, 2, "lazy", sk.lazy);
        flag_prop(&mut out, ctx, 2, "ignore-modifiers", sk.ignore_modifiers);
        prop_line(&mut out, ctx, 1, "};");
    }
    for cw in &doc.caps_words {
        open_behavior(&mut out, ctx, 1, &cw.name, super::extract::CAPS_WORD_COMPATIBLE, 0)?;
        if !cw.continue_list.is_empty() {
            prop_line(
                &mut out,
                ctx,
                2,
                &format!("continue-list = <{}>;", cw.continue_list.iter().join(" ")),
            );
        }
        if let Some(mods) = &cw.mods {
            prop_line(&mut out, ctx, 2, &format!("mods = <{mods}>;"));
        }
        prop_line(&mut out, ctx, 1, "};");
    }
    for mm in &doc.mod_morphs {
        open_behavior(&mut out, ctx, 1, &mm.name, super::extract::MOD_MORPH_COMPATIBLE, 0)?;
        prop_line(
            &mut out,
            ctx,
            2,
            &format!("bindings = {};", binding_groups(&mm.bindings)),
        );
        if let Some(mods) = &mm.mods {
            prop_line(&mut out, ctx, 2, &format!("mods = <{mods}>;"));
        }
        if let Some(keep) = &mm.keep_mods {
            prop_line(&mut out, ctx, 2, &format!("keep-mods = <{keep}>;"));
        }
        prop_line(&mut out, ctx, 1, "};");
    }
    prop_line(&mut out, ctx, 0, "};");
    Ok(out)
}

/// The `combos { ... };` node.
pub fn combos_dtsi(doc: &LayoutDocument, ctx: &FormatContext) -> Result<String> {
    let mut out = String::new();
    prop_line(&mut out, ctx, 0, "combos {");
    prop_line(
        &mut out,
        ctx,
        1,
        &format!("compatible = \"{}\";", super::extract::COMBOS_COMPATIBLE),
    );
    for combo in &doc.combos {
        check_identifier(&combo.name)?;
        prop_line(&mut out, ctx, 1, &format!("{} {{", combo.name));
        u32_prop(&mut out, ctx, 2, "timeout-ms", combo.timeout_ms);
        prop_line(
            &mut out,
            ctx,
            2,
            &format!(
                "key-positions = <{}>;",
                combo.key_positions.iter().join(" ")
            ),
        );
        prop_line(
            &mut out,
            ctx,
            2,
            &format!("bindings = {};", binding_group(&combo.bindings)),
        );
        if !combo.layers.is_empty() {
            prop_line(
                &mut out,
                ctx,
                2,
                &format!("layers = <{}>;", combo.layers.iter().join(" ")),
            );
        }
        u32_prop(
            &mut out,
            ctx,
            2,
            "require-prior-idle-ms",
            combo.require_prior_idle_ms,
        );
        prop_line(&mut out, ctx, 1, "};");
    }
    prop_line(&mut out, ctx, 0, "};");
    Ok(out)
}

fn macro_compatible(m: &Macro) -> &'static str {
    match m.param_count {
        Some(1) => "zmk,behavior-macro-one-param",
        Some(2) => "zmk,behavior-macro-two-param",
        _ => "zmk,behavior-macro",
    }
}

/// The `macros { ... };` node.
pub fn macros_dtsi(doc: &LayoutDocument, ctx: &FormatContext) -> Result<String> {
    let mut out = String::new();
    prop_line(&mut out, ctx, 0, "macros {");
    for m in &doc.macros {
        open_behavior(
            &mut out,
            ctx,
            1,
            &m.name,
            macro_compatible(m),
            m.param_count.unwrap_or(0),
        )?;
        u32_prop(&mut out, ctx, 2, "tap-ms", m.tap_ms);
        u32_prop(&mut out, ctx, 2, "wait-ms", m.wait_ms);
        prop_line(
            &mut out,
            ctx,
            2,
            &format!("bindings = {};", binding_groups(&m.bindings)),
        );
        prop_line(&mut out, ctx, 1, "};");
    }
    prop_line(&mut out, ctx, 0, "};");
    Ok(out)
}

/// Format one layer's bindings as a grid: one row per line, columns padded
/// to the row's widest binding plus the key gap.
fn binding_grid(bindings: &[Binding], ctx: &FormatContext) -> String {
    let cells: Vec<String> = bindings.iter().map(|b| b.to_string()).collect();
    let mut rows: Vec<&[String]> = vec![];
    let mut rest = cells.as_slice();
    let mut widths = ctx.keys_per_row.iter().copied();
    while !rest.is_empty() {
        let width = widths.next().unwrap_or(FALLBACK_ROW_WIDTH).min(rest.len());
        let (row, tail) = rest.split_at(width.max(1));
        rows.push(row);
        rest = tail;
    }
    let pad = ctx.indent(3);
    let mut out = String::new();
    for row in rows {
        let col = row.iter().map(String::len).max().unwrap_or(0) + ctx.key_gap;
        out.push_str(&pad);
        for cell in row {
            out.push_str(&format!("{cell:<col$}"));
        }
        while out.ends_with(' ') {
            out.pop();
        }
        out.push('\n');
    }
    out
}

/// The `keymap { ... };` node with one child per layer.
pub fn keymap_node(doc: &LayoutDocument, ctx: &FormatContext) -> Result<String> {
    let mut out = String::new();
    prop_line(&mut out, ctx, 0, "keymap {");
    prop_line(
        &mut out,
        ctx,
        1,
        &format!("compatible = \"{}\";", super::extract::KEYMAP_COMPATIBLE),
    );
    for (name, bindings) in doc.layer_names.iter().zip(&doc.layers) {
        check_identifier(name)?;
        prop_line(&mut out, ctx, 1, &format!("{name} {{"));
        prop_line(&mut out, ctx, 2, "bindings = <");
        out.push_str(&binding_grid(bindings, ctx));
        prop_line(&mut out, ctx, 2, ">;");
        prop_line(&mut out, ctx, 1, "};");
    }
    prop_line(&mut out, ctx, 0, "};");
    Ok(out)
}

/// `&listener { ... };` override nodes for input listeners.
pub fn input_listeners_dtsi(doc: &LayoutDocument, ctx: &FormatContext) -> Result<String> {
    let mut out = String::new();
    for listener in &doc.input_listeners {
        prop_line(&mut out, ctx, 0, &format!("{} {{", listener.code));
        if !listener.input_processors.is_empty() {
            prop_line(
                &mut out,
                ctx,
                1,
                &format!(
                    "input-processors = {};",
                    binding_groups(&listener.input_processors)
                ),
            );
        }
        for node in &listener.nodes {
            check_identifier(&node.code)?;
            prop_line(&mut out, ctx, 1, &format!("{} {{", node.code));
            if !node.layers.is_empty() {
                prop_line(
                    &mut out,
                    ctx,
                    2,
                    &format!("layers = <{}>;", node.layers.iter().join(" ")),
                );
            }
            if !node.input_processors.is_empty() {
                prop_line(
                    &mut out,
                    ctx,
                    2,
                    &format!(
                        "input-processors = {};",
                        binding_groups(&node.input_processors)
                    ),
                );
            }
            prop_line(&mut out, ctx, 1, "};");
        }
        prop_line(&mut out, ctx, 0, "};");
    }
    Ok(out)
}

fn indent_block(block: &str, pad: &str) -> String {
    block
        .lines()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("{pad}{l}")
            }
        })
        .join("\n")
        + "\n"
}

/// A complete standalone keymap file: includes, layer defines and the root
/// node. Parsing this back yields the same layers and behaviors.
pub fn full_keymap(doc: &LayoutDocument, ctx: &FormatContext) -> Result<String> {
    let mut out = String::new();
    for include in &ctx.includes {
        out.push_str(&format!("#include <{include}>\n"));
    }
    if !ctx.includes.is_empty() {
        out.push('\n');
    }
    let defines = layer_defines(doc)?;
    if !defines.is_empty() {
        out.push_str(&defines);
        out.push('\n');
    }
    out.push_str("/ {\n");
    let pad = ctx.indent(1);
    let has_behaviors = !(doc.hold_taps.is_empty()
        && doc.tap_dances.is_empty()
        && doc.sticky_keys.is_empty()
        && doc.caps_words.is_empty()
        && doc.mod_morphs.is_empty());
    if has_behaviors {
        out.push_str(&indent_block(&behaviors_dtsi(doc, ctx)?, &pad));
    }
    if !doc.combos.is_empty() {
        out.push_str(&indent_block(&combos_dtsi(doc, ctx)?, &pad));
    }
    if !doc.macros.is_empty() {
        out.push_str(&indent_block(&macros_dtsi(doc, ctx)?, &pad));
    }
    out.push_str(&indent_block(&keymap_node(doc, ctx)?, &pad));
    out.push_str("};\n");
    let listeners = input_listeners_dtsi(doc, ctx)?;
    if !listeners.is_empty() {
        out.push('\n');
        out.push_str(&listeners);
    }
    Ok(out)
}

/// The context dictionary handed to an external `TemplateProvider`.
pub fn template_context(doc: &LayoutDocument, ctx: &FormatContext) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    map.insert("keyboard".into(), Value::String(doc.keyboard.clone()));
    map.insert("title".into(), Value::String(doc.title.clone()));
    map.insert(
        "layer_names".into(),
        Value::Array(
            doc.layer_names
                .iter()
                .map(|n| Value::String(n.clone()))
                .collect(),
        ),
    );
    map.insert("layer_defines".into(), Value::String(layer_defines(doc)?));
    map.insert(
        "behaviors_dtsi".into(),
        Value::String(behaviors_dtsi(doc, ctx)?),
    );
    map.insert("combos_dtsi".into(), Value::String(combos_dtsi(doc, ctx)?));
    map.insert("macros_dtsi".into(), Value::String(macros_dtsi(doc, ctx)?));
    map.insert("keymap_node".into(), Value::String(keymap_node(doc, ctx)?));
    map.insert(
        "input_listeners_dtsi".into(),
        Value::String(input_listeners_dtsi(doc, ctx)?),
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Combo, TapDance};

    fn doc() -> LayoutDocument {
        let doc = LayoutDocument::new("corne", "test");
        let doc = doc.layers().add("default_layer").unwrap();
        let doc = doc.layers().add("nav").unwrap();
        let doc = doc
            .layers()
            .get("default_layer")
            .unwrap()
            .set_range(
                0,
                4,
                &[
                    Binding::parse("&kp A").unwrap(),
                    Binding::parse("&kp B").unwrap(),
                    Binding::parse("&mt LCTRL ESC").unwrap(),
                    Binding::parse("&mo 1").unwrap(),
                ],
            )
            .unwrap();
        doc
    }

    #[test]
    fn layer_defines_are_upper_snake_with_indices() {
        assert_eq!(
            layer_defines(&doc()).unwrap(),
            "#define DEFAULT_LAYER 0\n#define NAV 1\n"
        );
    }

    #[test]
    fn invalid_layer_name_is_rejected_before_emission() {
        let mut d = doc();
        d.layer_names[0] = "bad-name".into();
        let e = layer_defines(&d).unwrap_err();
        assert_eq!(e.kind, ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn combo_node_emits_all_four_properties() {
        let mut d = doc();
        let mut combo = Combo::new("combo_esc", vec![0, 1], Binding::parse("&kp ESC").unwrap());
        combo.timeout_ms = Some(30);
        combo.layers = vec![0, 1];
        d.combos.push(combo);
        let text = combos_dtsi(&d, &FormatContext::default()).unwrap();
        assert!(text.contains("combo_esc {"));
        assert!(text.contains("timeout-ms = <30>;"));
        assert!(text.contains("key-positions = <0 1>;"));
        assert!(text.contains("bindings = <&kp ESC>;"));
        assert!(text.contains("layers = <0 1>;"));
    }

    #[test]
    fn hold_tap_emits_two_binding_groups() {
        let mut d = doc();
        d.hold_taps.push(HoldTap::new("hm"));
        let text = behaviors_dtsi(&d, &FormatContext::default()).unwrap();
        assert!(text.contains("hm: hm {"));
        assert!(text.contains("compatible = \"zmk,behavior-hold-tap\";"));
        assert!(text.contains("#binding-cells = <2>;"));
        assert!(text.contains("bindings = <&kp>, <&kp>;"));
        assert!(text.contains("tapping-term-ms = <200>;"));
    }

    #[test]
    fn tap_dance_keeps_binding_order() {
        let mut d = doc();
        let mut td = TapDance::new("td");
        td.bindings = vec![
            Binding::parse("&kp A").unwrap(),
            Binding::parse("&kp B").unwrap(),
        ];
        d.tap_dances.push(td);
        let text = behaviors_dtsi(&d, &FormatContext::default()).unwrap();
        assert!(text.contains("bindings = <&kp A>, <&kp B>;"));
    }

    #[test]
    fn grid_rows_follow_the_row_layout_with_uniform_columns() {
        let ctx = FormatContext {
            keys_per_row: vec![2, 2],
            ..Default::default()
        };
        let text = keymap_node(&doc(), &ctx).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let first = lines
            .iter()
            .position(|l| l.trim_start().starts_with("&kp A"))
            .unwrap();
        // widest in row one is "&kp B" (5) vs "&kp A" (5): width 6
        assert_eq!(lines[first], "            &kp A &kp B");
        assert_eq!(lines[first + 1], "            &mt LCTRL ESC &mo 1");
    }

    #[test]
    fn grid_pads_columns_to_the_widest_binding() {
        let ctx = FormatContext {
            keys_per_row: vec![2],
            ..Default::default()
        };
        let d = doc()
            .layers()
            .get("nav")
            .unwrap()
            .set_range(
                0,
                2,
                &[
                    Binding::parse("&kp LC(LA(DEL))").unwrap(),
                    Binding::parse("&kp B").unwrap(),
                ],
            )
            .unwrap();
        let text = keymap_node(&d, &ctx).unwrap();
        assert!(text.contains("&kp LC(LA(DEL)) &kp B"));
    }

    #[test]
    fn full_keymap_contains_every_section() {
        let mut d = doc();
        d.hold_taps.push(HoldTap::new("hm"));
        d.combos.push(Combo::new(
            "c",
            vec![0, 1],
            Binding::parse("&kp ESC").unwrap(),
        ));
        let text = full_keymap(&d, &FormatContext::default()).unwrap();
        assert!(text.starts_with("#include <behaviors.dtsi>"));
        assert!(text.contains("#define DEFAULT_LAYER 0"));
        assert!(text.contains("/ {"));
        assert!(text.contains("behaviors {"));
        assert!(text.contains("combos {"));
        assert!(text.contains("keymap {"));
        assert!(!text.contains("macros {"));
    }
}
