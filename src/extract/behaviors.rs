//! One extractor per behavior kind, each keyed by its `compatible`
//! string. A behavior that fails to extract becomes a warning and is
//! skipped; the rest of the document still assembles.

use crate::binding::Binding;
use crate::defines::DefineMap;
use crate::dts::{find_nodes_compatible, find_nodes_where, Node, Value};
use crate::error::{ErrorKind, LayoutError, Result};
use crate::layout::{
    CapsWord, Combo, HoldTap, InputListener, ListenerNode, Macro, ModMorph, StickyKey, TapDance,
};
use crate::{anyhow_at, bail_at};

use super::{
    behavior_name, prop_bindings, prop_flag, prop_raw, prop_str, prop_u32, prop_u32_list,
};

pub const HOLD_TAP_COMPATIBLE: &str = "zmk,behavior-hold-tap";
pub const MACRO_COMPATIBLES: &[(&str, Option<u8>)] = &[
    ("zmk,behavior-macro", None),
    ("zmk,behavior-macro-one-param", Some(1)),
    ("zmk,behavior-macro-two-param", Some(2)),
];
pub const COMBOS_COMPATIBLE: &str = "zmk,combos";
pub const TAP_DANCE_COMPATIBLE: &str = "zmk,behavior-tap-dance";
pub const STICKY_KEY_COMPATIBLE: &str = "zmk,behavior-sticky-key";
pub const CAPS_WORD_COMPATIBLE: &str = "zmk,behavior-caps-word";
pub const MOD_MORPH_COMPATIBLE: &str = "zmk,behavior-mod-morph";
pub const INPUT_LISTENER_COMPATIBLE: &str = "zmk,input-listener";

/// Run `f` per node, demoting failures to warnings.
fn collect_each<'a, T>(
    nodes: Vec<&'a Node>,
    warnings: &mut Vec<LayoutError>,
    f: impl Fn(&'a Node) -> Result<T>,
) -> Vec<T> {
    let mut out = vec![];
    for node in nodes {
        match f(node) {
            Ok(t) => out.push(t),
            Err(e) => warnings.push(e),
        }
    }
    out
}

pub fn extract_hold_taps(
    roots: &[Node],
    defines: &DefineMap,
    warnings: &mut Vec<LayoutError>,
) -> Vec<HoldTap> {
    collect_each(
        find_nodes_compatible(roots, HOLD_TAP_COMPATIBLE),
        warnings,
        |node| {
            Ok(HoldTap {
                name: behavior_name(node),
                description: None,
                tapping_term_ms: prop_u32(node, "tapping-term-ms")?,
                quick_tap_ms: prop_u32(node, "quick-tap-ms")?,
                require_prior_idle_ms: prop_u32(node, "require-prior-idle-ms")?,
                flavor: prop_str(node, "flavor")?,
                hold_trigger_key_positions: prop_u32_list(
                    node,
                    "hold-trigger-key-positions",
                    defines,
                )?,
                hold_trigger_on_release: prop_flag(node, "hold-trigger-on-release"),
                retro_tap: prop_flag(node, "retro-tap"),
                bindings: require_bindings(node, defines)?,
            })
        },
    )
}

pub fn extract_macros(
    roots: &[Node],
    defines: &DefineMap,
    warnings: &mut Vec<LayoutError>,
) -> Vec<Macro> {
    let mut out = vec![];
    for &(compatible, param_count) in MACRO_COMPATIBLES {
        let macros = collect_each(
            find_nodes_compatible(roots, compatible),
            warnings,
            |node| {
                Ok(Macro {
                    name: behavior_name(node),
                    description: None,
                    wait_ms: prop_u32(node, "wait-ms")?,
                    tap_ms: prop_u32(node, "tap-ms")?,
                    param_count,
                    bindings: require_bindings(node, defines)?,
                })
            },
        );
        out.extend(macros);
    }
    out
}

/// Combos live as children of a `zmk,combos` node (also matched by the
/// conventional node name for sources that omit the compatible).
pub fn extract_combos(
    roots: &[Node],
    defines: &DefineMap,
    layer_names: &[String],
    warnings: &mut Vec<LayoutError>,
) -> Vec<Combo> {
    let containers = find_nodes_where(roots, |n| {
        n.compatible() == Some(COMBOS_COMPATIBLE)
            || (n.name == "combos" && n.compatible().is_none())
    });
    let mut out = vec![];
    for container in containers {
        let combos = collect_each(
            container.children.iter().collect(),
            warnings,
            |node| {
                let key_positions =
                    prop_u32_list(node, "key-positions", defines)?.ok_or_else(|| {
                        anyhow_at!(
                            ErrorKind::Extract,
                            &node.span,
                            "combo {:?} is missing key-positions",
                            node.name
                        )
                    })?;
                let bindings = require_bindings(node, defines)?;
                if bindings.len() != 1 {
                    bail_at!(
                        ErrorKind::Extract,
                        &node.span,
                        "combo {:?} must have exactly one binding, has {}",
                        node.name,
                        bindings.len()
                    );
                }
                Ok(Combo {
                    name: node.name.clone(),
                    description: None,
                    key_positions,
                    bindings: bindings.into_iter().next().expect("one binding"),
                    timeout_ms: prop_u32(node, "timeout-ms")?,
                    layers: combo_layers(node, defines, layer_names)?,
                    require_prior_idle_ms: prop_u32(node, "require-prior-idle-ms")?,
                })
            },
        );
        out.extend(combos);
    }
    out
}

/// Combo `layers` normalize to indices. Accepted on input: integer
/// indices, `#define`d names, literal layer names.
fn combo_layers(
    node: &Node,
    defines: &DefineMap,
    layer_names: &[String],
) -> Result<Vec<usize>> {
    let prop = match node.prop("layers") {
        Some(p) => p,
        None => return Ok(vec![]),
    };
    let mut out = vec![];
    for cell in prop.cells() {
        let idx = match cell {
            Value::Integer(i) if *i >= 0 => *i as usize,
            Value::Raw(name) => {
                let resolved = defines.resolve(name);
                match resolved.parse::<usize>() {
                    Ok(i) => i,
                    Err(_) => match layer_names.iter().position(|n| n == resolved) {
                        Some(i) => i,
                        None => {
                            bail_at!(
                                ErrorKind::Extract,
                                &prop.span,
                                "combo {:?} targets unknown layer {name:?}",
                                node.name
                            );
                        }
                    },
                }
            }
            other => {
                bail_at!(
                    ErrorKind::Extract,
                    &prop.span,
                    "combo {:?} has a malformed layers entry: {other:?}",
                    node.name
                );
            }
        };
        out.push(idx);
    }
    Ok(out)
}

pub fn extract_tap_dances(
    roots: &[Node],
    defines: &DefineMap,
    warnings: &mut Vec<LayoutError>,
) -> Vec<TapDance> {
    collect_each(
        find_nodes_compatible(roots, TAP_DANCE_COMPATIBLE),
        warnings,
        |node| {
            Ok(TapDance {
                name: behavior_name(node),
                description: None,
                tapping_term_ms: prop_u32(node, "tapping-term-ms")?,
                bindings: require_bindings(node, defines)?,
            })
        },
    )
}

pub fn extract_sticky_keys(
    roots: &[Node],
    defines: &DefineMap,
    warnings: &mut Vec<LayoutError>,
) -> Vec<StickyKey> {
    collect_each(
        find_nodes_compatible(roots, STICKY_KEY_COMPATIBLE),
        warnings,
        |node| {
            Ok(StickyKey {
                name: behavior_name(node),
                description: None,
                release_after_ms: prop_u32(node, "release-after-ms")?,
                quick_release: prop_flag(node, "quick-release"),
                lazy: prop_flag(node, "lazy"),
                ignore_modifiers: prop_flag(node, "ignore-modifiers"),
                bindings: require_bindings(node, defines)?,
            })
        },
    )
}

pub fn extract_caps_words(roots: &[Node], warnings: &mut Vec<LayoutError>) -> Vec<CapsWord> {
    collect_each(
        find_nodes_compatible(roots, CAPS_WORD_COMPATIBLE),
        warnings,
        |node| {
            let continue_list = node
                .prop("continue-list")
                .map(|prop| {
                    prop.cells()
                        .iter()
                        .map(|cell| match cell {
                            Value::Raw(s) => Ok(s.clone()),
                            Value::Integer(i) => Ok(i.to_string()),
                            other => err_continue_entry(node, other),
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?
                .unwrap_or_default();
            Ok(CapsWord {
                name: behavior_name(node),
                description: None,
                continue_list,
                mods: prop_raw(node, "mods"),
            })
        },
    )
}

fn err_continue_entry(node: &Node, v: &Value) -> Result<String> {
    Err(anyhow_at!(
        ErrorKind::Extract,
        &node.span,
        "caps-word {:?} continue-list entries must be identifiers, found {v:?}",
        node.name
    ))
}

pub fn extract_mod_morphs(
    roots: &[Node],
    defines: &DefineMap,
    warnings: &mut Vec<LayoutError>,
) -> Vec<ModMorph> {
    collect_each(
        find_nodes_compatible(roots, MOD_MORPH_COMPATIBLE),
        warnings,
        |node| {
            Ok(ModMorph {
                name: behavior_name(node),
                description: None,
                mods: prop_raw(node, "mods"),
                keep_mods: prop_raw(node, "keep-mods"),
                bindings: require_bindings(node, defines)?,
            })
        },
    )
}

/// Input listeners appear either as `compatible = "zmk,input-listener"`
/// definitions or as `&listener { ... }` overrides at file scope.
pub fn extract_input_listeners(
    roots: &[Node],
    defines: &DefineMap,
    warnings: &mut Vec<LayoutError>,
) -> Vec<InputListener> {
    let nodes = find_nodes_where(roots, |n| {
        n.compatible() == Some(INPUT_LISTENER_COMPATIBLE)
            || (n.name.starts_with('&')
                && n.children
                    .iter()
                    .any(|c| c.prop("input-processors").is_some() || c.prop("layers").is_some()))
    });
    collect_each(nodes, warnings, |node| {
        let code = if node.name.starts_with('&') {
            node.name.clone()
        } else {
            format!("&{}", behavior_name(node))
        };
        let mut listener_nodes = vec![];
        for child in &node.children {
            listener_nodes.push(ListenerNode {
                code: child.name.clone(),
                description: None,
                layers: prop_u32_list(child, "layers", defines)?
                    .unwrap_or_default()
                    .into_iter()
                    .map(|l| l as usize)
                    .collect(),
                input_processors: prop_bindings(child, "input-processors", defines)?,
            });
        }
        Ok(InputListener {
            code,
            input_processors: prop_bindings(node, "input-processors", defines)?,
            nodes: listener_nodes,
        })
    })
}

fn require_bindings(node: &Node, defines: &DefineMap) -> Result<Vec<Binding>> {
    match node.prop("bindings") {
        Some(prop) => super::bindings_from_property(prop, defines),
        None => Err(anyhow_at!(
            ErrorKind::Extract,
            &node.span,
            "{:?} is missing a bindings property",
            node.name
        )),
    }
}
