//! Lowering of the devicetree AST into a [`LayoutDocument`]: find the
//! keymap node and every behavior definition, reassemble flat binding cell
//! arrays into structured bindings, and resolve `#define`d identifiers one
//! level deep.
//!
//! Extraction is one-shot; the produced document holds no reference back
//! into the AST. Per-behavior failures are collected as warnings; only a
//! failure that prevents assembling a coherent document is a hard error.

mod behaviors;

#[cfg(test)]
mod tests;

use crate::binding::{Binding, Param, ParamValue};
use crate::defines::DefineMap;
use crate::dts::{find_nodes_compatible, Node, Property, Value};
use crate::error::{ErrorKind, LayoutError, Result};
use crate::layout::LayoutDocument;
use crate::{bail_at, err_at};

pub use behaviors::*;

pub const KEYMAP_COMPATIBLE: &str = "zmk,keymap";

/// The lowering result: the document plus non-fatal findings.
#[derive(Debug)]
pub struct Extraction {
    pub layout: LayoutDocument,
    pub warnings: Vec<LayoutError>,
}

/// Extract a full layout document from parsed roots.
pub fn extract_layout(roots: &[Node]) -> Result<Extraction> {
    let defines = DefineMap::collect(roots);
    let mut warnings = vec![];
    let mut doc = LayoutDocument::default();

    extract_keymap(roots, &defines, &mut doc, &mut warnings)?;

    doc.hold_taps = extract_hold_taps(roots, &defines, &mut warnings);
    doc.macros = extract_macros(roots, &defines, &mut warnings);
    let layer_names = doc.layer_names.clone();
    doc.combos = extract_combos(roots, &defines, &layer_names, &mut warnings);
    doc.tap_dances = extract_tap_dances(roots, &defines, &mut warnings);
    doc.sticky_keys = extract_sticky_keys(roots, &defines, &mut warnings);
    doc.caps_words = extract_caps_words(roots, &mut warnings);
    doc.mod_morphs = extract_mod_morphs(roots, &defines, &mut warnings);
    doc.input_listeners = extract_input_listeners(roots, &defines, &mut warnings);

    Ok(Extraction {
        layout: doc,
        warnings,
    })
}

/// Layers come from the children of the `zmk,keymap` node, in source
/// order; the child node name is the layer name.
fn extract_keymap(
    roots: &[Node],
    defines: &DefineMap,
    doc: &mut LayoutDocument,
    warnings: &mut Vec<LayoutError>,
) -> Result<()> {
    let keymap = match find_nodes_compatible(roots, KEYMAP_COMPATIBLE).into_iter().next() {
        Some(n) => n,
        // A behaviors-only fragment has no keymap node.
        None => return Ok(()),
    };
    for layer_node in &keymap.children {
        let bindings = match layer_node.prop("bindings") {
            Some(prop) => bindings_from_property(prop, defines)?,
            None => {
                warnings.push(LayoutError::at(
                    ErrorKind::Extract,
                    &layer_node.span,
                    format!("layer {:?} has no bindings property", layer_node.name),
                ));
                vec![]
            }
        };
        doc.layer_names.push(layer_node.name.clone());
        doc.layers.push(bindings);
    }
    Ok(())
}

/// Reassemble a property's flat cell sequence into bindings: a reference
/// opens a binding, every following non-reference cell is one of its
/// parameters.
pub(crate) fn bindings_from_property(prop: &Property, defines: &DefineMap) -> Result<Vec<Binding>> {
    let cells = prop.cells();
    let mut out: Vec<Binding> = vec![];
    for cell in cells {
        match cell {
            Value::Reference(name) => out.push(Binding::new(format!("&{name}"), vec![])),
            other => {
                let param = param_from_value(other, defines, prop)?;
                match out.last_mut() {
                    Some(b) => b.params.push(param),
                    None => {
                        bail_at!(
                            ErrorKind::Extract,
                            &prop.span,
                            "parameter cell before any behavior reference in {:?}",
                            prop.name
                        );
                    }
                }
            }
        }
    }
    Ok(out)
}

fn param_from_value(value: &Value, defines: &DefineMap, prop: &Property) -> Result<Param> {
    match value {
        Value::Integer(i) => Ok(Param::int(*i)),
        Value::Raw(s) => Ok(Param {
            value: ParamValue::from(defines.resolve(s)),
            params: vec![],
        }),
        Value::String(s) => Ok(Param::name(s.clone())),
        Value::FunctionCall { name, args } => {
            let params = args
                .iter()
                .map(|a| param_from_value(a, defines, prop))
                .collect::<Result<Vec<_>>>()?;
            Ok(Param::call(name.clone(), params))
        }
        other => err_at!(
            ErrorKind::Extract,
            &prop.span,
            "cannot use {other:?} as a binding parameter in {:?}",
            prop.name
        ),
    }
}

/// Behaviors are referenced by their label when they have one.
pub(crate) fn behavior_name(node: &Node) -> String {
    node.label.clone().unwrap_or_else(|| node.name.clone())
}

pub(crate) fn prop_u32(node: &Node, name: &str) -> Result<Option<u32>> {
    let prop = match node.prop(name) {
        Some(p) => p,
        None => return Ok(None),
    };
    let cells = prop.cells();
    match cells.first() {
        Some(Value::Integer(i)) if *i >= 0 => Ok(Some(*i as u32)),
        _ => err_at!(
            ErrorKind::Extract,
            &prop.span,
            "property {name:?} of {:?} must be a non-negative integer",
            node.name
        ),
    }
}

pub(crate) fn prop_str(node: &Node, name: &str) -> Result<Option<String>> {
    let prop = match node.prop(name) {
        Some(p) => p,
        None => return Ok(None),
    };
    match prop.value.as_ref().and_then(|v| v.as_str()) {
        Some(s) => Ok(Some(s.to_string())),
        None => err_at!(
            ErrorKind::Extract,
            &prop.span,
            "property {name:?} of {:?} must be a string",
            node.name
        ),
    }
}

/// Devicetree boolean properties are present-or-absent.
pub(crate) fn prop_flag(node: &Node, name: &str) -> Option<bool> {
    node.prop(name).map(|p| p.is_boolean() || p.cells().first().and_then(|v| v.as_integer()) != Some(0))
}

/// An integer list, with `#define`d identifiers resolved one level.
pub(crate) fn prop_u32_list(
    node: &Node,
    name: &str,
    defines: &DefineMap,
) -> Result<Option<Vec<u32>>> {
    let prop = match node.prop(name) {
        Some(p) => p,
        None => return Ok(None),
    };
    let mut out = vec![];
    for cell in prop.cells() {
        let n = match cell {
            Value::Integer(i) => *i,
            Value::Raw(s) => match defines.resolve(s).parse::<i64>() {
                Ok(i) => i,
                Err(_) => {
                    bail_at!(
                        ErrorKind::Extract,
                        &prop.span,
                        "{s:?} in {name:?} of {:?} is not a number or a defined constant",
                        node.name
                    );
                }
            },
            _ => bail_at!(
                ErrorKind::Extract,
                &prop.span,
                "property {name:?} of {:?} must hold integers",
                node.name
            ),
        };
        if n < 0 {
            bail_at!(
                ErrorKind::Extract,
                &prop.span,
                "negative value {n} in {name:?} of {:?}",
                node.name
            );
        }
        out.push(n as u32);
    }
    Ok(Some(out))
}

pub(crate) fn prop_bindings(
    node: &Node,
    name: &str,
    defines: &DefineMap,
) -> Result<Vec<Binding>> {
    match node.prop(name) {
        Some(prop) => bindings_from_property(prop, defines),
        None => Ok(vec![]),
    }
}

/// The raw text of a cell-valued property, e.g. a `mods` expression.
pub(crate) fn prop_raw(node: &Node, name: &str) -> Option<String> {
    let prop = node.prop(name)?;
    prop.cells().first().map(|v| match v {
        Value::Raw(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        other => format!("{other:?}"),
    })
}
