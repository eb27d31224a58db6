//! Document invariant checks. `validate` reports every violation;
//! `ensure_valid` stops at the first.

use crate::error::{ErrorKind, LayoutError, Result};
use crate::providers::{is_builtin_behavior, ValidationRules};

use super::LayoutDocument;

type HashSet<T> = rustc_hash::FxHashSet<T>;

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_c_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Check every invariant, returning the full violation list (empty when
/// the document is valid).
pub fn validate(doc: &LayoutDocument, rules: &ValidationRules) -> Vec<LayoutError> {
    let mut errors = vec![];
    let fail = |errors: &mut Vec<LayoutError>, kind: ErrorKind, msg: String| {
        errors.push(LayoutError::new(kind, msg));
    };

    if doc.layer_names.len() != doc.layers.len() {
        fail(
            &mut errors,
            ErrorKind::Validate,
            format!(
                "{} layer names for {} layers",
                doc.layer_names.len(),
                doc.layers.len()
            ),
        );
    }
    if rules.max_layers > 0 && doc.layers.len() > rules.max_layers {
        fail(
            &mut errors,
            ErrorKind::Validate,
            format!(
                "{} layers exceed the profile maximum of {}",
                doc.layers.len(),
                rules.max_layers
            ),
        );
    }

    let mut seen = HashSet::default();
    for name in &doc.layer_names {
        if !is_c_identifier(name) {
            fail(
                &mut errors,
                ErrorKind::InvalidIdentifier,
                format!("layer name {name:?} is not a valid C identifier"),
            );
        }
        if !seen.insert(name.as_str()) {
            fail(
                &mut errors,
                ErrorKind::Validate,
                format!("duplicate layer name {name:?}"),
            );
        }
    }

    for (layer_idx, layer) in doc.layers.iter().enumerate() {
        for (pos, binding) in layer.iter().enumerate() {
            if !binding.value.starts_with('&') {
                fail(
                    &mut errors,
                    ErrorKind::InvalidBinding,
                    format!(
                        "binding {:?} at layer {layer_idx} position {pos} does not start with '&'",
                        binding.value
                    ),
                );
                continue;
            }
            let code = binding.behavior();
            if !is_builtin_behavior(rules, code) && !doc.has_behavior(code) {
                fail(
                    &mut errors,
                    ErrorKind::Validate,
                    format!(
                        "binding {:?} at layer {layer_idx} position {pos} names an unknown behavior",
                        binding.value
                    ),
                );
            }
        }
    }

    for combo in &doc.combos {
        if rules.key_count > 0 {
            for &p in &combo.key_positions {
                if p as usize >= rules.key_count {
                    fail(
                        &mut errors,
                        ErrorKind::IndexOutOfRange,
                        format!(
                            "combo {:?} uses key position {p}, profile has {} keys",
                            combo.name, rules.key_count
                        ),
                    );
                }
            }
        }
        for &l in &combo.layers {
            if l >= doc.layer_names.len() {
                fail(
                    &mut errors,
                    ErrorKind::IndexOutOfRange,
                    format!(
                        "combo {:?} targets layer index {l}, document has {} layers",
                        combo.name,
                        doc.layer_names.len()
                    ),
                );
            }
        }
    }

    for ht in &doc.hold_taps {
        if ht.bindings.len() != 2 {
            fail(
                &mut errors,
                ErrorKind::Validate,
                format!(
                    "hold-tap {:?} needs exactly 2 bindings, has {}",
                    ht.name,
                    ht.bindings.len()
                ),
            );
        }
    }
    for mm in &doc.mod_morphs {
        if mm.bindings.len() != 2 {
            fail(
                &mut errors,
                ErrorKind::Validate,
                format!(
                    "mod-morph {:?} needs exactly 2 bindings, has {}",
                    mm.name,
                    mm.bindings.len()
                ),
            );
        }
    }
    for td in &doc.tap_dances {
        if !(2..=5).contains(&td.bindings.len()) {
            fail(
                &mut errors,
                ErrorKind::Validate,
                format!(
                    "tap-dance {:?} needs 2 to 5 bindings, has {}",
                    td.name,
                    td.bindings.len()
                ),
            );
        }
    }
    for sk in &doc.sticky_keys {
        if sk.bindings.len() != 1 {
            fail(
                &mut errors,
                ErrorKind::Validate,
                format!(
                    "sticky key {:?} needs exactly 1 binding, has {}",
                    sk.name,
                    sk.bindings.len()
                ),
            );
        }
    }
    for cw in &doc.caps_words {
        for word in &cw.continue_list {
            if word.is_empty() {
                fail(
                    &mut errors,
                    ErrorKind::Validate,
                    format!("caps-word {:?} has an empty continue-list entry", cw.name),
                );
            }
        }
    }

    errors
}

/// Fail on the first invariant violation.
pub fn ensure_valid(doc: &LayoutDocument, rules: &ValidationRules) -> Result<()> {
    match validate(doc, rules).into_iter().next() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::layout::{Combo, HoldTap, TapDance};

    fn valid_doc() -> LayoutDocument {
        let doc = LayoutDocument::new("corne", "t");
        let doc = doc.layers().add("base").unwrap();
        doc.layers()
            .get("base")
            .unwrap()
            .set(0, Binding::parse("&kp A").unwrap())
            .unwrap()
    }

    fn rules() -> ValidationRules {
        ValidationRules {
            key_count: 42,
            max_layers: 10,
            ..Default::default()
        }
    }

    #[test]
    fn a_small_document_is_valid() {
        assert!(validate(&valid_doc(), &rules()).is_empty());
    }

    #[test]
    fn name_count_mismatch_is_flagged() {
        let mut doc = valid_doc();
        doc.layers.push(vec![]);
        let errors = validate(&doc, &rules());
        assert!(errors.iter().any(|e| e.kind == ErrorKind::Validate));
    }

    #[test]
    fn bad_layer_name_is_flagged() {
        let mut doc = valid_doc();
        doc.layer_names[0] = "no-dashes".into();
        let errors = validate(&doc, &rules());
        assert!(errors.iter().any(|e| e.kind == ErrorKind::InvalidIdentifier));
    }

    #[test]
    fn unknown_behavior_in_binding_is_flagged() {
        let mut doc = valid_doc();
        doc.layers[0].push(Binding::parse("&missing X").unwrap());
        let errors = validate(&doc, &rules());
        assert_eq!(errors.len(), 1);
        // once defined, the same binding passes
        doc.hold_taps.push(HoldTap::new("missing"));
        assert!(validate(&doc, &rules()).is_empty());
    }

    #[test]
    fn combo_bounds_are_checked() {
        let mut doc = valid_doc();
        let mut combo = Combo::new("c", vec![0, 99], Binding::parse("&kp ESC").unwrap());
        combo.layers = vec![0, 7];
        doc.combos.push(combo);
        let errors = validate(&doc, &rules());
        assert_eq!(
            errors
                .iter()
                .filter(|e| e.kind == ErrorKind::IndexOutOfRange)
                .count(),
            2
        );
    }

    #[test]
    fn behavior_arity_is_checked() {
        let mut doc = valid_doc();
        let mut ht = HoldTap::new("hm");
        ht.bindings.pop();
        doc.hold_taps.push(ht);
        let mut td = TapDance::new("td");
        td.bindings = vec![Binding::trans()];
        doc.tap_dances.push(td);
        let errors = validate(&doc, &rules());
        assert_eq!(errors.len(), 2);
        assert!(ensure_valid(&doc, &rules()).is_err());
    }

    #[test]
    fn c_identifier_rule() {
        assert!(is_c_identifier("base_layer"));
        assert!(is_c_identifier("_hidden"));
        assert!(is_c_identifier("Layer2"));
        assert!(!is_c_identifier(""));
        assert!(!is_c_identifier("2fast"));
        assert!(!is_c_identifier("has-dash"));
        assert!(!is_c_identifier("has space"));
    }
}
