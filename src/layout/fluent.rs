//! The fluent mutation surface. Every operation leaves the receiver
//! untouched and returns a fresh [`LayoutDocument`]; failures happen before
//! any cloning is observable, so no half-modified document can escape.

use crate::bail;
use crate::binding::Binding;
use crate::error::{ErrorKind, Result};

use super::behaviors::{
    CapsWord, Combo, HoldTap, InputListener, Macro, ModMorph, StickyKey, TapDance,
};
use super::validate::is_c_identifier;
use super::LayoutDocument;

/// Layer-collection operations.
pub struct Layers<'a> {
    doc: &'a LayoutDocument,
}

impl<'a> Layers<'a> {
    pub(crate) fn new(doc: &'a LayoutDocument) -> Self {
        Layers { doc }
    }

    pub fn names(&self) -> &'a [String] {
        &self.doc.layer_names
    }

    pub fn len(&self) -> usize {
        self.doc.layer_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.layer_names.is_empty()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        match self.doc.layer_index(name) {
            Some(i) => Ok(i),
            None => bail!(ErrorKind::LayerNotFound, "no layer named {name:?}"),
        }
    }

    fn check_new_name(&self, name: &str) -> Result<()> {
        if !is_c_identifier(name) {
            bail!(
                ErrorKind::InvalidIdentifier,
                "layer name {name:?} is not a valid C identifier"
            );
        }
        if self.doc.layer_index(name).is_some() {
            bail!(ErrorKind::LayerAlreadyExists, "layer {name:?} already exists");
        }
        Ok(())
    }

    /// A proxy for per-layer mutation.
    pub fn get(&self, name: &str) -> Result<LayerProxy<'a>> {
        Ok(LayerProxy {
            doc: self.doc,
            index: self.index_of(name)?,
        })
    }

    /// Append a new empty layer.
    pub fn add(&self, name: &str) -> Result<LayoutDocument> {
        self.add_at(name, self.len())
    }

    /// Insert a new empty layer at `pos`.
    pub fn add_at(&self, name: &str, pos: usize) -> Result<LayoutDocument> {
        self.check_new_name(name)?;
        if pos > self.len() {
            bail!(
                ErrorKind::IndexOutOfRange,
                "layer position {pos} is out of range 0..={}",
                self.len()
            );
        }
        let mut doc = self.doc.clone();
        doc.layer_names.insert(pos, name.to_string());
        doc.layers.insert(pos, vec![]);
        Ok(doc)
    }

    /// Drop a layer and its name. Combo layer indices referring to layers
    /// after it shift down; references to the removed layer are dropped.
    pub fn remove(&self, name: &str) -> Result<LayoutDocument> {
        let idx = self.index_of(name)?;
        let mut doc = self.doc.clone();
        doc.layer_names.remove(idx);
        doc.layers.remove(idx);
        for combo in &mut doc.combos {
            combo.layers.retain(|&l| l != idx);
            for l in &mut combo.layers {
                if *l > idx {
                    *l -= 1;
                }
            }
        }
        Ok(doc)
    }

    /// Reposition a layer within the ordering.
    pub fn move_to(&self, name: &str, index: usize) -> Result<LayoutDocument> {
        let from = self.index_of(name)?;
        if index >= self.len() {
            bail!(
                ErrorKind::IndexOutOfRange,
                "layer position {index} is out of range 0..{}",
                self.len()
            );
        }
        let mut doc = self.doc.clone();
        let n = doc.layer_names.remove(from);
        let l = doc.layers.remove(from);
        doc.layer_names.insert(index, n);
        doc.layers.insert(index, l);
        Ok(doc)
    }

    /// Rename a layer. Index-based references (combos) are unaffected.
    pub fn rename(&self, old: &str, new: &str) -> Result<LayoutDocument> {
        let idx = self.index_of(old)?;
        if new != old {
            self.check_new_name(new)?;
        }
        let mut doc = self.doc.clone();
        doc.layer_names[idx] = new.to_string();
        Ok(doc)
    }

    /// Deep-copy a layer's bindings under a new name, appended at the end.
    pub fn copy(&self, src: &str, dst: &str) -> Result<LayoutDocument> {
        let idx = self.index_of(src)?;
        self.check_new_name(dst)?;
        let mut doc = self.doc.clone();
        let bindings = doc.layers[idx].clone();
        doc.layer_names.push(dst.to_string());
        doc.layers.push(bindings);
        Ok(doc)
    }

    /// Empty a layer's bindings, keeping the layer.
    pub fn clear(&self, name: &str) -> Result<LayoutDocument> {
        let idx = self.index_of(name)?;
        let mut doc = self.doc.clone();
        doc.layers[idx].clear();
        Ok(doc)
    }

    /// Apply a permutation of the current layer names.
    pub fn reorder(&self, names: &[&str]) -> Result<LayoutDocument> {
        if names.len() != self.len() {
            bail!(
                ErrorKind::Validate,
                "reorder got {} names but the document has {} layers",
                names.len(),
                self.len()
            );
        }
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self.index_of(name)?;
            if indices.contains(&idx) {
                bail!(ErrorKind::Validate, "layer {name:?} appears twice in reorder");
            }
            indices.push(idx);
        }
        let mut doc = self.doc.clone();
        doc.layer_names = indices
            .iter()
            .map(|&i| self.doc.layer_names[i].clone())
            .collect();
        doc.layers = indices.iter().map(|&i| self.doc.layers[i].clone()).collect();
        Ok(doc)
    }
}

/// Per-layer binding operations, obtained through [`Layers::get`].
pub struct LayerProxy<'a> {
    doc: &'a LayoutDocument,
    index: usize,
}

impl<'a> LayerProxy<'a> {
    pub fn name(&self) -> &'a str {
        &self.doc.layer_names[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn bindings(&self) -> &'a [Binding] {
        &self.doc.layers[self.index]
    }

    pub fn len(&self) -> usize {
        self.bindings().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings().is_empty()
    }

    pub fn get(&self, i: usize) -> Result<&'a Binding> {
        match self.bindings().get(i) {
            Some(b) => Ok(b),
            None => bail!(
                ErrorKind::IndexOutOfRange,
                "position {i} is out of range for layer {:?} of length {}",
                self.name(),
                self.len()
            ),
        }
    }

    fn edit(&self, f: impl FnOnce(&mut Vec<Binding>)) -> LayoutDocument {
        let mut doc = self.doc.clone();
        f(&mut doc.layers[self.index]);
        doc
    }

    /// Set position `i`, filling any gap below it with `&trans`.
    pub fn set(&self, i: usize, binding: Binding) -> Result<LayoutDocument> {
        Ok(self.edit(|layer| {
            if i >= layer.len() {
                layer.resize(i + 1, Binding::trans());
            }
            layer[i] = binding;
        }))
    }

    /// Overwrite `[start, end)`; `bindings` must cover the range exactly.
    pub fn set_range(&self, start: usize, end: usize, bindings: &[Binding]) -> Result<LayoutDocument> {
        if end < start {
            bail!(ErrorKind::IndexOutOfRange, "range {start}..{end} is inverted");
        }
        if bindings.len() != end - start {
            bail!(
                ErrorKind::Validate,
                "range {start}..{end} needs {} bindings, got {}",
                end - start,
                bindings.len()
            );
        }
        Ok(self.edit(|layer| {
            if end > layer.len() {
                layer.resize(end, Binding::trans());
            }
            layer[start..end].clone_from_slice(bindings);
        }))
    }

    /// Replace this layer's bindings with a copy of another layer's.
    pub fn copy_from(&self, src: &str) -> Result<LayoutDocument> {
        let src_idx = match self.doc.layer_index(src) {
            Some(i) => i,
            None => bail!(ErrorKind::LayerNotFound, "no layer named {src:?}"),
        };
        let bindings = self.doc.layers[src_idx].clone();
        Ok(self.edit(|layer| *layer = bindings))
    }

    pub fn append(&self, binding: Binding) -> Result<LayoutDocument> {
        Ok(self.edit(|layer| layer.push(binding)))
    }

    pub fn insert(&self, i: usize, binding: Binding) -> Result<LayoutDocument> {
        if i > self.len() {
            bail!(
                ErrorKind::IndexOutOfRange,
                "cannot insert at {i} in layer {:?} of length {}",
                self.name(),
                self.len()
            );
        }
        Ok(self.edit(|layer| layer.insert(i, binding)))
    }

    pub fn remove(&self, i: usize) -> Result<LayoutDocument> {
        if i >= self.len() {
            bail!(
                ErrorKind::IndexOutOfRange,
                "cannot remove position {i} from layer {:?} of length {}",
                self.name(),
                self.len()
            );
        }
        Ok(self.edit(|layer| {
            layer.remove(i);
        }))
    }

    pub fn clear(&self) -> Result<LayoutDocument> {
        Ok(self.edit(|layer| layer.clear()))
    }

    /// Replace the layer with `size` copies of `binding`.
    pub fn fill(&self, binding: Binding, size: usize) -> Result<LayoutDocument> {
        Ok(self.edit(|layer| {
            layer.clear();
            layer.resize(size, binding);
        }))
    }

    /// Extend to `size` with `&trans`; a layer already that long is
    /// unchanged.
    pub fn pad_to(&self, size: usize) -> Result<LayoutDocument> {
        self.pad_to_with(size, Binding::trans())
    }

    pub fn pad_to_with(&self, size: usize, binding: Binding) -> Result<LayoutDocument> {
        Ok(self.edit(|layer| {
            if layer.len() < size {
                layer.resize(size, binding);
            }
        }))
    }
}

/// Behavior-collection operations.
pub struct Behaviors<'a> {
    doc: &'a LayoutDocument,
}

macro_rules! behavior_ops {
    ($add:ident, $remove:ident, $has:ident, $field:ident, $ty:ty, $kind:literal) => {
        pub fn $add(&self, behavior: $ty) -> Result<LayoutDocument> {
            self.check_free_name(&behavior.name)?;
            let mut doc = self.doc.clone();
            doc.$field.push(behavior);
            Ok(doc)
        }

        pub fn $remove(&self, name: &str) -> Result<LayoutDocument> {
            if !self.doc.$field.iter().any(|b| b.name == name) {
                bail!(ErrorKind::Validate, concat!("no ", $kind, " named {:?}"), name);
            }
            let mut doc = self.doc.clone();
            doc.$field.retain(|b| b.name != name);
            Ok(doc)
        }

        pub fn $has(&self, name: &str) -> bool {
            self.doc.$field.iter().any(|b| b.name == name)
        }
    };
}

impl<'a> Behaviors<'a> {
    pub(crate) fn new(doc: &'a LayoutDocument) -> Self {
        Behaviors { doc }
    }

    /// Bindable behaviors share one namespace; combos are node names and
    /// only collide among themselves.
    fn check_free_name(&self, name: &str) -> Result<()> {
        if self.doc.has_behavior(name) {
            bail!(ErrorKind::Validate, "behavior {name:?} already exists");
        }
        Ok(())
    }

    behavior_ops!(add_hold_tap, remove_hold_tap, has_hold_tap, hold_taps, HoldTap, "hold-tap");
    behavior_ops!(add_macro, remove_macro, has_macro, macros, Macro, "macro");
    behavior_ops!(add_tap_dance, remove_tap_dance, has_tap_dance, tap_dances, TapDance, "tap-dance");
    behavior_ops!(
        add_sticky_key,
        remove_sticky_key,
        has_sticky_key,
        sticky_keys,
        StickyKey,
        "sticky-key"
    );
    behavior_ops!(add_caps_word, remove_caps_word, has_caps_word, caps_words, CapsWord, "caps-word");
    behavior_ops!(add_mod_morph, remove_mod_morph, has_mod_morph, mod_morphs, ModMorph, "mod-morph");

    pub fn add_combo(&self, combo: Combo) -> Result<LayoutDocument> {
        if self.has_combo(&combo.name) {
            bail!(ErrorKind::Validate, "combo {:?} already exists", combo.name);
        }
        let mut doc = self.doc.clone();
        doc.combos.push(combo);
        Ok(doc)
    }

    pub fn remove_combo(&self, name: &str) -> Result<LayoutDocument> {
        if !self.has_combo(name) {
            bail!(ErrorKind::Validate, "no combo named {name:?}");
        }
        let mut doc = self.doc.clone();
        doc.combos.retain(|c| c.name != name);
        Ok(doc)
    }

    pub fn has_combo(&self, name: &str) -> bool {
        self.doc.combos.iter().any(|c| c.name == name)
    }

    pub fn add_input_listener(&self, listener: InputListener) -> Result<LayoutDocument> {
        if self.doc.input_listeners.iter().any(|l| l.code == listener.code) {
            bail!(
                ErrorKind::Validate,
                "input listener {:?} already exists",
                listener.code
            );
        }
        let mut doc = self.doc.clone();
        doc.input_listeners.push(listener);
        Ok(doc)
    }

    pub fn remove_input_listener(&self, code: &str) -> Result<LayoutDocument> {
        if !self.doc.input_listeners.iter().any(|l| l.code == code) {
            bail!(ErrorKind::Validate, "no input listener named {code:?}");
        }
        let mut doc = self.doc.clone();
        doc.input_listeners.retain(|l| l.code != code);
        Ok(doc)
    }

    /// Drop every user-defined behavior of every kind.
    pub fn clear_all(&self) -> LayoutDocument {
        let mut doc = self.doc.clone();
        doc.hold_taps.clear();
        doc.combos.clear();
        doc.macros.clear();
        doc.tap_dances.clear();
        doc.sticky_keys.clear();
        doc.caps_words.clear();
        doc.mod_morphs.clear();
        doc.input_listeners.clear();
        doc
    }
}
