//! A bidirectional translator between ZMK devicetree keymap sources and
//! structured layout documents.
//!
//! The parsing direction runs source text through the tokenizer and
//! recursive-descent parser in [`dts`], then lowers the AST with
//! [`extract`] into a [`layout::LayoutDocument`]. The generating direction
//! turns a document back into DTSI text and a kconfig fragment with
//! [`generate`]. [`pipeline::KeymapProcessor`] wires both ends to a
//! keyboard profile supplied through [`providers::ConfigurationProvider`].
//!
//! Documents are logically immutable; the fluent surface on
//! [`layout::LayoutDocument::layers`] and
//! [`layout::LayoutDocument::behaviors`] returns new document values.

pub mod binding;
pub mod defines;
pub mod dts;
pub mod error;
pub mod extract;
pub mod generate;
pub mod layout;
pub mod pipeline;
pub mod providers;
pub mod span;
