//! One-pass collection of `#define NAME VALUE` directives and one-level
//! substitution during extraction. No conditional evaluation, no
//! function-like macros, no recursive expansion.

use crate::dts::{walk_all, Conditional, Node, Visitor};

type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[derive(Debug, Default, Clone)]
pub struct DefineMap {
    map: HashMap<String, String>,
}

impl DefineMap {
    /// Scan every stored conditional in the tree for object-like defines.
    pub fn collect(roots: &[Node]) -> Self {
        struct Collect(DefineMap);
        impl Visitor for Collect {
            fn visit_conditional(&mut self, cond: &Conditional) {
                if cond.directive != "define" {
                    return;
                }
                let (name, value) = match cond.condition.split_once(char::is_whitespace) {
                    Some((n, v)) => (n, v.trim()),
                    // `#define FLAG` defines an empty value.
                    None => (cond.condition.as_str(), ""),
                };
                if name.is_empty() || name.contains('(') {
                    // Function-like macros are out of scope.
                    return;
                }
                self.0.map.insert(name.to_string(), value.to_string());
            }
        }
        let mut c = Collect(DefineMap::default());
        walk_all(roots, &mut c);
        c.0
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Substitute `name` if it is defined; one level only, never recursive.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dts::parse_source;

    fn defines(src: &str) -> DefineMap {
        DefineMap::collect(&parse_source(src, "test").unwrap())
    }

    #[test]
    fn collects_defines_from_every_scope() {
        let d = defines("#define BASE 0\n/ { #define NAV 1\ninner { #define SYM 2\n }; };");
        assert_eq!(d.get("BASE"), Some("0"));
        assert_eq!(d.get("NAV"), Some("1"));
        assert_eq!(d.get("SYM"), Some("2"));
    }

    #[test]
    fn substitution_is_one_level_only() {
        let d = defines("#define A B\n#define B C\n/ { };");
        assert_eq!(d.resolve("A"), "B");
        assert_eq!(d.resolve("UNKNOWN"), "UNKNOWN");
    }

    #[test]
    fn function_like_macros_are_skipped() {
        let d = defines("#define MO_TOG(layer) &mo layer\n/ { };");
        assert!(d.is_empty());
    }

    #[test]
    fn flag_define_is_empty_valued() {
        let d = defines("#define HAS_THUMB_CLUSTER\n/ { };");
        assert_eq!(d.get("HAS_THUMB_CLUSTER"), Some(""));
    }
}
