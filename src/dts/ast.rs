//! The devicetree AST: a tree of nodes owning properties, children,
//! comments and preprocessor directives. Cross-node references stay
//! symbolic (`Value::Reference` carries a name, never a pointer).

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    /// Comment text without the `//` or `/* */` delimiters, trimmed.
    pub text: String,
    pub is_block: bool,
    pub span: Span,
}

impl Comment {
    pub fn line(&self) -> usize {
        self.span.start.line
    }

    pub fn column(&self) -> usize {
        self.span.start.column
    }
}

/// A preprocessor directive, stored verbatim and never evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    /// The directive word: `define`, `include`, `ifdef`, ...
    pub directive: String,
    /// Everything after the directive word, trimmed.
    pub condition: String,
    pub span: Span,
}

impl Conditional {
    /// Split a raw `#...` line into directive and condition.
    pub fn from_line(line: &str, span: Span) -> Self {
        let rest = line.trim_end().trim_start_matches('#').trim_start();
        let (directive, condition) = match rest.split_once(char::is_whitespace) {
            Some((d, c)) => (d.to_string(), c.trim().to_string()),
            None => (rest.to_string(), String::new()),
        };
        Conditional {
            directive,
            condition,
            span,
        }
    }

    pub fn line(&self) -> usize {
        self.span.start.line
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Array(Vec<Value>),
    Reference(String),
    Boolean(bool),
    FunctionCall { name: String, args: Vec<Value> },
    /// Anything the parser keeps as source text, e.g. `(MOD_LSFT|MOD_RSFT)`
    /// or a bare identifier cell awaiting define resolution.
    Raw(String),
}

impl Value {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(vs) => Some(vs),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Value::Raw(s) => Some(s),
            _ => None,
        }
    }

    /// Flatten `<a b>, <c>` shapes into the cell sequence `a b c`.
    /// Devicetree concatenates cells across comma-separated groups.
    pub fn cells(&self) -> Vec<&Value> {
        match self {
            Value::Array(vs) => vs.iter().flat_map(|v| v.cells()).collect(),
            v => vec![v],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    /// `None` for the bare `name;` form, which devicetree reads as a true
    /// boolean. `name = v1, v2;` stores `Value::Array([v1, v2])`.
    pub value: Option<Value>,
    pub comments: Vec<Comment>,
    pub span: Span,
}

impl Property {
    pub fn line(&self) -> usize {
        self.span.start.line
    }

    pub fn column(&self) -> usize {
        self.span.start.column
    }

    pub fn is_boolean(&self) -> bool {
        self.value.is_none()
    }

    /// The property's cell sequence, flattened across value groups.
    pub fn cells(&self) -> Vec<&Value> {
        self.value.as_ref().map(|v| v.cells()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub label: Option<String>,
    pub unit_address: Option<String>,
    pub properties: Vec<Property>,
    pub children: Vec<Node>,
    pub conditionals: Vec<Conditional>,
    pub comments: Vec<Comment>,
    pub span: Span,
}

impl Node {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Node {
            name: name.into(),
            label: None,
            unit_address: None,
            properties: vec![],
            children: vec![],
            conditionals: vec![],
            comments: vec![],
            span,
        }
    }

    pub fn line(&self) -> usize {
        self.span.start.line
    }

    pub fn column(&self) -> usize {
        self.span.start.column
    }

    pub fn prop(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// The node's `compatible` string, if it has one.
    pub fn compatible(&self) -> Option<&str> {
        match self.prop("compatible")?.value.as_ref()? {
            Value::String(s) => Some(s),
            // `compatible = "a", "b"` matches on the first entry.
            Value::Array(vs) => vs.first().and_then(|v| v.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_splits_directive_and_condition() {
        let c = Conditional::from_line("#define BASE 0", Span::default());
        assert_eq!(c.directive, "define");
        assert_eq!(c.condition, "BASE 0");

        let c = Conditional::from_line("#endif", Span::default());
        assert_eq!(c.directive, "endif");
        assert_eq!(c.condition, "");
    }

    #[test]
    fn cells_flatten_value_groups() {
        let v = Value::Array(vec![
            Value::Array(vec![Value::Reference("kp".into())]),
            Value::Array(vec![Value::Reference("kp".into())]),
        ]);
        let cells = v.cells();
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().all(|c| c.as_reference() == Some("kp")));
    }
}
