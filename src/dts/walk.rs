//! A visitor over the devicetree AST plus the node finders built on it.

use super::ast::{Comment, Conditional, Node, Property, Value};

/// One method per AST element kind; default impls do nothing so a visitor
/// only overrides what it cares about.
pub trait Visitor {
    fn visit_node(&mut self, _node: &Node) {}
    fn visit_property(&mut self, _prop: &Property) {}
    fn visit_value(&mut self, _value: &Value) {}
    fn visit_comment(&mut self, _comment: &Comment) {}
    fn visit_conditional(&mut self, _cond: &Conditional) {}
}

/// Depth-first, source-order traversal of a node and everything below it.
pub fn walk(node: &Node, v: &mut dyn Visitor) {
    v.visit_node(node);
    for c in &node.comments {
        v.visit_comment(c);
    }
    for c in &node.conditionals {
        v.visit_conditional(c);
    }
    for p in &node.properties {
        v.visit_property(p);
        for c in &p.comments {
            v.visit_comment(c);
        }
        if let Some(value) = &p.value {
            walk_value(value, v);
        }
    }
    for child in &node.children {
        walk(child, v);
    }
}

fn walk_value(value: &Value, v: &mut dyn Visitor) {
    v.visit_value(value);
    match value {
        Value::Array(vs) => {
            for inner in vs {
                walk_value(inner, v);
            }
        }
        Value::FunctionCall { args, .. } => {
            for arg in args {
                walk_value(arg, v);
            }
        }
        _ => {}
    }
}

pub fn walk_all(roots: &[Node], v: &mut dyn Visitor) {
    for n in roots {
        walk(n, v);
    }
}

struct NodeCollector<'a, F> {
    pred: F,
    found: Vec<&'a Node>,
}

impl<'a, F: Fn(&Node) -> bool> NodeCollector<'a, F> {
    fn run(roots: &'a [Node], pred: F) -> Vec<&'a Node> {
        let mut found = vec![];
        for root in roots {
            Self::collect(root, &pred, &mut found);
        }
        found
    }

    fn collect(node: &'a Node, pred: &F, found: &mut Vec<&'a Node>) {
        if pred(node) {
            found.push(node);
        }
        for child in &node.children {
            Self::collect(child, pred, found);
        }
    }
}

/// All nodes (in source order) satisfying the predicate.
pub fn find_nodes_where<'a, F: Fn(&Node) -> bool>(roots: &'a [Node], pred: F) -> Vec<&'a Node> {
    NodeCollector::run(roots, pred)
}

pub fn find_nodes_named<'a>(roots: &'a [Node], name: &str) -> Vec<&'a Node> {
    find_nodes_where(roots, |n| n.name == name)
}

pub fn find_nodes_compatible<'a>(roots: &'a [Node], compatible: &str) -> Vec<&'a Node> {
    find_nodes_where(roots, |n| n.compatible() == Some(compatible))
}
