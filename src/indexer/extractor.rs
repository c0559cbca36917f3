//! Language-agnostic structural extraction over a tree-sitter syntax tree.
//!
//! A single depth-first walk emits one [`Element`] per class or function
//! node. Whether a function is a method is decided by its ancestors, which
//! are carried as an immutable, structurally shared chain so sibling
//! branches never see each other's frames.

use super::elements::{Element, ElementKind, ElementSet};
use super::languages::{LanguageSpec, LanguageTag};
use std::rc::Rc;
use tree_sitter::{Node, Tree};

pub const UNKNOWN_FUNCTION: &str = "unknown_function";
pub const UNKNOWN_CLASS: &str = "unknown_class";

const DOC_NODE_KINDS: &[&str] = &["string", "string_literal", "comment"];
const COMMENT_NODE_KINDS: &[&str] = &["comment", "line_comment", "block_comment"];

/// Persistent list of ancestors, nearest first.
#[derive(Clone, Default)]
struct Ancestry<'t>(Option<Rc<Link<'t>>>);

struct Link<'t> {
    node: Node<'t>,
    rest: Ancestry<'t>,
}

impl<'t> Ancestry<'t> {
    fn with(&self, node: Node<'t>) -> Self {
        Ancestry(Some(Rc::new(Link {
            node,
            rest: self.clone(),
        })))
    }

    fn nearest(&self, kind: &str) -> Option<Node<'t>> {
        let mut cur = self.0.as_deref();
        while let Some(link) = cur {
            if link.node.is_named() && link.node.kind() == kind {
                return Some(link.node);
            }
            cur = link.rest.0.as_deref();
        }
        None
    }
}

struct Frame<'t> {
    node: Node<'t>,
    ancestors: Ancestry<'t>,
}

/// Walks syntax trees of one language and collects classes, functions and methods.
#[derive(Debug, Clone, Copy)]
pub struct StructuralExtractor {
    spec: Option<LanguageSpec>,
}

impl StructuralExtractor {
    /// Extractor for `language`. `Unsupported` yields an extractor that finds nothing.
    pub fn new(language: LanguageTag) -> Self {
        Self {
            spec: language.spec(),
        }
    }

    /// Extractor with an explicit node-kind table.
    pub fn with_spec(spec: LanguageSpec) -> Self {
        Self { spec: Some(spec) }
    }

    pub fn extract(&self, tree: &Tree, source: &str) -> ElementSet {
        let mut elements = ElementSet::new();
        let Some(spec) = self.spec else {
            return elements;
        };
        if source.is_empty() {
            return elements;
        }

        let mut stack = vec![Frame {
            node: tree.root_node(),
            ancestors: Ancestry::default(),
        }];

        while let Some(Frame { node, ancestors }) = stack.pop() {
            // anonymous keyword tokens can share a kind with the node they open
            let kind = if node.is_named() { node.kind() } else { "" };
            if kind == spec.function_kind {
                let parent = ancestors.nearest(spec.class_kind);
                let parent_class = parent.map(|class_node| {
                    field_text(class_node, spec.class_name_field, source)
                        .unwrap_or_else(|| UNKNOWN_CLASS.to_string())
                });
                let kind = if parent_class.is_some() {
                    ElementKind::Method
                } else {
                    ElementKind::Function
                };
                let name = field_text(node, spec.name_field, source)
                    .unwrap_or_else(|| UNKNOWN_FUNCTION.to_string());
                elements.push(build_element(node, source, kind, name, parent_class));
            } else if kind == spec.class_kind {
                let name = field_text(node, spec.class_name_field, source)
                    .unwrap_or_else(|| UNKNOWN_CLASS.to_string());
                elements.push(build_element(node, source, ElementKind::Class, name, None));
            }

            let child_ancestors = ancestors.with(node);
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            // reversed so that pops follow document order
            for child in children.into_iter().rev() {
                stack.push(Frame {
                    node: child,
                    ancestors: child_ancestors.clone(),
                });
            }
        }

        elements
    }
}

/// Convenience wrapper: extract `tree` as `language`.
pub fn extract(tree: &Tree, source: &str, language: LanguageTag) -> ElementSet {
    StructuralExtractor::new(language).extract(tree, source)
}

fn build_element(
    node: Node<'_>,
    source: &str,
    kind: ElementKind,
    name: String,
    parent_class: Option<String>,
) -> Element {
    Element {
        kind,
        name,
        source_text: node_text(node, source).to_string(),
        docstring: docstring(node, source),
        comments: comments(node, source),
        parent_class,
        start_line: node.start_position().row,
        end_line: node.end_position().row,
    }
}

fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

fn field_text(node: Node<'_>, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source).to_string())
}

/// Collects docstring candidates: string/comment children, plus a leading
/// string-literal statement in the node's `body`.
fn docstring(node: Node<'_>, source: &str) -> Option<String> {
    let mut parts = Vec::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if DOC_NODE_KINDS.contains(&child.kind()) {
            parts.push(strip_quotes(node_text(child, source)));
        }
    }

    if let Some(literal) = leading_body_string(node) {
        parts.push(strip_quotes(node_text(literal, source)));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

fn leading_body_string(node: Node<'_>) -> Option<Node<'_>> {
    let body = node.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let first = body.children(&mut cursor).next()?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let mut cursor = first.walk();
    let expr = first.children(&mut cursor).next()?;
    (expr.kind() == "string").then_some(expr)
}

/// Strips triple quotes (3 chars per side) or single/double quotes (1 char per side).
pub(crate) fn strip_quotes(raw: &str) -> String {
    let text = raw.trim();
    let width = if text.starts_with("\"\"\"") || text.starts_with("'''") {
        3
    } else if text.starts_with('"') || text.starts_with('\'') {
        1
    } else {
        return text.to_string();
    };

    let chars: Vec<char> = text.chars().collect();
    if chars.len() < width * 2 {
        return String::new();
    }
    chars[width..chars.len() - width]
        .iter()
        .collect::<String>()
        .trim()
        .to_string()
}

fn comments(node: Node<'_>, source: &str) -> Vec<String> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|child| COMMENT_NODE_KINDS.contains(&child.kind()))
        .map(|child| clean_comment(node_text(child, source)))
        .collect()
}

pub(crate) fn clean_comment(raw: &str) -> String {
    let text = raw.trim();
    if let Some(rest) = text.strip_prefix('#') {
        return rest.trim().to_string();
    }
    if let Some(rest) = text.strip_prefix("//") {
        return rest.trim().to_string();
    }
    text.to_string()
}
