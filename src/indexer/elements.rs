use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of an extracted or stored unit.
///
/// Only `Function`, `Method` and `Class` come out of structural extraction.
/// `Module` is produced by the whole-file fallback splitter; `Docstring` and
/// `Comment` are carried as element attributes and never indexed on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Function,
    Method,
    Class,
    Module,
    Docstring,
    Comment,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Module => "module",
            Self::Docstring => "docstring",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(Self::Function),
            "method" => Ok(Self::Method),
            "class" => Ok(Self::Class),
            "module" => Ok(Self::Module),
            "docstring" => Ok(Self::Docstring),
            "comment" => Ok(Self::Comment),
            other => Err(format!("unknown element kind: {other}")),
        }
    }
}

/// One structural unit found by a single traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub kind: ElementKind,
    pub name: String,
    /// Byte-exact slice of the original file.
    pub source_text: String,
    pub docstring: Option<String>,
    pub comments: Vec<String>,
    /// Set only for methods.
    pub parent_class: Option<String>,
    /// Zero-based.
    pub start_line: usize,
    /// Zero-based.
    pub end_line: usize,
}

/// Elements of one file in traversal (document) order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSet {
    elements: Vec<Element>,
}

impl ElementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.elements.iter()
    }

    pub fn of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(move |e| e.kind == kind)
    }

    pub fn functions(&self) -> impl Iterator<Item = &Element> {
        self.of_kind(ElementKind::Function)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Element> {
        self.of_kind(ElementKind::Method)
    }

    pub fn classes(&self) -> impl Iterator<Item = &Element> {
        self.of_kind(ElementKind::Class)
    }

    pub fn into_vec(self) -> Vec<Element> {
        self.elements
    }
}

impl From<Vec<Element>> for ElementSet {
    fn from(elements: Vec<Element>) -> Self {
        Self { elements }
    }
}

impl IntoIterator for ElementSet {
    type Item = Element;
    type IntoIter = std::vec::IntoIter<Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a ElementSet {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}
