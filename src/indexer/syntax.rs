use super::languages::LanguageTag;
use thiserror::Error;
use tree_sitter::{Parser, Tree};

/// Errors raised while turning source text into a syntax tree.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("grammar rejected by tree-sitter: {0}")]
    Grammar(String),

    #[error("parser produced no tree")]
    NoTree,
}

/// Source text → syntax tree capability.
pub trait SyntaxParser: Send + Sync {
    fn parse(&self, source: &str, language: LanguageTag) -> Result<Tree, ParseError>;
}

/// Tree-sitter backed parser. Stateless; a `tree_sitter::Parser` is built per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeSitterParser;

impl TreeSitterParser {
    pub fn new() -> Self {
        Self
    }
}

impl SyntaxParser for TreeSitterParser {
    fn parse(&self, source: &str, language: LanguageTag) -> Result<Tree, ParseError> {
        let grammar = language
            .grammar()
            .ok_or_else(|| ParseError::UnsupportedLanguage(language.to_string()))?;

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| ParseError::Grammar(e.to_string()))?;

        parser.parse(source, None).ok_or(ParseError::NoTree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_python() {
        let tree = TreeSitterParser::new()
            .parse("def f():\n    pass\n", LanguageTag::Python)
            .unwrap();
        assert_eq!(tree.root_node().kind(), "module");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_parse_unsupported() {
        let err = TreeSitterParser::new()
            .parse("whatever", LanguageTag::Unsupported)
            .unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_every_grammar_loads() {
        let parser = TreeSitterParser::new();
        for tag in LanguageTag::ALL {
            assert!(parser.parse("", tag).is_ok(), "{tag} grammar should load");
        }
    }
}
