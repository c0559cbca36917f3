use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tree_sitter::Language;

/// Languages the structural extractor knows how to walk.
///
/// Anything else maps to [`LanguageTag::Unsupported`], which parses to nothing
/// and extracts to an empty element set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageTag {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Ruby,
    Cpp,
    CSharp,
    Kotlin,
    Rust,
    Unsupported,
}

/// Node-kind mapping used by the extractor for one grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageSpec {
    pub class_kind: &'static str,
    pub function_kind: &'static str,
    /// Field holding a function's identifier.
    pub name_field: &'static str,
    /// Field holding a class's identifier (differs for Rust `impl` blocks).
    pub class_name_field: &'static str,
}

impl LanguageSpec {
    /// Python-shaped node names, used for grammars without an explicit table entry.
    pub const DEFAULT: LanguageSpec = LanguageSpec {
        class_kind: "class_definition",
        function_kind: "function_definition",
        name_field: "name",
        class_name_field: "name",
    };

    const fn simple(class_kind: &'static str, function_kind: &'static str) -> Self {
        Self {
            class_kind,
            function_kind,
            name_field: "name",
            class_name_field: "name",
        }
    }
}

impl LanguageTag {
    pub const ALL: [LanguageTag; 10] = [
        LanguageTag::Python,
        LanguageTag::JavaScript,
        LanguageTag::TypeScript,
        LanguageTag::Java,
        LanguageTag::Go,
        LanguageTag::Ruby,
        LanguageTag::Cpp,
        LanguageTag::CSharp,
        LanguageTag::Kotlin,
        LanguageTag::Rust,
    ];

    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "py" => Self::Python,
            "js" | "jsx" | "mjs" => Self::JavaScript,
            "ts" | "tsx" => Self::TypeScript,
            "java" => Self::Java,
            "go" => Self::Go,
            "rb" => Self::Ruby,
            "cpp" | "cc" | "cxx" | "hpp" => Self::Cpp,
            "cs" => Self::CSharp,
            "kt" | "kts" => Self::Kotlin,
            "rs" => Self::Rust,
            _ => Self::Unsupported,
        }
    }

    /// Case-insensitive lookup by name; unknown names are `Unsupported`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "python" => Self::Python,
            "javascript" => Self::JavaScript,
            "typescript" => Self::TypeScript,
            "java" => Self::Java,
            "go" => Self::Go,
            "ruby" => Self::Ruby,
            "cpp" | "c++" => Self::Cpp,
            "csharp" | "c#" => Self::CSharp,
            "kotlin" => Self::Kotlin,
            "rust" => Self::Rust,
            _ => Self::Unsupported,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Go => "go",
            Self::Ruby => "ruby",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Kotlin => "kotlin",
            Self::Rust => "rust",
            Self::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    /// Node-kind table for this tag. `None` for `Unsupported`.
    pub fn spec(&self) -> Option<LanguageSpec> {
        let spec = match self {
            Self::Python => LanguageSpec::DEFAULT,
            Self::JavaScript | Self::TypeScript => {
                LanguageSpec::simple("class_declaration", "function_declaration")
            }
            Self::Java | Self::CSharp => {
                LanguageSpec::simple("class_declaration", "method_declaration")
            }
            Self::Go => LanguageSpec::simple("type_declaration", "function_declaration"),
            Self::Ruby => LanguageSpec::simple("class", "method"),
            Self::Cpp => LanguageSpec::simple("class_specifier", "function_definition"),
            Self::Kotlin => LanguageSpec::simple("class_declaration", "function_declaration"),
            Self::Rust => LanguageSpec {
                class_kind: "impl_item",
                function_kind: "function_item",
                name_field: "name",
                class_name_field: "type",
            },
            Self::Unsupported => return None,
        };
        Some(spec)
    }

    /// Tree-sitter grammar for this tag. `None` for `Unsupported`.
    pub fn grammar(&self) -> Option<Language> {
        let language = match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Ruby => tree_sitter_ruby::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Self::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Self::Kotlin => tree_sitter_kotlin_ng::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Unsupported => return None,
        };
        Some(language)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LanguageTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}
