//! Tree-sitter parse service
//!
//! One mutex-guarded `Parser` per grammar. Parsing is synchronous and CPU
//! bound; async callers run it on the blocking pool.

use std::collections::HashMap;
use std::sync::Mutex;

use tree_sitter::{Language, Parser, Tree};

use crate::error::ParseError;
use crate::infra::ast::node_types::canonical_language_id;

/// Incremental parse capability consumed by the document store
pub trait ParseService: Send + Sync {
    /// Parse `text`, reusing `previous` when it has been edited to match.
    ///
    /// Unsupported language ids yield `Ok(None)`.
    fn parse(
        &self,
        language_id: &str,
        previous: Option<&Tree>,
        text: &str,
    ) -> Result<Option<Tree>, ParseError>;

    fn supports(&self, language_id: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Grammar {
    Go,
    Python,
    JavaScript,
    // TSX grammar is a superset and handles both .ts and .tsx
    TypeScript,
    Rust,
    Java,
    // C sources go through the C++ grammar
    Cpp,
    CSharp,
    Ruby,
    Lua,
    Php,
    Kotlin,
    Bash,
}

impl Grammar {
    const ALL: [Grammar; 13] = [
        Self::Go,
        Self::Python,
        Self::JavaScript,
        Self::TypeScript,
        Self::Rust,
        Self::Java,
        Self::Cpp,
        Self::CSharp,
        Self::Ruby,
        Self::Lua,
        Self::Php,
        Self::Kotlin,
        Self::Bash,
    ];

    fn from_language_id(language_id: &str) -> Option<Self> {
        match canonical_language_id(language_id) {
            "go" => Some(Self::Go),
            "python" => Some(Self::Python),
            "javascript" => Some(Self::JavaScript),
            "typescript" => Some(Self::TypeScript),
            "rust" => Some(Self::Rust),
            "java" => Some(Self::Java),
            "c" | "cpp" => Some(Self::Cpp),
            "csharp" => Some(Self::CSharp),
            "ruby" => Some(Self::Ruby),
            "lua" => Some(Self::Lua),
            "php" => Some(Self::Php),
            "kotlin" => Some(Self::Kotlin),
            "bash" => Some(Self::Bash),
            _ => None,
        }
    }

    fn language(self) -> Language {
        match self {
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Self::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Self::Ruby => tree_sitter_ruby::LANGUAGE.into(),
            Self::Lua => tree_sitter_lua::LANGUAGE.into(),
            Self::Php => tree_sitter_php::LANGUAGE_PHP.into(),
            Self::Kotlin => tree_sitter_kotlin_sg::LANGUAGE.into(),
            Self::Bash => tree_sitter_bash::LANGUAGE.into(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Rust => "rust",
            Self::Java => "java",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Lua => "lua",
            Self::Php => "php",
            Self::Kotlin => "kotlin",
            Self::Bash => "bash",
        }
    }
}

pub struct TreeSitterParser {
    parsers: HashMap<Grammar, Mutex<Parser>>,
}

impl TreeSitterParser {
    pub fn new() -> Result<Self, ParseError> {
        let parsers = Grammar::ALL
            .iter()
            .map(|&grammar| Ok((grammar, Mutex::new(Self::create_parser(grammar)?))))
            .collect::<Result<HashMap<_, _>, ParseError>>()?;
        Ok(Self { parsers })
    }

    fn create_parser(grammar: Grammar) -> Result<Parser, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&grammar.language())
            .map_err(|e| ParseError::Grammar {
                language: grammar.name().to_string(),
                message: e.to_string(),
            })?;
        Ok(parser)
    }
}

impl ParseService for TreeSitterParser {
    fn parse(
        &self,
        language_id: &str,
        previous: Option<&Tree>,
        text: &str,
    ) -> Result<Option<Tree>, ParseError> {
        let Some(grammar) = Grammar::from_language_id(language_id) else {
            return Ok(None);
        };
        let Some(parser) = self.parsers.get(&grammar) else {
            return Ok(None);
        };

        let mut parser = parser
            .lock()
            .map_err(|_| ParseError::Poisoned(grammar.name().to_string()))?;

        parser
            .parse(text, previous)
            .map(Some)
            .ok_or_else(|| ParseError::Failed(grammar.name().to_string()))
    }

    fn supports(&self, language_id: &str) -> bool {
        Grammar::from_language_id(language_id).is_some()
    }
}
