//! Tree-sitter Node Kind Tables
//!
//! Per-language sets of declaration and import node kinds, sourced from each
//! grammar's `src/node-types.json`, plus the textual cleanup applied to import
//! nodes. Everything here is data keyed by language id.

/// Textual cleanup applied to the source text of one import node
#[derive(Debug, Clone, Copy)]
pub struct ImportCleanup {
    /// Stripped in order, each at most once, with whitespace trimmed between
    pub prefixes: &'static [&'static str],
    pub suffixes: &'static [&'static str],
    /// Removed wherever they occur
    pub remove: &'static [char],
    /// Trimmed from both ends after prefix/suffix stripping
    pub trim: &'static [char],
    pub collapse_whitespace: bool,
}

impl ImportCleanup {
    const fn none() -> Self {
        Self {
            prefixes: &[],
            suffixes: &[],
            remove: &[],
            trim: &[],
            collapse_whitespace: false,
        }
    }

    /// Returns `None` when nothing meaningful is left
    pub fn apply(&self, text: &str) -> Option<String> {
        let mut cleaned = text.trim();
        for prefix in self.prefixes {
            if let Some(rest) = cleaned.strip_prefix(*prefix) {
                cleaned = rest.trim_start();
            }
        }
        for suffix in self.suffixes {
            if let Some(rest) = cleaned.strip_suffix(*suffix) {
                cleaned = rest.trim_end();
            }
        }
        let cleaned = cleaned.trim_matches(self.trim).trim();

        let mut cleaned: String = cleaned
            .chars()
            .filter(|c| !self.remove.contains(c))
            .collect();
        if self.collapse_whitespace {
            cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        }

        let cleaned = cleaned.trim();
        if cleaned.is_empty() || cleaned == "(" || cleaned == ")" {
            None
        } else {
            Some(cleaned.to_string())
        }
    }
}

/// Node kinds that matter for context extraction in one language
#[derive(Debug, Clone, Copy)]
pub struct LanguageNodeKinds {
    pub functions: &'static [&'static str],
    pub types: &'static [&'static str],
    pub imports: &'static [&'static str],
    pub import_cleanup: ImportCleanup,
}

impl LanguageNodeKinds {
    /// Function-like or type-like: candidates for the enclosing declaration
    pub fn is_enclosing(&self, kind: &str) -> bool {
        self.functions.contains(&kind) || self.types.contains(&kind)
    }

    pub fn is_import(&self, kind: &str) -> bool {
        self.imports.contains(&kind)
    }
}

/// Map editor language ids onto the table key they share
pub fn canonical_language_id(language_id: &str) -> &str {
    match language_id {
        "javascriptreact" | "jsx" => "javascript",
        "typescriptreact" | "tsx" => "typescript",
        "shellscript" | "sh" | "zsh" => "bash",
        "c++" => "cpp",
        "cs" | "c#" => "csharp",
        other => other,
    }
}

/// Node kind table for a language id; `None` for unrecognized languages
pub fn node_kinds(language_id: &str) -> Option<&'static LanguageNodeKinds> {
    match canonical_language_id(language_id) {
        "go" => Some(&GO),
        "python" => Some(&PYTHON),
        "javascript" => Some(&JAVASCRIPT),
        "typescript" => Some(&TYPESCRIPT),
        "rust" => Some(&RUST),
        "java" => Some(&JAVA),
        "c" => Some(&C),
        "cpp" => Some(&CPP),
        "csharp" => Some(&CSHARP),
        "ruby" => Some(&RUBY),
        "lua" => Some(&LUA),
        "php" => Some(&PHP),
        "kotlin" => Some(&KOTLIN),
        "bash" => Some(&BASH),
        _ => None,
    }
}

const COLLAPSE: ImportCleanup = ImportCleanup {
    collapse_whitespace: true,
    ..ImportCleanup::none()
};

// =============================================================================
// Go - tree-sitter-go/src/node-types.json
// =============================================================================
// Only `import_spec`: grouped declarations would otherwise also be collected
// as one opaque `import (...)` blob.
const GO: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["function_declaration", "method_declaration"],
    types: &["type_spec", "struct_type"],
    imports: &["import_spec"],
    import_cleanup: ImportCleanup {
        remove: &['"', '`'],
        collapse_whitespace: true,
        ..ImportCleanup::none()
    },
};

// =============================================================================
// Python - tree-sitter-python/src/node-types.json
// =============================================================================
const PYTHON: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["function_definition"],
    types: &["class_definition"],
    imports: &["import_statement", "import_from_statement"],
    import_cleanup: COLLAPSE,
};

// =============================================================================
// JavaScript - tree-sitter-javascript/src/node-types.json
// =============================================================================
const JAVASCRIPT: LanguageNodeKinds = LanguageNodeKinds {
    functions: &[
        "function_declaration",
        "function_expression",
        "generator_function_declaration",
        "arrow_function",
        "method_definition",
    ],
    types: &["class_declaration", "class"],
    imports: &["import_statement"],
    import_cleanup: COLLAPSE,
};

// =============================================================================
// TypeScript - tree-sitter-typescript/tsx/src/node-types.json
// =============================================================================
const TYPESCRIPT: LanguageNodeKinds = LanguageNodeKinds {
    functions: &[
        "function_declaration",
        "function_expression",
        "generator_function_declaration",
        "arrow_function",
        "method_definition",
    ],
    types: &[
        "class_declaration",
        "abstract_class_declaration",
        "class",
        "interface_declaration",
        "enum_declaration",
    ],
    imports: &["import_statement"],
    import_cleanup: COLLAPSE,
};

// =============================================================================
// Rust - tree-sitter-rust/src/node-types.json
// =============================================================================
const RUST: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["function_item", "function_signature_item"],
    types: &[
        "struct_item",
        "enum_item",
        "union_item",
        "trait_item",
        "impl_item",
    ],
    imports: &["use_declaration", "extern_crate_declaration"],
    import_cleanup: ImportCleanup {
        prefixes: &["pub(crate) ", "pub ", "use ", "extern crate "],
        suffixes: &[";"],
        collapse_whitespace: true,
        ..ImportCleanup::none()
    },
};

// =============================================================================
// Java - tree-sitter-java/src/node-types.json
// =============================================================================
const JAVA: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["method_declaration", "constructor_declaration"],
    types: &[
        "class_declaration",
        "interface_declaration",
        "enum_declaration",
        "record_declaration",
    ],
    imports: &["import_declaration"],
    import_cleanup: ImportCleanup {
        prefixes: &["import ", "static "],
        suffixes: &[";"],
        ..ImportCleanup::none()
    },
};

// =============================================================================
// C - parsed with tree-sitter-cpp (superset), node kinds shared with C
// =============================================================================
const C: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["function_definition"],
    types: &["struct_specifier", "union_specifier", "enum_specifier"],
    imports: &["preproc_include"],
    import_cleanup: ImportCleanup {
        prefixes: &["#include"],
        trim: &['<', '>', '"'],
        ..ImportCleanup::none()
    },
};

// =============================================================================
// C++ - tree-sitter-cpp/src/node-types.json
// =============================================================================
const CPP: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["function_definition", "lambda_expression"],
    types: &[
        "class_specifier",
        "struct_specifier",
        "union_specifier",
        "enum_specifier",
    ],
    imports: &["preproc_include", "using_declaration"],
    import_cleanup: ImportCleanup {
        prefixes: &["#include", "using "],
        suffixes: &[";"],
        trim: &['<', '>', '"'],
        ..ImportCleanup::none()
    },
};

// =============================================================================
// C# - tree-sitter-c-sharp/src/node-types.json
// =============================================================================
const CSHARP: LanguageNodeKinds = LanguageNodeKinds {
    functions: &[
        "method_declaration",
        "constructor_declaration",
        "local_function_statement",
    ],
    types: &[
        "class_declaration",
        "interface_declaration",
        "struct_declaration",
        "record_declaration",
        "enum_declaration",
    ],
    imports: &["using_directive"],
    import_cleanup: ImportCleanup {
        prefixes: &["global ", "using ", "static "],
        suffixes: &[";"],
        ..ImportCleanup::none()
    },
};

// =============================================================================
// Ruby - tree-sitter-ruby/src/node-types.json
// =============================================================================
// `require` is an ordinary method call; there is no import node kind.
const RUBY: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["method", "singleton_method"],
    types: &["class", "module"],
    imports: &[],
    import_cleanup: ImportCleanup::none(),
};

// =============================================================================
// Lua - tree-sitter-lua/src/node-types.json
// =============================================================================
const LUA: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["function_declaration", "function_definition"],
    types: &[],
    imports: &[],
    import_cleanup: ImportCleanup::none(),
};

// =============================================================================
// PHP - tree-sitter-php/php/src/node-types.json
// =============================================================================
const PHP: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["function_definition", "method_declaration"],
    types: &[
        "class_declaration",
        "interface_declaration",
        "trait_declaration",
        "enum_declaration",
    ],
    imports: &["namespace_use_declaration"],
    import_cleanup: ImportCleanup {
        prefixes: &["use "],
        suffixes: &[";"],
        ..ImportCleanup::none()
    },
};

// =============================================================================
// Kotlin - fwcd/tree-sitter-kotlin/src/node-types.json
// =============================================================================
const KOTLIN: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["function_declaration", "anonymous_function"],
    types: &["class_declaration", "object_declaration"],
    imports: &["import_header"],
    import_cleanup: ImportCleanup {
        prefixes: &["import "],
        ..ImportCleanup::none()
    },
};

// =============================================================================
// Bash - tree-sitter-bash/src/node-types.json
// =============================================================================
const BASH: LanguageNodeKinds = LanguageNodeKinds {
    functions: &["function_definition"],
    types: &[],
    imports: &[],
    import_cleanup: ImportCleanup::none(),
};
