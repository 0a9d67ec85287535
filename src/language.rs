//! C2 — LanguageDetector: map extension → language tag; detect binary/non-code.

use std::path::Path;

/// A language tag recognized by the parsers (C3) and the vocabulary table (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    C,
    Cpp,
    Java,
    Kotlin,
    Scala,
    CSharp,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    Ruby,
    Php,
    Swift,
    Cobol,
    Tal,
    Sql,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Kotlin => "kotlin",
            Self::Scala => "scala",
            Self::CSharp => "csharp",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Swift => "swift",
            Self::Cobol => "cobol",
            Self::Tal => "tal",
            Self::Sql => "sql",
        }
    }

    /// Whether this language's call-body scanning uses brace-depth (true)
    /// or indentation (false, Python) per §4.1.
    pub fn uses_brace_bodies(&self) -> bool {
        !matches!(self, Self::Python)
    }
}

/// Extensions recognized as source code, per §6's vocabulary table.
/// `cbl`/`cob`/`cpy` → COBOL, `tal` → TAL, `sql`/`ddl`/`plsql` → SQL.
const EXTENSION_TABLE: &[(&str, Language)] = &[
    ("c", Language::C),
    ("h", Language::C),
    ("cpp", Language::Cpp),
    ("cc", Language::Cpp),
    ("hpp", Language::Cpp),
    ("cxx", Language::Cpp),
    ("java", Language::Java),
    ("kt", Language::Kotlin),
    ("scala", Language::Scala),
    ("cs", Language::CSharp),
    ("py", Language::Python),
    ("pyw", Language::Python),
    ("js", Language::JavaScript),
    ("jsx", Language::JavaScript),
    ("mjs", Language::JavaScript),
    ("cjs", Language::JavaScript),
    ("ts", Language::TypeScript),
    ("tsx", Language::TypeScript),
    ("go", Language::Go),
    ("rs", Language::Rust),
    ("rb", Language::Ruby),
    ("php", Language::Php),
    ("swift", Language::Swift),
    ("cbl", Language::Cobol),
    ("cob", Language::Cobol),
    ("cpy", Language::Cobol),
    ("tal", Language::Tal),
    ("sql", Language::Sql),
    ("ddl", Language::Sql),
    ("plsql", Language::Sql),
];

/// Extensions recognized but explicitly excluded from parsing/search (§6):
/// binary formats and non-code text that would only pollute the indexes.
const EXCLUDED_EXTENSIONS: &[&str] = &[
    "md", "json", "yaml", "yml", "txt", "po", "css", "lock", "png", "jpg",
    "jpeg", "gif", "ico", "woff", "woff2", "ttf", "eot", "pdf", "zip",
    "tar", "gz", "exe", "dll", "so", "dylib", "class", "jar", "pyc",
];

/// Detect the language for a path by its extension. Returns `None` for
/// excluded/non-code extensions or unrecognized extensions.
pub fn detect_language(path: &str) -> Option<Language> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase();
    if EXCLUDED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    EXTENSION_TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

/// Whether a path should be skipped entirely (non-code, binary, or a
/// recognized build file per §4.10's skip-file predicate) unless its
/// filename contains a keyword the caller is searching for.
pub fn is_excluded_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    if let Some(ext) = Path::new(&lower).extension().and_then(|e| e.to_str())
        && EXCLUDED_EXTENSIONS.contains(&ext)
    {
        return true;
    }
    const BUILD_FILES: &[&str] = &[
        "makefile",
        "cmakelists.txt",
        "meson.build",
        "package.json",
        "package-lock.json",
        "cargo.toml",
        "cargo.lock",
        "tsconfig.json",
        "go.sum",
    ];
    let name = crate::path_utils::file_name(&lower);
    BUILD_FILES.iter().any(|b| name == *b)
}

/// Heuristic binary-content sniff: a NUL byte in the first 8KB, matching
/// the common "binary file" detection used by grep-like tools.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let sniff_len = bytes.len().min(8192);
    bytes[..sniff_len].contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_languages() {
        assert_eq!(detect_language("a/b.rs"), Some(Language::Rust));
        assert_eq!(detect_language("a/b.py"), Some(Language::Python));
        assert_eq!(detect_language("a/b.cbl"), Some(Language::Cobol));
        assert_eq!(detect_language("a/b.TAL"), Some(Language::Tal));
        assert_eq!(detect_language("a/b.sql"), Some(Language::Sql));
        assert_eq!(detect_language("a/b.tsx"), Some(Language::TypeScript));
    }

    #[test]
    fn excludes_non_code() {
        assert_eq!(detect_language("README.md"), None);
        assert_eq!(detect_language("data.json"), None);
        assert_eq!(detect_language("image.png"), None);
    }

    #[test]
    fn unknown_extension_is_none() {
        assert_eq!(detect_language("a.xyz123"), None);
    }

    #[test]
    fn excluded_path_matches_build_files() {
        assert!(is_excluded_path("project/Cargo.toml"));
        assert!(is_excluded_path("project/Makefile"));
        assert!(!is_excluded_path("project/src/main.rs"));
    }

    #[test]
    fn binary_sniff_detects_nul_byte() {
        assert!(looks_binary(b"abc\0def"));
        assert!(!looks_binary(b"abcdef"));
    }

    #[test]
    fn python_uses_indentation_not_braces() {
        assert!(!Language::Python.uses_brace_bodies());
        assert!(Language::Rust.uses_brace_bodies());
    }
}
