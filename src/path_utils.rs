//! C1 — PathUtils: cross-platform path manipulation shared by every other component.

use std::path::{Path, PathBuf};

/// Strip the `\\?\` extended-length path prefix that Windows canonicalize adds.
pub fn clean_path(p: &str) -> String {
    p.strip_prefix(r"\\?\").unwrap_or(p).to_string()
}

/// Normalize path separators to `/` for stable cross-platform map keys
/// (e.g. `name@path` symbol keys, §3).
pub fn normalize_separators(p: &str) -> String {
    p.replace('\\', "/")
}

/// Read a file's bytes, falling back to lossy UTF-8 conversion if the content
/// is not valid UTF-8. Returns `(content, was_lossy)`.
pub fn read_file_lossy(path: &Path) -> std::io::Result<(String, bool)> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(s) => Ok((s, false)),
        Err(e) => Ok((String::from_utf8_lossy(e.as_bytes()).into_owned(), true)),
    }
}

/// The top-two directory components of a path, used by CodeIndex::discover_domain
/// (§4.2) and the QueryClassifier's module map (§4.9) to derive a "module" token.
pub fn module_token(path: &str) -> Option<String> {
    let clean = normalize_separators(&clean_path(path));
    let parts: Vec<&str> = clean
        .split('/')
        .filter(|p| !p.is_empty() && *p != "." && *p != "..")
        .collect();
    if parts.len() < 2 {
        return None;
    }
    // Drop the file name (last component); keep the last two directory segments.
    let dirs = &parts[..parts.len() - 1];
    if dirs.is_empty() {
        return None;
    }
    let start = dirs.len().saturating_sub(2);
    Some(dirs[start..].join("/"))
}

/// File stem (name without extension), used for filename/directory match
/// scoring in the SearchPipeline (§4.10 phase 1).
pub fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name including extension.
pub fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory component of a path (everything before the final segment).
pub fn dir_name(path: &str) -> String {
    let clean = normalize_separators(path);
    match clean.rfind('/') {
        Some(idx) => clean[..idx].to_string(),
        None => String::new(),
    }
}

/// Length of the common prefix between two lowercase strings, in characters.
/// Used by the filename-stem match heuristic in §4.10 (prefix ≥ 4 chars).
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x.eq_ignore_ascii_case(y))
        .count()
}

/// Collapse a path to a `PathBuf` with `.`/`..` segments resolved lexically
/// (no filesystem access — used for comparing persisted index roots).
pub fn lexical_normalize(path: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        use std::path::Component::*;
        match component {
            ParentDir => {
                out.pop();
            }
            CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_strips_prefix() {
        assert_eq!(clean_path(r"\\?\C:\Users\test"), r"C:\Users\test");
    }

    #[test]
    fn clean_path_no_prefix() {
        assert_eq!(clean_path(r"C:\Users\test"), r"C:\Users\test");
    }

    #[test]
    fn module_token_picks_last_two_dirs() {
        assert_eq!(
            module_token("src/parsers/cobol.rs"),
            Some("src/parsers".to_string())
        );
    }

    #[test]
    fn module_token_none_for_top_level_file() {
        assert_eq!(module_token("main.rs"), None);
    }

    #[test]
    fn file_stem_and_name() {
        assert_eq!(file_stem("a/b/Widget.java"), "Widget");
        assert_eq!(file_name("a/b/Widget.java"), "Widget.java");
    }

    #[test]
    fn common_prefix_len_case_insensitive() {
        assert_eq!(common_prefix_len("HashJoin", "hashjoinstate"), 8);
        assert_eq!(common_prefix_len("abc", "xyz"), 0);
    }

    #[test]
    fn dir_name_strips_filename() {
        assert_eq!(dir_name("a/b/c.rs"), "a/b");
        assert_eq!(dir_name("c.rs"), "");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn clean_path_idempotent(input in "\\PC{0,100}") {
            let once = clean_path(&input);
            let twice = clean_path(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn clean_path_no_prefix_in_output(input in "\\PC{0,100}") {
            let result = clean_path(&input);
            prop_assert!(!result.starts_with(r"\\?\"));
        }

        #[test]
        fn common_prefix_len_never_exceeds_shorter_string(
            a in "[a-zA-Z0-9]{0,30}",
            b in "[a-zA-Z0-9]{0,30}",
        ) {
            let len = common_prefix_len(&a, &b);
            prop_assert!(len <= a.chars().count());
            prop_assert!(len <= b.chars().count());
        }
    }
}
