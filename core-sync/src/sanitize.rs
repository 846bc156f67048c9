//! # Filename Sanitizer
//!
//! Maps names that common destination filesystems (FAT32/exFAT, NTFS,
//! SMB shares) reject to a visually similar, safe variant.
//!
//! Each reserved character becomes an underscore followed by a full-width
//! homoglyph, so `AC/DC` turns into `AC_⧸DC`: still readable, and unlikely
//! to collide with a name that was already safe. Names ending in `.` get a
//! trailing `_`, and names longer than 255 characters are shortened while
//! keeping their extension.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Longest name, in Unicode code points, a path component may have.
pub const MAX_NAME_CHARS: usize = 255;

fn replacement(c: char) -> Option<&'static str> {
    Some(match c {
        '/' => "_⧸",
        '\\' => "_⧹",
        '?' => "_？",
        '%' => "_％",
        '*' => "_＊",
        ':' => "_：",
        '|' => "_｜",
        '"' => "_＂",
        '\'' => "_’",
        '<' => "_＜",
        '>' => "_＞",
        _ => return None,
    })
}

/// Sanitize a single path component.
///
/// Never call this on a whole path: separators are replaced too.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match replacement(c) {
            Some(safe) => out.push_str(safe),
            None => out.push(c),
        }
    }

    if out.ends_with('.') {
        out.push('_');
    }

    if out.chars().count() > MAX_NAME_CHARS {
        out = truncate(&out);
    }

    out
}

/// Shorten to exactly [`MAX_NAME_CHARS`] code points, keeping the extension
/// (the last `.` and everything after it) when there is room for it.
fn truncate(name: &str) -> String {
    let extension = name.rfind('.').map(|dot| &name[dot..]);
    let extension_chars = extension.map_or(0, |ext| ext.chars().count());

    match extension {
        Some(ext) if extension_chars < MAX_NAME_CHARS => {
            let stem_chars = MAX_NAME_CHARS - extension_chars;
            let mut out: String = name.chars().take(stem_chars).collect();
            out.push_str(ext);
            out
        }
        _ => {
            let mut out: String = name.chars().take(MAX_NAME_CHARS).collect();
            if out.ends_with('.') {
                out.pop();
                out.push('_');
            }
            out
        }
    }
}

/// Sanitize every normal component of a relative path.
///
/// Components that are not valid UTF-8 are converted lossily first.
pub fn sanitize_relative_path(path: &Path) -> PathBuf {
    path.components()
        .map(|component| match component {
            Component::Normal(name) => PathBuf::from(sanitize_os(name)),
            other => PathBuf::from(other.as_os_str()),
        })
        .collect()
}

fn sanitize_os(name: &OsStr) -> String {
    sanitize_filename(&name.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_characters() {
        assert_eq!(sanitize_filename("a/b?c"), "a_⧸b_？c");
        assert_eq!(
            sanitize_filename(r#"\%*:|"'<>"#),
            "_⧹_％_＊_：_｜_＂_’_＜_＞"
        );
    }

    #[test]
    fn test_safe_names_unchanged() {
        assert_eq!(sanitize_filename("01 - Intro.flac"), "01 - Intro.flac");
        assert_eq!(sanitize_filename("Sigur Rós – ( )"), "Sigur Rós – ( )");
        assert_eq!(sanitize_filename(""), "");
    }

    #[test]
    fn test_trailing_dot() {
        assert_eq!(sanitize_filename("name."), "name._");
        assert_eq!(sanitize_filename("Vol. 2..."), "Vol. 2..._");
    }

    #[test]
    fn test_long_name_keeps_extension() {
        let name = format!("{}.mp3", "a".repeat(300));
        let out = sanitize_filename(&name);

        assert_eq!(out.chars().count(), MAX_NAME_CHARS);
        assert!(out.ends_with(".mp3"));
        assert!(out.starts_with("aaa"));
    }

    #[test]
    fn test_long_name_counts_code_points() {
        let name = format!("{}.flac", "é".repeat(400));
        let out = sanitize_filename(&name);

        assert_eq!(out.chars().count(), MAX_NAME_CHARS);
        assert!(out.ends_with(".flac"));
    }

    #[test]
    fn test_long_name_without_extension() {
        let out = sanitize_filename(&"b".repeat(256));
        assert_eq!(out, "b".repeat(MAX_NAME_CHARS));
    }

    #[test]
    fn test_long_name_cut_on_dot() {
        let name = format!("{}.{}", "c".repeat(254), "d".repeat(300));
        let out = sanitize_filename(&name);

        assert_eq!(out.chars().count(), MAX_NAME_CHARS);
        assert!(out.ends_with('_'));
        assert!(!out.ends_with('.'));
    }

    #[test]
    fn test_replacements_count_toward_limit() {
        let name = format!("{}.ogg", "?".repeat(200));
        let out = sanitize_filename(&name);

        assert_eq!(out.chars().count(), MAX_NAME_CHARS);
        assert!(out.ends_with(".ogg"));
    }

    #[test]
    fn test_relative_path_per_component() {
        let path = Path::new("AC:DC").join("Who Made Who?").join("01 - Ride On.flac");
        let out = sanitize_relative_path(&path);

        let expected = Path::new("AC_：DC")
            .join("Who Made Who_？")
            .join("01 - Ride On.flac");
        assert_eq!(out, expected);
    }
}
