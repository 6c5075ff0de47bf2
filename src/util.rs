//! Small shared helpers

use std::path::PathBuf;

use sha2::{Digest, Sha256};

/// Expand a leading `~` to the caller's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let path = path.trim();
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Truncate to at most `max_chars` codepoints. Zero means no limit.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return text;
    }
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncate to at most `max_chars` codepoints, appending `…` when cut.
pub fn truncate_chars_ellipsis(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let cut = truncate_chars(text, max_chars);
    if cut.len() < text.len() {
        format!("{}…", cut)
    } else {
        cut.to_string()
    }
}

/// Snap a byte index down to the nearest UTF-8 char boundary.
pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_counts_codepoints() {
        assert_eq!(truncate_chars("안녕하세요", 2), "안녕");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "abc");
    }

    #[test]
    fn test_truncate_ellipsis() {
        assert_eq!(truncate_chars_ellipsis("hello world", 5), "hello…");
        assert_eq!(truncate_chars_ellipsis("hi", 5), "hi");
    }

    #[test]
    fn test_floor_char_boundary() {
        let s = "a안b";
        // Index 2 lands inside the 3-byte Hangul syllable.
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 100), s.len());
    }

    #[test]
    fn test_sha256_hex_stable() {
        assert_eq!(sha256_hex(b"abc").len(), 64);
        assert_eq!(sha256_hex(b"abc"), sha256_hex(b"abc"));
        assert_ne!(sha256_hex(b"abc"), sha256_hex(b"abd"));
    }

    #[test]
    fn test_expand_home_passthrough() {
        assert_eq!(expand_home("/tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(expand_home("  relative.txt "), PathBuf::from("relative.txt"));
    }
}
