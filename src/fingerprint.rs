//! Corpus content fingerprinting.
//!
//! Computes a single SHA-256 digest over every corpus file so any change
//! to the file set, to a filename, or to file bytes is detectable with
//! one comparison. Filenames are sorted before hashing, so the digest
//! does not depend on filesystem enumeration order.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Digest returned for a missing or empty corpus directory. A real digest
/// is always 64 hex characters, so this can never collide with one.
pub const EMPTY_CORPUS: &str = "";

/// Hash the full corpus under `dir`, considering only regular files with
/// the given extension (matched case-insensitively, no leading dot).
///
/// Corpus identity is the sorted (filename, bytes) list, so each file
/// contributes its name followed by a NUL delimiter and then its bytes.
/// The delimiter keeps a rename distinguishable from a content edit and
/// pins the boundaries between adjacent files. Returns [`EMPTY_CORPUS`]
/// if the directory does not exist or contains no matching files. Pure
/// with respect to the filesystem: no writes, no network.
pub fn corpus_fingerprint(dir: &Path, extension: &str) -> Result<String> {
    let files = list_corpus_files(dir, extension)?;
    if files.is_empty() {
        return Ok(EMPTY_CORPUS.to_string());
    }

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);

        let mut file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open corpus file: {}", path.display()))?;
        loop {
            let n = file
                .read(&mut buf)
                .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// List regular corpus files under `dir`, sorted by filename.
///
/// The sort is load-bearing: both the fingerprint and the indexing order
/// derive document identity from it.
pub fn list_corpus_files(dir: &Path, extension: &str) -> Result<Vec<std::path::PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list corpus directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_directory_yields_sentinel() {
        let fp = corpus_fingerprint(Path::new("/nonexistent/corpus"), "pdf").unwrap();
        assert_eq!(fp, EMPTY_CORPUS);
    }

    #[test]
    fn test_empty_directory_yields_sentinel() {
        let tmp = TempDir::new().unwrap();
        let fp = corpus_fingerprint(tmp.path(), "pdf").unwrap();
        assert_eq!(fp, EMPTY_CORPUS);
    }

    #[test]
    fn test_non_matching_extensions_ignored() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "hello").unwrap();
        let fp = corpus_fingerprint(tmp.path(), "pdf").unwrap();
        assert_eq!(fp, EMPTY_CORPUS);
    }

    #[test]
    fn test_order_independent_of_creation_order() {
        let a = TempDir::new().unwrap();
        std::fs::write(a.path().join("one.pdf"), b"first contents").unwrap();
        std::fs::write(a.path().join("two.pdf"), b"second contents").unwrap();

        let b = TempDir::new().unwrap();
        std::fs::write(b.path().join("two.pdf"), b"second contents").unwrap();
        std::fs::write(b.path().join("one.pdf"), b"first contents").unwrap();

        let fp_a = corpus_fingerprint(a.path(), "pdf").unwrap();
        let fp_b = corpus_fingerprint(b.path(), "pdf").unwrap();
        assert_eq!(fp_a, fp_b);
        assert_eq!(fp_a.len(), 64);
    }

    #[test]
    fn test_content_sensitive() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("doc.pdf"), b"original").unwrap();
        let before = corpus_fingerprint(tmp.path(), "pdf").unwrap();

        std::fs::write(tmp.path().join("doc.pdf"), b"originaX").unwrap();
        let after = corpus_fingerprint(tmp.path(), "pdf").unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_rename_changes_fingerprint() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("faq.pdf"), b"same bytes").unwrap();
        let before = corpus_fingerprint(tmp.path(), "pdf").unwrap();

        std::fs::rename(tmp.path().join("faq.pdf"), tmp.path().join("warranty.pdf")).unwrap();
        let after = corpus_fingerprint(tmp.path(), "pdf").unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_byte_shift_across_file_boundary_detected() {
        // Same filenames, same concatenated bytes, different split.
        let a = TempDir::new().unwrap();
        std::fs::write(a.path().join("one.pdf"), b"ab").unwrap();
        std::fs::write(a.path().join("two.pdf"), b"c").unwrap();

        let b = TempDir::new().unwrap();
        std::fs::write(b.path().join("one.pdf"), b"a").unwrap();
        std::fs::write(b.path().join("two.pdf"), b"bc").unwrap();

        let fp_a = corpus_fingerprint(a.path(), "pdf").unwrap();
        let fp_b = corpus_fingerprint(b.path(), "pdf").unwrap();
        assert_ne!(fp_a, fp_b);
    }

    #[test]
    fn test_file_set_sensitive() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.pdf"), b"contents").unwrap();
        let before = corpus_fingerprint(tmp.path(), "pdf").unwrap();

        std::fs::write(tmp.path().join("b.pdf"), b"more").unwrap();
        let after = corpus_fingerprint(tmp.path(), "pdf").unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_listing_sorted_by_filename() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("zeta.pdf"), b"z").unwrap();
        std::fs::write(tmp.path().join("alpha.pdf"), b"a").unwrap();
        std::fs::write(tmp.path().join("mid.pdf"), b"m").unwrap();

        let names: Vec<String> = list_corpus_files(tmp.path(), "pdf")
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alpha.pdf", "mid.pdf", "zeta.pdf"]);
    }
}
