//! Destination paths derived from a resolved file
//!
//! Pure functions, no I/O. Chain segments are joined in the order the
//! resolver produced them.

use std::path::{Path, PathBuf};

use super::ResolvedFile;

/// Join every ancestor id, then `<id>.<extension>`
pub fn id_path(file: &ResolvedFile, base: &Path) -> PathBuf {
    let mut path = base.to_path_buf();
    for pair in &file.ancestor_chain {
        path.push(safe_segment(&pair.id().to_string()));
    }

    let id = file.id.to_string();
    let leaf = match extension(&file.filename) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id,
    };
    path.push(safe_segment(&leaf));
    path
}

/// Join every ancestor name, then the filename
pub fn name_path(file: &ResolvedFile, base: &Path) -> PathBuf {
    let mut path = base.to_path_buf();
    for pair in &file.ancestor_chain {
        path.push(safe_segment(pair.name()));
    }
    path.push(safe_segment(&file.filename));
    path
}

/// Extension of a filename without the leading dot
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn extension(filename: &str) -> Option<&str> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
}

/// Keep a provider supplied name from escaping its directory
fn safe_segment(segment: &str) -> String {
    match segment {
        "" | "." | ".." => "_".to_string(),
        _ => segment.replace(['/', '\\'], "_"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::core::{FileSource, IdPathPair};

    fn file(id: &str, filename: &str, chain: Vec<IdPathPair>) -> ResolvedFile {
        ResolvedFile::new(id, filename, FileSource::get("https://example.com"))
            .with_ancestors(chain)
    }

    #[test]
    fn test_name_path_reproduces_folder_layout() {
        let f = file(
            "x",
            "a.png",
            vec![IdPathPair::new(1u64, "Photos"), IdPathPair::new(2u64, "2024")],
        );
        assert_eq!(name_path(&f, Path::new("")), PathBuf::from("Photos/2024/a.png"));
    }

    #[test]
    fn test_id_path_mixes_numeric_and_string_ids() {
        let f = file(
            "abc",
            "holiday.jpeg",
            vec![IdPathPair::new(1u64, "Photos"), IdPathPair::new("2f", "2024")],
        );
        assert_eq!(
            id_path(&f, Path::new("downloads")),
            PathBuf::from("downloads/1/2f/abc.jpeg")
        );
    }

    #[test]
    fn test_id_path_without_extension() {
        let f = file("abc", "README", vec![]);
        assert_eq!(id_path(&f, Path::new("out")), PathBuf::from("out/abc"));

        let dotfile = file("abc", ".bashrc", vec![]);
        assert_eq!(id_path(&dotfile, Path::new("out")), PathBuf::from("out/abc"));
    }

    #[test]
    fn test_id_path_uses_last_extension_only() {
        let f = file("abc", "backup.tar.gz", vec![]);
        assert_eq!(id_path(&f, Path::new("out")), PathBuf::from("out/abc.gz"));
    }

    #[test]
    fn test_id_paths_differ_for_distinct_files() {
        let base = Path::new("out");
        let a = file("1", "a.png", vec![IdPathPair::new("root", "Root")]);
        let b = file("2", "a.png", vec![IdPathPair::new("root", "Root")]);
        let c = file("1", "a.png", vec![IdPathPair::new("other", "Root")]);
        let d = file("1", "a.png", vec![]);

        let paths = [&a, &b, &c, &d].map(|f| id_path(f, base));
        for (i, left) in paths.iter().enumerate() {
            for right in paths.iter().skip(i + 1) {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn test_same_id_and_chain_share_destination() {
        let base = Path::new("out");
        let a = file("1", "a.png", vec![IdPathPair::new("root", "Root")]);
        let renamed = file("1", "renamed.png", vec![IdPathPair::new("root", "Renamed")]);
        assert_eq!(id_path(&a, base), id_path(&renamed, base));
    }

    #[test]
    fn test_names_cannot_escape_destination() {
        let f = file("1", "../../etc/passwd", vec![IdPathPair::new("r", "..")]);
        assert_eq!(name_path(&f, Path::new("out")), PathBuf::from("out/_/.._.._etc_passwd"));
    }
}
