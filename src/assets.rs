//! Locating per-finding asset folders.

use std::fs;
use std::path::{Path, PathBuf};

/// Maps a finding identifier to its asset folder under `base`.
pub trait AssetResolver {
    fn resolve(&self, base: &Path, identifier: &str) -> Option<PathBuf>;
}

/// Folders named after the identifier, matched exactly first and then
/// case-insensitively.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectoryAssets;

impl AssetResolver for DirectoryAssets {
    fn resolve(&self, base: &Path, identifier: &str) -> Option<PathBuf> {
        let exact = base.join(identifier);
        if exact.is_dir() {
            return Some(exact);
        }
        let wanted = identifier.to_uppercase();
        let found = fs::read_dir(base)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .find(|p| {
                p.is_dir()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.to_uppercase() == wanted)
            });
        if found.is_none() {
            log::debug!("No asset folder for {identifier} under {}", base.display());
        }
        found
    }
}

fn looks_like_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| "CHMLI".contains(c.to_ascii_uppercase()))
        && !chars.as_str().is_empty()
        && chars.all(|c| c.is_ascii_digit())
}

fn has_identifier_folders(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(|e| e.ok()).any(|e| {
        e.path().is_dir() && e.file_name().to_str().is_some_and(looks_like_identifier)
    })
}

/// Find the directory that directly holds identifier-named folders:
/// `<dir>/POC`, then `<dir>` itself, then any immediate subdirectory.
pub fn discover_base(dir: &Path) -> Option<PathBuf> {
    let poc = dir.join("POC");
    if poc.is_dir() && has_identifier_folders(&poc) {
        return Some(poc);
    }
    if has_identifier_folders(dir) {
        return Some(dir.to_path_buf());
    }
    let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    subdirs.into_iter().find(|p| has_identifier_folders(p))
}
