use std::path::{Path, PathBuf};

pub fn absolute_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        get_current_dir().join(path)
    }
}

pub fn get_current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Walks from `start` towards the filesystem root and returns the first existing file
/// that matches one of `candidates` (relative to the visited directory).
pub fn find_in_ancestors(start: &Path, candidates: &[&str]) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        candidates
            .iter()
            .map(|candidate| dir.join(candidate))
            .find(|path| path.is_file())
    })
}
