//! The on-disk orphan registry: a deduplicated, newline-delimited list of
//! region names this process (or another) has created, so the `shm-cleanup`
//! tool can find regions left behind by a crashed consumer.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

static REGISTRY_LOCK: Mutex<()> = Mutex::new(());

/// `~/.ringlog/shm_registry.txt` on POSIX, `%LOCALAPPDATA%\ringlog\shm_registry.txt`
/// on Windows. `None` if the platform's home/app-data directory can't be found.
pub fn registry_path() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        dirs::data_local_dir().map(|d| d.join("ringlog").join("shm_registry.txt"))
    }
    #[cfg(not(windows))]
    {
        dirs::home_dir().map(|d| d.join(".ringlog").join("shm_registry.txt"))
    }
}

fn read_names(path: &PathBuf) -> BTreeSet<String> {
    fs::read_to_string(path)
        .map(|s| {
            s.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Best-effort: a failure to persist the registry must never fail the
/// operation that triggered it (create/destroy of the region itself).
fn write_names(path: &PathBuf, names: &BTreeSet<String>) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            tracing::warn!(error = %e, path = %parent.display(), "failed to create registry directory");
            return;
        }
    }
    match fs::File::create(path) {
        Ok(mut f) => {
            for name in names {
                let _ = writeln!(f, "{name}");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "failed to write shm registry");
        }
    }
}

pub fn register_name(name: &str) {
    let Some(path) = registry_path() else { return };
    let _guard = REGISTRY_LOCK.lock().unwrap();
    let mut names = read_names(&path);
    names.insert(name.to_string());
    write_names(&path, &names);
}

pub fn deregister_name(name: &str) {
    let Some(path) = registry_path() else { return };
    let _guard = REGISTRY_LOCK.lock().unwrap();
    let mut names = read_names(&path);
    names.remove(name);
    write_names(&path, &names);
}

/// All names currently recorded in the registry, regardless of whether the
/// backing kernel object still exists. Used by the cleanup tool on
/// platforms (macOS) where `/dev/shm` can't be listed directly.
pub fn registered_names() -> Vec<String> {
    let Some(path) = registry_path() else {
        return Vec::new();
    };
    let _guard = REGISTRY_LOCK.lock().unwrap();
    read_names(&path).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_path_is_rooted_under_dot_ringlog() {
        if let Some(p) = registry_path() {
            assert!(p.to_string_lossy().contains("ringlog"));
            assert_eq!(p.file_name().unwrap(), "shm_registry.txt");
        }
    }
}
