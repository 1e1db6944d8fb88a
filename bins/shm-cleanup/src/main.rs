//! Orphan shared-memory listing and cleanup tool.
//!
//! A consumer process that crashes before calling `ShmRegion::destroy`
//! leaves its kernel shared-memory object (and registry entry) behind.
//! This binary lists and reclaims those: scanning `/dev/shm` directly on
//! Linux, probing the registry with a read-only `shm_open` on macOS, and
//! declining to enumerate anything on Windows (where the kernel reclaims
//! the object on its own once every handle closes).

use clap::Parser;

/// List or remove orphaned ringlog shared-memory regions.
#[derive(Parser)]
#[command(name = "shm-cleanup")]
struct Cli {
    /// List orphaned regions instead of removing any.
    #[arg(short = 'l', long)]
    list: bool,

    /// Operate on every region found, not just the ones named on the
    /// command line.
    #[arg(short = 'a', long)]
    all: bool,

    /// Remove a name even if it isn't present in the local registry
    /// (e.g. created by a process that predates this registry).
    #[arg(short = 'f', long)]
    force: bool,

    /// Only consider names beginning with this prefix (leading `/`
    /// stripped for comparison, matching how names are stored in `/dev/shm`).
    #[arg(short = 'p', long)]
    prefix: Option<String>,

    /// Explicit region names to remove. Ignored when `--all` is set.
    names: Vec<String>,
}

fn normalize(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

fn matches_prefix(name: &str, prefix: Option<&str>) -> bool {
    match prefix {
        None => true,
        Some(p) => name.strip_prefix('/').unwrap_or(name).starts_with(p),
    }
}

#[cfg(target_os = "linux")]
fn discover(prefix: Option<&str>) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir("/dev/shm")
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .map(|n| normalize(&n))
                .filter(|n| matches_prefix(n, prefix))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names.dedup();
    names
}

#[cfg(target_os = "macos")]
fn discover(prefix: Option<&str>) -> Vec<String> {
    use nix::fcntl::OFlag;
    use nix::sys::mman::shm_open;
    use nix::sys::stat::Mode;

    ringlog_shm::registered_names()
        .into_iter()
        .filter(|n| matches_prefix(n, prefix))
        .filter(|name| shm_open(name.as_str(), OFlag::O_RDONLY, Mode::empty()).is_ok())
        .collect()
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn discover(_prefix: Option<&str>) -> Vec<String> {
    Vec::new()
}

fn do_list(prefix: Option<&str>) {
    #[cfg(windows)]
    {
        println!("shm-cleanup: listing is not supported on this platform (objects are reclaimed automatically)");
        return;
    }
    #[cfg(not(windows))]
    {
        let names = discover(prefix);
        if names.is_empty() {
            println!("no orphaned regions found");
        }
        for name in names {
            println!("{name}");
        }
    }
}

/// Unlinks the kernel object (best-effort; absence is not an error) and
/// always removes the registry entry, matching the registry's own
/// create/destroy contract. Returns whether a live object was actually
/// removed.
fn remove_one(name: &str) -> bool {
    let unlinked = nix::sys::mman::shm_unlink(name).is_ok();
    ringlog_shm::deregister_name(name);
    unlinked
}

fn do_cleanup(cli: &Cli) -> i32 {
    let targets: Vec<String> = if cli.all {
        discover(cli.prefix.as_deref())
    } else {
        cli.names.iter().map(|n| normalize(n)).collect()
    };

    if targets.is_empty() {
        println!("nothing to clean up");
        return 0;
    }

    let registered = ringlog_shm::registered_names();
    let mut failures = 0;
    for name in &targets {
        if !cli.force && !cli.all && !registered.contains(name) {
            eprintln!("shm-cleanup: '{name}' is not in the registry; pass --force to remove it anyway");
            failures += 1;
            continue;
        }
        let removed = remove_one(name);
        if removed {
            println!("removed {name}");
        } else {
            println!("{name} was already gone; registry entry cleared");
        }
    }

    if failures > 0 { 1 } else { 0 }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.list {
        do_list(cli.prefix.as_deref());
        std::process::exit(0);
    }

    let code = do_cleanup(&cli);
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_leading_slash() {
        assert_eq!(normalize("foo"), "/foo");
        assert_eq!(normalize("/foo"), "/foo");
    }

    #[test]
    fn matches_prefix_strips_leading_slash_on_both_sides() {
        assert!(matches_prefix("/ringlog_shm", Some("ringlog")));
        assert!(!matches_prefix("/other_shm", Some("ringlog")));
        assert!(matches_prefix("/anything", None));
    }
}
