use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use intent_core::config::PipelineContext;
use tracing_subscriber::EnvFilter;

/// Canonicalize the root path if possible, falling back to the given string
/// relative to the current working directory.
pub fn canonicalize_or_current(root: &str) -> Result<PathBuf> {
    let path = Path::new(root);
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        // Try to canonicalize; if it fails (e.g., path does not yet exist),
        // join it with the current dir to get an absolute path.
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Resolve `root` and load its pipeline context.
pub fn load_context(root: &str) -> Result<PipelineContext> {
    let root_path = canonicalize_or_current(root)?;
    PipelineContext::from_root(&root_path)
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `verbose`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}

/// Print a `category: count` table, one per line, indented.
pub fn print_distribution<'a>(counts: impl IntoIterator<Item = (&'a String, &'a usize)>) {
    let mut any = false;
    for (category, count) in counts {
        any = true;
        println!("  {category:<17} {count}");
    }
    if !any {
        println!("  (none)");
    }
}
