use anyhow::Result;
use binary_intent::commands::{
    build_command, collect_command, extract_command, init_command, label_command, status_command,
    CollectArgs,
};
use binary_intent::init_logging;
use clap::{Parser, Subcommand};

/// Binary intent dataset pipeline.
///
/// Stages run in order: `collect` finds binaries, `extract` runs external
/// tools over them, `label` records a human judgement per binary, and `build`
/// joins the two into a training dataset. Every stage reads and writes JSON
/// artifacts under `<root>/data`.
#[derive(Parser, Debug)]
#[command(
    name = "binary-intent",
    version,
    about = "Collect, describe, and label binaries into a training dataset",
    long_about = None
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the workspace directories and write a default `.intent/pipeline.json`.
    Init {
        /// Workspace root. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Overwrite an existing config.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Scan directories for binaries and write `data/collected_binaries.json`.
    Collect {
        /// How many binaries to collect (overrides `discovery.max_count`).
        count: Option<usize>,

        /// Workspace root. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Directory to scan; repeatable. Replaces `discovery.roots`.
        #[arg(long = "dir")]
        dirs: Vec<String>,

        /// Emit the artifact as JSON instead of progress lines.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Extract symbols, strings, and code counts for every collected binary.
    Extract {
        /// Workspace root. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Re-extract binaries that already have a feature record.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Per-tool timeout in seconds; 0 waits forever.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Label extracted binaries interactively.
    Label {
        /// Workspace root. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Also review binaries that already have a label.
        #[arg(long, default_value_t = false)]
        relabel: bool,
    },

    /// Join features and labels into `data/training_dataset.json`.
    Build {
        /// Workspace root. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Emit the build report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show what each stage has produced so far.
    Status {
        /// Workspace root. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Init { root, force } => init_command(&root, force)?,
        Command::Collect { count, root, dirs, json } => {
            collect_command(&root, CollectArgs { count, dirs, json })?
        }
        Command::Extract { root, force, timeout_secs } => {
            extract_command(&root, force, timeout_secs)?
        }
        Command::Label { root, relabel } => label_command(&root, relabel)?,
        Command::Build { root, json } => build_command(&root, json)?,
        Command::Status { root, json } => status_command(&root, json)?,
    }

    Ok(())
}
