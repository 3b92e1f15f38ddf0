use clap::{Parser, Subcommand};

/// Build version string combining Cargo.toml version and git describe.
fn build_version() -> &'static str {
    static VERSION: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    VERSION.get_or_init(|| {
        let cargo_ver = env!("CARGO_PKG_VERSION");
        let git_desc = env!("ORC_GIT_DESCRIBE");
        if git_desc.is_empty() {
            cargo_ver.to_string()
        } else {
            format!("{cargo_ver} ({git_desc})")
        }
    })
}

#[derive(Parser)]
#[command(name = "orc", version = build_version())]
#[command(about = "Orchestration Engine: Architect -> Executor -> Auditor -> Consultant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root the session store and generated files live under.
    #[arg(long, global = true, default_value = ".")]
    pub cd: std::path::PathBuf,

    /// Path to the project config JSON (defaults to `<cd>/orchestra.json`).
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Prompt for plan approval on the terminal instead of auto-approving.
    #[arg(long, global = true)]
    pub interactive: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a fresh run for a task and drive it to a terminal phase.
    Run {
        /// Task description. Read from stdin if omitted.
        task: Option<String>,

        /// Use the per-file pipelined mode instead of batch-by-phase.
        #[arg(long)]
        pipeline: bool,
    },
    /// Resume a non-terminal session from its persisted phase.
    Resume {
        /// Session id, as printed by `orc run` or `orc session list`.
        session_id: String,
    },
    /// List sessions recorded under the workspace's session store.
    Session {
        #[command(subcommand)]
        cmd: SessionCommands,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List known sessions and their current phase.
    List,
}
