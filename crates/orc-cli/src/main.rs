use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::sync::Arc;

mod approval;
mod cli;
mod observer;
mod registry;

use cli::{Cli, Commands, SessionCommands};
use observer::TracingObserver;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let workspace_root = cli.cd.canonicalize().unwrap_or(cli.cd.clone());
    let config_path = cli.config.clone().unwrap_or_else(|| workspace_root.join("orchestra.json"));

    let config = orc_config::ProjectConfig::load(&config_path)
        .with_context(|| format!("loading project config from {}", config_path.display()))?;

    let observer: Arc<dyn orc_core::events::EngineObserver> = Arc::new(TracingObserver);
    observer.on_config_loaded(&config_path.display().to_string());

    let registry = registry::built_in_registry();
    let role_adapters = orc_scheduler::build_role_adapters(&config, &registry)
        .context("resolving agents.* adapter chains from the project config")?;

    let adapters: std::collections::HashMap<_, _> = role_adapters
        .into_iter()
        .map(|(role, chain)| (role, Arc::new(chain.with_observer(observer.clone())) as Arc<dyn orc_adapter::Adapter>))
        .collect();

    let approval: Arc<dyn orc_engine::ApprovalHandler> = if cli.interactive {
        Arc::new(approval::StdinApproval)
    } else {
        Arc::new(orc_engine::AutoApprove)
    };

    let engine = orc_engine::PipelineEngine::new(
        workspace_root,
        config,
        adapters,
        observer,
        approval,
        cli.interactive,
    );

    match cli.command {
        Commands::Run { task, pipeline } => {
            let task = read_task(task)?;
            let session = if pipeline { engine.run_pipeline(&task).await } else { engine.run(&task).await }
                .context("running the orchestration pipeline")?;
            report(&session)
        }
        Commands::Resume { session_id } => {
            let session = engine.resume(&session_id).await.context("resuming session")?;
            report(&session)
        }
        Commands::Session { cmd } => match cmd {
            SessionCommands::List => {
                for id in engine.store().list_sessions()? {
                    match engine.store().load(&id) {
                        Ok(handle) => println!("{id}\t{:?}\titeration {}", handle.session().phase, handle.session().iteration),
                        Err(e) => println!("{id}\t<unreadable: {e}>"),
                    }
                }
                Ok(())
            }
        },
    }
}

/// Read the task description from the CLI argument, or stdin if omitted,
/// e.g. `echo "create hello.py" | orc run`.
fn read_task(task: Option<String>) -> Result<String> {
    if let Some(task) = task {
        anyhow::ensure!(!task.trim().is_empty(), "empty task provided");
        return Ok(task);
    }

    use std::io::IsTerminal;
    anyhow::ensure!(
        !std::io::stdin().is_terminal(),
        "no task provided and stdin is a terminal.\n\nUsage:\n  orc run \"create hello.py that prints Hello\"\n  echo \"task\" | orc run"
    );
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    anyhow::ensure!(!buffer.trim().is_empty(), "empty task from stdin");
    Ok(buffer)
}

fn report(session: &orc_session::SessionHandle) -> Result<()> {
    let phase = session.session().phase;
    println!("session {}: {phase:?}", session.session().session_id);
    if let Some(error) = &session.session().last_error {
        eprintln!("last error: {error}");
    }
    if let Some(code) = phase.exit_code() {
        std::process::exit(code as i32);
    }
    Ok(())
}
