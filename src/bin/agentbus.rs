use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use agentbus::{
    register_builtin_agent_factories, AgentFactoryRegistry, Coordinator, WorkflowConfig,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "agentbus", version, about = "Agent message bus CLI", author)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect registered agents
    Agents {
        #[command(subcommand)]
        command: AgentCommand,
    },
    /// Run a workflow file once
    Run {
        workflow: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Run a workflow file repeatedly on a fixed interval
    Schedule {
        workflow: PathBuf,
        #[arg(long, value_name = "SECONDS")]
        every: u64,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AgentCommand {
    List {
        #[arg(long, short, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init()
        .ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Agents { command } => match command {
            AgentCommand::List { format } => handle_agents_list(format)?,
        },
        Command::Run { workflow, output } => handle_run(workflow, output).await?,
        Command::Schedule {
            workflow,
            every,
            output_dir,
        } => handle_schedule(workflow, every, output_dir).await?,
    }
    Ok(())
}

fn default_agent_configs() -> Vec<(&'static str, Value)> {
    let mut configs = vec![
        (
            "echo",
            json!({
                "name": "echo",
                "description": "Echoes input back with uptime",
                "capabilities": ["echo", "uptime"]
            }),
        ),
        (
            "text_stats",
            json!({
                "name": "text_stats",
                "description": "Counts words and characters, converts case",
                "capabilities": ["text_analysis", "case_conversion"]
            }),
        ),
        (
            "data_file",
            json!({
                "name": "data_file",
                "description": "Reads and writes JSON data files",
                "capabilities": ["data_read", "data_write"]
            }),
        ),
    ];
    #[cfg(feature = "http-agent")]
    configs.push((
        "http_api",
        json!({
            "name": "http_api",
            "description": "Performs outbound HTTP API calls",
            "capabilities": ["api_request"]
        }),
    ));
    configs
}

fn setup_coordinator() -> anyhow::Result<Coordinator> {
    let mut factories = AgentFactoryRegistry::new();
    register_builtin_agent_factories(&mut factories);

    let coordinator = Coordinator::new();
    for (kind, config) in default_agent_configs() {
        let agent = factories.build(kind, Some(config))?;
        coordinator.register_agent(agent);
    }
    Ok(coordinator)
}

fn handle_agents_list(format: OutputFormat) -> anyhow::Result<()> {
    let coordinator = setup_coordinator()?;
    let descriptors = coordinator.descriptors();

    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = descriptors
                .iter()
                .map(|descriptor| {
                    json!({
                        "name": descriptor.name,
                        "version": descriptor.version,
                        "capabilities": descriptor.capabilities,
                        "description": descriptor.description,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Table => {
            println!(
                "{:<16} {:<10} {:<36} {}",
                "Name", "Version", "Capabilities", "Description"
            );
            for descriptor in &descriptors {
                println!(
                    "{:<16} {:<10} {:<36} {}",
                    descriptor.name,
                    descriptor.version,
                    descriptor.capabilities.join(", "),
                    descriptor.description
                );
            }
        }
    }
    Ok(())
}

async fn handle_run(workflow: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = WorkflowConfig::from_path(&workflow)?;
    let coordinator = setup_coordinator()?;

    let loop_task = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.start().await }
    });

    let results = config.build_workflow(coordinator.clone(), "cli").execute().await;
    coordinator.stop();
    loop_task.await??;
    let results = results?;

    let content = serde_json::to_string_pretty(&results)?;
    if let Some(path) = output {
        fs::write(&path, content)?;
        println!("Results saved to `{}`", path.display());
    } else {
        println!("{content}");
    }
    Ok(())
}

async fn handle_schedule(
    workflow: PathBuf,
    every: u64,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if every == 0 {
        anyhow::bail!("--every must be at least 1 second");
    }
    let config = WorkflowConfig::from_path(&workflow)?;
    if let Some(dir) = &output_dir {
        fs::create_dir_all(dir)?;
    }

    let coordinator = setup_coordinator()?;
    let loop_task = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.start().await }
    });

    println!("Running workflow every {every}s, press Ctrl-C to stop");
    let mut ticker = tokio::time::interval(Duration::from_secs(every));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match config.build_workflow(coordinator.clone(), "cli_scheduler").execute().await {
                    Ok(results) => save_scheduled_results(&results, output_dir.as_deref())?,
                    Err(err) => eprintln!("workflow run failed: {err}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    coordinator.stop();
    loop_task.await??;
    println!("Scheduler stopped");
    Ok(())
}

fn save_scheduled_results(results: &[Value], output_dir: Option<&std::path::Path>) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(results)?;
    match output_dir {
        Some(dir) => {
            let stamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let path = dir.join(format!("workflow_result_{stamp}.json"));
            fs::write(&path, content)?;
            println!("Results saved to `{}`", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}
