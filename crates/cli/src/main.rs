//! taskweave CLI: the main entry point.
//!
//! Commands:
//! - `run`     Run a configured agent on a task
//! - `agents`  List configured agents and the capabilities they receive
//! - `tools`   List the capability catalog
//! - `config`  Show the effective configuration, or write a default file

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "taskweave",
    about = "taskweave: goal-driven agents that act through capabilities",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agent on a task until it terminates
    Run {
        /// Name of the configured agent
        #[arg(short, long, default_value = "Coordinator")]
        agent: String,

        /// The task handed to the agent
        #[arg(short, long)]
        task: String,

        /// Override the agent's iteration ceiling
        #[arg(long)]
        max_iterations: Option<usize>,
    },

    /// List configured agents
    Agents,

    /// List the capability catalog
    Tools,

    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            agent,
            task,
            max_iterations,
        } => commands::run::run(agent, task, max_iterations).await?,
        Commands::Agents => commands::agents::run()?,
        Commands::Tools => commands::tools::run()?,
        Commands::Config { init } => commands::config_cmd::run(init)?,
    }

    Ok(())
}
