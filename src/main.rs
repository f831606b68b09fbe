use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use switchboard_agent::SessionController;
use switchboard_core::config::AppConfig;
use switchboard_core::types::{SessionEvent, SessionRequest, SpecialistId};
use switchboard_gateway::{GatewayServer, HealthProber};
use switchboard_llm::{create_generator, GenerationAdapter};
use switchboard_specialist::SpecialistService;

#[derive(Parser)]
#[command(name = "switchboard", version, about = "Routes questions to specialist models and streams the answer")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "switchboard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve,
    /// Run one specialist service (agent_math, agent_coding, agent_creative)
    Specialist {
        /// Specialist identifier
        id: String,
    },
    /// Run a single session locally and print its events
    Ask {
        /// The request text; read from stdin when omitted
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Probe every configured specialist
    Health,
    /// Show effective configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("switchboard=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "switchboard", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let controller = Arc::new(build_controller(&config)?);
            info!(
                bind = %config.gateway.bind,
                evaluation = %config.session.evaluation,
                max_refine_passes = config.session.max_refine_passes,
                "Starting gateway"
            );
            let server = GatewayServer::new(config.gateway.clone(), controller);
            server.run(shutdown_on_ctrl_c("gateway")).await?;
        }
        Commands::Specialist { id } => {
            let id: SpecialistId = id.parse()?;
            let sc = config.specialists.get(id);
            let listen = sc
                .listen_addr()
                .with_context(|| format!("no listen address for {}", id))?;

            let generator = create_generator(&config.generation, &sc.model)?;
            let adapter = GenerationAdapter::new(generator, config.generation.timeout());
            let service = SpecialistService::new(id, adapter, &sc.model, &listen)?;
            service.run(shutdown_on_ctrl_c("specialist")).await?;
        }
        Commands::Ask { text } => {
            let text = if text.is_empty() {
                io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                text.join(" ")
            };
            let request = SessionRequest::new(text)?;
            let controller = Arc::new(build_controller(&config)?);
            info!(evaluation = %config.session.evaluation, "Running session");

            let mut events = controller.start(request, shutdown_on_ctrl_c("session"));
            while let Some(event) = events.recv().await {
                print_event(&event);
            }
        }
        Commands::Health => {
            let controller = build_controller(&config)?;
            let prober = HealthProber::new(
                controller.registry().clone(),
                Duration::from_secs(config.gateway.health_timeout_secs),
            );
            let report = prober.report().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn load_config(path: &PathBuf) -> anyhow::Result<AppConfig> {
    if path.exists() {
        let config = AppConfig::load(path)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    } else {
        warn!(path = %path.display(), "Config file not found, using built-in defaults");
        let config = AppConfig::default();
        config.validate()?;
        Ok(config)
    }
}

fn build_controller(config: &AppConfig) -> anyhow::Result<SessionController> {
    let generator = create_generator(&config.generation, &config.generation.model)?;
    info!(
        provider = %config.generation.provider,
        model = %config.generation.model,
        "Generation capability ready"
    );
    Ok(SessionController::from_config(config, generator))
}

fn shutdown_on_ctrl_c(what: &'static str) -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down {}...", what);
        cancel_clone.cancel();
    });
    cancel
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::SpecialistAnswer { specialist, text } => {
            println!("[{}] {}", specialist.label(), text)
        }
        SessionEvent::Error { text } => eprintln!("[error] {}", text),
        other => println!("[{}] {}", other.kind(), other.text()),
    }
}
