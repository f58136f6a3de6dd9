//! StepOne Persona - synthetic customer interviews
//!
//! Founders practice customer-discovery interviews against a synthetic
//! persona over a streaming voice session. Replies come from a chain of
//! completion providers, falling back to a deterministic offline simulator.

mod backend;
mod cli;
mod config;
mod conversation;
mod error;
mod logging;
mod persona;
mod protocol;
mod server;
mod session;
mod version;

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use crate::cli::{Cli, Commands, ConfigSubcommand, PersonaSubcommand};
use crate::config::AppConfig;
use crate::conversation::{classify, select_voice, simulate_explained, stable_hash};
use crate::error::{Error, Result};
use crate::persona::{PersonaRegistry, PersonaSource};
use crate::server::SessionServer;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Serve { ref bind } => {
            let mut config = AppConfig::load(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.server.bind = bind.clone();
                config.validate()?;
            }

            // Guards must outlive the runtime so buffered log lines are flushed
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

            let build = version::build_info();
            info!(
                version = %build.full_version(),
                target = %build.target,
                profile = %build.profile,
                "Starting StepOne Persona"
            );

            serve(config)
        }
        command => {
            logging::init_simple(cli.verbose, cli.quiet)?;
            run_offline(command, cli.config.as_deref())
        }
    }
}

/// Run the interview server until Ctrl+C.
fn serve(config: AppConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("stepone-persona")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(async {
        let server = Arc::new(SessionServer::from_config(&config)?);

        let listener = TcpListener::bind(&config.server.bind)
            .await
            .map_err(|e| Error::ConnectionFailed {
                addr: config.server.bind.clone(),
                message: e.to_string(),
            })?;

        tokio::select! {
            result = server.run(listener) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    })
}

/// Commands that never touch the network.
fn run_offline(command: Commands, config_path: Option<&str>) -> Result<()> {
    match command {
        Commands::Simulate {
            persona,
            utterance,
            explain,
        } => {
            let registry = load_registry(config_path)?;
            let persona = registry.resolve(&persona)?;
            let reply = simulate_explained(&utterance, &persona);

            if explain {
                println!("style:    {}", classify(&utterance));
                println!("bucket:   {}", reply.bucket);
                println!("template: {}", reply.template_index);
                println!("hash:     {}", hex::encode(stable_hash(&utterance).to_be_bytes()));
                println!("reply:    {}", reply.text);
            } else {
                println!("{}", reply.text);
            }
        }
        Commands::Classify { utterance } => {
            println!("{}", classify(&utterance));
        }
        Commands::Voice { name, style } => {
            let profile = select_voice(&name, &style);
            println!("{} ({})", profile.voice, profile.rule.as_str());
        }
        Commands::Persona { subcommand } => handle_persona_command(subcommand, config_path)?,
        Commands::Config { subcommand } => handle_config_command(subcommand, config_path)?,
        Commands::Serve { .. } | Commands::Version => {
            return Err(Error::Internal("command requires the server runtime".to_string()));
        }
    }

    Ok(())
}

fn load_registry(config_path: Option<&str>) -> Result<PersonaRegistry> {
    let config = AppConfig::load(config_path)?;
    PersonaRegistry::load(config.persona_dir().as_deref())
}

fn handle_persona_command(subcommand: PersonaSubcommand, config_path: Option<&str>) -> Result<()> {
    let registry = load_registry(config_path)?;

    match subcommand {
        PersonaSubcommand::List => {
            println!("{:<20} {:<20} {:<28} SOURCE", "ID", "NAME", "ROLE");
            for listing in registry.list() {
                let source = match listing.source {
                    PersonaSource::Bundled => "bundled".to_string(),
                    PersonaSource::File(path) => path.display().to_string(),
                };
                println!("{:<20} {:<20} {:<28} {}", listing.id, listing.name, listing.role, source);
            }
        }
        PersonaSubcommand::Show { persona } => {
            let persona = registry.resolve(&persona)?;
            let json = serde_json::to_string_pretty(persona.as_ref())
                .map_err(|e| Error::Internal(format!("Failed to encode persona: {}", e)))?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn handle_config_command(subcommand: ConfigSubcommand, config_path: Option<&str>) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            let config = AppConfig::load(config_path)?;
            print!("{}", config.to_redacted_toml()?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate => {
            AppConfig::load(config_path)?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
