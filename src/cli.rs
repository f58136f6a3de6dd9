//! CLI argument parsing using clap v4

use clap::{Parser, Subcommand};

/// StepOne Persona - synthetic customer interviews for idea validation
///
/// Serves voice interview sessions with a synthetic customer persona and
/// offers offline tools to inspect how the persona would react.
#[derive(Parser, Debug)]
#[command(name = "stepone-persona")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, env = "STEPONE_CONFIG", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the WebSocket interview server
    Serve {
        /// Override the bind address (e.g. 0.0.0.0:8000)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Print the offline simulator's reply to an utterance
    Simulate {
        /// Persona id from the registry, or a path to a persona file
        #[arg(short, long)]
        persona: String,

        /// What the founder says
        utterance: String,

        /// Also show the topic bucket and template chosen
        #[arg(long)]
        explain: bool,
    },

    /// Print the question style of an utterance
    Classify {
        utterance: String,
    },

    /// Print the voice chosen for a persona name and style
    Voice {
        #[arg(short, long)]
        name: String,

        #[arg(short, long, default_value = "")]
        style: String,
    },

    /// Persona registry
    Persona {
        #[command(subcommand)]
        subcommand: PersonaSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PersonaSubcommand {
    /// List bundled and user personas
    List,

    /// Show one persona as JSON
    Show {
        /// Persona id, or a path to a persona file
        persona: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration (API keys masked)
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration
    Validate,
}
