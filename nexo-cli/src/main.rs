// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Nexo CLI - unified access to LLM text-generation providers.
//!
//! # Examples
//!
//! ```bash
//! # Configure a provider and make it active
//! nexo configure openai --set api_key=sk-...
//! nexo use openai
//!
//! # Generate text, falling back across available providers
//! nexo generate "Rename these files by date"
//!
//! # Provider list and spend
//! nexo providers
//! nexo stats --format json --pretty
//!
//! # Monthly limit with alerts at 90%
//! nexo limit openai 20 --threshold 0.9
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use nexo_manager::ManagerError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, configure, generate, limit, providers, stats};

// ============================================================================
// CLI Definition
// ============================================================================

/// Nexo CLI - unified access to LLM providers.
#[derive(Parser)]
#[command(name = "nexo")]
#[command(about = "Unified access layer over LLM text-generation providers")]
#[command(long_about = r"
Nexo routes prompts to the active LLM provider, falls back across healthy
providers in priority order, redacts sensitive data before it leaves the
machine, and tracks spend against monthly limits.

Supported providers:
  • OpenAI-compatible (openai)
  • Anthropic (anthropic)
  • Ollama, local (ollama)

Examples:
  nexo generate 'Summarize this'     # Generate with fallback
  nexo configure openai --set api_key=sk-...
  nexo providers                     # Provider states
  nexo stats --format json           # Spend per provider
")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Keep the configuration key in the system keychain instead of a
    /// file (same as `NEXO_KEY_STORE=keychain`).
    #[arg(long, global = true)]
    pub keychain: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Generate text from a prompt.
    #[command(visible_alias = "g")]
    Generate(generate::GenerateArgs),

    /// List registered providers and their state.
    #[command(visible_alias = "p")]
    Providers,

    /// Show detailed status for one provider.
    Status {
        /// Provider name.
        name: String,
    },

    /// Store configuration fields for a provider.
    Configure(configure::ConfigureArgs),

    /// Make a provider the active one.
    Use {
        /// Provider name.
        name: String,
    },

    /// Remove a provider's stored configuration.
    Remove {
        /// Provider name.
        name: String,
    },

    /// Show spend and usage per provider.
    #[command(visible_alias = "s")]
    Stats,

    /// Set a monthly spend limit.
    Limit(limit::LimitArgs),

    /// Export, import or locate the configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Invalid input or configuration.
    ConfigError = 2,
    /// Unknown or unavailable provider.
    ProviderMissing = 3,
    /// Every provider failed.
    AllUnavailable = 4,
}

impl ExitCode {
    fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<ManagerError>() {
            Some(ManagerError::AllProvidersUnavailable { .. }) => Self::AllUnavailable,
            Some(ManagerError::ProviderNotFound(_) | ManagerError::ProviderUnavailable(_)) => {
                Self::ProviderMissing
            }
            Some(e) if e.is_config_error() => Self::ConfigError,
            _ => Self::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("nexo=debug,info")
        } else {
            EnvFilter::new("nexo=warn")
        }
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Generate(args) => generate::run(args, &cli).await,
        Commands::Providers => providers::list(&cli).await,
        Commands::Status { name } => providers::status(name, &cli).await,
        Commands::Configure(args) => configure::run(args, &cli).await,
        Commands::Use { name } => providers::activate(name, &cli).await,
        Commands::Remove { name } => providers::remove(name, &cli).await,
        Commands::Stats => stats::run(&cli).await,
        Commands::Limit(args) => limit::run(args, &cli).await,
        Commands::Config(args) => config::run(args, &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}
