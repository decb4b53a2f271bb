//! Fable - sign-in, session and backend proxy tooling
//!
//! Main entry point for the Fable CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{account, auth, config, progress, serve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Fable - sign-in, session and backend proxy tooling
#[derive(Parser)]
#[command(name = "fable")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Backend URL (default: http://localhost:8080)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Directory for the session record and OAuth state
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the backend proxy server
    Serve(serve::ServeArgs),

    /// Sign in with email and password
    Login(auth::LoginArgs),

    /// Create an account
    Register(auth::RegisterArgs),

    /// Sign in with a Google ID token
    Google(auth::GoogleArgs),

    /// Sign in with LINE
    Line(auth::LineArgs),

    /// Show the signed-in user
    Status,

    /// Sign out and forget the stored session
    Logout,

    /// View or edit the profile
    Profile(account::ProfileArgs),

    /// Change, forget or reset the password
    Password(account::PasswordArgs),

    /// Email verification
    Verify(account::VerifyArgs),

    /// Report reading progress for a chapter
    Progress(progress::ProgressArgs),

    /// Configuration inspection
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "fable=debug,fable_client=debug,fable_session=debug,fable_oauth=debug,fable_server=debug,fable_config=debug,info"
    } else {
        "fable=info,fable_client=warn,fable_session=warn,fable_oauth=warn,fable_server=info,warn"
    };

    let log_dir = fable_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "fable.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "fable=trace,fable_client=trace,fable_session=trace,fable_oauth=trace,fable_server=trace,fable_config=trace,info",
                )),
        )
        .init();

    let loaded = fable_config::load_config(None)?;
    let mut config = loaded.config;
    if let Some(url) = cli.backend {
        config.backend.get_or_insert_with(Default::default).url = Some(url);
    }
    if let Some(dir) = cli.data_dir {
        config.session.get_or_insert_with(Default::default).data_dir = Some(dir);
    }

    let ctx = commands::Context {
        config,
        sources: loaded.sources,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Login(args) => auth::login(args, &ctx).await,
        Commands::Register(args) => auth::register(args, &ctx).await,
        Commands::Google(args) => auth::google(args, &ctx).await,
        Commands::Line(args) => auth::line(args, &ctx).await,
        Commands::Status => auth::status(&ctx).await,
        Commands::Logout => auth::logout(&ctx).await,
        Commands::Profile(args) => account::profile(args, &ctx).await,
        Commands::Password(args) => account::password(args, &ctx).await,
        Commands::Verify(args) => account::verify(args, &ctx).await,
        Commands::Progress(args) => progress::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx),
    }
}
