//! CLI command handlers.

pub mod account;
pub mod auth;
pub mod config;
pub mod progress;
pub mod serve;

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use fable_client::{Notifier, SharedNotifier, UserProfile};
use fable_config::{ConfigSource, FableConfig};
use fable_oauth::OAuthError;
use fable_session::{SessionBroker, SessionError};
use serde::Serialize;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration, CLI overrides applied.
    pub config: FableConfig,
    /// Config files that were consulted.
    pub sources: Vec<ConfigSource>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn broker(&self) -> Result<Arc<SessionBroker>> {
        let broker = SessionBroker::from_config(&self.config).map_err(session_error)?;
        Ok(Arc::new(broker))
    }

    /// A broker with the stored session restored, or an error if there is none.
    pub async fn signed_in_broker(&self) -> Result<Arc<SessionBroker>> {
        let broker = self.broker()?;
        if broker.restore_session().await.is_none() {
            anyhow::bail!("Not signed in. Run 'fable login' first.");
        }
        Ok(broker)
    }

    pub fn notifier(&self) -> SharedNotifier {
        Arc::new(ConsoleNotifier {
            quiet: self.json_output,
        })
    }
}

/// Prints notifications to the terminal.
#[derive(Debug)]
pub struct ConsoleNotifier {
    quiet: bool,
}

impl Notifier for ConsoleNotifier {
    fn success(&self, message: &str) {
        if !self.quiet {
            println!("✓ {}", message);
        }
    }

    fn error(&self, message: &str) {
        eprintln!("✗ {}", message);
    }
}

/// Reduce a session error to what the user should see.
pub fn session_error(e: SessionError) -> anyhow::Error {
    tracing::debug!(kind = ?e.kind(), error = %e, "Command failed");
    match e.field() {
        Some(field) => anyhow::anyhow!("{}: {}", field, e.user_message()),
        None => anyhow::anyhow!(e.user_message()),
    }
}

pub fn oauth_error(e: OAuthError) -> anyhow::Error {
    tracing::debug!(kind = ?e.kind(), error = %e, "Command failed");
    anyhow::anyhow!(e.user_message())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_user(user: &UserProfile) {
    println!("  Name:     {}", user.display());
    println!("  Email:    {}", user.email);
    if let Some(username) = &user.username {
        println!("  Username: @{}", username);
    }
    if user.role.is_staff() {
        println!("  Role:     {} (staff)", user.role);
    } else {
        println!("  Role:     {}", user.role);
    }
    println!("  Status:   {}", user.status);
    println!(
        "  Verified: {}",
        if user.email_verified { "yes" } else { "no" }
    );
    println!(
        "  Balance:  {} coins, {} earnings",
        user.coin_balance, user.earnings_balance
    );
}

/// Read one trimmed line from stdin after printing `prompt`.
pub fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Use the given password or prompt for one without echo.
pub fn password_or_prompt(given: Option<String>, prompt: &str) -> Result<String> {
    match given {
        Some(password) => Ok(password),
        None => Ok(rpassword::prompt_password(prompt)?),
    }
}
