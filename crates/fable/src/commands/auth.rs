//! Sign-in commands: password, Google, LINE, registration, status, logout.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use fable_oauth::{
    CallbackGate, CallbackOutcome, CallbackParams, GoogleExchanger, GoogleLogin, LineLogin,
    PresetIdToken,
};
use fable_session::{RegisterData, RegisterOutcome, Session};
use serde::Serialize;

use super::{
    Context, oauth_error, password_or_prompt, print_json, print_user, read_line, session_error,
};

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Password (prompted for when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub display_name: Option<String>,

    /// Password (prompted for twice when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct GoogleArgs {
    /// ID token obtained from Google Identity Services
    #[arg(long)]
    pub id_token: String,
}

#[derive(Args, Debug)]
pub struct LineArgs {
    /// The URL LINE redirected to, answering the state from an earlier
    /// `fable line` run; read from stdin when omitted
    #[arg(long)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    signed_in: bool,
    backend: String,
    user: Option<&'a fable_client::UserProfile>,
}

fn report_session(session: &Session, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        return print_json(&session.user);
    }
    println!("Signed in as {}", session.user.display());
    if ctx.verbose {
        print_user(&session.user);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Password
// ─────────────────────────────────────────────────────────────────────────────

pub async fn login(args: LoginArgs, ctx: &Context) -> Result<()> {
    let password = password_or_prompt(args.password, "Password: ")?;
    let broker = ctx.broker()?;
    let session = broker
        .login_with_password(&args.email, &password)
        .await
        .map_err(session_error)?;
    report_session(&session, ctx)
}

pub async fn register(args: RegisterArgs, ctx: &Context) -> Result<()> {
    let (password, confirm_password) = match args.password {
        Some(password) => (password.clone(), password),
        None => (
            password_or_prompt(None, "Password: ")?,
            password_or_prompt(None, "Confirm password: ")?,
        ),
    };
    let data = RegisterData {
        email: args.email,
        password,
        confirm_password,
        username: args.username,
        display_name: args.display_name,
    };

    let broker = ctx.broker()?;
    match broker.register(&data).await.map_err(session_error)? {
        RegisterOutcome::Activated(session) => report_session(&session, ctx),
        RegisterOutcome::PendingVerification(email) => {
            if ctx.json_output {
                return print_json(&serde_json::json!({"pendingVerification": email}));
            }
            println!("Account created. Check {} for a verification link.", email);
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────────────────────────────────────

pub async fn google(args: GoogleArgs, ctx: &Context) -> Result<()> {
    let client_id = ctx
        .config
        .google
        .as_ref()
        .map(|g| g.client_id.clone())
        .unwrap_or_default();
    let exchanger = GoogleExchanger::new(Arc::new(PresetIdToken(args.id_token)), client_id);
    let login = GoogleLogin::new(exchanger, ctx.broker()?, ctx.notifier());

    let session = login.login().await.map_err(oauth_error)?;
    report_session(&session, ctx)
}

pub async fn line(args: LineArgs, ctx: &Context) -> Result<()> {
    ctx.config.require_line()?;
    let login = LineLogin::from_config(&ctx.config, ctx.broker()?, ctx.notifier())
        .map_err(oauth_error)?;

    // A supplied callback answers state issued by an earlier run; issuing
    // again here would overwrite it.
    let callback_url = match args.callback_url {
        Some(url) => url,
        None => {
            let auth_url = login.begin();
            println!("Open this URL in your browser:");
            println!();
            println!("  {}", auth_url);
            println!();
            println!("After approving, paste the full URL you were redirected to.");
            read_line("callback> ")?
        }
    };
    if callback_url.is_empty() {
        println!("No input provided, aborting.");
        return Ok(());
    }

    let params = CallbackParams::from_url(&callback_url).map_err(oauth_error)?;
    let gate = CallbackGate::new();
    match login.handle_callback(&gate, &params).await {
        CallbackOutcome::Succeeded { session, .. } => report_session(&session, ctx),
        CallbackOutcome::Failed { error, .. } => Err(oauth_error(error)),
        CallbackOutcome::Ignored => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

pub async fn status(ctx: &Context) -> Result<()> {
    let broker = ctx.broker()?;
    let session = broker.restore_session().await;

    if ctx.json_output {
        return print_json(&StatusOutput {
            signed_in: session.is_some(),
            backend: ctx.config.backend_url(),
            user: session.as_ref().map(|s| &s.user),
        });
    }

    match session {
        Some(session) => {
            println!("Signed in as {}", session.user.display());
            print_user(&session.user);
        }
        None => {
            println!("Not signed in");
            println!("  Run 'fable login' to sign in");
        }
    }
    Ok(())
}

pub async fn logout(ctx: &Context) -> Result<()> {
    let broker = ctx.broker()?;
    broker.clear_session().await.map_err(session_error)?;
    if !ctx.json_output {
        println!("Signed out.");
    }
    Ok(())
}
