//! Account maintenance: profile, password and email verification.

use anyhow::Result;
use clap::{Args, Subcommand};
use fable_client::ProfilePatch;

use super::{Context, password_or_prompt, print_json, print_user, session_error};

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: Option<ProfileCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Fetch the profile from the backend (default)
    Show,

    /// Change profile fields
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct PasswordArgs {
    #[command(subcommand)]
    pub command: PasswordCommand,
}

#[derive(Subcommand, Debug)]
pub enum PasswordCommand {
    /// Change the password of the signed-in account
    Change,

    /// Request a password reset email
    Forgot {
        #[arg(long)]
        email: String,
    },

    /// Set a new password using a reset token
    Reset {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(subcommand)]
    pub command: VerifyCommand,
}

#[derive(Subcommand, Debug)]
pub enum VerifyCommand {
    /// Confirm an email address with the token from the verification link
    Email {
        #[arg(long)]
        token: String,
    },

    /// Send the verification email again
    Resend {
        #[arg(long)]
        email: String,
    },
}

fn acknowledge(message: Option<String>, fallback: &str, ctx: &Context) -> Result<()> {
    let message = message.unwrap_or_else(|| fallback.to_string());
    if ctx.json_output {
        return print_json(&serde_json::json!({ "message": message }));
    }
    println!("{}", message);
    Ok(())
}

pub async fn profile(args: ProfileArgs, ctx: &Context) -> Result<()> {
    let broker = ctx.signed_in_broker().await?;

    let user = match args.command.unwrap_or(ProfileCommand::Show) {
        ProfileCommand::Show => broker.refresh_profile().await.map_err(session_error)?,
        ProfileCommand::Update {
            username,
            display_name,
            avatar_url,
            email,
        } => {
            let patch = ProfilePatch {
                username,
                display_name,
                avatar_url,
                email,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update. Pass at least one field.");
            }
            let user = broker.update_profile(&patch).await.map_err(session_error)?;
            ctx.notifier().success("Profile updated");
            user
        }
    };

    if ctx.json_output {
        return print_json(&user);
    }
    print_user(&user);
    Ok(())
}

pub async fn password(args: PasswordArgs, ctx: &Context) -> Result<()> {
    match args.command {
        PasswordCommand::Change => {
            let broker = ctx.signed_in_broker().await?;
            let current = password_or_prompt(None, "Current password: ")?;
            let new = password_or_prompt(None, "New password: ")?;
            broker
                .change_password(&current, &new)
                .await
                .map_err(session_error)?;
            ctx.notifier().success("Password changed");
            Ok(())
        }
        PasswordCommand::Forgot { email } => {
            let message = ctx
                .broker()?
                .forgot_password(&email)
                .await
                .map_err(session_error)?;
            acknowledge(message, "If that account exists, a reset email is on its way.", ctx)
        }
        PasswordCommand::Reset { token, password } => {
            let password = password_or_prompt(password, "New password: ")?;
            let message = ctx
                .broker()?
                .reset_password(&token, &password)
                .await
                .map_err(session_error)?;
            acknowledge(message, "Password reset. You can now sign in.", ctx)
        }
    }
}

pub async fn verify(args: VerifyArgs, ctx: &Context) -> Result<()> {
    let broker = ctx.broker()?;
    match args.command {
        VerifyCommand::Email { token } => {
            match broker.verify_email(&token).await.map_err(session_error)? {
                Some(session) if ctx.json_output => print_json(&session.user),
                Some(session) => {
                    println!("Email verified. Signed in as {}", session.user.display());
                    Ok(())
                }
                None => acknowledge(None, "Email verified. You can now sign in.", ctx),
            }
        }
        VerifyCommand::Resend { email } => {
            let message = broker
                .resend_verification(&email)
                .await
                .map_err(session_error)?;
            acknowledge(message, "Verification email sent.", ctx)
        }
    }
}
