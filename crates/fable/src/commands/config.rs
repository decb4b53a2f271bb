//! Config command - show the effective configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::{Context, print_json};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged configuration as TOML
    Show,

    /// List the config files consulted, in precedence order
    Sources,
}

pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let mut config = ctx.config.clone();
            if let Some(line) = config.line.as_mut()
                && !line.channel_secret.is_empty()
            {
                line.channel_secret = "****".to_string();
            }
            if ctx.json_output {
                return print_json(&config);
            }
            print!("{}", config.to_toml()?);
            println!("# backend = {}", ctx.config.backend_url());
        }
        ConfigCommand::Sources => {
            for source in &ctx.sources {
                let mark = if source.loaded { "loaded" } else { "absent" };
                println!("{:>7}  {}", mark, source.path.display());
            }
        }
    }
    Ok(())
}
