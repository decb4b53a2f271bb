//! Serve command - run the backend proxy.

use anyhow::Result;
use clap::Args;
use fable_server::Server;

use super::Context;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides [server] bind)
    #[arg(long)]
    pub bind: Option<String>,
}

pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(bind) = args.bind {
        config.server.get_or_insert_with(Default::default).bind = Some(bind);
    }

    let server = Server::from_config(&config)?;
    if !ctx.json_output {
        println!(
            "Proxying http://{} -> {}",
            server.bind_address(),
            config.backend_url()
        );
    }
    server.run().await?;
    Ok(())
}
