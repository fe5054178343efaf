use clap::{Args, Subcommand};
use htb_api::api::pwnbox::Pwnbox;
use htb_api::models::MISSING;
use miette::Result;

use super::{Context, OutputArgs};
use crate::output;

#[derive(Args)]
pub struct PwnboxCommand {
    #[command(subcommand)]
    action: PwnboxAction,
}

#[derive(Subcommand)]
enum PwnboxAction {
    /// Show the running Pwnbox instance
    Status(OutputArgs),
    /// Terminate the running Pwnbox instance
    Terminate(OutputArgs),
}

pub async fn run(args: PwnboxCommand, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let pwnbox = Pwnbox::new(&client);

    match args.action {
        PwnboxAction::Status(out) => {
            if out.json {
                return output::print_json(&pwnbox.info().await?);
            }
            let status = pwnbox.status().await?;
            println!("Status:   {}", status.status.as_deref().unwrap_or(MISSING));
            println!("Version:  {}", status.version.as_deref().unwrap_or(MISSING));
            println!("Region:   {}", status.region.as_deref().unwrap_or(MISSING));
            println!("IP:       {}", status.ip.as_deref().unwrap_or(MISSING));
        }
        PwnboxAction::Terminate(out) => {
            let value = pwnbox.terminate().await?;
            if out.json {
                return output::print_json(&value);
            }
            output::print_message(&value);
        }
    }

    Ok(())
}
