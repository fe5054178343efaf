use clap::{Args, Subcommand};
use htb_api::api::user::User;
use htb_api::models::MISSING;
use miette::Result;

use super::{Context, OutputArgs};
use crate::output::{self, Column};

const CONNECTION_COLUMNS: [Column; 3] = [
    Column::new("TYPE", 16, "type"),
    Column::new("SERVER", 24, "server/friendly_name"),
    Column::new("IP", 0, "connection/ip4"),
];

#[derive(Args)]
pub struct UserCommand {
    #[command(subcommand)]
    action: UserAction,
}

#[derive(Subcommand)]
enum UserAction {
    /// Show the signed-in account
    Info(OutputArgs),
    /// Show your active VPN connections
    Connection(OutputArgs),
}

pub async fn run(args: UserCommand, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let user = User::new(&client);

    match args.action {
        UserAction::Info(out) => {
            if out.json {
                return output::print_json(&user.info().await?);
            }
            let info = user.whoami().await?;
            println!("Username:      {}", info.name);
            println!("ID:            {}", info.id);
            println!("Email:         {}", info.email.as_deref().unwrap_or(MISSING));
            println!("VIP:           {}", if info.is_vip { "Yes" } else { "No" });
            println!(
                "Subscription:  {}",
                info.subscription_type.as_deref().unwrap_or(MISSING)
            );
            println!("Verified:      {}", if info.verified { "Yes" } else { "No" });
            println!(
                "Timezone:      {}",
                info.timezone.as_deref().unwrap_or(MISSING)
            );
            if let Some(server_id) = info.server_id {
                println!("VPN server:    {}", server_id);
            }
        }
        UserAction::Connection(out) => {
            let value = user.connection_status().await?;
            if out.json {
                return output::print_json(&value);
            }
            let rows = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
            output::print_table(&CONNECTION_COLUMNS, rows, "No active connections.");
        }
    }

    Ok(())
}
