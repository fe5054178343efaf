use clap::{Args, Subcommand};
use htb_api::api::prolabs::{Prolabs, prolab_rows};
use miette::Result;

use super::{Context, OutputArgs, PageArgs, resolve_id};
use crate::output::{self, Column};

const LIST_COLUMNS: [Column; 4] = [
    Column::new("ID", 6, "id"),
    Column::new("NAME", 20, "name"),
    Column::new("MACHINES", 9, "pro_machines_count"),
    Column::new("FLAGS", 0, "pro_flags_count"),
];

const INFO_FIELDS: [(&str, &str); 6] = [
    ("Name", "name"),
    ("ID", "id"),
    ("Machines", "pro_machines_count"),
    ("Flags", "pro_flags_count"),
    ("Entry points", "entry_points"),
    ("Description", "description"),
];

#[derive(Args)]
pub struct ProlabsCommand {
    #[command(subcommand)]
    action: ProlabsAction,
}

#[derive(Subcommand)]
enum ProlabsAction {
    /// List pro labs
    List(ListArgs),
    /// Show pro lab details
    Info(TargetArgs),
    /// Show your VPN connection to a pro lab
    Status(TargetArgs),
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    paging: PageArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct TargetArgs {
    /// Pro lab ID or name
    prolab: String,

    #[command(flatten)]
    output: OutputArgs,
}

pub async fn run(args: ProlabsCommand, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let prolabs = Prolabs::new(&client);

    match args.action {
        ProlabsAction::List(list) => {
            let value = prolabs.list(list.paging.page, list.paging.per_page).await?;
            if list.output.json {
                return output::print_json(&value);
            }
            output::print_table(&LIST_COLUMNS, prolab_rows(&value), "No pro labs found.");
        }
        ProlabsAction::Info(target) => {
            let id = resolve_id(&target.prolab, &prolabs).await?;
            let value = prolabs.info(id).await?;
            let text =
                output::render_detail(&value, target.output.json, "data", "pro lab", &INFO_FIELDS)?;
            print!("{text}");
        }
        ProlabsAction::Status(target) => {
            let id = resolve_id(&target.prolab, &prolabs).await?;
            let value = prolabs.connection_status(id).await?;
            if target.output.json {
                return output::print_json(&value);
            }
            match value.get("data") {
                Some(data) if !data.is_null() => output::print_fields(
                    data,
                    &[
                        ("Server", "server/friendly_name"),
                        ("IP", "connection/ip4"),
                        ("Connected", "connection/name"),
                    ],
                ),
                // 400 responses carry only a message
                _ => output::print_message(&value),
            }
        }
    }

    Ok(())
}
