use clap::{Args, Subcommand};
use htb_api::api::sherlocks::Sherlocks;
use htb_api::models;
use miette::Result;

use super::{Context, OutputArgs, PageArgs, resolve_id};
use crate::output::{self, Column};

const LIST_COLUMNS: [Column; 5] = [
    Column::new("ID", 6, "id"),
    Column::new("NAME", 24, "name"),
    Column::new("CATEGORY", 14, "category_name"),
    Column::new("DIFFICULTY", 10, "difficulty"),
    Column::new("SOLVES", 0, "solves"),
];

const INFO_FIELDS: [(&str, &str); 6] = [
    ("Name", "name"),
    ("ID", "id"),
    ("Category", "category_name"),
    ("Difficulty", "difficulty"),
    ("Released", "release_date"),
    ("Description", "description"),
];

#[derive(Args)]
pub struct SherlocksCommand {
    #[command(subcommand)]
    action: SherlocksAction,
}

#[derive(Subcommand)]
enum SherlocksAction {
    /// List sherlocks
    List(ListArgs),
    /// Show sherlock details
    Info(InfoArgs),
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    paging: PageArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct InfoArgs {
    /// Sherlock ID or name
    sherlock: String,

    #[command(flatten)]
    output: OutputArgs,
}

pub async fn run(args: SherlocksCommand, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let sherlocks = Sherlocks::new(&client);

    match args.action {
        SherlocksAction::List(list) => {
            let value = sherlocks.list(list.paging.page, list.paging.per_page).await?;
            if list.output.json {
                return output::print_json(&value);
            }
            output::print_table(
                &LIST_COLUMNS,
                models::listing_items(&value),
                "No sherlocks found.",
            );
        }
        SherlocksAction::Info(info) => {
            let id = resolve_id(&info.sherlock, &sherlocks).await?;
            let value = sherlocks.info(&id.to_string()).await?;
            let text =
                output::render_detail(&value, info.output.json, "data", "sherlock", &INFO_FIELDS)?;
            print!("{text}");
        }
    }

    Ok(())
}
