use std::path::PathBuf;

use clap::{Args, Subcommand};
use htb_api::api::challenges::{ChallengeFilter, Challenges, category_items};
use htb_api::models;
use miette::{IntoDiagnostic, Result};
use serde_json::Value;

use super::{Context, OutputArgs, PageArgs, resolve_id};
use crate::output::{self, Column};

const LIST_COLUMNS: [Column; 5] = [
    Column::new("ID", 6, "id"),
    Column::new("NAME", 24, "name"),
    Column::new("CATEGORY", 14, "category_name"),
    Column::new("DIFFICULTY", 10, "difficulty"),
    Column::new("SOLVES", 0, "solves"),
];

const INFO_FIELDS: [(&str, &str); 8] = [
    ("Name", "name"),
    ("ID", "id"),
    ("Category", "category_name"),
    ("Difficulty", "difficulty"),
    ("Points", "points"),
    ("Solves", "solves"),
    ("Creator", "creator_name"),
    ("Released", "release_date"),
];

const CATEGORY_COLUMNS: [Column; 2] = [Column::new("ID", 6, "id"), Column::new("NAME", 0, "name")];

#[derive(Args)]
pub struct ChallengesCommand {
    #[command(subcommand)]
    action: ChallengesAction,
}

#[derive(Subcommand)]
enum ChallengesAction {
    /// List challenges, optionally filtered
    List(ListArgs),
    /// Show challenge details
    Info(TargetArgs),
    /// List challenge categories
    Categories(OutputArgs),
    /// Start a challenge instance
    Start(TargetArgs),
    /// Stop a challenge instance
    Stop(TargetArgs),
    /// Submit a challenge flag
    Submit(SubmitArgs),
    /// Download the challenge files
    Download(DownloadArgs),
}

#[derive(Args)]
struct ListArgs {
    /// Category ID or name (whole words, e.g. "pwn" does not match "GamePwn")
    #[arg(long)]
    category: Option<String>,

    /// Difficulty filter (easy, medium, hard, insane)
    #[arg(long)]
    difficulty: Option<String>,

    #[command(flatten)]
    paging: PageArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct TargetArgs {
    /// Challenge ID or name
    challenge: String,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct SubmitArgs {
    /// Challenge ID or name
    challenge: String,

    /// The flag to submit
    flag: String,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct DownloadArgs {
    /// Challenge ID or name
    challenge: String,

    /// Where to write the archive (defaults to `<id>.zip` in the current directory)
    #[arg(long, short)]
    out: Option<PathBuf>,
}

pub async fn run(args: ChallengesCommand, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let challenges = Challenges::new(&client);

    match args.action {
        ChallengesAction::List(list) => {
            let category = match list.category {
                Some(ref token) => Some(challenges.resolve_category(token).await?.id),
                None => None,
            };
            let filter = ChallengeFilter {
                difficulty: list.difficulty,
                category,
            };
            let value = challenges
                .list(list.paging.page, list.paging.per_page, &filter)
                .await?;
            if list.output.json {
                return output::print_json(&value);
            }
            output::print_table(
                &LIST_COLUMNS,
                models::listing_items(&value),
                "No challenges found.",
            );
        }
        ChallengesAction::Info(target) => {
            let id = resolve_id(&target.challenge, &challenges).await?;
            let value = challenges.info(&id.to_string()).await?;
            if target.output.json {
                return output::print_json(&value);
            }
            let challenge = models::require_object(&value, "challenge", "challenge")?;
            output::print_fields(challenge, &INFO_FIELDS);
            if let Some(Value::String(description)) = challenge.get("description") {
                println!("\n{}", description.trim());
            }
        }
        ChallengesAction::Categories(out) => {
            let value = challenges.categories().await?;
            if out.json {
                return output::print_json(&value);
            }
            let rows: Vec<Value> = category_items(&value)
                .into_iter()
                .map(|c| serde_json::json!({"id": c.id, "name": c.name}))
                .collect();
            output::print_table(&CATEGORY_COLUMNS, &rows, "No categories found.");
        }
        ChallengesAction::Start(target) => {
            let id = resolve_id(&target.challenge, &challenges).await?;
            let value = challenges.start(id).await?;
            if target.output.json {
                return output::print_json(&value);
            }
            output::print_message(&value);
        }
        ChallengesAction::Stop(target) => {
            let id = resolve_id(&target.challenge, &challenges).await?;
            let value = challenges.stop(id).await?;
            if target.output.json {
                return output::print_json(&value);
            }
            output::print_message(&value);
        }
        ChallengesAction::Submit(submit) => {
            let id = resolve_id(&submit.challenge, &challenges).await?;
            let value = challenges.submit_flag(id, &submit.flag).await?;
            if submit.output.json {
                return output::print_json(&value);
            }
            output::print_message(&value);
        }
        ChallengesAction::Download(download) => {
            let id = resolve_id(&download.challenge, &challenges).await?;
            let bytes = challenges.download(id).await?;
            let path = download
                .out
                .unwrap_or_else(|| PathBuf::from(format!("{id}.zip")));
            tokio::fs::write(&path, &bytes).await.into_diagnostic()?;
            println!("Saved {} bytes to {}", bytes.len(), path.display());
        }
    }

    Ok(())
}
