use clap::{Args, Subcommand};
use htb_api::api::machines::Machines;
use htb_api::api::vm::active_machine;
use htb_api::models;
use miette::Result;

use super::{Context, OutputArgs, PageArgs, resolve_id};
use crate::output::{self, Column};

const LIST_COLUMNS: [Column; 6] = [
    Column::new("ID", 6, "id"),
    Column::new("NAME", 20, "name"),
    Column::new("OS", 10, "os"),
    Column::new("DIFFICULTY", 12, "difficultyText"),
    Column::new("POINTS", 7, "points"),
    Column::new("RELEASED", 0, "release"),
];

const PROFILE_FIELDS: [(&str, &str); 9] = [
    ("Name", "name"),
    ("ID", "id"),
    ("OS", "os"),
    ("Difficulty", "difficultyText"),
    ("Points", "points"),
    ("IP", "ip"),
    ("Maker", "maker/name"),
    ("Released", "release"),
    ("Retired", "retired"),
];

const ACTIVITY_COLUMNS: [Column; 3] = [
    Column::new("USER", 20, "user_name"),
    Column::new("TYPE", 8, "type"),
    Column::new("DATE", 0, "date"),
];

#[derive(Args)]
pub struct MachinesCommand {
    #[command(subcommand)]
    action: MachinesAction,
}

#[derive(Subcommand)]
enum MachinesAction {
    /// List active machines (or retired ones with --retired)
    List(ListArgs),
    /// Show a machine's profile
    Info(TargetArgs),
    /// Show the machine currently assigned to you
    Active(OutputArgs),
    /// Submit a user or root flag
    Submit(SubmitArgs),
    /// Show recent owns of a machine
    Activity(TargetArgs),
}

#[derive(Args)]
struct ListArgs {
    /// List retired machines instead of active ones
    #[arg(long)]
    retired: bool,

    #[command(flatten)]
    paging: PageArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct TargetArgs {
    /// Machine ID or name
    machine: String,

    /// Search retired machines when resolving a name
    #[arg(long)]
    retired: bool,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct SubmitArgs {
    /// Machine ID or name
    machine: String,

    /// The flag to submit
    flag: String,

    /// Search retired machines when resolving a name
    #[arg(long)]
    retired: bool,

    #[command(flatten)]
    output: OutputArgs,
}

pub async fn run(args: MachinesCommand, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;

    match args.action {
        MachinesAction::List(list) => {
            let machines = Machines::new(&client).retired(list.retired);
            let value = machines.list(list.paging.page, list.paging.per_page).await?;
            if list.output.json {
                return output::print_json(&value);
            }
            output::print_table(
                &LIST_COLUMNS,
                models::listing_items(&value),
                "No machines found.",
            );
        }
        MachinesAction::Info(target) => {
            let machines = Machines::new(&client).retired(target.retired);
            print!("{}", profile_text(&machines, &target.machine, target.output.json).await?);
        }
        MachinesAction::Active(out) => {
            let value = Machines::new(&client).active().await?;
            if out.json {
                return output::print_json(&value);
            }
            match active_machine(&value)? {
                Some(machine) => super::vm::print_active(&machine),
                None => println!("No active machine."),
            }
        }
        MachinesAction::Submit(submit) => {
            let machines = Machines::new(&client).retired(submit.retired);
            let id = resolve_id(&submit.machine, &machines).await?;
            let value = machines.submit_flag(id, &submit.flag).await?;
            if submit.output.json {
                return output::print_json(&value);
            }
            output::print_message(&value);
        }
        MachinesAction::Activity(target) => {
            let machines = Machines::new(&client).retired(target.retired);
            let id = resolve_id(&target.machine, &machines).await?;
            let value = machines.activity(id).await?;
            if target.output.json {
                return output::print_json(&value);
            }
            output::print_table(
                &ACTIVITY_COLUMNS,
                output::items_at(&value, "/info/activity"),
                "No activity recorded.",
            );
        }
    }

    Ok(())
}

async fn profile_text(machines: &Machines<'_>, token: &str, json: bool) -> Result<String> {
    let id = resolve_id(token, machines).await?;
    let value = machines.profile(&id.to_string()).await?;
    output::render_detail(&value, json, "info", "machine profile", &PROFILE_FIELDS)
}
