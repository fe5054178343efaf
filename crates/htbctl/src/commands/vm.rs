use std::time::Duration;

use clap::{Args, Subcommand};
use htb_api::Poller;
use htb_api::api::machines::Machines;
use htb_api::api::vm::{Vm, active_machine};
use htb_api::models::{ActiveMachine, MISSING};
use miette::Result;

use super::{Context, OutputArgs, resolve_id};
use crate::output;

#[derive(Args)]
pub struct VmCommand {
    #[command(subcommand)]
    action: VmAction,
}

#[derive(Subcommand)]
enum VmAction {
    /// Spawn a machine and wait until it has an IP
    Spawn(SpawnArgs),
    /// Show the active machine instance
    Status(OutputArgs),
    /// Terminate a machine instance
    Terminate(TargetArgs),
    /// Reset a machine instance
    Reset(TargetArgs),
    /// Extend a machine instance's lifetime
    Extend(TargetArgs),
}

#[derive(Args)]
struct SpawnArgs {
    /// Machine ID or name
    machine: String,

    /// Return right after the spawn request
    #[arg(long)]
    no_wait: bool,

    /// Seconds to wait for the machine to become ready (default from config, 300)
    #[arg(long)]
    timeout: Option<u64>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct TargetArgs {
    /// Machine ID or name
    machine: String,

    #[command(flatten)]
    output: OutputArgs,
}

pub async fn run(args: VmCommand, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let vm = Vm::new(&client);
    let machines = Machines::new(&client);

    match args.action {
        VmAction::Spawn(spawn) => {
            let id = resolve_id(&spawn.machine, &machines).await?;
            let value = vm.spawn(id).await?;
            if spawn.output.json {
                return output::print_json(&value);
            }
            output::print_message(&value);
            if spawn.no_wait {
                return Ok(());
            }

            let max_wait = spawn
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(ctx.config.poll_timeout);
            println!(
                "Waiting up to {}s for machine {} (Ctrl+C to stop waiting)...",
                max_wait.as_secs(),
                id
            );

            let poller = Poller::new(max_wait);
            let outcome = tokio::select! {
                outcome = poller.wait_until_ready(&vm, id) => outcome,
                _ = tokio::signal::ctrl_c() => {
                    println!("\nStopped waiting; the machine keeps spawning in the background.");
                    return Ok(());
                }
            };

            let (machine, report) = outcome.into_result()?;
            println!(
                "{} is ready at {} ({}s, {} checks)",
                machine.name,
                machine.ip.as_deref().unwrap_or(MISSING),
                report.elapsed.as_secs(),
                report.attempts
            );
        }
        VmAction::Status(out) => {
            let value = vm.active().await?;
            if out.json {
                return output::print_json(&value);
            }
            match active_machine(&value)? {
                Some(machine) => print_active(&machine),
                None => println!("No active machine."),
            }
        }
        VmAction::Terminate(target) => {
            let id = resolve_id(&target.machine, &machines).await?;
            let value = vm.terminate(id).await?;
            if target.output.json {
                return output::print_json(&value);
            }
            output::print_message(&value);
        }
        VmAction::Reset(target) => {
            let id = resolve_id(&target.machine, &machines).await?;
            let value = vm.reset(id).await?;
            if target.output.json {
                return output::print_json(&value);
            }
            output::print_message(&value);
        }
        VmAction::Extend(target) => {
            let id = resolve_id(&target.machine, &machines).await?;
            let value = vm.extend(id).await?;
            if target.output.json {
                return output::print_json(&value);
            }
            output::print_message(&value);
        }
    }

    Ok(())
}

pub(super) fn print_active(machine: &ActiveMachine) {
    let state = if machine.is_ready() { "ready" } else { "spawning" };
    println!("Name:     {}", machine.name);
    println!("ID:       {}", machine.id);
    println!("IP:       {}", machine.ip.as_deref().unwrap_or(MISSING));
    println!("State:    {}", state);
    println!("Type:     {}", machine.kind.as_deref().unwrap_or(MISSING));
    println!("Expires:  {}", machine.expires_at.as_deref().unwrap_or(MISSING));
    if let Some(ref server) = machine.lab_server {
        println!("Server:   {}", server);
    }
}
