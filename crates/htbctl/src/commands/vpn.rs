use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use htb_api::api::vpn::{Vpn, flatten_servers};
use htb_api::{VpnCache, VpnProtocol};
use miette::{IntoDiagnostic, Result};
use tracing::{debug, info};

use super::{Context, OutputArgs};
use crate::output::{self, Column};

const STATUS_COLUMNS: [Column; 3] = [
    Column::new("TYPE", 16, "type"),
    Column::new("SERVER", 24, "server/friendly_name"),
    Column::new("IP", 0, "connection/ip4"),
];

#[derive(Args)]
pub struct VpnCommand {
    #[command(subcommand)]
    action: VpnAction,
}

#[derive(Subcommand)]
enum VpnAction {
    /// List VPN servers for a product
    Servers(ServersArgs),
    /// Switch your assigned VPN server
    Switch(SwitchArgs),
    /// Show your active VPN connections
    Status(OutputArgs),
    /// Download .ovpn files for every server of a product
    Download(DownloadArgs),
    /// List downloaded .ovpn files
    Files,
    /// Connect with openvpn in the background using a downloaded file
    Start(StartArgs),
    /// Stop every running openvpn process
    Stop,
}

#[derive(Args)]
struct ServersArgs {
    /// Product whose servers to list (labs, starting_point, endgames, fortresses)
    #[arg(long, default_value = "labs")]
    product: String,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct SwitchArgs {
    /// VPN server ID
    id: u64,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct DownloadArgs {
    /// Product whose servers to download
    #[arg(long, default_value = "labs")]
    product: String,

    /// Only download this protocol (udp or tcp); both by default
    #[arg(long)]
    protocol: Option<VpnProtocol>,
}

#[derive(Args)]
struct StartArgs {
    /// Path to an .ovpn file, or part of a downloaded file's name
    file: String,

    /// Protocol variant to use when matching a downloaded file
    #[arg(long, default_value = "udp")]
    mode: VpnProtocol,
}

pub async fn run(args: VpnCommand, ctx: &Context) -> Result<()> {
    let cache = VpnCache::with_dir(ctx.config.vpn_dir.clone());

    match args.action {
        VpnAction::Servers(servers) => {
            let client = ctx.client()?;
            let value = Vpn::new(&client).servers(&servers.product).await?;
            if servers.output.json {
                return output::print_json(&value);
            }
            let servers = flatten_servers(&value);
            if servers.is_empty() {
                println!("No VPN servers found.");
                return Ok(());
            }

            println!(
                "{:<6} {:<24} {:<10} {:<12} {:<8} FULL",
                "ID", "NAME", "LOCATION", "GROUP", "CLIENTS"
            );
            println!("{}", "-".repeat(70));
            for server in servers {
                let clients = server
                    .current_clients
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<6} {:<24} {:<10} {:<12} {:<8} {}",
                    server.id,
                    server.friendly_name,
                    server.location,
                    server.group,
                    clients,
                    if server.full { "yes" } else { "no" }
                );
            }
        }
        VpnAction::Switch(switch) => {
            let client = ctx.client()?;
            let value = Vpn::new(&client).switch(switch.id).await?;
            if switch.output.json {
                return output::print_json(&value);
            }
            output::print_message(&value);
        }
        VpnAction::Status(out) => {
            let client = ctx.client()?;
            let value = Vpn::new(&client).status().await?;
            if out.json {
                return output::print_json(&value);
            }
            let rows = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
            output::print_table(&STATUS_COLUMNS, rows, "Not connected.");
        }
        VpnAction::Download(download) => {
            let client = ctx.client()?;
            let protocols = match download.protocol {
                Some(protocol) => vec![protocol],
                None => vec![VpnProtocol::Udp, VpnProtocol::Tcp],
            };
            let summary = Vpn::new(&client)
                .download_all(&download.product, &protocols, &cache)
                .await?;

            for path in &summary.stored {
                println!("Saved {}", path.display());
            }
            for (server, error) in &summary.failed {
                println!("Failed {} ({}): {}", server.friendly_name, server.id, error);
            }
            println!(
                "{} file(s) in {}, {} server(s) failed",
                summary.stored.len(),
                cache.dir().display(),
                summary.failed.len()
            );
        }
        VpnAction::Files => {
            let files = cache.list().await?;
            if files.is_empty() {
                println!("No VPN files in {}.", cache.dir().display());
                return Ok(());
            }

            println!("{:<24} {:<10} {:<6} PATH", "NAME", "LOCATION", "PROTO");
            println!("{}", "-".repeat(80));
            for file in files {
                println!(
                    "{:<24} {:<10} {:<6} {}",
                    file.name,
                    file.location,
                    file.protocol,
                    file.path.display()
                );
            }
        }
        VpnAction::Start(start) => {
            let path = locate_config(&cache, &start.file, start.mode).await?;
            ensure_openvpn().await?;

            info!(config = %path.display(), "starting openvpn");
            let status = tokio::process::Command::new("sudo")
                .args(openvpn_args(&path))
                .status()
                .await
                .into_diagnostic()?;
            if !status.success() {
                miette::bail!("openvpn exited with status {}", status);
            }
            println!("VPN started with {}", path.display());
        }
        VpnAction::Stop => {
            let output = tokio::process::Command::new("pgrep")
                .arg("openvpn")
                .output()
                .await
                .into_diagnostic()?;
            // pgrep exits 1 when nothing matched.
            if !output.status.success() && output.status.code() != Some(1) {
                miette::bail!(
                    "pgrep failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }

            let pids = parse_pids(&String::from_utf8_lossy(&output.stdout));
            if pids.is_empty() {
                println!("No active VPN connection found.");
                return Ok(());
            }
            for pid in pids {
                debug!(pid, "stopping openvpn");
                let status = tokio::process::Command::new("sudo")
                    .args(["kill", &pid.to_string()])
                    .status()
                    .await
                    .into_diagnostic()?;
                if !status.success() {
                    miette::bail!("failed to stop openvpn process {}", pid);
                }
                println!("Stopped openvpn process {pid}");
            }
        }
    }

    Ok(())
}

/// An existing path wins; otherwise match against downloaded file names.
async fn locate_config(cache: &VpnCache, file: &str, mode: VpnProtocol) -> Result<PathBuf> {
    let direct = PathBuf::from(file);
    if direct.is_file() {
        return Ok(direct);
    }
    match cache.find(file, mode).await? {
        Some(found) => Ok(found.path),
        None => Err(miette::miette!(
            help = "run `htbctl vpn download` first, or `htbctl vpn files` to see what is available",
            "no {} VPN file matching '{}' in {}",
            mode,
            file,
            cache.dir().display()
        )),
    }
}

/// Fail early when `openvpn` is not installed or does not run.
async fn ensure_openvpn() -> Result<()> {
    let found = tokio::process::Command::new("openvpn")
        .arg("--version")
        .output()
        .await
        .is_ok_and(|output| output.status.success());
    if !found {
        miette::bail!(
            help = "install OpenVPN with your package manager",
            "openvpn is not installed or not on PATH"
        );
    }
    Ok(())
}

/// Arguments for `sudo`: run openvpn detached from the terminal.
fn openvpn_args(config: &Path) -> Vec<OsString> {
    vec![
        "openvpn".into(),
        "--config".into(),
        config.as_os_str().to_owned(),
        "--daemon".into(),
    ]
}

fn parse_pids(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}
