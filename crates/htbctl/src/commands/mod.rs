pub mod challenges;
pub mod info;
pub mod machines;
pub mod prolabs;
pub mod pwnbox;
pub mod sherlocks;
pub mod user;
pub mod vm;
pub mod vpn;

use clap::{Args, Parser, Subcommand};
use htb_api::resolve::DEFAULT_MAX_PAGES;
use htb_api::{ApiClient, ApiVersion, Config, PageSource};
use miette::Result;
use tracing::debug;

#[derive(Parser)]
#[command(name = "htbctl", about = "Work with Hack The Box labs from the terminal", version)]
pub struct Cli {
    /// Log progress at info level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// API token (overrides .env and the config file)
    #[arg(long, global = true, env = "HTB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// API version to talk to (v4 or v5)
    #[arg(long, global = true)]
    api_version: Option<ApiVersion>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Browse machines and submit machine flags
    Machines(machines::MachinesCommand),
    /// Browse, start and submit challenges
    Challenges(challenges::ChallengesCommand),
    /// Browse sherlocks
    Sherlocks(sherlocks::SherlocksCommand),
    /// Browse pro labs and check lab connections
    Prolabs(prolabs::ProlabsCommand),
    /// Spawn and manage machine instances
    Vm(vm::VmCommand),
    /// Inspect or terminate the Pwnbox
    Pwnbox(pwnbox::PwnboxCommand),
    /// Show account details
    User(user::UserCommand),
    /// Manage VPN servers and configuration files
    Vpn(vpn::VpnCommand),
    /// Show the effective configuration
    Info(info::InfoArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let ctx = Context::load(self.token, self.api_version)?;
        match self.command {
            Command::Machines(args) => machines::run(args, &ctx).await,
            Command::Challenges(args) => challenges::run(args, &ctx).await,
            Command::Sherlocks(args) => sherlocks::run(args, &ctx).await,
            Command::Prolabs(args) => prolabs::run(args, &ctx).await,
            Command::Vm(args) => vm::run(args, &ctx).await,
            Command::Pwnbox(args) => pwnbox::run(args, &ctx).await,
            Command::User(args) => user::run(args, &ctx).await,
            Command::Vpn(args) => vpn::run(args, &ctx).await,
            Command::Info(args) => info::run(args, &ctx),
        }
    }
}

/// Loaded configuration plus the per-invocation overrides from global flags.
pub struct Context {
    pub config: Config,
}

impl Context {
    fn load(token: Option<String>, api_version: Option<ApiVersion>) -> Result<Self> {
        let mut config = Config::load()?;
        if token.is_some() {
            config.token = token;
        }
        if let Some(version) = api_version {
            config.api_version = version;
        }
        debug!(host = %config.host, api_version = %config.api_version, "configuration loaded");
        Ok(Self { config })
    }

    /// Authenticated client on the configured API version.
    pub fn client(&self) -> Result<ApiClient> {
        Ok(ApiClient::new(&self.config, self.config.api_version)?)
    }
}

/// `--json` (alias `--debug`): print the raw API response and nothing else.
#[derive(Args, Clone, Copy, Default)]
pub struct OutputArgs {
    /// Print the raw JSON response instead of the formatted view
    #[arg(long, alias = "debug")]
    pub json: bool,
}

/// Paging flags shared by the listing commands.
#[derive(Args, Clone, Copy)]
pub struct PageArgs {
    /// Page number (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Entries per page (max 100)
    #[arg(long, default_value_t = htb_api::config::DEFAULT_PER_PAGE)]
    pub per_page: u32,
}

/// Resolve an `<id|name>` argument against `source`.
pub async fn resolve_id<S: PageSource>(token: &str, source: &S) -> Result<u64> {
    let resolved = htb_api::resolve(token, source, DEFAULT_MAX_PAGES).await?;
    debug!(token, id = resolved.id, kind = %resolved.kind, "resolved identifier");
    Ok(resolved.id)
}
