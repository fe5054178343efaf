use clap::Args;
use htb_api::config::config_path;
use miette::Result;
use serde_json::json;

use super::{Context, OutputArgs};
use crate::output;

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    output: OutputArgs,
}

/// Never prints the token itself.
pub fn run(args: InfoArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let token = if config.token.is_some() { "set" } else { "not set" };

    if args.output.json {
        return output::print_json(&json!({
            "config_file": config_path(),
            "token": token,
            "host": config.host,
            "api_version": config.api_version.to_string(),
            "base_url": config.base_url(config.api_version),
            "vpn_dir": config.vpn_dir,
            "poll_timeout_secs": config.poll_timeout.as_secs(),
        }));
    }

    println!("Config file:   {}", config_path().display());
    println!("Token:         {}", token);
    println!("Host:          {}", config.host);
    println!("API version:   {}", config.api_version);
    println!("Base URL:      {}", config.base_url(config.api_version));
    println!("VPN files:     {}", config.vpn_dir.display());
    println!("Poll timeout:  {}s", config.poll_timeout.as_secs());
    Ok(())
}
