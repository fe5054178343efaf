#![allow(async_fn_in_trait)]

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod poll;
pub mod resolve;
pub mod traits;
pub mod vpn_cache;

pub use client::ApiClient;
pub use config::{ApiVersion, Config};
pub use error::{HtbError, Result};
pub use poll::{PollOutcome, PollReport, Poller};
pub use resolve::{EntityKind, Identifier, ResolvedRef, resolve};
pub use traits::{PageSource, StatusSource};
pub use vpn_cache::{CachedVpn, VpnCache, VpnProtocol};
