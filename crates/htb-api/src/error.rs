use miette::Diagnostic;
use thiserror::Error;

use crate::resolve::EntityKind;

pub type Result<T> = std::result::Result<T, HtbError>;

#[derive(Debug, Error, Diagnostic)]
pub enum HtbError {
    #[error("HTB_TOKEN is not set")]
    #[diagnostic(
        code(htb::config::missing_token),
        help(
            "export HTB_TOKEN=<token>, add it to a .env file, or set `token` in the config file"
        )
    )]
    MissingToken,

    #[error("invalid configuration in {source_name}: {detail}")]
    #[diagnostic(code(htb::config::parse))]
    ConfigParse { source_name: String, detail: String },

    #[error("failed to build HTTP client: {0}")]
    #[diagnostic(code(htb::client::build))]
    ClientBuild(#[source] reqwest::Error),

    #[error("{method} {url} failed{}: {body}", status_suffix(.status))]
    #[diagnostic(code(htb::request::failed))]
    Request {
        method: String,
        url: String,
        status: Option<u16>,
        body: String,
    },

    #[error("unexpected response from {path}: {detail}")]
    #[diagnostic(code(htb::request::decode))]
    Decode { path: String, detail: String },

    #[error("could not find {kind} with name '{name}'")]
    #[diagnostic(
        code(htb::resolve::not_found),
        help("check the spelling, or pass the numeric ID instead")
    )]
    NotFound { kind: EntityKind, name: String },

    #[error("no {what} found")]
    #[diagnostic(code(htb::response::empty))]
    EmptyResponse { what: String },

    #[error(
        "timed out waiting for machine {id} to become ready after {elapsed_secs} seconds, {attempts} attempts"
    )]
    #[diagnostic(
        code(htb::poll::timeout),
        help("the spawn may still complete; check again with `htbctl vm status`")
    )]
    PollTimeout {
        id: u64,
        elapsed_secs: u64,
        attempts: u32,
    },

    #[error(transparent)]
    #[diagnostic(code(htb::io))]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

impl HtbError {
    /// HTTP status attached to a request failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            HtbError::Request { status, .. } => *status,
            _ => None,
        }
    }
}
