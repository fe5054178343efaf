//! Typed views over the JSON the API returns.
//!
//! Only the fields the CLI actually reads are modelled; everything else stays in the
//! raw [`Value`] that `--json` prints.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{HtbError, Result};

/// Placeholder rendered for absent or null fields.
pub const MISSING: &str = "N/A";

/// Minimal shape shared by every listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
}

/// One page of a listing: the entries that decoded, and how many the server sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub entries: Vec<EntitySummary>,
    /// Raw entry count, undecodable entries included. Decides whether the listing goes on.
    pub received: usize,
}

impl Page {
    pub fn from_items(items: &[Value]) -> Self {
        let entries = items
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(error = %e, entry = %item, "skipping listing entry without a usable id");
                    None
                }
            })
            .collect();
        Self {
            entries,
            received: items.len(),
        }
    }
}

impl From<Vec<EntitySummary>> for Page {
    fn from(entries: Vec<EntitySummary>) -> Self {
        let received = entries.len();
        Self { entries, received }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Some endpoints send IDs as JSON strings.
fn number_or_numeric_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    match RawId::deserialize(d)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Machine status as reported by `/machine/active`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveMachine {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default, rename = "isSpawning")]
    pub is_spawning: bool,
    #[serde(default, alias = "expiresAt")]
    pub expires_at: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub lab_server: Option<String>,
}

impl ActiveMachine {
    /// Ready means spawning has finished and an address has been assigned.
    pub fn is_ready(&self) -> bool {
        !self.is_spawning && self.ip.as_deref().is_some_and(|ip| !ip.trim().is_empty())
    }
}

/// The `{message, success}` envelope most mutating endpoints answer with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub success: Option<Value>,
}

impl MessageResponse {
    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or(MISSING)
    }

    /// `success` arrives as a bool, `0/1`, or `"0"/"1"` depending on the endpoint.
    pub fn succeeded(&self) -> Option<bool> {
        match self.success.as_ref()? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => match s.as_str() {
                "1" | "true" => Some(true),
                "0" | "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A VPN server flattened out of the nested `options` tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnServer {
    pub id: u64,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub current_clients: Option<u64>,
    #[serde(default)]
    pub full: bool,
    /// Server group name (e.g. "VIP", "Free"), taken from the enclosing node.
    #[serde(skip)]
    pub group: String,
}

/// The signed-in account, from `/user/info`'s `info` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "isVip")]
    pub is_vip: bool,
    #[serde(default, rename = "subscriptionType")]
    pub subscription_type: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub server_id: Option<u64>,
}

/// Pwnbox instance details, from `/pwnbox/info`'s `data` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PwnboxStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

/// Extract the item array from a listing response.
///
/// Listings come back either as `{"data": [...]}` or, for the paginated endpoints,
/// `{"data": {"data": [...]}}`.
pub fn listing_items(value: &Value) -> &[Value] {
    let data = match value.get("data") {
        Some(Value::Object(inner)) => inner.get("data").unwrap_or(&Value::Null),
        Some(other) => other,
        None => &Value::Null,
    };
    data.as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Decode every listing entry that carries at least a numeric `id`.
pub fn summaries(value: &Value) -> Vec<EntitySummary> {
    Page::from_items(listing_items(value)).entries
}

/// Look up a `/`-separated path (e.g. `info/maker/name`) and render it for display.
///
/// Missing keys, nulls and empty strings all collapse to `default`.
pub fn field_or(value: &Value, path: &str, default: &str) -> String {
    let mut current = value;
    for key in path.split('/') {
        current = match current {
            Value::Object(map) => match map.get(key) {
                Some(v) => v,
                None => return default.to_string(),
            },
            Value::Array(items) => match key.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(v) => v,
                None => return default.to_string(),
            },
            _ => return default.to_string(),
        };
    }
    match current {
        Value::Null => default.to_string(),
        Value::String(s) if s.is_empty() => default.to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "Yes" } else { "No" }.to_string(),
        other => other.to_string(),
    }
}

/// Pull the object under `key`, reporting `what` as missing when it is absent or null.
pub fn require_object<'a>(value: &'a Value, key: &str, what: &str) -> Result<&'a Value> {
    match value.get(key) {
        Some(Value::Null) | None => Err(HtbError::EmptyResponse {
            what: what.to_string(),
        }),
        Some(Value::Array(items)) if items.is_empty() => Err(HtbError::EmptyResponse {
            what: what.to_string(),
        }),
        Some(v) => Ok(v),
    }
}

/// Decode `value` into `T`, naming `path` in the error.
pub fn decode<T: serde::de::DeserializeOwned>(value: Value, path: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| HtbError::Decode {
        path: path.to_string(),
        detail: e.to_string(),
    })
}
