use serde_json::Value;

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{self, Page};
use crate::resolve::EntityKind;
use crate::traits::PageSource;

use super::page_query;

#[derive(Debug, Clone, Copy)]
pub struct Prolabs<'a> {
    api: &'a ApiClient,
}

impl<'a> Prolabs<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn list(&self, page: u32, per_page: u32) -> Result<Value> {
        self.api.get("/prolabs", &page_query(page, per_page)).await
    }

    pub async fn info(&self, id: u64) -> Result<Value> {
        self.api.get(&format!("/prolab/{id}/info"), &[]).await
    }

    /// Connection status for one prolab. "Not connected" comes back as a body, not an error.
    pub async fn connection_status(&self, id: u64) -> Result<Value> {
        self.api
            .get(&format!("/connection/status/prolab/{id}"), &[])
            .await
    }
}

/// Prolab listings nest entries under `data.labs`; other listings use `data`.
pub fn prolab_rows(value: &Value) -> &[Value] {
    match value.pointer("/data/labs") {
        Some(Value::Array(items)) => items,
        _ => models::listing_items(value),
    }
}


impl PageSource for Prolabs<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::Prolab
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Page> {
        let value = self.list(page, per_page).await?;
        Ok(Page::from_items(prolab_rows(&value)))
    }
}
