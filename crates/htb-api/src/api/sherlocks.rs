use serde_json::Value;

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{self, Page};
use crate::resolve::EntityKind;
use crate::traits::PageSource;

use super::page_query;

#[derive(Debug, Clone, Copy)]
pub struct Sherlocks<'a> {
    api: &'a ApiClient,
}

impl<'a> Sherlocks<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn list(&self, page: u32, per_page: u32) -> Result<Value> {
        self.api.get("/sherlocks", &page_query(page, per_page)).await
    }

    pub async fn info(&self, id_or_slug: &str) -> Result<Value> {
        self.api
            .get(&format!("/sherlock/info/{id_or_slug}"), &[])
            .await
    }

    pub async fn activity(&self, id: u64) -> Result<Value> {
        self.api.get(&format!("/sherlock/activity/{id}"), &[]).await
    }
}

impl PageSource for Sherlocks<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::Sherlock
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Page> {
        let value = self.list(page, per_page).await?;
        Ok(Page::from_items(models::listing_items(&value)))
    }
}
