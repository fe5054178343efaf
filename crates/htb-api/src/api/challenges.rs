use serde_json::{Value, json};

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{self, EntitySummary, Page};
use crate::resolve::{self, EntityKind, ResolvedRef};
use crate::traits::PageSource;

use super::page_query;

/// Optional filters for the challenge listing.
#[derive(Debug, Clone, Default)]
pub struct ChallengeFilter {
    pub difficulty: Option<String>,
    /// Category ID, already resolved.
    pub category: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct Challenges<'a> {
    api: &'a ApiClient,
}

impl<'a> Challenges<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn list(&self, page: u32, per_page: u32, filter: &ChallengeFilter) -> Result<Value> {
        let mut query = page_query(page, per_page);
        if let Some(ref difficulty) = filter.difficulty {
            query.push(("difficulty", difficulty.clone()));
        }
        if let Some(category) = filter.category {
            query.push(("category", category.to_string()));
        }
        self.api.get("/challenges", &query).await
    }

    pub async fn info(&self, id_or_slug: &str) -> Result<Value> {
        self.api
            .get(&format!("/challenge/info/{id_or_slug}"), &[])
            .await
    }

    pub async fn categories(&self) -> Result<Value> {
        self.api.get("/challenge/categories/list", &[]).await
    }

    /// Resolve a category by ID or name. Partial names must match whole words.
    pub async fn resolve_category(&self, token: &str) -> Result<ResolvedRef> {
        // Checked here as well as in `resolve_in` so an ID never costs the categories request.
        if let resolve::Identifier::Id(id) = resolve::Identifier::parse(token) {
            return Ok(ResolvedRef {
                id,
                kind: EntityKind::Category,
            });
        }
        let value = self.categories().await?;
        resolve::resolve_in(token, EntityKind::Category, &category_items(&value))
    }

    pub async fn start(&self, id: u64) -> Result<Value> {
        self.api
            .post("/challenge/start", Some(&json!({ "challenge_id": id })))
            .await
    }

    pub async fn stop(&self, id: u64) -> Result<Value> {
        self.api
            .post("/challenge/stop", Some(&json!({ "challenge_id": id })))
            .await
    }

    pub async fn submit_flag(&self, id: u64, flag: &str) -> Result<Value> {
        self.api
            .post(
                "/challenge/own",
                Some(&json!({ "challenge_id": id, "flag": flag })),
            )
            .await
    }

    /// Download the challenge archive.
    pub async fn download(&self, id: u64) -> Result<Vec<u8>> {
        self.api
            .get_binary(&format!("/challenge/download/{id}"), &[])
            .await
    }
}

/// Categories arrive under `info` on current API versions and `data` on older ones.
pub fn category_items(value: &Value) -> Vec<EntitySummary> {
    match value.get("info") {
        Some(Value::Array(items)) => Page::from_items(items).entries,
        _ => models::summaries(value),
    }
}

impl PageSource for Challenges<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::Challenge
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Page> {
        let value = self
            .list(page, per_page, &ChallengeFilter::default())
            .await?;
        Ok(Page::from_items(models::listing_items(&value)))
    }
}
