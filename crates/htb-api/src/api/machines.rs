use serde_json::{Value, json};

use crate::client::ApiClient;
use crate::config::ApiVersion;
use crate::error::Result;
use crate::models::{self, Page};
use crate::resolve::EntityKind;
use crate::traits::PageSource;

use super::page_query;

/// Machine endpoints. Name searches scan the active listing unless `retired` is set.
#[derive(Debug, Clone, Copy)]
pub struct Machines<'a> {
    api: &'a ApiClient,
    retired: bool,
}

impl<'a> Machines<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self {
            api,
            retired: false,
        }
    }

    pub fn retired(self, retired: bool) -> Self {
        Self { retired, ..self }
    }

    pub async fn list(&self, page: u32, per_page: u32) -> Result<Value> {
        let path = if self.retired {
            "/machine/list/retired/paginated"
        } else {
            "/machine/paginated"
        };
        self.api.get(path, &page_query(page, per_page)).await
    }

    /// The machine currently assigned to the user, if any (`info` is null otherwise).
    pub async fn active(&self) -> Result<Value> {
        self.api.get("/machine/active", &[]).await
    }

    /// Profile by numeric ID or name slug.
    pub async fn profile(&self, id_or_slug: &str) -> Result<Value> {
        self.api
            .get(&format!("/machine/profile/{id_or_slug}"), &[])
            .await
    }

    pub async fn activity(&self, id: u64) -> Result<Value> {
        self.api.get(&format!("/machine/activity/{id}"), &[]).await
    }

    pub async fn changelog(&self, id: u64) -> Result<Value> {
        self.api.get(&format!("/machine/changelog/{id}"), &[]).await
    }

    pub async fn tags(&self, id: u64) -> Result<Value> {
        self.api.get(&format!("/machine/tags/{id}"), &[]).await
    }

    pub async fn recommended(&self) -> Result<Value> {
        self.api.get("/machine/recommended", &[]).await
    }

    /// Submit a flag. Always goes to the v5 API; a wrong flag is a normal result.
    pub async fn submit_flag(&self, id: u64, flag: &str) -> Result<Value> {
        self.api
            .with_version(ApiVersion::V5)
            .post("/machine/own", Some(&json!({ "flag": flag, "id": id })))
            .await
    }
}

impl PageSource for Machines<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::Machine
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Page> {
        let value = self.list(page, per_page).await?;
        Ok(Page::from_items(models::listing_items(&value)))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;

    use super::*;
    use crate::client::tests::client_for;
    use crate::resolve::{DEFAULT_MAX_PAGES, resolve};

    fn page_of(start: u64, n: u64) -> Value {
        let items: Vec<Value> = (start..start + n)
            .map(|id| json!({"id": id, "name": format!("Box{id}"), "os": "Linux"}))
            .collect();
        json!({ "data": items })
    }

    #[tokio::test]
    async fn resolves_name_across_pages() {
        let server = MockServer::start_async().await;
        let page1 = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/machine/paginated")
                .query_param("page", "1");
            then.status(200).json_body(page_of(100, 20));
        });
        let page2 = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/machine/paginated")
                .query_param("page", "2");
            then.status(200).json_body(json!({
                "data": [{"id": 501, "name": "Sau"}, {"id": 502, "name": "Sauna"}]
            }));
        });

        let client = client_for(&server);
        let machines = Machines::new(&client);
        let resolved = resolve("sauna", &machines, DEFAULT_MAX_PAGES).await.unwrap();

        assert_eq!(resolved.id, 502);
        page1.assert_hits(1);
        page2.assert_hits(1);
    }

    #[tokio::test]
    async fn retired_listing_uses_its_own_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/machine/list/retired/paginated")
                .query_param("per_page", "20");
            then.status(200)
                .json_body(json!({"data": [{"id": 1, "name": "Lame"}]}));
        });

        let client = client_for(&server);
        let machines = Machines::new(&client).retired(true);
        let items = machines.fetch_page(1, 20).await.unwrap();

        mock.assert();
        assert_eq!(
            items.entries,
            vec![models::EntitySummary { id: 1, name: "Lame".into() }]
        );
    }

    #[tokio::test]
    async fn nameless_entry_does_not_end_the_scan_early() {
        let server = MockServer::start_async().await;
        let mut first: Vec<Value> = (100..119)
            .map(|id| json!({"id": id, "name": format!("Box{id}")}))
            .collect();
        first.push(json!({"id": 119, "name": null}));
        let page1 = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/machine/paginated")
                .query_param("page", "1");
            then.status(200).json_body(json!({ "data": first }));
        });
        let page2 = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/machine/paginated")
                .query_param("page", "2");
            then.status(200)
                .json_body(json!({"data": [{"id": 501, "name": "Sau"}]}));
        });

        let client = client_for(&server);
        let resolved = resolve("sau", &Machines::new(&client), DEFAULT_MAX_PAGES)
            .await
            .unwrap();

        assert_eq!(resolved.id, 501);
        page1.assert_hits(1);
        page2.assert_hits(1);
    }

    #[tokio::test]
    async fn flag_submission_is_pinned_to_v5() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v5/machine/own")
                .json_body(json!({"flag": "HTB{x}", "id": 1}));
            then.status(200)
                .json_body(json!({"message": "Lame user is now owned.", "success": true}));
        });

        let client = client_for(&server);
        let result = Machines::new(&client).submit_flag(1, "HTB{x}").await.unwrap();

        mock.assert();
        assert_eq!(result["success"], true);
    }
}
