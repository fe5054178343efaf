use serde_json::{Value, json};
use tracing::info;

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{self, ActiveMachine};
use crate::traits::StatusSource;

/// Machine instance lifecycle: spawn, terminate, reset, extend.
///
/// Spawning is asynchronous on the server; pair [`Vm::spawn`] with
/// [`Poller`](crate::poll::Poller) to wait for an address.
#[derive(Debug, Clone, Copy)]
pub struct Vm<'a> {
    api: &'a ApiClient,
}

impl<'a> Vm<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn spawn(&self, machine_id: u64) -> Result<Value> {
        info!(machine_id, "requesting machine spawn");
        self.lifecycle("/vm/spawn", machine_id).await
    }

    pub async fn terminate(&self, machine_id: u64) -> Result<Value> {
        info!(machine_id, "requesting machine termination");
        self.lifecycle("/vm/terminate", machine_id).await
    }

    pub async fn reset(&self, machine_id: u64) -> Result<Value> {
        info!(machine_id, "requesting machine reset");
        self.lifecycle("/vm/reset", machine_id).await
    }

    pub async fn extend(&self, machine_id: u64) -> Result<Value> {
        self.lifecycle("/vm/extend", machine_id).await
    }

    /// Raw `/machine/active` response.
    pub async fn active(&self) -> Result<Value> {
        self.api.get("/machine/active", &[]).await
    }

    async fn lifecycle(&self, path: &str, machine_id: u64) -> Result<Value> {
        self.api
            .post(path, Some(&json!({ "machine_id": machine_id })))
            .await
    }
}

/// Decode the `info` object of a `/machine/active` response; null means nothing active.
pub fn active_machine(value: &Value) -> Result<Option<ActiveMachine>> {
    match value.get("info") {
        None | Some(Value::Null) => Ok(None),
        Some(info) => models::decode(info.clone(), "/machine/active").map(Some),
    }
}

impl StatusSource for Vm<'_> {
    /// Another machine being active counts as "not active yet" for `id`.
    async fn fetch_status(&self, id: u64) -> Result<Option<ActiveMachine>> {
        let value = self.active().await?;
        Ok(active_machine(&value)?.filter(|machine| machine.id == id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;

    use super::*;
    use crate::client::tests::client_for;
    use crate::poll::Poller;

    #[tokio::test]
    async fn spawn_posts_machine_id() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v4/vm/spawn")
                .json_body(json!({"machine_id": 811}));
            then.status(200)
                .json_body(json!({"message": "Machine deployed to lab.", "success": true}));
        });

        let client = client_for(&server);
        let value = Vm::new(&client).spawn(811).await.unwrap();
        mock.assert();
        assert_eq!(value["message"], "Machine deployed to lab.");
    }

    #[tokio::test]
    async fn status_ignores_other_active_machines() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v4/machine/active");
            then.status(200).json_body(json!({
                "info": {"id": 12, "name": "Other", "ip": "10.10.11.2", "isSpawning": false}
            }));
        });

        let client = client_for(&server);
        assert!(Vm::new(&client).fetch_status(811).await.unwrap().is_none());
        assert!(Vm::new(&client).fetch_status(12).await.unwrap().is_some());
    }

    #[test]
    fn null_info_means_nothing_active() {
        assert!(active_machine(&json!({"info": null})).unwrap().is_none());
        assert!(active_machine(&json!({})).unwrap().is_none());
    }

    #[tokio::test]
    async fn poller_sees_ready_machine_over_http() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v4/machine/active");
            then.status(200).json_body(json!({
                "info": {
                    "id": 811,
                    "name": "Sau",
                    "ip": "10.10.11.224",
                    "isSpawning": false,
                    "expires_at": "2026-10-19 12:00:00"
                }
            }));
        });

        let client = client_for(&server);
        let (machine, report) = Poller::new(Duration::from_secs(10))
            .wait_until_ready(&Vm::new(&client), 811)
            .await
            .into_result()
            .unwrap();

        mock.assert_hits(1);
        assert_eq!(machine.name, "Sau");
        assert_eq!(report.attempts, 1);
    }
}
