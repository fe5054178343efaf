use serde_json::Value;
use tracing::info;

use crate::client::{ApiClient, PWNBOX_TERMINATE_PATH};
use crate::error::Result;
use crate::models::{self, PwnboxStatus};

#[derive(Debug, Clone, Copy)]
pub struct Pwnbox<'a> {
    api: &'a ApiClient,
}

impl<'a> Pwnbox<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn info(&self) -> Result<Value> {
        self.api.get("/pwnbox/info", &[]).await
    }

    /// Typed view of [`Pwnbox::info`]; no `data` object means no instance.
    pub async fn status(&self) -> Result<PwnboxStatus> {
        let value = self.info().await?;
        let data = models::require_object(&value, "data", "pwnbox instance")?;
        models::decode(data.clone(), "/pwnbox/info")
    }

    /// Terminate the running instance. "No instance" is a normal result.
    pub async fn terminate(&self) -> Result<Value> {
        info!("requesting pwnbox termination");
        self.api.post(PWNBOX_TERMINATE_PATH, None).await
    }
}
