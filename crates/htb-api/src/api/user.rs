use serde_json::Value;

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{self, UserInfo};

#[derive(Debug, Clone, Copy)]
pub struct User<'a> {
    api: &'a ApiClient,
}

impl<'a> User<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn info(&self) -> Result<Value> {
        self.api.get("/user/info", &[]).await
    }

    /// Typed view of [`User::info`]; a missing `info` object is [`EmptyResponse`](crate::HtbError::EmptyResponse).
    pub async fn whoami(&self) -> Result<UserInfo> {
        let value = self.info().await?;
        let info = models::require_object(&value, "info", "user info")?;
        models::decode(info.clone(), "/user/info")
    }

    pub async fn connection_status(&self) -> Result<Value> {
        self.api.get("/user/connection/status", &[]).await
    }

    pub async fn profile(&self, user_id: u64) -> Result<Value> {
        self.api
            .get(&format!("/user/profile/basic/{user_id}"), &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;

    use super::*;
    use crate::client::tests::client_for;
    use crate::error::HtbError;

    #[tokio::test]
    async fn whoami_decodes_info() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v4/user/info");
            then.status(200).json_body(json!({
                "info": {"id": 12, "name": "neo", "isVip": true, "subscriptionType": "vip+", "verified": true}
            }));
        });

        let client = client_for(&server);
        let info = User::new(&client).whoami().await.unwrap();
        assert_eq!(info.name, "neo");
        assert!(info.is_vip);
        assert_eq!(info.subscription_type.as_deref(), Some("vip+"));
        assert_eq!(info.email, None);
    }

    #[tokio::test]
    async fn whoami_without_info_is_empty_response() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v4/user/info");
            then.status(200).json_body(json!({"info": null}));
        });

        let client = client_for(&server);
        let err = User::new(&client).whoami().await.unwrap_err();
        assert!(matches!(err, HtbError::EmptyResponse { .. }));
    }
}
