use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::{ApiVersion, Config};
use crate::error::{HtbError, Result};
use crate::models;

const USER_AGENT: &str = concat!("htbctl/", env!("CARGO_PKG_VERSION"));

pub const PWNBOX_TERMINATE_PATH: &str = "/pwnbox/terminate";
pub const PROLAB_STATUS_PREFIX: &str = "/connection/status/prolab/";
pub const PWNBOX_TERMINATED_MESSAGE: &str = "PwnBox terminated successfully";

/// Query parameters as `(name, value)` pairs.
pub type Query<'a> = &'a [(&'a str, String)];

/// Authenticated client bound to one versioned API base.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    host: String,
    version: ApiVersion,
}

impl ApiClient {
    /// Build a client for `version`. Fails with [`HtbError::MissingToken`] before any
    /// network activity when no token is configured.
    pub fn new(config: &Config, version: ApiVersion) -> Result<Self> {
        let token = config.require_token()?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            HtbError::ConfigParse {
                source_name: "HTB_TOKEN".into(),
                detail: "token contains characters not allowed in an HTTP header".into(),
            }
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .build()
            .map_err(HtbError::ClientBuild)?;

        Ok(Self {
            http,
            host: config.host.clone(),
            version,
        })
    }

    /// A sibling client on another API version, sharing credentials and connections.
    pub fn with_version(&self, version: ApiVersion) -> Self {
        Self {
            http: self.http.clone(),
            host: self.host.clone(),
            version,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn base_url(&self) -> String {
        format!("{}/api/{}", self.host, self.version.path_segment())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub async fn get(&self, path: &str, query: Query<'_>) -> Result<Value> {
        self.request(Method::GET, path, query, None).await
    }

    /// GET and decode the body into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str, query: Query<'_>) -> Result<T> {
        let value = self.get(path, query).await?;
        models::decode(value, path)
    }

    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::POST, path, &[], body).await
    }

    pub async fn put(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::PUT, path, &[], body).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, &[], None).await
    }

    /// GET an opaque payload (file downloads). Any non-2xx status is an error.
    pub async fn get_binary(&self, path: &str, query: Query<'_>) -> Result<Vec<u8>> {
        let url = self.url(path);
        let mut req = self.http.get(&url);
        if !query.is_empty() {
            req = req.query(query);
        }
        let res = req
            .send()
            .await
            .map_err(|e| transport_error(&Method::GET, &url, &e))?;

        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| transport_error(&Method::GET, &url, &e))?;
        debug!(method = "GET", url = %url, status = status.as_u16(), size_bytes = bytes.len(), "binary response");

        if !status.is_success() {
            return Err(HtbError::Request {
                method: Method::GET.to_string(),
                url,
                status: Some(status.as_u16()),
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }
        Ok(bytes.to_vec())
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.url(path);
        let mut req = self.http.request(method.clone(), &url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let res = req
            .send()
            .await
            .map_err(|e| transport_error(&method, &url, &e))?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| transport_error(&method, &url, &e))?;
        debug!(method = %method, url = %url, status = status.as_u16(), "api response");

        normalize(&method, path, status, &bytes).map_err(|body| HtbError::Request {
            method: method.to_string(),
            url,
            status: Some(status.as_u16()),
            body,
        })
    }
}

/// Map a raw response onto the value handed back to callers.
///
/// A few endpoints encode ordinary outcomes as error statuses; those come back as
/// `Ok`. Every other non-2xx status yields `Err` with the body rendered for diagnostics.
pub fn normalize(
    method: &Method,
    path: &str,
    status: StatusCode,
    body: &[u8],
) -> std::result::Result<Value, String> {
    let path = path.trim_end_matches('/');
    let parsed = parse_body(body);

    if *method == Method::POST {
        if is_flag_submission(path)
            && status == StatusCode::INTERNAL_SERVER_ERROR
            && is_incorrect_flag(&parsed)
        {
            return Ok(parsed);
        }
        if path == PWNBOX_TERMINATE_PATH {
            match status {
                StatusCode::NO_CONTENT => {
                    return Ok(json!({ "message": PWNBOX_TERMINATED_MESSAGE }));
                }
                // No running instance
                StatusCode::NOT_FOUND => return Ok(parsed),
                _ => {}
            }
        }
    }

    // 400 means "not connected" here
    if *method == Method::GET
        && path.starts_with(PROLAB_STATUS_PREFIX)
        && status == StatusCode::BAD_REQUEST
    {
        return Ok(parsed);
    }

    if status.is_success() {
        return Ok(parsed);
    }

    Err(match parsed {
        Value::String(text) => text,
        Value::Object(ref map) if map.is_empty() => "empty body".to_string(),
        other => other.to_string(),
    })
}

/// Flag submission endpoints: `/machine/own`, `/challenge/own`, `/arena/own`, ...
pub fn is_flag_submission(path: &str) -> bool {
    path.ends_with("/own")
}

fn is_incorrect_flag(body: &Value) -> bool {
    let text = match body.get("message").and_then(Value::as_str) {
        Some(message) => message,
        None => body.as_str().unwrap_or_default(),
    };
    text.to_ascii_lowercase().contains("incorrect flag")
}

/// JSON when possible, the trimmed text otherwise; an empty body is `{}`.
fn parse_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return json!({});
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).trim().to_string()))
}

fn transport_error(method: &Method, url: &str, err: &reqwest::Error) -> HtbError {
    let mut detail = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    HtbError::Request {
        method: method.to_string(),
        url: url.to_string(),
        status: None,
        body: detail,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httpmock::Method::{DELETE, GET, POST, PUT};
    use httpmock::MockServer;

    pub(crate) fn client_for(server: &MockServer) -> ApiClient {
        let config = Config {
            token: Some("test-token".into()),
            host: server.base_url(),
            ..Config::default()
        };
        ApiClient::new(&config, ApiVersion::V4).unwrap()
    }

    #[test]
    fn missing_token_fails_before_any_request() {
        let err = ApiClient::new(&Config::default(), ApiVersion::V4).unwrap_err();
        assert!(matches!(err, HtbError::MissingToken));
    }

    #[test]
    fn incorrect_flag_is_a_result_not_an_error() {
        let body = br#"{"message": "Incorrect Flag, try again!"}"#;
        let value = normalize(
            &Method::POST,
            "/machine/own",
            StatusCode::INTERNAL_SERVER_ERROR,
            body,
        )
        .unwrap();
        assert_eq!(value["message"], "Incorrect Flag, try again!");
    }

    #[test]
    fn other_500_on_flag_submission_is_an_error() {
        let body = br#"{"message": "Server Error"}"#;
        let err = normalize(
            &Method::POST,
            "/machine/own",
            StatusCode::INTERNAL_SERVER_ERROR,
            body,
        )
        .unwrap_err();
        assert!(err.contains("Server Error"));
    }

    #[test]
    fn pwnbox_terminate_special_cases() {
        let value = normalize(&Method::POST, PWNBOX_TERMINATE_PATH, StatusCode::NO_CONTENT, b"")
            .unwrap();
        assert_eq!(value, json!({"message": "PwnBox terminated successfully"}));

        let value = normalize(
            &Method::POST,
            PWNBOX_TERMINATE_PATH,
            StatusCode::NOT_FOUND,
            br#"{"message": "No active PwnBox instance"}"#,
        )
        .unwrap();
        assert_eq!(value["message"], "No active PwnBox instance");

        assert!(
            normalize(&Method::GET, PWNBOX_TERMINATE_PATH, StatusCode::NOT_FOUND, b"{}").is_err()
        );
    }

    #[test]
    fn prolab_status_400_means_not_connected() {
        let value = normalize(
            &Method::GET,
            "/connection/status/prolab/3",
            StatusCode::BAD_REQUEST,
            br#"{"status": false, "message": "Not connected"}"#,
        )
        .unwrap();
        assert_eq!(value["status"], false);

        assert!(
            normalize(&Method::GET, "/connection/status", StatusCode::BAD_REQUEST, b"{}").is_err()
        );
    }

    #[test]
    fn non_json_error_bodies_are_kept_as_text() {
        let err = normalize(
            &Method::GET,
            "/machine/active",
            StatusCode::BAD_GATEWAY,
            b"<html>bad gateway</html>\n",
        )
        .unwrap_err();
        assert_eq!(err, "<html>bad gateway</html>");
    }

    #[tokio::test]
    async fn sends_bearer_token_and_query() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/machine/paginated")
                .header("authorization", "Bearer test-token")
                .query_param("page", "2")
                .query_param("per_page", "20");
            then.status(200).json_body(json!({"data": []}));
        });

        let client = client_for(&server);
        let value = client
            .get(
                "/machine/paginated",
                &[("page", "2".to_string()), ("per_page", "20".to_string())],
            )
            .await
            .unwrap();

        mock.assert();
        assert_eq!(value, json!({"data": []}));
    }

    #[tokio::test]
    async fn flag_submission_500_round_trips_through_http() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/v5/machine/own");
            then.status(500)
                .json_body(json!({"message": "Incorrect Flag, try again!"}));
        });

        let client = client_for(&server).with_version(ApiVersion::V5);
        let value = client
            .post("/machine/own", Some(&json!({"flag": "x", "id": 1})))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(value["message"], "Incorrect Flag, try again!");
    }

    #[tokio::test]
    async fn pwnbox_204_is_synthesised() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/v4/pwnbox/terminate");
            then.status(204);
        });

        let value = client_for(&server)
            .post(PWNBOX_TERMINATE_PATH, None)
            .await
            .unwrap();
        assert_eq!(value["message"], PWNBOX_TERMINATED_MESSAGE);
    }

    #[tokio::test]
    async fn other_failures_carry_status_and_body() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(DELETE).path("/api/v4/user/apptoken/7");
            then.status(403).json_body(json!({"message": "Forbidden"}));
        });

        let err = client_for(&server)
            .delete("/user/apptoken/7")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("Forbidden"));
        assert!(err.to_string().contains("status 403"));
    }

    #[tokio::test]
    async fn binary_download_returns_raw_bytes() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v4/access/ovpnfile/12/0");
            then.status(200).body("client\ndev tun\n");
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v4/access/ovpnfile/13/0");
            then.status(404).body("missing");
        });

        let client = client_for(&server);
        let bytes = client.get_binary("/access/ovpnfile/12/0", &[]).await.unwrap();
        assert_eq!(bytes, b"client\ndev tun\n");

        let err = client
            .get_binary("/access/ovpnfile/13/0", &[])
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn transport_failures_have_no_status() {
        let config = Config {
            token: Some("t".into()),
            host: "http://127.0.0.1:1".into(),
            ..Config::default()
        };
        let client = ApiClient::new(&config, ApiVersion::V4).unwrap();
        let err = client.get("/user/info", &[]).await.unwrap_err();
        assert!(matches!(err, HtbError::Request { status: None, .. }));
    }

    #[tokio::test]
    async fn put_sends_json_body() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/v4/user/settings")
                .json_body(json!({"public": true}));
            then.status(200).json_body(json!({"message": "ok"}));
        });

        let value = client_for(&server)
            .put("/user/settings", Some(&json!({"public": true})))
            .await
            .unwrap();
        mock.assert();
        assert_eq!(value["message"], "ok");
    }
}
