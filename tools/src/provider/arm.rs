//! Azure Resource Manager REST provider
//!
//! Mutations follow the ARM asynchronous-operation protocol: the operation is
//! tracked through the `Azure-AsyncOperation` status URL when the service
//! returns one, otherwise through the `Location` URL, otherwise by re-reading
//! the resource until its `provisioningState` is terminal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::credential::TokenCredential;
use super::{
    is_terminal_state, provisioning_state, LongRunningOperation, NetAppProvider, Pager,
    ProviderError, ResourcePath,
};

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_API_VERSION: &str = "2024-07-01";

const ASYNC_OPERATION: &str = "azure-asyncoperation";

#[derive(Debug, Clone)]
pub struct ArmSettings {
    pub endpoint: String,
    pub api_version: String,
    /// Delay between polls when the service sends no `Retry-After`
    pub poll_interval: Duration,
    /// Upper bound on waiting for one long-running operation
    pub operation_timeout: Duration,
}

impl Default for ArmSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(30 * 60),
        }
    }
}

struct ArmInner {
    client: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    settings: ArmSettings,
}

/// [`NetAppProvider`] backed by the `Microsoft.NetApp` ARM REST API
#[derive(Clone)]
pub struct ArmProvider {
    inner: Arc<ArmInner>,
}

impl ArmProvider {
    pub fn new(
        client: reqwest::Client,
        credential: Arc<dyn TokenCredential>,
        mut settings: ArmSettings,
    ) -> Self {
        settings.endpoint = settings.endpoint.trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(ArmInner {
                client,
                credential,
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &ArmSettings {
        &self.inner.settings
    }

    async fn begin(
        &self,
        method: Method,
        resource: &ResourcePath,
        action: Option<&str>,
        body: Option<Value>,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError> {
        let resource_url = self.inner.resource_url(resource, None);
        let url = match action {
            Some(_) => self.inner.resource_url(resource, action),
            None => resource_url.clone(),
        };
        let is_delete = method == Method::DELETE;
        let response = self.inner.send(method, &url, body.as_ref()).await?;
        ArmOperation::start(Arc::clone(&self.inner), resource_url, is_delete, response).await
    }
}

impl ArmInner {
    fn resource_url(&self, path: &ResourcePath, action: Option<&str>) -> String {
        let mut url = format!("{}{}", self.settings.endpoint, path.arm_id());
        if let Some(action) = action {
            url.push('/');
            url.push_str(action);
        }
        url.push_str("?api-version=");
        url.push_str(&self.settings.api_version);
        url
    }

    /// Send an authenticated request; non-2xx responses become [`ProviderError::Http`]
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response, ProviderError> {
        let token = self.credential.token().await?;
        debug!("ARM {method} {url}");
        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn get_json(&self, url: &str) -> Result<(StatusCode, HeaderMap, Option<Value>), ProviderError> {
        let response = self.send(Method::GET, url, None).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = read_body(response).await?;
        Ok((status, headers, body))
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let (code, message) = parse_error_envelope(&text).unwrap_or_else(|| {
        (
            status.canonical_reason().unwrap_or("Error").replace(' ', ""),
            text,
        )
    });
    ProviderError::Http {
        status: status.as_u16(),
        code,
        message,
    }
}

fn parse_error_envelope(text: &str) -> Option<(String, String)> {
    serde_json::from_str::<ErrorEnvelope>(text)
        .ok()
        .map(|e| (e.error.code, e.error.message))
}

async fn read_body(response: Response) -> Result<Option<Value>, ProviderError> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn header_url(headers: &HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[derive(Deserialize)]
struct ListPage {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

struct ArmPager {
    inner: Arc<ArmInner>,
    next: Option<String>,
}

#[async_trait]
impl Pager for ArmPager {
    async fn next_page(&mut self) -> Result<Option<Vec<Value>>, ProviderError> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };
        let (_, _, body) = self.inner.get_json(&url).await?;
        let page: ListPage = match body {
            Some(body) => {
                serde_json::from_value(body).map_err(|e| ProviderError::Decode(e.to_string()))?
            }
            None => return Ok(Some(Vec::new())),
        };
        self.next = page.next_link.filter(|link| !link.is_empty());
        Ok(Some(page.value))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PollState {
    /// Poll the status monitor until `status` is terminal
    AsyncOperation(String),
    /// Poll until the URL stops answering 202
    Location(String),
    /// Re-read the resource until `provisioningState` is terminal
    ProvisioningState,
    Done(Option<Value>),
}

#[derive(Deserialize)]
struct OperationStatus {
    status: String,
    error: Option<ErrorBody>,
}

struct ArmOperation {
    inner: Arc<ArmInner>,
    resource_url: String,
    is_delete: bool,
    state: PollState,
    delay: Option<Duration>,
}

impl ArmOperation {
    async fn start(
        inner: Arc<ArmInner>,
        resource_url: String,
        is_delete: bool,
        response: Response,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = read_body(response).await?;
        let state = initial_state(status, &headers, body, is_delete);
        Ok(Box::new(Self {
            inner,
            resource_url,
            is_delete,
            state,
            delay: retry_after(&headers),
        }))
    }

    /// The final resource once the operation has succeeded
    async fn final_resource(&self) -> Result<Option<Value>, ProviderError> {
        if self.is_delete {
            return Ok(None);
        }
        let (_, _, body) = self.inner.get_json(&self.resource_url).await?;
        Ok(body)
    }

    async fn step(&mut self) -> Result<PollState, ProviderError> {
        match &self.state {
            PollState::AsyncOperation(url) => {
                let (_, headers, body) = self.inner.get_json(url).await?;
                self.delay = retry_after(&headers);
                let status: OperationStatus = body
                    .ok_or_else(|| ProviderError::Decode("empty operation status".to_string()))
                    .and_then(|b| {
                        serde_json::from_value(b).map_err(|e| ProviderError::Decode(e.to_string()))
                    })?;
                if !is_terminal_state(&status.status) {
                    return Ok(self.state.clone());
                }
                if status.status.eq_ignore_ascii_case("succeeded") {
                    Ok(PollState::Done(self.final_resource().await?))
                } else {
                    Err(ProviderError::OperationFailed {
                        message: status
                            .error
                            .map(|e| format!("{}: {}", e.code, e.message))
                            .unwrap_or_else(|| "no error detail".to_string()),
                        status: status.status,
                    })
                }
            }
            PollState::Location(url) => {
                let (status, headers, body) = self.inner.get_json(url).await?;
                self.delay = retry_after(&headers);
                if status == StatusCode::ACCEPTED {
                    return Ok(self.state.clone());
                }
                if self.is_delete {
                    return Ok(PollState::Done(None));
                }
                match body {
                    Some(body) => Ok(PollState::Done(Some(body))),
                    None => Ok(PollState::Done(self.final_resource().await?)),
                }
            }
            PollState::ProvisioningState => {
                let body = match self.inner.get_json(&self.resource_url).await {
                    Ok((_, _, body)) => body,
                    Err(ProviderError::Http { status: 404, .. }) if self.is_delete => {
                        return Ok(PollState::Done(None));
                    }
                    Err(e) => return Err(e),
                };
                let state = body
                    .as_ref()
                    .and_then(provisioning_state)
                    .unwrap_or("Succeeded")
                    .to_string();
                if !is_terminal_state(&state) {
                    return Ok(PollState::ProvisioningState);
                }
                if state.eq_ignore_ascii_case("succeeded") {
                    Ok(PollState::Done(if self.is_delete { None } else { body }))
                } else {
                    Err(ProviderError::OperationFailed {
                        status: state,
                        message: "resource provisioning did not succeed".to_string(),
                    })
                }
            }
            PollState::Done(_) => Ok(self.state.clone()),
        }
    }
}

fn initial_state(
    status: StatusCode,
    headers: &HeaderMap,
    body: Option<Value>,
    is_delete: bool,
) -> PollState {
    if let Some(url) = header_url(headers, ASYNC_OPERATION) {
        return PollState::AsyncOperation(url);
    }
    if status == StatusCode::ACCEPTED {
        if let Some(url) = header_url(headers, LOCATION) {
            return PollState::Location(url);
        }
        return PollState::ProvisioningState;
    }
    if is_delete {
        return PollState::Done(None);
    }
    let in_progress = body
        .as_ref()
        .and_then(provisioning_state)
        .is_some_and(|state| !is_terminal_state(state));
    if in_progress {
        PollState::ProvisioningState
    } else {
        PollState::Done(body)
    }
}

#[async_trait]
impl LongRunningOperation for ArmOperation {
    async fn poll_until_done(&mut self) -> Result<Option<Value>, ProviderError> {
        let timeout = self.inner.settings.operation_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            if let PollState::Done(body) = &mut self.state {
                return Ok(body.take());
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("Operation on {} timed out after {:?}", self.resource_url, timeout);
                return Err(ProviderError::Timeout(timeout));
            }
            let wait = self
                .delay
                .take()
                .unwrap_or(self.inner.settings.poll_interval)
                .min(deadline - now);
            tokio::time::sleep(wait).await;
            self.state = self.step().await?;
        }
    }
}

#[async_trait]
impl NetAppProvider for ArmProvider {
    async fn get(&self, resource: &ResourcePath) -> Result<Value, ProviderError> {
        let url = self.inner.resource_url(resource, None);
        let (_, _, body) = self.inner.get_json(&url).await?;
        body.ok_or_else(|| ProviderError::Decode(format!("empty body for {}", resource.arm_id())))
    }

    fn list(&self, collection: &ResourcePath) -> Box<dyn Pager> {
        Box::new(ArmPager {
            inner: Arc::clone(&self.inner),
            next: Some(self.inner.resource_url(collection, None)),
        })
    }

    async fn begin_create_or_update(
        &self,
        resource: &ResourcePath,
        body: Value,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError> {
        self.begin(Method::PUT, resource, None, Some(body)).await
    }

    async fn begin_update(
        &self,
        resource: &ResourcePath,
        body: Value,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError> {
        self.begin(Method::PATCH, resource, None, Some(body)).await
    }

    async fn begin_delete(
        &self,
        resource: &ResourcePath,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError> {
        self.begin(Method::DELETE, resource, None, None).await
    }

    async fn begin_action(
        &self,
        resource: &ResourcePath,
        action: &str,
        body: Option<Value>,
    ) -> Result<Box<dyn LongRunningOperation>, ProviderError> {
        self.begin(Method::POST, resource, Some(action), body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_error_envelope_is_parsed() {
        let parsed = parse_error_envelope(
            r#"{"error":{"code":"ResourceNotFound","message":"The Resource was not found."}}"#,
        );
        assert_eq!(
            parsed,
            Some(("ResourceNotFound".to_string(), "The Resource was not found.".to_string()))
        );
        assert_eq!(parse_error_envelope("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_initial_state_prefers_async_operation_header() {
        let mut headers = HeaderMap::new();
        headers.insert(ASYNC_OPERATION, HeaderValue::from_static("https://x/op"));
        headers.insert(LOCATION, HeaderValue::from_static("https://x/loc"));
        assert_eq!(
            initial_state(StatusCode::CREATED, &headers, None, false),
            PollState::AsyncOperation("https://x/op".to_string())
        );
    }

    #[test]
    fn test_initial_state_location_only_on_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("https://x/loc"));
        assert_eq!(
            initial_state(StatusCode::ACCEPTED, &headers, None, true),
            PollState::Location("https://x/loc".to_string())
        );
        assert_eq!(
            initial_state(StatusCode::OK, &headers, None, true),
            PollState::Done(None)
        );
    }

    #[test]
    fn test_initial_state_from_provisioning_state() {
        let headers = HeaderMap::new();
        let creating = json!({"properties": {"provisioningState": "Creating"}});
        assert_eq!(
            initial_state(StatusCode::CREATED, &headers, Some(creating), false),
            PollState::ProvisioningState
        );
        let done = json!({"properties": {"provisioningState": "Succeeded"}});
        assert_eq!(
            initial_state(StatusCode::OK, &headers, Some(done.clone()), false),
            PollState::Done(Some(done))
        );
    }

    #[test]
    fn test_resource_url_carries_api_version() {
        let provider = ArmProvider::new(
            reqwest::Client::new(),
            Arc::new(super::super::credential::StaticToken::new("t")),
            ArmSettings {
                endpoint: "https://arm.example/".to_string(),
                ..ArmSettings::default()
            },
        );
        let path = ResourcePath::new("s", "rg").child("netAppAccounts", "a");
        assert_eq!(
            provider.inner.resource_url(&path, Some("renewCredentials")),
            "https://arm.example/subscriptions/s/resourceGroups/rg/providers/Microsoft.NetApp/netAppAccounts/a/renewCredentials?api-version=2024-07-01"
        );
    }
}
