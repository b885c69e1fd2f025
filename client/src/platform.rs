use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use cloud_vision_common::config::PlatformConfig;
use cloud_vision_common::detection::{CallError, DetectionResult};
use reqwest::multipart::{Form, Part};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::completion::Completion;
use crate::dispatcher::Dispatcher;
use crate::request::CloudRequest;

const TOKEN_HEADER: &str = "Accept-Token";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("platform client must be created inside a tokio runtime")]
    NoRuntime,
    #[error("failed to build HTTP client: {0}")]
    Build(reqwest::Error),
}

/// HTTP client for the cloud platform.
///
/// Every dispatch runs on its own task of the runtime the client was built
/// in, so callers never block on the network.
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    runtime: Handle,
    calls: AtomicU64,
}

impl PlatformClient {
    pub fn new(config: &PlatformConfig) -> Result<Self, ClientError> {
        let runtime = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            token: config.token.clone(),
            runtime,
            calls: AtomicU64::new(0),
        })
    }

    pub fn endpoint(&self, service: &str) -> String {
        format!("{}/hop/{}", self.base_url.trim_end_matches('/'), service)
    }

    /// Perform a call and wait for its result.
    pub async fn call(&self, request: CloudRequest) -> DetectionResult {
        let url = self.endpoint(request.service());
        execute(&self.http, &url, &self.token, &request).await
    }
}

impl Dispatcher for PlatformClient {
    fn dispatch(&self, request: CloudRequest, on_complete: Completion) {
        let call_id = self.calls.fetch_add(1, Ordering::Relaxed);
        let http = self.http.clone();
        let url = self.endpoint(request.service());
        let token = self.token.clone();

        debug!(call_id, url, "dispatching platform call");

        self.runtime.spawn(async move {
            let started = Instant::now();
            let result = execute(&http, &url, &token, &request).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                DetectionResult::Failed(e) => {
                    warn!(call_id, service = request.service(), elapsed_ms, error = %e, "platform call failed");
                }
                ok => {
                    debug!(call_id, service = request.service(), elapsed_ms, found = ok.count(), "platform call finished");
                }
            }
            on_complete.complete(result);
        });
    }

    fn name(&self) -> &str {
        "platform"
    }
}

async fn execute(
    http: &reqwest::Client,
    url: &str,
    token: &str,
    request: &CloudRequest,
) -> DetectionResult {
    let mut builder = http.post(url).header(TOKEN_HEADER, token);

    if let Some(image) = request.image() {
        let part = match Part::bytes(image.data.to_vec())
            .file_name(image.file_name())
            .mime_str(image.format.mime())
        {
            Ok(p) => p,
            Err(e) => return DetectionResult::Failed(CallError::Transport(e.to_string())),
        };
        let form = Form::new()
            .part("file", part)
            .text("json", request.arguments().to_string());
        builder = builder.multipart(form);
    }

    let response = match builder.send().await {
        Ok(r) => r,
        Err(e) => return DetectionResult::Failed(CallError::Transport(e.to_string())),
    };

    if !response.status().is_success() {
        return DetectionResult::Failed(CallError::Status(response.status().as_u16()));
    }

    match response.bytes().await {
        Ok(body) => request.parse_response(&body),
        Err(e) => DetectionResult::Failed(CallError::Transport(e.to_string())),
    }
}
