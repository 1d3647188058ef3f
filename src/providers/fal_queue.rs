use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::variant::{DEFAULT_BASE_URL, ModelVariant, PollPolicy};

use crate::error::Stage;
use crate::image::ImageGenerationModel;
use crate::profile::{
    Env, FalConfig, HttpAuth, ProviderSettings, UserSettings, build_http_client,
    default_http_client, resolve_api_key,
};
use crate::render;
use crate::types::{
    GenerationKind, GenerationParams, GenerationRequest, GenerationResult, JobHandle, JobStatus,
};
use crate::utils::http::{join_endpoint, send_checked_json};
use crate::{FalError, Result};

const STATUS_COMPLETED: &str = "COMPLETED";
const STATUS_FAILED: &str = "FAILED";

/// Client for the fal.ai request queue: submit a job, poll its status, fetch the result.
#[derive(Clone)]
pub struct FalQueueImages {
    http: reqwest::Client,
    base_url: String,
    variant: ModelVariant,
    fallback_api_key: Option<String>,
}

impl std::fmt::Debug for FalQueueImages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FalQueueImages")
            .field("base_url", &self.base_url)
            .field("variant", &self.variant.name)
            .field(
                "fallback_api_key",
                &self.fallback_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl FalQueueImages {
    /// `api_key` is used when per-call settings carry none; pass `""` to require it per call.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        Ok(Self {
            http: default_http_client()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            variant: ModelVariant::default(),
            fallback_api_key: Some(api_key.trim().to_string()).filter(|key| !key.is_empty()),
        })
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_variant(mut self, variant: ModelVariant) -> Self {
        self.variant = variant;
        self
    }

    /// At least one status check is always made.
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.variant.poll = PollPolicy {
            max_attempts: poll.max_attempts.max(1),
            ..poll
        };
        self
    }

    pub fn from_config(config: &FalConfig, env: &Env) -> Result<Self> {
        let mut variant = ModelVariant::builtin(config.variant.as_deref().unwrap_or("flux-lora"))?;
        variant.defaults = variant.defaults.overlay(&config.settings);
        if let Some(poll) = config.poll.as_ref() {
            variant.poll = variant.poll.with_overrides(poll);
        }

        let api_key = resolve_api_key(None, env, config.api_key_env.as_slice()).unwrap_or_default();
        let mut out = Self::new(api_key)?.with_variant(variant);
        if !config.http_headers.is_empty() {
            out = out.with_http_client(build_http_client(
                crate::profile::HTTP_TIMEOUT,
                &config.http_headers,
            )?);
        }
        if let Some(base_url) = config.base_url.as_deref().filter(|s| !s.trim().is_empty()) {
            out = out.with_base_url(base_url);
        }
        Ok(out)
    }

    pub fn variant(&self) -> &ModelVariant {
        &self.variant
    }

    pub fn resolve_settings(&self, user: &UserSettings) -> Result<ProviderSettings> {
        ProviderSettings::resolve(user, &self.variant.defaults)
    }

    /// Runs the whole job and renders it. Failures come back as `**Error:** ...`, never as `Err`.
    pub async fn generate_markdown(&self, params: GenerationParams, user: &UserSettings) -> String {
        match self.run_markdown(params, user).await {
            Ok(markdown) => markdown,
            Err(err) => {
                tracing::warn!(
                    variant = %self.variant.name,
                    kind = ?err.kind(),
                    error = %err,
                    "fal generation failed"
                );
                err.to_markdown()
            }
        }
    }

    async fn run_markdown(&self, params: GenerationParams, user: &UserSettings) -> Result<String> {
        let request = GenerationRequest::try_from(params)?;
        let settings = self.resolve_settings(user)?;
        let result = self.generate(request.clone(), &settings).await?;
        Ok(render::to_markdown(&request, &result))
    }

    pub async fn submit(
        &self,
        request: &GenerationRequest,
        settings: &ProviderSettings,
    ) -> Result<JobHandle> {
        #[derive(Deserialize)]
        struct SubmitResponse {
            #[serde(default)]
            request_id: Option<String>,
        }

        let body = self.build_body(request, settings);
        let url = join_endpoint(&self.base_url, self.variant.endpoint(request.kind));
        tracing::info!(
            variant = %self.variant.name,
            kind = %request.kind,
            images = settings.image_count,
            steps = settings.inference_steps,
            "submitting fal job"
        );

        let req = self.apply_auth(self.http.post(url), settings)?.json(&body);
        let parsed = send_checked_json::<SubmitResponse>(Stage::Submit, req).await?;
        let request_id = parsed
            .request_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(FalError::MissingRequestId)?;

        tracing::debug!(request_id = %request_id, "fal job queued");
        Ok(JobHandle { request_id })
    }

    /// One status check. A completed job is fetched before returning.
    pub async fn check(&self, handle: &JobHandle, settings: &ProviderSettings) -> Result<JobStatus> {
        #[derive(Deserialize)]
        struct StatusResponse {
            #[serde(default)]
            status: Option<String>,
            #[serde(default)]
            error: Option<Value>,
        }

        let req = self.apply_auth(self.http.get(self.status_url(handle)), settings)?;
        let parsed = send_checked_json::<StatusResponse>(Stage::Status, req).await?;
        let status = parsed.status.unwrap_or_default();

        match status.as_str() {
            STATUS_COMPLETED => {
                let req = self.apply_auth(self.http.get(self.result_url(handle)), settings)?;
                let result = send_checked_json::<GenerationResult>(Stage::Result, req).await?;
                Ok(JobStatus::Completed(result))
            }
            STATUS_FAILED => Ok(JobStatus::Failed {
                reason: describe_error(parsed.error.as_ref()),
            }),
            _ => Ok(JobStatus::Pending { status }),
        }
    }

    /// Polls until the job completes, fails, or the variant's attempt budget runs out.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(request_id = %handle.request_id, variant = %self.variant.name)
    )]
    pub async fn wait(
        &self,
        handle: &JobHandle,
        settings: &ProviderSettings,
    ) -> Result<GenerationResult> {
        let poll = self.variant.poll;
        let interval = poll.interval(settings.inference_steps);
        tracing::debug!(
            interval_ms = interval.as_millis() as u64,
            budget_ms = poll.budget(settings.inference_steps).as_millis() as u64,
            "polling fal job"
        );

        for attempt in 1..=poll.max_attempts {
            match self.check(handle, settings).await? {
                JobStatus::Completed(result) => {
                    tracing::info!(attempt, images = result.images.len(), "fal job completed");
                    return Ok(result);
                }
                JobStatus::Failed { reason } => return Err(FalError::JobFailed(reason)),
                JobStatus::Pending { status } => {
                    tracing::debug!(attempt, max_attempts = poll.max_attempts, status = %status, "fal job pending");
                }
            }
            if attempt < poll.max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(FalError::Timeout {
            attempts: poll.max_attempts,
        })
    }

    fn apply_auth(
        &self,
        req: reqwest::RequestBuilder,
        settings: &ProviderSettings,
    ) -> Result<reqwest::RequestBuilder> {
        let key = Some(settings.api_key.trim())
            .filter(|key| !key.is_empty())
            .or(self.fallback_api_key.as_deref());
        match key {
            Some(key) => Ok(HttpAuth::key(key)?.apply(req)),
            None => Ok(req),
        }
    }

    fn status_url(&self, handle: &JobHandle) -> String {
        join_endpoint(
            &self.base_url,
            &format!("{}/requests/{}/status", self.variant.app, handle.request_id),
        )
    }

    fn result_url(&self, handle: &JobHandle) -> String {
        join_endpoint(
            &self.base_url,
            &format!("{}/requests/{}", self.variant.app, handle.request_id),
        )
    }

    fn build_body(
        &self,
        request: &GenerationRequest,
        settings: &ProviderSettings,
    ) -> Map<String, Value> {
        let mut body = Map::<String, Value>::new();
        if request.kind == GenerationKind::ImageToImage {
            match request.source_image_url.as_deref() {
                Some(url) => {
                    body.insert("image_url".to_string(), Value::String(url.to_string()));
                }
                None => tracing::warn!(
                    variant = %self.variant.name,
                    "image_to_image request without image_url; submitting anyway"
                ),
            }
        }
        body.insert("prompt".to_string(), Value::String(request.prompt.clone()));
        body.insert(
            "image_size".to_string(),
            Value::String(settings.image_size.clone()),
        );
        body.insert(
            "num_inference_steps".to_string(),
            Value::Number(settings.inference_steps.into()),
        );
        body.insert(
            "num_images".to_string(),
            Value::Number(settings.image_count.into()),
        );
        body.insert(
            "enable_safety_checker".to_string(),
            Value::Bool(settings.safety_checker_enabled),
        );

        for (key, value) in self.variant.extras(request.kind) {
            if body.contains_key(key) {
                tracing::warn!(
                    variant = %self.variant.name,
                    key = %key,
                    "variant extra overrides a request field; ignoring"
                );
                continue;
            }
            body.insert(key.clone(), value.clone());
        }
        body
    }
}

fn describe_error(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
        Some(Value::Null) | None => "unknown error".to_string(),
        Some(Value::String(_)) => "unknown error".to_string(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl ImageGenerationModel for FalQueueImages {
    fn provider(&self) -> &str {
        "fal"
    }

    fn model_id(&self) -> &str {
        self.variant.app.as_str()
    }

    async fn generate(
        &self,
        request: GenerationRequest,
        settings: &ProviderSettings,
    ) -> Result<GenerationResult> {
        let handle = self.submit(&request, settings).await?;
        self.wait(&handle, settings).await
    }
}
