//! Info resolution pipeline
//!
//! One call runs Search → Prompt → Model → Parse → Validate → Normalize →
//! Persist strictly in order. Nothing is cached: every call is a fresh search
//! and model round trip. Public operations never return errors; `None` means
//! "could not determine", while a record with an empty URL means "no official
//! page exists".

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::Config;
use crate::info::{Info, InfoRequest, Mode, parse_model_output};
use crate::model::{GeminiClient, GenerateRequest, GenerativeModel};
use crate::prompt::{build_prompt, format_search_context, search_query};
use crate::store::{InfoStore, PostgrestInfoStore};
use crate::validator::UrlValidator;
use crate::web_search::{BrowserSearch, SearchProvider};

/// Characters of unparseable model output echoed into logs
const LOG_PREVIEW_CHARS: usize = 200;

pub struct InfoResolver {
    search: Arc<dyn SearchProvider>,
    model: Option<Arc<dyn GenerativeModel>>,
    validator: UrlValidator,
    store: Option<Arc<dyn InfoStore>>,
    config: Config,
}

impl InfoResolver {
    /// Assemble a resolver from explicit collaborators
    ///
    /// `model` is `None` when no API key is available; every resolve then
    /// returns `None` without searching.
    pub fn new(
        search: Arc<dyn SearchProvider>,
        model: Option<Arc<dyn GenerativeModel>>,
        validator: UrlValidator,
        config: Config,
    ) -> Self {
        Self {
            search,
            model,
            validator,
            store: None,
            config,
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn InfoStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Production wiring: browser search, Gemini from the environment,
    /// reqwest probes, and the PostgREST store when its environment is set
    ///
    /// Rejects configs whose timeouts or limits are out of range.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let search = Arc::new(BrowserSearch::from_config(&config));
        let model = GeminiClient::from_env(&config.model)
            .map(|client| Arc::new(client) as Arc<dyn GenerativeModel>);
        let validator = UrlValidator::from_config(&config.validator)?;

        let store = match PostgrestInfoStore::from_env(&config.store) {
            Ok(store) => Some(Arc::new(store) as Arc<dyn InfoStore>),
            Err(e) => {
                info!("Persistence disabled: {}", e);
                None
            }
        };

        let mut resolver = Self::new(search, model, validator, config);
        resolver.store = store;
        Ok(resolver)
    }

    /// Resolve guidance for `service_name`, persisting it under `record_id`
    /// when one is given
    ///
    /// A failed save is logged; the caller still receives the record.
    pub async fn resolve(
        &self,
        service_name: &str,
        mode: Mode,
        record_id: Option<&str>,
    ) -> Option<Info> {
        let pipeline = self.run_pipeline(service_name, mode);

        let info = match self.config.resolver.timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), pipeline).await {
                Ok(info) => info,
                Err(_) => {
                    warn!(service = %service_name, %mode, "Resolve exceeded {}s deadline", secs);
                    None
                }
            },
            None => pipeline.await,
        }?;

        if let Some(record_id) = record_id {
            self.persist(record_id, &info).await;
        }

        Some(info)
    }

    pub async fn resolve_request(&self, request: &InfoRequest) -> Option<Info> {
        self.resolve(&request.service_name, request.mode, request.record_id.as_deref())
            .await
    }

    /// Re-run resolution; identical to [`InfoResolver::resolve`] since there
    /// is no cache to bypass
    pub async fn refresh(
        &self,
        service_name: &str,
        mode: Mode,
        record_id: Option<&str>,
    ) -> Option<Info> {
        self.resolve(service_name, mode, record_id).await
    }

    /// Replace the stored URL with a human-entered one and mark it verified
    ///
    /// Merges onto the stored object so steps, required info, and notes
    /// survive. Returns `false` on any read or write failure.
    pub async fn update_url(&self, record_id: &str, mode: Mode, new_url: &str) -> bool {
        let Some(store) = self.store.as_ref() else {
            warn!(record_id = %record_id, "update_url called without a store");
            return false;
        };

        let existing = match store.get_info(record_id, mode).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(record_id = %record_id, %mode, error = %e, "Failed to read info for URL update");
                return false;
            }
        };

        let mut object = match existing {
            None => Map::new(),
            Some(Value::Object(object)) => object,
            Some(other) => {
                warn!(record_id = %record_id, %mode, "Stored info is not an object: {}", other);
                return false;
            }
        };

        object.insert(mode.url_key().to_string(), Value::String(new_url.trim().to_string()));
        object.insert("verified".to_string(), Value::Bool(true));

        match store.set_info(record_id, mode, &Value::Object(object)).await {
            Ok(()) => {
                info!(record_id = %record_id, %mode, "Stored manually verified URL");
                true
            }
            Err(e) => {
                warn!(record_id = %record_id, %mode, error = %e, "Failed to write updated URL");
                false
            }
        }
    }

    /// Read the stored record, normalized; `None` when absent or unreadable
    pub async fn stored_info(&self, record_id: &str, mode: Mode) -> Option<Info> {
        let store = self.store.as_ref()?;
        match store.get_info(record_id, mode).await {
            Ok(Some(value)) => match Info::from_value(mode, value) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!(record_id = %record_id, %mode, error = %e, "Stored info is malformed");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(record_id = %record_id, %mode, error = %e, "Failed to read stored info");
                None
            }
        }
    }

    async fn run_pipeline(&self, service_name: &str, mode: Mode) -> Option<Info> {
        let service_name = service_name.trim();
        if service_name.is_empty() {
            warn!("Empty service name, nothing to resolve");
            return None;
        }

        let Some(model) = self.model.as_ref() else {
            warn!(service = %service_name, "No model client configured, cannot resolve");
            return None;
        };

        let mut trace = DebugTrace::new(self.config.resolver.collect_debug_logs);

        // 1. Search
        let query = search_query(service_name, mode);
        let results = self.search.search(&query, self.config.search.limit).await;
        if results.is_empty() {
            warn!(service = %service_name, %mode, "No search results, asking model without context");
        }
        trace.push(format!("search \"{}\" returned {} results", query, results.len()));

        // 2. Prompt
        let context = format_search_context(&results);
        let prompt = build_prompt(service_name, &context, mode);
        debug!(service = %service_name, prompt_chars = prompt.chars().count(), "Prompt built");

        // 3. Model call
        let request = GenerateRequest::json(prompt, &self.config.model);
        let text = match model.generate(request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(service = %service_name, model = model.name(), error = %e, "Model call failed");
                return None;
            }
        };
        trace.push(format!("model {} returned {} chars", model.name(), text.len()));

        // 4. Parse + 6. Normalize
        let mut info = match parse_model_output(&text, mode) {
            Ok(info) => info,
            Err(e) => {
                warn!(
                    service = %service_name,
                    error = %e,
                    "Discarding unparseable model output: {}",
                    preview(&text)
                );
                return None;
            }
        };

        // 5. Validate (advisory)
        if should_validate(&info) {
            let url = info.url().to_string();
            if self.validator.validate(&url).await {
                trace.push(format!("validated {url}"));
            } else {
                warn!(service = %service_name, url = %url, "URL failed validation, keeping it unverified");
                trace.push(format!("validation failed for {url}, kept"));
            }
        }

        if let (Info::Cancellation(cancellation), Some(logs)) = (&mut info, trace.finish()) {
            cancellation.debug_logs = Some(logs);
        }

        info!(service = %service_name, %mode, url = %info.url(), "Resolved info");
        Some(info)
    }

    async fn persist(&self, record_id: &str, info: &Info) {
        let Some(store) = self.store.as_ref() else {
            debug!(record_id = %record_id, "No store configured, skipping persist");
            return;
        };

        if let Err(e) = store.set_info(record_id, info.mode(), &info.to_value()).await {
            warn!(record_id = %record_id, error = %e, "Failed to persist info");
        }
    }
}

/// Cancellation URLs are only probed for cancellable services
fn should_validate(info: &Info) -> bool {
    match info {
        Info::Cancellation(c) => c.is_cancellable && !c.cancellation_url.is_empty(),
        Info::Registration(r) => !r.registration_url.is_empty(),
    }
}

fn preview(text: &str) -> String {
    let mut shown: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    if text.chars().count() > LOG_PREVIEW_CHARS {
        shown.push('…');
    }
    shown
}

/// Per-call stage messages, kept only when debug logs are enabled
struct DebugTrace {
    lines: Option<Vec<String>>,
}

impl DebugTrace {
    fn new(enabled: bool) -> Self {
        Self {
            lines: enabled.then(Vec::new),
        }
    }

    fn push(&mut self, message: String) {
        if let Some(lines) = self.lines.as_mut() {
            let stamp = chrono::Utc::now().format("%H:%M:%S%.3f");
            lines.push(format!("[{stamp}] {message}"));
        }
    }

    fn finish(self) -> Option<Vec<String>> {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelError;
    use crate::store::MemoryInfoStore;
    use crate::validator::{ProbeError, Prober};
    use crate::web_search::SearchResult;
    use async_trait::async_trait;
    use reqwest::{Method, StatusCode};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct FixedSearch(Vec<SearchResult>);

    #[async_trait]
    impl SearchProvider for FixedSearch {
        async fn search(&self, _query: &str, limit: usize) -> Vec<SearchResult> {
            self.0.iter().take(limit).cloned().collect()
        }
    }

    struct CountingSearch(AtomicUsize);

    #[async_trait]
    impl SearchProvider for CountingSearch {
        async fn search(&self, _query: &str, _limit: usize) -> Vec<SearchResult> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
    }

    struct SlowModel;

    #[async_trait]
    impl GenerativeModel for SlowModel {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _request: GenerateRequest) -> Result<String, ModelError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("{}".into())
        }
    }

    struct CannedModel {
        reply: String,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl CannedModel {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                requests: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl GenerativeModel for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<String, ModelError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    struct CountingProber {
        status: StatusCode,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, _method: Method, _url: &Url) -> Result<StatusCode, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.status)
        }
    }

    fn prober(status: StatusCode) -> Arc<CountingProber> {
        Arc::new(CountingProber {
            status,
            calls: AtomicUsize::new(0),
        })
    }

    fn resolver(
        search: Arc<dyn SearchProvider>,
        model: Option<Arc<dyn GenerativeModel>>,
        prober: Arc<CountingProber>,
        config: Config,
    ) -> InfoResolver {
        InfoResolver::new(search, model, UrlValidator::new(prober), config)
    }

    #[tokio::test]
    async fn missing_model_short_circuits_before_search() {
        let search = Arc::new(CountingSearch(AtomicUsize::new(0)));
        let resolver = resolver(search.clone(), None, prober(StatusCode::OK), Config::default());

        assert!(resolver.resolve("hulu", Mode::Cancellation, None).await.is_none());
        assert_eq!(search.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_service_name_is_undetermined() {
        let model = CannedModel::new("{}");
        let resolver = resolver(
            Arc::new(FixedSearch(vec![])),
            Some(model.clone()),
            prober(StatusCode::OK),
            Config::default(),
        );

        assert!(resolver.resolve("   ", Mode::Registration, None).await.is_none());
        assert!(model.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_request_uses_configured_sampling() {
        let model = CannedModel::new("{}");
        let mut config = Config::default();
        config.model.temperature = 0.1;
        config.model.max_output_tokens = 512;
        let resolver = resolver(
            Arc::new(FixedSearch(vec![])),
            Some(model.clone()),
            prober(StatusCode::OK),
            config,
        );

        resolver.resolve("hulu", Mode::Cancellation, None).await.unwrap();

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, 0.1);
        assert_eq!(requests[0].max_output_tokens, 512);
        assert_eq!(requests[0].response_mime_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn non_cancellable_records_are_not_probed() {
        let probes = prober(StatusCode::OK);
        let resolver = resolver(
            Arc::new(FixedSearch(vec![])),
            Some(CannedModel::new(
                r#"{"cancellation_url": "https://example.com/help", "is_cancellable": false}"#,
            )),
            probes.clone(),
            Config::default(),
        );

        let info = resolver.resolve("example", Mode::Cancellation, None).await.unwrap();
        assert_eq!(info.url(), "https://example.com/help");
        assert_eq!(probes.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn registration_urls_are_probed_and_kept_on_failure() {
        let probes = prober(StatusCode::INTERNAL_SERVER_ERROR);
        let resolver = resolver(
            Arc::new(FixedSearch(vec![])),
            Some(CannedModel::new(r#"{"registration_url": "https://example.com/signup"}"#)),
            probes.clone(),
            Config::default(),
        );

        let info = resolver.resolve("example", Mode::Registration, None).await.unwrap();
        assert_eq!(info.url(), "https://example.com/signup");
        assert_eq!(probes.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn debug_logs_are_collected_when_enabled() {
        let mut config = Config::default();
        config.resolver.collect_debug_logs = true;
        let resolver = resolver(
            Arc::new(FixedSearch(vec![])),
            Some(CannedModel::new(r#"{"cancellation_url": "https://example.com/cancel"}"#)),
            prober(StatusCode::NOT_FOUND),
            config,
        );

        let info = resolver.resolve("example", Mode::Cancellation, None).await.unwrap();
        let logs = info.as_cancellation().unwrap().debug_logs.clone().unwrap();
        assert_eq!(logs.len(), 3);
        assert!(logs[0].contains("example 解約方法 公式"));
        assert!(logs[2].contains("validation failed"));
    }

    #[tokio::test]
    async fn debug_logs_are_absent_by_default() {
        let resolver = resolver(
            Arc::new(FixedSearch(vec![])),
            Some(CannedModel::new("{}")),
            prober(StatusCode::OK),
            Config::default(),
        );

        let info = resolver.resolve("example", Mode::Cancellation, None).await.unwrap();
        assert!(info.as_cancellation().unwrap().debug_logs.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_slow_resolution_into_none() {
        let store = Arc::new(MemoryInfoStore::new());
        let mut config = Config::default();
        config.resolver.timeout_secs = Some(30);
        let resolver = resolver(
            Arc::new(FixedSearch(vec![])),
            Some(Arc::new(SlowModel)),
            prober(StatusCode::OK),
            config,
        )
        .with_store(store.clone());

        assert!(resolver.resolve("example", Mode::Cancellation, Some("sub-1")).await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_url_without_store_fails() {
        let resolver = resolver(
            Arc::new(FixedSearch(vec![])),
            None,
            prober(StatusCode::OK),
            Config::default(),
        );
        assert!(!resolver.update_url("sub-1", Mode::Cancellation, "https://example.com").await);
    }

    #[tokio::test]
    async fn update_url_rejects_non_object_records() {
        let store = Arc::new(MemoryInfoStore::new());
        store
            .set_info("sub-1", Mode::Cancellation, &Value::String("legacy".into()))
            .await
            .unwrap();
        let resolver = resolver(
            Arc::new(FixedSearch(vec![])),
            None,
            prober(StatusCode::OK),
            Config::default(),
        )
        .with_store(store.clone());

        assert!(!resolver.update_url("sub-1", Mode::Cancellation, "https://example.com").await);
        assert_eq!(
            store.get_info("sub-1", Mode::Cancellation).await.unwrap(),
            Some(Value::String("legacy".into()))
        );
    }

    #[tokio::test]
    async fn update_url_on_empty_record_creates_verified_entry() {
        let store = Arc::new(MemoryInfoStore::new());
        let resolver = resolver(
            Arc::new(FixedSearch(vec![])),
            None,
            prober(StatusCode::OK),
            Config::default(),
        )
        .with_store(store);

        assert!(resolver.update_url("sub-9", Mode::Registration, " https://example.com/join ").await);
        let info = resolver.stored_info("sub-9", Mode::Registration).await.unwrap();
        assert_eq!(info.url(), "https://example.com/join");
        assert!(info.verified());
    }

    #[test]
    fn from_config_rejects_out_of_range_timeouts() {
        let mut config = Config::default();
        config.validator.timeout_secs = 0;
        assert!(InfoResolver::from_config(config).is_err());

        let mut config = Config::default();
        config.search.limit = 0;
        assert!(InfoResolver::from_config(config).is_err());
    }

    #[test]
    fn preview_truncates_long_output() {
        let long = "x".repeat(LOG_PREVIEW_CHARS + 10);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), LOG_PREVIEW_CHARS + 1);
        assert!(shown.ends_with('…'));
        assert_eq!(preview("short"), "short");
    }
}
