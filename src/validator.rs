//! Reachability probing for candidate URLs
//!
//! `HEAD` first; servers that reject `HEAD` with 403/404/405 get exactly one
//! `GET`. Every failure mode folds into `false`. The result is advisory: the
//! resolver keeps unreachable URLs and only logs a warning.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::ValidatorConfig;

/// Statuses that usually mean "HEAD not welcome" rather than "page gone"
const RETRY_WITH_GET: &[StatusCode] = &[
    StatusCode::FORBIDDEN,
    StatusCode::NOT_FOUND,
    StatusCode::METHOD_NOT_ALLOWED,
];

#[derive(Error, Debug)]
#[error("Probe failed: {0}")]
pub struct ProbeError(pub String);

/// Issues a single request and reports the response status
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, method: Method, url: &Url) -> Result<StatusCode, ProbeError>;
}

/// reqwest-backed prober with a per-request timeout and fixed user agent
pub struct ReqwestProber {
    client: Client,
}

impl ReqwestProber {
    pub fn new(config: &ValidatorConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ProbeError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for ReqwestProber {
    async fn probe(&self, method: Method, url: &Url) -> Result<StatusCode, ProbeError> {
        let resp = self
            .client
            .request(method, url.clone())
            .send()
            .await
            .map_err(|e| ProbeError(e.to_string()))?;
        Ok(resp.status())
    }
}

#[derive(Clone)]
pub struct UrlValidator {
    prober: Arc<dyn Prober>,
}

impl UrlValidator {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    pub fn from_config(config: &ValidatorConfig) -> Result<Self, ProbeError> {
        Ok(Self::new(Arc::new(ReqwestProber::new(config)?)))
    }

    /// `true` when `url` answers with a 2xx to HEAD, or to the GET fallback
    pub async fn validate(&self, url: &str) -> bool {
        let Some(parsed) = parse_probe_url(url) else {
            debug!(url = %url, "Rejected malformed URL without probing");
            return false;
        };

        let status = match self.prober.probe(Method::HEAD, &parsed).await {
            Ok(status) => status,
            Err(e) => {
                warn!(url = %url, error = %e, "HEAD probe failed");
                return false;
            }
        };

        if status.is_success() {
            return true;
        }

        if !RETRY_WITH_GET.contains(&status) {
            debug!(url = %url, status = status.as_u16(), "HEAD probe returned non-success");
            return false;
        }

        debug!(url = %url, status = status.as_u16(), "HEAD rejected, retrying with GET");
        match self.prober.probe(Method::GET, &parsed).await {
            Ok(status) => {
                if !status.is_success() {
                    debug!(url = %url, status = status.as_u16(), "GET probe returned non-success");
                }
                status.is_success()
            }
            Err(e) => {
                warn!(url = %url, error = %e, "GET probe failed");
                false
            }
        }
    }
}

/// Absolute http(s) URL with a host, or `None`
fn parse_probe_url(url: &str) -> Option<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = Url::parse(trimmed).ok()?;
    let web = matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some();
    web.then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted outcomes and records every call
    #[derive(Default)]
    struct ScriptedProber {
        outcomes: Mutex<VecDeque<Result<StatusCode, ProbeError>>>,
        calls: Mutex<Vec<Method>>,
    }

    impl ScriptedProber {
        fn with(outcomes: Vec<Result<StatusCode, ProbeError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::default(),
            })
        }

        fn calls(&self) -> Vec<Method> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, method: Method, _url: &Url) -> Result<StatusCode, ProbeError> {
            self.calls.lock().unwrap().push(method);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProbeError("no scripted outcome".into())))
        }
    }

    #[tokio::test]
    async fn empty_and_malformed_urls_never_hit_the_network() {
        let prober = ScriptedProber::with(vec![]);
        let validator = UrlValidator::new(prober.clone());

        assert!(!validator.validate("").await);
        assert!(!validator.validate("   ").await);
        assert!(!validator.validate("not a url").await);
        assert!(!validator.validate("/account/cancel").await);
        assert!(!validator.validate("mailto:support@example.com").await);
        assert!(prober.calls().is_empty());
    }

    #[tokio::test]
    async fn head_success_needs_one_probe() {
        let prober = ScriptedProber::with(vec![Ok(StatusCode::OK)]);
        let validator = UrlValidator::new(prober.clone());

        assert!(validator.validate("https://help.hulu.jp/cancel").await);
        assert_eq!(prober.calls(), vec![Method::HEAD]);
    }

    #[tokio::test]
    async fn head_404_retries_exactly_once_with_get() {
        let prober = ScriptedProber::with(vec![Ok(StatusCode::NOT_FOUND), Ok(StatusCode::OK)]);
        let validator = UrlValidator::new(prober.clone());

        assert!(validator.validate("https://example.com/help/cancel").await);
        assert_eq!(prober.calls(), vec![Method::HEAD, Method::GET]);
    }

    #[tokio::test]
    async fn get_fallback_failure_is_final() {
        let prober = ScriptedProber::with(vec![
            Ok(StatusCode::METHOD_NOT_ALLOWED),
            Ok(StatusCode::NOT_FOUND),
        ]);
        let validator = UrlValidator::new(prober.clone());

        assert!(!validator.validate("https://example.com/gone").await);
        assert_eq!(prober.calls(), vec![Method::HEAD, Method::GET]);
    }

    #[tokio::test]
    async fn forbidden_head_falls_back_to_get() {
        let prober = ScriptedProber::with(vec![Ok(StatusCode::FORBIDDEN), Ok(StatusCode::NO_CONTENT)]);
        let validator = UrlValidator::new(prober.clone());

        assert!(validator.validate("https://example.com/account").await);
        assert_eq!(prober.calls().len(), 2);
    }

    #[tokio::test]
    async fn other_statuses_do_not_retry() {
        let prober = ScriptedProber::with(vec![Ok(StatusCode::INTERNAL_SERVER_ERROR)]);
        let validator = UrlValidator::new(prober.clone());

        assert!(!validator.validate("https://example.com/").await);
        assert_eq!(prober.calls(), vec![Method::HEAD]);
    }

    #[tokio::test]
    async fn transport_errors_are_false() {
        let prober = ScriptedProber::with(vec![Err(ProbeError("dns failure".into()))]);
        let validator = UrlValidator::new(prober.clone());

        assert!(!validator.validate("https://does-not-exist.invalid/").await);
        assert_eq!(prober.calls(), vec![Method::HEAD]);
    }

    mod live {
        use super::super::*;
        use axum::{Router, http::HeaderMap, http::StatusCode as AxumStatus, routing::get};

        async fn serve(router: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });
            format!("http://{addr}")
        }

        #[tokio::test]
        async fn reqwest_prober_falls_back_to_get_on_405() {
            let router = Router::new()
                .route(
                    "/cancel",
                    get(|headers: HeaderMap| async move {
                        let ua = headers
                            .get("user-agent")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default();
                        if ua.contains("SubscriptionGuideLinkChecker") {
                            AxumStatus::OK
                        } else {
                            AxumStatus::BAD_REQUEST
                        }
                    })
                    .head(|| async { AxumStatus::METHOD_NOT_ALLOWED }),
                )
                .route("/broken", get(|| async { AxumStatus::INTERNAL_SERVER_ERROR }));
            let base = serve(router).await;

            let validator = UrlValidator::from_config(&ValidatorConfig::default()).unwrap();
            assert!(validator.validate(&format!("{base}/cancel")).await);
            assert!(!validator.validate(&format!("{base}/broken")).await);
        }

        #[tokio::test]
        async fn refused_connection_is_false() {
            // Bind then drop to get a port nothing listens on
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let validator = UrlValidator::from_config(&ValidatorConfig::default()).unwrap();
            assert!(!validator.validate(&format!("http://{addr}/")).await);
        }
    }
}
