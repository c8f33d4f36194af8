//! Per-call browser lifecycle
//!
//! Launches a chromiumoxide browser with a unique profile directory and
//! guarantees it is torn down when the caller is done, whether the work
//! succeeded, failed, or panicked.

use std::future::Future;
use std::path::{Path, PathBuf};

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserError, BrowserResult};
use crate::BrowserConfig;

/// One isolated browser process plus its CDP event handler task
///
/// Call [`BrowserSession::close`] for a clean shutdown. If the session is
/// dropped without it (deadline, early return, panic), `Drop` aborts the
/// handler and hands the browser to a background task that kills Chrome,
/// waits for it to exit, and only then removes the profile directory.
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserSession {
    /// Launch a fresh browser with its own throwaway profile directory
    ///
    /// The directory name carries a random UUID so concurrent sessions in the
    /// same process never contend for a Chrome profile lock.
    pub async fn launch(config: &BrowserConfig) -> BrowserResult<Self> {
        let user_data_dir = std::env::temp_dir().join(format!(
            "subscription_guide_search_{}_{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));

        debug!("Launching search browser with profile {}", user_data_dir.display());

        let (browser, handler) =
            crate::browser_setup::launch_browser(config, Some(user_data_dir.clone()))
                .await
                .map_err(|e| BrowserError::LaunchFailed(format!("{e:#}")))?;

        Ok(Self {
            browser: Some(browser),
            handler,
            user_data_dir: Some(user_data_dir),
        })
    }

    /// Create a blank page to navigate from
    pub async fn new_page(&self) -> BrowserResult<Page> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| BrowserError::PageCreationFailed("browser already closed".into()))?;
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))
    }

    /// Close the browser, wait for the process to exit, then remove the
    /// profile directory
    ///
    /// Both `close()` and `wait()` are needed: dropping the handler alone
    /// leaves a zombie Chrome process behind.
    pub async fn close(mut self) {
        info!("Shutting down search browser");

        let browser = self.browser.take();
        let user_data_dir = self.user_data_dir.take();
        self.handler.abort();

        let Some(mut browser) = browser else {
            return;
        };

        shutdown_then_remove(
            async move {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser cleanly: {}", e);
                }
                if let Err(e) = browser.wait().await {
                    warn!("Failed to wait for browser exit: {}", e);
                }
            },
            user_data_dir,
        )
        .await;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();

        let Some(mut browser) = self.browser.take() else {
            return;
        };
        let user_data_dir = self.user_data_dir.take();

        warn!("BrowserSession dropped without close(); killing browser in the background");

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(shutdown_then_remove(
                    async move {
                        if let Some(Err(e)) = browser.kill().await {
                            warn!("Failed to kill browser: {}", e);
                        }
                        if let Err(e) = browser.wait().await {
                            warn!("Failed to wait for browser exit: {}", e);
                        }
                    },
                    user_data_dir,
                ));
            }
            Err(_) => {
                // Browser::drop() starts the kill; the profile may still be
                // locked, so removal is best-effort
                drop(browser);
                if let Some(path) = user_data_dir {
                    remove_profile_dir(&path);
                }
            }
        }
    }
}

/// Await `shutdown`, then remove `user_data_dir`
///
/// The directory must outlive the Chrome process, otherwise Chrome keeps
/// writing into it and Windows refuses to delete locked files.
async fn shutdown_then_remove<F>(shutdown: F, user_data_dir: Option<PathBuf>)
where
    F: Future<Output = ()>,
{
    shutdown.await;
    if let Some(path) = user_data_dir {
        remove_profile_dir(&path);
    }
}

fn remove_profile_dir(path: &Path) {
    debug!("Cleaning up temp directory: {}", path.display());
    if let Err(e) = std::fs::remove_dir_all(path) {
        warn!(
            "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
            path.display(),
            e
        );
    }
}

/// Run `work` against a blank page of a freshly launched browser
///
/// The browser is closed after `work` completes regardless of its outcome.
/// Launch and page creation failures are returned without running `work`.
pub async fn with_session<F, Fut, T>(config: &BrowserConfig, work: F) -> BrowserResult<T>
where
    F: FnOnce(Page) -> Fut,
    Fut: Future<Output = BrowserResult<T>>,
{
    let session = BrowserSession::launch(config).await?;

    let outcome = match session.new_page().await {
        Ok(page) => work(page).await,
        Err(e) => Err(e),
    };

    session.close().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "sg_profile_{}",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(path.join("Default")).unwrap();
        std::fs::write(path.join("Default").join("Preferences"), "{}").unwrap();
        path
    }

    #[tokio::test]
    async fn profile_survives_until_shutdown_finishes() {
        let dir = scratch_dir();
        let profile = dir.clone();

        shutdown_then_remove(
            async move {
                tokio::task::yield_now().await;
                // Chrome is still "running" here and may write to its profile
                assert!(profile.join("Default").join("Preferences").exists());
                std::fs::write(profile.join("Default").join("Cookies"), "late write").unwrap();
            },
            Some(dir.clone()),
        )
        .await;

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn missing_profile_dir_is_tolerated() {
        let dir = std::env::temp_dir().join(format!("sg_gone_{}", uuid::Uuid::new_v4().simple()));
        shutdown_then_remove(async {}, Some(dir.clone())).await;
        shutdown_then_remove(async {}, None).await;
        assert!(!dir.exists());
    }
}
