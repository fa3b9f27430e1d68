//! Headless Chromium session shared by the capture and Markdown pipelines.
//!
//! A [`BrowserSession`] owns the browser process and the task driving its
//! DevTools connection. Always finish with [`BrowserSession::close`], also
//! on the error path, so no Chromium process outlives the call.

use crate::config::BrowserOptions;
use crate::error::ForgeError;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Maximum time to wait for `document.readyState == "complete"`.
const READY_TIMEOUT: Duration = Duration::from_secs(15);

pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Starts a headless browser with the configured viewport.
    pub async fn launch(opts: &BrowserOptions) -> Result<Self, ForgeError> {
        let executable = match &opts.chrome_path {
            Some(p) => p.clone(),
            None => tool_locate::locate_chrome()?,
        };
        debug!(chrome = %executable.display(), "launching headless browser");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .window_size(opts.viewport_width, opts.viewport_height)
            .viewport(Viewport {
                width: opts.viewport_width,
                height: opts.viewport_height,
                ..Viewport::default()
            })
            .request_timeout(Duration::from_secs(opts.request_timeout_secs))
            .arg("--hide-scrollbars")
            .arg("--disable-gpu");
        if opts.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(ForgeError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ForgeError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler stopped: {e}");
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }

    /// Opens `url` in a new tab and waits for the document to finish loading.
    pub async fn open(&self, url: &str) -> Result<Page, ForgeError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| step_failed("open page", e))?;
        wait_until_ready(&page).await?;
        Ok(page)
    }

    /// Opens a local file.
    pub async fn open_file(&self, path: &Path) -> Result<Page, ForgeError> {
        self.open(&file_url(path).await?).await
    }

    /// Shuts the browser down and reaps the process. Errors are logged.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("closing browser: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            warn!("waiting for browser exit: {e}");
        }
        self.handler.abort();
    }
}

/// `file://` URL for an existing local file.
pub async fn file_url(path: &Path) -> Result<String, ForgeError> {
    let abs = tokio::fs::canonicalize(path)
        .await
        .map_err(|e| ForgeError::from_input_io(path, e))?;
    reqwest::Url::from_file_path(&abs)
        .map(|u| u.to_string())
        .map_err(|_| ForgeError::InvalidInput {
            input: abs.display().to_string(),
            reason: "cannot be expressed as a file:// URL".into(),
        })
}

/// Evaluates `script` and decodes its completion value.
pub async fn eval<T: serde::de::DeserializeOwned>(
    page: &Page,
    step: &'static str,
    script: &str,
) -> Result<T, ForgeError> {
    page.evaluate(script)
        .await
        .map_err(|e| step_failed(step, e))?
        .into_value::<T>()
        .map_err(|e| step_failed(step, e))
}

pub(crate) fn step_failed(step: &'static str, e: impl std::fmt::Display) -> ForgeError {
    ForgeError::Browser {
        step,
        detail: e.to_string(),
    }
}

async fn wait_until_ready(page: &Page) -> Result<(), ForgeError> {
    let deadline = tokio::time::Instant::now() + READY_TIMEOUT;
    loop {
        let state: String = eval(page, "wait for load", "document.readyState").await?;
        if state == "complete" {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("page still '{state}' after {}s, continuing", READY_TIMEOUT.as_secs());
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_url_for_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("page one.html");
        std::fs::write(&p, "<html></html>").unwrap();
        let url = file_url(&p).await.unwrap();
        assert!(url.starts_with("file:///"));
        assert!(url.ends_with("page%20one.html"));
    }

    #[tokio::test]
    async fn file_url_for_missing_file_is_not_found() {
        let err = file_url(Path::new("/definitely/not/here.html")).await.unwrap_err();
        assert!(matches!(err, ForgeError::FileNotFound { .. }));
    }
}
