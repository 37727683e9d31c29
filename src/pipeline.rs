//! Run controller
//!
//! Sequences staging, locale enumeration, the static server, the rendering
//! engine and the per-locale loop. Per-locale failures are recorded and never
//! stop the loop; the server and engine are released on every exit path.

use crate::browser::{Browser, Page};
use crate::engine::RenderEngine;
use crate::output::WrittenEntry;
use crate::server::StaticServer;
use crate::{locales, output, render, sanitize, screenshot, stage};
use crate::{Error, LocaleKey, Result, RunConfig};
use futures::FutureExt;
use log::{error, info, warn};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

/// Progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Staged,
    ServerUp,
    EngineUp,
    LocaleLoop,
    /// The loop completed, whatever the per-locale outcomes
    Done,
    /// A setup step failed before the loop started
    Failed,
}

/// Outcome of rendering one locale.
#[derive(Debug)]
pub struct RenderResult {
    pub locale: LocaleKey,
    /// Sanitized markup, absent when rendering or sanitizing failed
    pub html: Option<String>,
    pub entry: Option<WrittenEntry>,
    pub screenshot: Option<PathBuf>,
    pub error: Option<Error>,
    pub screenshot_error: Option<Error>,
}

impl RenderResult {
    fn new(locale: LocaleKey) -> Self {
        Self {
            locale,
            html: None,
            entry: None,
            screenshot: None,
            error: None,
            screenshot_error: None,
        }
    }

    fn failed(locale: LocaleKey, error: Error) -> Self {
        Self {
            error: Some(error),
            ..Self::new(locale)
        }
    }
}

/// What the run keeps of a [`RenderResult`] once its markup is on disk.
#[derive(Debug)]
pub struct LocaleReport {
    pub locale: LocaleKey,
    pub entry: Option<WrittenEntry>,
    pub screenshot: Option<PathBuf>,
    pub error: Option<Error>,
    pub screenshot_error: Option<Error>,
}

impl LocaleReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl From<RenderResult> for LocaleReport {
    fn from(r: RenderResult) -> Self {
        Self {
            locale: r.locale,
            entry: r.entry,
            screenshot: r.screenshot,
            error: r.error,
            screenshot_error: r.screenshot_error,
        }
    }
}

/// Final report of a completed run, one entry per locale in processing order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<LocaleReport>,
}

impl RunSummary {
    pub fn report(&self, locale: &LocaleKey) -> Option<&LocaleReport> {
        self.reports.iter().find(|r| &r.locale == locale)
    }

    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.succeeded()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} locale(s): {} succeeded, {} failed",
            self.reports.len(),
            self.succeeded(),
            self.failed()
        )?;
        for r in &self.reports {
            match (&r.error, &r.screenshot_error) {
                (Some(e), _) => writeln!(f, "  {:<8} FAILED {}: {}", r.locale.to_string(), e.kind(), e)?,
                (None, Some(e)) => writeln!(f, "  {:<8} ok (no screenshot: {})", r.locale.to_string(), e)?,
                (None, None) => writeln!(f, "  {:<8} ok", r.locale.to_string())?,
            }
        }
        Ok(())
    }
}

/// The server and engine owned for the duration of the locale loop.
///
/// Both fields release their resource on drop, so an early return, a panic or
/// a dropped future still tears them down; [`Session::shutdown`] is the
/// orderly path.
struct Session {
    server: StaticServer,
    browser: Browser,
}

impl Session {
    async fn shutdown(self) {
        let Session { server, browser } = self;
        if let Err(e) = browser.close().await {
            warn!("Failed to close rendering engine: {}", e);
        }
        server.stop();
    }

    async fn process(&self, config: &RunConfig, locale: &LocaleKey) -> RenderResult {
        let url = match render::locale_url(&self.server.base_url(), &config.locale_query_param, locale) {
            Ok(url) => url,
            Err(e) => return RenderResult::failed(locale.clone(), e),
        };
        info!("Rendering locale {} -> {}", locale, url);

        let page = match self.browser.new_page().await {
            Ok(page) => page,
            Err(e) => return RenderResult::failed(locale.clone(), e),
        };

        let mut result = RenderResult::new(locale.clone());
        let unit = AssertUnwindSafe(render_unit(&page, config, locale, &url, &mut result));
        if unit.catch_unwind().await.is_err() {
            result.error = Some(Error::Render(format!("rendering {} panicked", locale)));
        }

        if let Err(e) = page.close().await {
            warn!("Failed to close page for {}: {}", locale, e);
        }
        result
    }
}

/// Render → sanitize → write → screenshot for one locale on an open page.
async fn render_unit(page: &Page, config: &RunConfig, locale: &LocaleKey, url: &str, result: &mut RenderResult) {
    let captured = render::capture_markup(page, config, url).await;
    let html = match captured.and_then(|raw| sanitize::sanitize(&raw)) {
        Ok(html) => html,
        Err(e) => {
            result.error = Some(e);
            return;
        }
    };

    match output::finalize(config, locale, &html) {
        Ok(entry) => result.entry = Some(entry),
        Err(e) => result.error = Some(e),
    }
    result.html = Some(html);

    match screenshot::capture(page, config, locale).await {
        Ok(path) => result.screenshot = Some(path),
        Err(e) => result.screenshot_error = Some(e),
    }
}

/// Drives one prerender run.
pub struct Pipeline {
    config: RunConfig,
    state: RunState,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            state: RunState::Idle,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the whole pipeline with the engine produced by `launch`.
    ///
    /// Returns `Err` only for failures before the locale loop; per-locale
    /// failures are in the returned summary.
    pub async fn run<E, F>(&mut self, launch: F) -> Result<RunSummary>
    where
        E: RenderEngine + 'static,
        F: FnOnce() -> Result<E> + Send + 'static,
    {
        match self.run_inner(launch).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!("Prerender aborted: {}", e);
                self.advance(RunState::Failed);
                Err(e)
            }
        }
    }

    async fn run_inner<E, F>(&mut self, launch: F) -> Result<RunSummary>
    where
        E: RenderEngine + 'static,
        F: FnOnce() -> Result<E> + Send + 'static,
    {
        self.config.validate()?;

        stage::prepare(&self.config)?;
        self.advance(RunState::Staged);

        let locales = locales::list_locales(&self.config)?;
        info!(
            "Locales: {}",
            locales.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(", ")
        );

        let server = StaticServer::start(&self.config.output_dir, self.config.port, &self.config.entry_file)?;
        self.advance(RunState::ServerUp);

        let browser = Browser::launch(launch)
            .await
            .map_err(|e| Error::Setup(format!("failed to launch rendering engine: {}", e)))?;
        self.advance(RunState::EngineUp);

        let session = Session { server, browser };
        self.advance(RunState::LocaleLoop);

        let mut summary = RunSummary::default();
        for locale in &locales {
            let result = session.process(&self.config, locale).await;
            log_result(&result);
            summary.reports.push(result.into());
        }

        session.shutdown().await;
        self.advance(RunState::Done);
        info!(
            "All locales processed: {} succeeded, {} failed",
            summary.succeeded(),
            summary.failed()
        );
        Ok(summary)
    }

    fn advance(&mut self, next: RunState) {
        log::debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn log_result(result: &RenderResult) {
    match &result.error {
        None => info!("Locale {} done", result.locale),
        Some(e) => error!("Locale {} failed ({}): {}", result.locale, e.kind(), e),
    }
    if let Some(e) = &result.screenshot_error {
        warn!("Locale {} screenshot failed: {}", result.locale, e);
    }
}

/// Run the pipeline against headless Chrome.
#[cfg(feature = "cdp")]
pub async fn run_with_chrome(config: RunConfig) -> Result<RunSummary> {
    let engine_config = config.clone();
    let mut pipeline = Pipeline::new(config);
    pipeline
        .run(move || crate::cdp::CdpEngine::launch(&engine_config))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RenderPage;

    const HYDRATED: &str = r#"<!DOCTYPE html><html class="dark"><body><div id="root"><svg></svg><img src="/a.png"></div></body></html>"#;

    struct FixedEngine;
    struct FixedPage;

    impl RenderEngine for FixedEngine {
        type Page = FixedPage;

        fn new_page(&mut self) -> Result<FixedPage> {
            Ok(FixedPage)
        }

        fn close_page(&mut self, _page: FixedPage) -> Result<()> {
            Ok(())
        }

        fn close(self) -> Result<()> {
            Ok(())
        }
    }

    impl RenderPage for FixedPage {
        fn goto(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        fn is_ready(&mut self, _selector: &str) -> Result<bool> {
            Ok(true)
        }

        fn content(&mut self) -> Result<String> {
            Ok(HYDRATED.to_string())
        }

        fn screenshot_png(&mut self) -> Result<Vec<u8>> {
            Ok(b"\x89PNG".to_vec())
        }
    }

    #[tokio::test]
    async fn failed_write_keeps_markup_and_screenshot() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("dist-seo");
        std::fs::write(&blocker, "a file where the output tree should be").unwrap();
        let shots = tmp.path().join("shots");
        std::fs::create_dir_all(&shots).unwrap();
        let cfg = RunConfig {
            output_dir: blocker,
            screenshot_dir: shots.clone(),
            ..Default::default()
        };

        let browser = Browser::launch(|| Ok(FixedEngine)).await.unwrap();
        let page = browser.new_page().await.unwrap();
        let locale = LocaleKey::new("fr");
        let mut result = RenderResult::new(locale.clone());
        render_unit(&page, &cfg, &locale, "http://127.0.0.1:4173/?webLang=fr", &mut result).await;

        assert_eq!(result.error.as_ref().map(|e| e.kind()), Some("WriteError"));
        assert!(result.entry.is_none());
        let html = result.html.as_deref().expect("sanitized markup is kept");
        assert!(!html.contains("<svg"));
        assert!(!html.contains("class=\"dark\""));
        assert_eq!(result.screenshot, Some(shots.join("fr.png")));

        page.close().await.unwrap();
        browser.close().await.unwrap();
    }

    #[test]
    fn summary_counts_failures() {
        let ok = RenderResult::new(LocaleKey::root());
        let bad = RenderResult::failed(LocaleKey::new("de"), Error::Navigation("reset".into()));
        let summary = RunSummary {
            reports: vec![ok.into(), bad.into()],
        };
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
        let text = summary.to_string();
        assert!(text.starts_with("2 locale(s): 1 succeeded, 1 failed"));
        assert!(text.contains("de       FAILED NavigationError"));
    }
}
