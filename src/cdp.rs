//! Chrome DevTools Protocol engine (uses the `headless_chrome` crate)

use crate::engine::{RenderEngine, RenderPage};
use crate::{Error, Result, RunConfig};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Page, Target};
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

const CONTENT_SCRIPT: &str = r#"(function(){
    const d = document.doctype;
    const doctype = d ? '<!DOCTYPE ' + d.name + '>' : '';
    return doctype + document.documentElement.outerHTML;
})()"#;

const HEIGHT_SCRIPT: &str = r#"Math.max(
    document.documentElement ? document.documentElement.scrollHeight : 0,
    document.body ? document.body.scrollHeight : 0
)"#;

/// Headless Chrome engine
///
/// One Chrome process per engine; each page gets its own incognito browser
/// context so storage and cookies never carry over between locales.
pub struct CdpEngine {
    browser: Browser,
    navigation_timeout: Duration,
    viewport_width: u32,
}

/// A tab inside its own browser context.
pub struct CdpPage {
    tab: Arc<Tab>,
    context_id: String,
    viewport_width: u32,
}

impl CdpEngine {
    /// Launch headless Chrome configured from `config`.
    pub fn launch(config: &RunConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .path(config.chrome_path.clone())
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(Duration::from_millis(
                config.navigation_timeout_ms.max(config.ready_timeout_ms) * 4,
            ))
            .build()
            .map_err(|e| Error::Engine(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Engine(format!("Failed to launch browser: {}", e)))?;
        debug!("Launched headless Chrome");

        Ok(Self {
            browser,
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
            viewport_width: config.viewport.width,
        })
    }
}

impl RenderEngine for CdpEngine {
    type Page = CdpPage;

    fn new_page(&mut self) -> Result<CdpPage> {
        let context = self
            .browser
            .new_context()
            .map_err(|e| Error::Engine(format!("Failed to create browser context: {}", e)))?;
        let tab = context
            .new_tab()
            .map_err(|e| Error::Engine(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(self.navigation_timeout);

        Ok(CdpPage {
            tab,
            context_id: context.get_id().to_string(),
            viewport_width: self.viewport_width,
        })
    }

    fn close_page(&mut self, page: CdpPage) -> Result<()> {
        if let Err(e) = page.tab.close(true) {
            warn!("Failed to close tab: {}", e);
        }
        self.browser
            .call_method(Target::DisposeBrowserContext {
                browser_context_id: page.context_id,
            })
            .map_err(|e| Error::Engine(format!("Failed to dispose browser context: {}", e)))?;
        Ok(())
    }

    fn close(self) -> Result<()> {
        // Dropping the last handle terminates the Chrome child process.
        drop(self.browser);
        Ok(())
    }
}

impl RenderPage for CdpPage {
    fn goto(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::Navigation(format!("{}: {}", url, e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::Navigation(format!("Wait for navigation to {} failed: {}", url, e)))?;
        Ok(())
    }

    fn is_ready(&mut self, selector: &str) -> Result<bool> {
        let selector = serde_json::to_string(selector)
            .map_err(|e| Error::Render(format!("Failed to encode selector: {}", e)))?;
        let script = format!(
            "(function(sel){{ const root = document.querySelector(sel); return !!root && root.innerHTML.trim().length > 0; }})({})",
            selector
        );
        let eval = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| Error::Render(format!("Readiness probe failed: {}", e)))?;
        Ok(eval.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn content(&mut self) -> Result<String> {
        let eval = self
            .tab
            .evaluate(CONTENT_SCRIPT, false)
            .map_err(|e| Error::Render(format!("Failed to serialize document: {}", e)))?;
        match eval.value {
            Some(serde_json::Value::String(html)) => Ok(html),
            Some(other) => Err(Error::Render(format!("Unexpected document value: {}", other))),
            None => Err(Error::Render("No value returned from evaluation".into())),
        }
    }

    fn screenshot_png(&mut self) -> Result<Vec<u8>> {
        let height = self
            .tab
            .evaluate(HEIGHT_SCRIPT, false)
            .ok()
            .and_then(|eval| eval.value)
            .and_then(|v| v.as_f64())
            .filter(|h| *h > 0.0);

        let clip = height.map(|height| Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: f64::from(self.viewport_width),
            height,
            scale: 1.0,
        });

        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, clip, true)
            .map_err(|e| Error::Screenshot(format!("Screenshot failed: {}", e)))
    }
}
