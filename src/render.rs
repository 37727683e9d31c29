//! Locale render driver: navigation, bounded readiness wait, markup capture

use crate::browser::Page;
use crate::{Error, LocaleKey, Result, RunConfig};
use log::debug;
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

/// URL that renders `locale`: the base URL for the default locale, otherwise the
/// base URL with `?<param>=<locale>` appended.
pub fn locale_url(base: &str, param: &str, locale: &LocaleKey) -> Result<String> {
    let mut url = Url::parse(base).map_err(|e| Error::Navigation(format!("invalid base URL {}: {}", base, e)))?;
    if !locale.is_root() {
        url.query_pairs_mut().append_pair(param, locale.as_str());
    }
    Ok(url.into())
}

/// Navigate `page` to `url`, wait for the application to report readiness and
/// return the serialized document.
pub async fn capture_markup(page: &Page, config: &RunConfig, url: &str) -> Result<String> {
    page.goto(url).await?;
    wait_until_ready(page, config).await?;
    let html = page.content().await?;
    verify_root(&html, &config.root_selector)?;
    Ok(html)
}

/// Poll the readiness probe until it passes or `ready_timeout_ms` elapses.
pub async fn wait_until_ready(page: &Page, config: &RunConfig) -> Result<()> {
    let timeout = Duration::from_millis(config.ready_timeout_ms);
    let interval = Duration::from_millis(config.ready_poll_interval_ms);

    let poll = async {
        let mut probes = 0u32;
        loop {
            probes += 1;
            if page.is_ready(&config.root_selector).await? {
                debug!("{} ready after {} probe(s)", config.root_selector, probes);
                return Ok(());
            }
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(res) => res,
        Err(_) => Err(Error::ReadinessTimeout {
            selector: config.root_selector.clone(),
            timeout_ms: config.ready_timeout_ms,
        }),
    }
}

/// Check the captured markup still carries a populated root node.
pub fn verify_root(html: &str, root_selector: &str) -> Result<()> {
    let selector = Selector::parse(root_selector)
        .map_err(|e| Error::Render(format!("invalid root selector `{}`: {:?}", root_selector, e)))?;
    let document = Html::parse_document(html);
    let populated = document
        .select(&selector)
        .next()
        .map(|root| !root.inner_html().trim().is_empty())
        .unwrap_or(false);
    if populated {
        Ok(())
    } else {
        Err(Error::Render(format!(
            "captured document has no populated `{}`",
            root_selector
        )))
    }
}
