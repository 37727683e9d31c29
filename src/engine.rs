//! Rendering engine seam
//!
//! The pipeline talks to the browser through these two traits. The production
//! implementation lives in [`crate::cdp`]; tests plug in scripted engines.

use crate::Result;

/// A running rendering engine (one browser process per run).
///
/// Engines are driven from a single worker thread (see [`crate::Browser`]), so
/// they do not need to be `Send`.
pub trait RenderEngine {
    type Page: RenderPage;

    /// Open a fresh page in its own isolated context (storage, cookies, scripts).
    fn new_page(&mut self) -> Result<Self::Page>;

    /// Close a page and dispose of its context.
    fn close_page(&mut self, page: Self::Page) -> Result<()>;

    /// Shut the engine down and release the underlying process.
    fn close(self) -> Result<()>;
}

/// A single page context owned by a [`RenderEngine`].
pub trait RenderPage {
    /// Navigate to `url` and wait for the load to settle.
    fn goto(&mut self, url: &str) -> Result<()>;

    /// One readiness probe: `selector` matches and its trimmed inner HTML is non-empty.
    fn is_ready(&mut self, selector: &str) -> Result<bool>;

    /// Serialized markup of the whole document, doctype included.
    fn content(&mut self) -> Result<String>;

    /// Full-page PNG of the current document.
    fn screenshot_png(&mut self) -> Result<Vec<u8>>;
}
