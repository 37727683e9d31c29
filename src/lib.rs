//! Prerender
//!
//! Build-time prerendering of a single-page application: the built asset tree
//! is served on a loopback port, each locale is rendered once in headless
//! Chrome, and the hydrated, sanitized markup is written as a static entry
//! point per locale next to a verification screenshot.
//!
//! # Pipeline
//!
//! - [`stage::prepare`] recreates the output and screenshot directories
//! - [`locales::list_locales`] derives the locale keys from the locale directory
//! - [`StaticServer`] serves the staged tree
//! - [`Browser`] drives the rendering engine from a worker thread
//! - [`sanitize::sanitize`] and [`output::finalize`] produce each entry point
//! - [`Pipeline`] sequences all of it and reports a [`RunSummary`]
//!
//! # Example
//!
//! ```no_run
//! use prerender::RunConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig {
//!     excluded_locale: "all".to_string(),
//!     ready_timeout_ms: 10_000,
//!     ..Default::default()
//! };
//!
//! let summary = prerender::run_with_chrome(config).await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{RunConfig, Viewport};

pub mod locales;
pub use locales::LocaleKey;

pub mod stage;
pub mod server;
pub use server::StaticServer;

// Engine seam and the async worker-backed facade over it
pub mod engine;
pub mod browser;
pub use browser::{Browser, Page};
pub use engine::{RenderEngine, RenderPage};

// CDP backend (feature-gated)
#[cfg(feature = "cdp")]
pub mod cdp;

pub mod render;
pub mod sanitize;
pub mod output;
pub mod screenshot;

pub mod pipeline;
pub use pipeline::{LocaleReport, Pipeline, RenderResult, RunState, RunSummary};

#[cfg(feature = "cdp")]
pub use pipeline::run_with_chrome;
