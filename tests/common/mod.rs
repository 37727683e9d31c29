//! Shared fixtures: a scripted rendering engine and a throwaway project tree.

#![allow(dead_code)]

use prerender::{Error, RenderEngine, RenderPage, Result, RunConfig};
use std::collections::HashSet;
use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const SHELL: &str = r#"<!DOCTYPE html><html lang="en"><head><meta charset="UTF-8"><link rel="icon" href="/favicon.ico"><script type="module" src="/assets/index.js"></script><title>QR Tools</title></head><body><div id="root"></div></body></html>"#;

/// Lay out `dist/`, `src/locales/` and return a config pointing at them.
pub fn project(root: &Path, locales: &[&str], port: u16) -> RunConfig {
    let dist = root.join("dist");
    fs::create_dir_all(dist.join("assets")).unwrap();
    fs::write(dist.join("index.html"), SHELL).unwrap();
    fs::write(dist.join("assets/index.js"), "console.log('app')").unwrap();
    fs::write(dist.join("favicon.ico"), [0u8, 0, 1, 0]).unwrap();

    let locale_dir = root.join("src/locales");
    fs::create_dir_all(&locale_dir).unwrap();
    for name in locales {
        fs::write(locale_dir.join(format!("{}.json", name)), "{}").unwrap();
    }

    RunConfig {
        port,
        source_dir: dist,
        output_dir: root.join("dist-seo"),
        screenshot_dir: root.join("dist-seo-view"),
        locale_dir,
        ready_timeout_ms: 300,
        ready_poll_interval_ms: 20,
        ..Default::default()
    }
}

/// A loopback port that was free a moment ago.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .unwrap()
}

/// Whether `port` becomes bindable again within a second.
///
/// The listener socket is released by the HTTP library's accept thread shortly
/// after the server handle is gone.
pub fn port_released(port: u16) -> bool {
    for _ in 0..50 {
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    false
}

/// What the scripted engine should do for particular locales.
#[derive(Clone, Default)]
pub struct Script {
    pub never_ready: HashSet<String>,
    pub navigation_fails: HashSet<String>,
    pub screenshot_fails: HashSet<String>,
    pub content_panics: HashSet<String>,
}

impl Script {
    pub fn never_ready(mut self, locale: &str) -> Self {
        self.never_ready.insert(locale.to_string());
        self
    }

    pub fn navigation_fails(mut self, locale: &str) -> Self {
        self.navigation_fails.insert(locale.to_string());
        self
    }

    pub fn screenshot_fails(mut self, locale: &str) -> Self {
        self.screenshot_fails.insert(locale.to_string());
        self
    }

    pub fn content_panics(mut self, locale: &str) -> Self {
        self.content_panics.insert(locale.to_string());
        self
    }
}

/// Lifecycle events recorded by the scripted engine.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, e: impl Into<String>) {
        self.0.lock().unwrap().push(e.into());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.all().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// An engine that fetches pages from the static server and "hydrates" them the
/// way the real application would: icons, a style container, a toast host and
/// a theme class on `<html>`.
pub struct ScriptedEngine {
    script: Script,
    events: Events,
    client: reqwest::blocking::Client,
}

impl ScriptedEngine {
    pub fn new(script: Script, events: Events) -> Self {
        events.push("launch");
        Self {
            script,
            events,
            client: reqwest::blocking::Client::new(),
        }
    }
}

pub struct ScriptedPage {
    script: Script,
    events: Events,
    client: reqwest::blocking::Client,
    locale: String,
    head: Option<String>,
}

impl RenderEngine for ScriptedEngine {
    type Page = ScriptedPage;

    fn new_page(&mut self) -> Result<ScriptedPage> {
        self.events.push("open");
        Ok(ScriptedPage {
            script: self.script.clone(),
            events: self.events.clone(),
            client: self.client.clone(),
            locale: String::new(),
            head: None,
        })
    }

    fn close_page(&mut self, page: ScriptedPage) -> Result<()> {
        self.events.push(format!("close {}", page.locale));
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.events.push("shutdown");
        Ok(())
    }
}

impl RenderPage for ScriptedPage {
    fn goto(&mut self, url: &str) -> Result<()> {
        let parsed = url::Url::parse(url).map_err(|e| Error::Navigation(e.to_string()))?;
        self.locale = parsed
            .query_pairs()
            .find(|(k, _)| k == "webLang")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        self.events.push(format!("goto {}", self.locale));

        if self.script.navigation_fails.contains(&self.locale) {
            return Err(Error::Navigation(format!("net::ERR_CONNECTION_RESET at {}", url)));
        }

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| Error::Navigation(e.to_string()))?;
        let head = body
            .split_once("<head>")
            .and_then(|(_, rest)| rest.split_once("</head>"))
            .map(|(head, _)| head.to_string())
            .ok_or_else(|| Error::Navigation("served document has no <head>".into()))?;
        self.head = Some(head);
        Ok(())
    }

    fn is_ready(&mut self, selector: &str) -> Result<bool> {
        assert_eq!(selector, "#root");
        Ok(self.head.is_some() && !self.script.never_ready.contains(&self.locale))
    }

    fn content(&mut self) -> Result<String> {
        if self.script.content_panics.contains(&self.locale) {
            panic!("renderer crashed for {}", self.locale);
        }
        let head = self.head.clone().unwrap_or_default();
        let lang = if self.locale.is_empty() { "en" } else { &self.locale };
        Ok(format!(
            concat!(
                r#"<!DOCTYPE html><html lang="{lang}" class="dark"><head>{head}<style id="_goober">.go1{{color:red}}</style></head>"#,
                r#"<body><div id="root"><nav><a href="/"><svg viewBox="0 0 24 24"><path d="M0 0"></path></svg>Home</a>"#,
                r#"<a href="https://x/y">GitHub</a></nav><main><h1>Hello {lang}</h1><img src="/images/a.png" alt=""></main></div>"#,
                r#"<div data-rht-toaster=""><div role="status"></div></div></body></html>"#
            ),
            lang = lang,
            head = head
        ))
    }

    fn screenshot_png(&mut self) -> Result<Vec<u8>> {
        if self.script.screenshot_fails.contains(&self.locale) {
            return Err(Error::Screenshot("capture timed out".into()));
        }
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }
}
