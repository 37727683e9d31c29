//! Removal of runtime-only artifacts from captured markup
//!
//! A captured document still carries things that only make sense while the
//! application is running: inline icon SVGs, the style-injection container of
//! the CSS-in-JS runtime, the toast container, and the theme class on `<html>`.
//! The sanitizer strips them so the static entry point is neutral.

use crate::{Error, Result};
use lol_html::{element, rewrite_str, RewriteStrSettings};

/// One step of the sanitization rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Remove every element with this tag name, subtree included
    RemoveTag(&'static str),
    /// Remove the element with this id, subtree included
    RemoveId(&'static str),
    /// Remove every element carrying this attribute, subtree included
    RemoveWithAttribute(&'static str),
    /// Drop this attribute from the `<html>` element
    StripRootAttribute(&'static str),
}

impl Rule {
    fn selector(&self) -> String {
        match self {
            Rule::RemoveTag(tag) => (*tag).to_string(),
            Rule::RemoveId(id) => format!("#{}", id),
            Rule::RemoveWithAttribute(attr) => format!("[{}]", attr),
            Rule::StripRootAttribute(_) => "html".to_string(),
        }
    }
}

/// The fixed, ordered rule set applied to every captured document.
pub const RULES: &[Rule] = &[
    Rule::RemoveTag("svg"),
    Rule::RemoveId("_goober"),
    Rule::RemoveWithAttribute("data-rht-toaster"),
    Rule::StripRootAttribute("class"),
];

/// Sanitize `html` with [`RULES`].
///
/// Pure and deterministic; applying it to its own output is a no-op.
pub fn sanitize(html: &str) -> Result<String> {
    sanitize_with(html, RULES)
}

/// Sanitize `html` with an explicit rule set.
pub fn sanitize_with(html: &str, rules: &[Rule]) -> Result<String> {
    let handlers = rules
        .iter()
        .map(|rule| match *rule {
            Rule::StripRootAttribute(attr) => element!(rule.selector(), move |el| {
                el.remove_attribute(attr);
                Ok(())
            }),
            _ => element!(rule.selector(), |el| {
                el.remove();
                Ok(())
            }),
        })
        .collect();

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| Error::Sanitize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURED: &str = r#"<!DOCTYPE html><html lang="fr" class="dark"><head><style id="_goober">.go1{color:red}</style><title>QR</title></head><body><div id="root"><nav><a href="/"><svg viewBox="0 0 24 24"><path d="M0 0h24"></path></svg>Home</a></nav><main><h1>Scanner</h1><button class="btn"><svg><g><circle r="2"></circle></g></svg>Scan</button></main></div><div data-rht-toaster=""><div role="status">Copied</div></div></body></html>"#;

    #[test]
    fn strips_runtime_artifacts() {
        let out = sanitize(CAPTURED).unwrap();
        assert!(!out.contains("<svg"));
        assert!(!out.contains("<path"));
        assert!(!out.contains("_goober"));
        assert!(!out.contains("data-rht-toaster"));
        assert!(!out.contains("Copied"));
        assert!(out.contains(r#"<html lang="fr">"#));
        assert!(out.contains("<h1>Scanner</h1>"));
        assert!(out.contains(r#"<button class="btn">Scan</button>"#));
        assert!(out.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize(CAPTURED).unwrap();
        let twice = sanitize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn leaves_clean_markup_untouched() {
        let clean = r#"<html lang="en"><head></head><body><div id="root"><p class="x">hi</p></div></body></html>"#;
        assert_eq!(sanitize(clean).unwrap(), clean);
    }

    #[test]
    fn only_root_class_is_removed() {
        let html = r#"<html class="light"><body class="page"><div class="card">x</div></body></html>"#;
        let out = sanitize(html).unwrap();
        assert_eq!(out, r#"<html><body class="page"><div class="card">x</div></body></html>"#);
    }

    #[test]
    fn custom_rules_apply_in_order() {
        let html = r#"<html><body><aside id="debug">x</aside><img src="/a.png"></body></html>"#;
        let out = sanitize_with(html, &[Rule::RemoveId("debug"), Rule::RemoveTag("img")]).unwrap();
        assert_eq!(out, "<html><body></body></html>");
    }
}
