//! HTML minification.
//!
//! Whitespace is collapsed outside of attribute values, `<pre>`, `<textarea>`,
//! `<script>` and `<style>`, comments are dropped (conditional comments are
//! kept), and inline styles and scripts go through the CSS and JS minifiers.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::css::minify_css;
use crate::script::minify_js;
use crate::traits::{Asset, Filter, FilterError};

/// Regions that are not whitespace-collapsed.
static PROTECTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<!--.*?-->|<pre\b[^>]*>.*?</pre\s*>|<textarea\b[^>]*>.*?</textarea\s*>|<script\b([^>]*)>(.*?)</script\s*>|<style\b([^>]*)>(.*?)</style\s*>",
    )
    .expect("Invalid protected region regex")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// A whole tag, quoted attribute values included.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(?:"[^"]*"|'[^']*'|[^'">])*>"#).expect("Invalid tag regex")
});

/// Whitespace between attributes; quoted values match first and are kept.
static TAG_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""[^"]*"|'[^']*'|\s+"#).expect("Invalid tag whitespace regex")
});

/// Tags around which whitespace never renders.
static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*(<!doctype[^>]*>|</?(?:html|head|body|title|meta|link|base|div|p|ul|ol|li|dl|dt|dd|section|header|footer|nav|main|article|aside|h[1-6]|table|thead|tbody|tfoot|tr|td|th|form|fieldset|figure|figcaption|blockquote|hr|br|noscript)\b[^>]*>)\s*",
    )
    .expect("Invalid block tag regex")
});

static TYPE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\btype\s*=\s*["']?([^"'\s>]+)"#).expect("Invalid type attribute regex")
});

/// Options mirroring the usual html-minifier switches.
#[derive(Debug, Clone, Copy)]
pub struct HtmlMinifyOptions {
    /// Collapse runs of whitespace in text
    pub collapse_whitespace: bool,
    /// Minify `<style>` blocks
    pub minify_css: bool,
    /// Minify `<script>` blocks
    pub minify_js: bool,
}

impl Default for HtmlMinifyOptions {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            minify_css: true,
            minify_js: true,
        }
    }
}

/// Minifies HTML pages.
#[derive(Debug, Clone, Default)]
pub struct HtmlMinifyFilter {
    options: HtmlMinifyOptions,
}

impl HtmlMinifyFilter {
    pub fn new(options: HtmlMinifyOptions) -> Self {
        Self { options }
    }
}

impl Filter for HtmlMinifyFilter {
    fn name(&self) -> &'static str {
        "htmlmin"
    }

    fn apply(&self, asset: Asset) -> Result<Vec<Asset>, FilterError> {
        let html = minify_html(asset.text()?, &self.options);
        Ok(vec![asset.with_contents(html)])
    }
}

/// Minify an HTML document.
pub fn minify_html(html: &str, options: &HtmlMinifyOptions) -> String {
    let mut out = String::with_capacity(html.len());
    let mut text = String::new();
    let mut after_protected = false;
    let mut last = 0;

    for caps in PROTECTED_RE.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        text.push_str(&html[last..whole.start()]);
        last = whole.end();

        let region = whole.as_str();
        if region.starts_with("<!--") && !region.starts_with("<!--[if") {
            continue;
        }

        out.push_str(&collapse(&text, options, after_protected, true));
        text.clear();
        out.push_str(&protected(&caps, options));
        after_protected = true;
    }

    text.push_str(&html[last..]);
    out.push_str(&collapse(&text, options, after_protected, false));

    if options.collapse_whitespace {
        out.trim().to_string()
    } else {
        out
    }
}

fn collapse(text: &str, options: &HtmlMinifyOptions, trim_start: bool, trim_end: bool) -> String {
    if !options.collapse_whitespace {
        return text.to_string();
    }

    let collapsed = collapse_runs(text);
    let mut collapsed = BLOCK_TAG_RE.replace_all(&collapsed, "$1").into_owned();

    if trim_end {
        collapsed.truncate(collapsed.trim_end().len());
    }
    if trim_start {
        collapsed = collapsed.trim_start().to_string();
    }
    collapsed
}

/// Collapse whitespace in text and between attributes, leaving attribute
/// values untouched.
fn collapse_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for tag in TAG_RE.find_iter(text) {
        out.push_str(&WHITESPACE_RE.replace_all(&text[last..tag.start()], " "));
        out.push_str(&TAG_SPACE_RE.replace_all(tag.as_str(), |caps: &Captures<'_>| {
            let token = &caps[0];
            if token.starts_with(['"', '\'']) {
                token.to_string()
            } else {
                " ".to_string()
            }
        }));
        last = tag.end();
    }

    out.push_str(&WHITESPACE_RE.replace_all(&text[last..], " "));
    out
}

fn protected(caps: &Captures<'_>, options: &HtmlMinifyOptions) -> String {
    let region = &caps[0];

    if let (Some(attrs), Some(body)) = (caps.get(1), caps.get(2)) {
        let attrs = attrs.as_str();
        if !options.minify_js || !is_javascript(attrs) || body.as_str().trim().is_empty() {
            return region.to_string();
        }
        return match minify_js(body.as_str()) {
            Ok(code) => format!("<script{}>{}</script>", attrs, code),
            Err(e) => {
                tracing::warn!("Leaving inline script unminified: {}", e);
                region.to_string()
            }
        };
    }

    if let (Some(attrs), Some(body)) = (caps.get(3), caps.get(4)) {
        if !options.minify_css || body.as_str().trim().is_empty() {
            return region.to_string();
        }
        return match minify_css(body.as_str()) {
            Ok(css) => format!("<style{}>{}</style>", attrs.as_str(), css),
            Err(e) => {
                tracing::warn!("Leaving inline style unminified: {}", e);
                region.to_string()
            }
        };
    }

    region.to_string()
}

fn is_javascript(attrs: &str) -> bool {
    match TYPE_ATTR_RE.captures(attrs) {
        None => true,
        Some(caps) => {
            let ty = caps[1].to_ascii_lowercase();
            ty.contains("javascript") || ty == "module"
        }
    }
}
