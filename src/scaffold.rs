//! Scaffold assembly
//!
//! Accumulates fetched bundle HTML into three ordered buckets (head styles,
//! head scripts, footer scripts) and renders them with the workarounds old
//! IE releases need: at most 31 stylesheet links per page, so past a cap the
//! remaining sheets become `@import` rules, themselves chunked because a
//! single `<style>` element also has an import limit.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

/// Stylesheet-producing extensions
pub const CSS_EXTENSIONS: &[&str] = &["css", "sass", "scss"];

/// Script-producing extensions
pub const JS_EXTENSIONS: &[&str] = &["js", "coffee"];

/// Extensions that only exist pre-compilation; built assets are always
/// plain js/css
pub const PRECOMPILED_EXTENSIONS: &[&str] = &["sass", "scss", "coffee"];

/// Six below the real IE limit (31), leaving room for the `@import` style
/// tag plus any link/style blocks scripts append later.
pub const MAX_IE_CSS_INCLUDES: usize = 20;

/// IE also caps the number of `@import` rules per `<style>` element.
pub const MAX_IMPORTS_PER_STYLE_ELEMENT: usize = 25;

/// Conditional-comment hook appended after the head scripts, reserved for
/// scripts that should only load in legacy IE.
const HEAD_JS_IE_TRAILER: &str = "<!--[if lt IE 9]><![endif]-->";

fn folder_extension_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(css|sass|scss|coffee|js)/").expect("valid regex"))
}

/// Find the asset extension of a path: the file extension if present,
/// otherwise (optionally) a `/<ext>/` folder component.
pub fn find_extension(filename: &str, also_search_folder_name: bool) -> Option<String> {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    if let Some((_, ext)) = base.rsplit_once('.') {
        if !ext.is_empty() {
            return Some(ext.to_lowercase());
        }
    }

    if also_search_folder_name {
        if let Some(captures) = folder_extension_regex().captures(filename) {
            return Some(captures[1].to_lowercase());
        }
    }

    None
}

/// Ordered buckets of asset-inclusion HTML lines
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scaffold {
    head_js: Vec<String>,
    head_css: Vec<String>,
    footer_js: Vec<String>,

    /// Render every stylesheet as a plain link, skipping the IE chunking
    force_normal_include: bool,
}

impl Scaffold {
    pub fn new(force_normal_include: bool) -> Self {
        Self {
            force_normal_include,
            ..Self::default()
        }
    }

    pub fn total_css_files(&self) -> usize {
        self.head_css.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head_js.is_empty() && self.head_css.is_empty() && self.footer_js.is_empty()
    }

    pub fn add_head_css_html(&mut self, html: &str) {
        self.head_css.extend(html.split('\n').map(str::to_string));
    }

    pub fn add_head_js_html(&mut self, html: &str) {
        self.head_js.extend(html.split('\n').map(str::to_string));
    }

    pub fn add_footer_js_html(&mut self, html: &str) {
        self.footer_js.extend(html.split('\n').map(str::to_string));
    }

    /// Route `html` to a bucket based on the originating bundle path:
    /// stylesheets to head-css, scripts named `*_head.js` / `*-head.js` to
    /// head-js, everything else to footer-js.
    pub fn add_html_by_file_name(&mut self, file_name: &str, html: &str) {
        let extension = find_extension(file_name, true);
        if extension
            .as_deref()
            .is_some_and(|ext| CSS_EXTENSIONS.contains(&ext))
        {
            self.add_head_css_html(html);
        } else if file_name.contains("_head.js") || file_name.contains("-head.js") {
            self.add_head_js_html(html);
        } else {
            self.add_footer_js_html(html);
        }
    }

    pub fn header_js_html(&self) -> String {
        let mut html = self.head_js.join("\n");
        html.push('\n');
        html.push_str(HEAD_JS_IE_TRAILER);
        html
    }

    pub fn footer_js_html(&self) -> String {
        self.footer_js.join("\n")
    }

    pub fn header_css_html(&self) -> String {
        if self.force_normal_include {
            self.head_css.join("\n")
        } else {
            self.head_css[..self.head_css.len().min(MAX_IE_CSS_INCLUDES)].join("\n")
        }
    }

    pub fn has_excess_stylesheets_for_ie(&self) -> bool {
        self.total_css_files() > MAX_IE_CSS_INCLUDES && !self.force_normal_include
    }

    /// Render the stylesheets past the IE link cap as `@import` rules,
    /// chunked into `<style>` elements of at most
    /// [`MAX_IMPORTS_PER_STYLE_ELEMENT`] imports each.
    pub fn header_forced_import_css_html_for_ie(&self) -> String {
        if !self.has_excess_stylesheets_for_ie() {
            return String::new();
        }

        let import_lines: Vec<String> = self.head_css[MAX_IE_CSS_INCLUDES..]
            .iter()
            .filter_map(|link| convert_link_to_import(link))
            .collect();

        import_lines
            .chunks(MAX_IMPORTS_PER_STYLE_ELEMENT)
            .map(|chunk| format!("<style>\n{}\n</style>", chunk.join("\n")))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Convert a `<link href="...">` line into an `@import "...";` rule.
///
/// Returns `None` (with a warning) when no href attribute can be found;
/// callers drop such lines from the import block.
fn convert_link_to_import(link_html: &str) -> Option<String> {
    let parse = || {
        let href_pos = link_html.find("href=")?;
        let mut chars = link_html[href_pos + 5..].chars();
        let quote = chars.next()?;
        let rest = chars.as_str();
        let end = rest.find(quote)?;
        Some(format!("@import \"{}\";", &rest[..end]))
    };

    let result = parse();
    if result.is_none() {
        warn!(
            fragment = link_html,
            "non-stylesheet line in the css bucket, skipping"
        );
    }
    result
}
