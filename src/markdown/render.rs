//! Markdown → standalone HTML document.
//!
//! CommonMark plus GFM tables, strikethrough, task lists and footnotes,
//! with three additions layered over the parser's event stream:
//!
//! * fenced code is highlighted server-side inside `div.codehilite`;
//! * headings get stable slug ids (`intro`, `intro_1`, …);
//! * a paragraph consisting only of `[TOC]` becomes a nested table of contents.
//!
//! Single newlines inside paragraphs render as `<br />`.

use super::style::DEFAULT_STYLESHEET;
use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::HashSet;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEMES: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

static RE_SLUG_SEP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());
static RE_SLUG_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)_([0-9]+)$").unwrap());

/// Light theme close to GitHub's.
const CODE_THEME: &str = "InspiredGitHub";

/// Options for [`markdown_to_html`].
#[derive(Debug, Clone)]
pub struct HtmlOptions {
    /// Guess the language of fenced blocks without an info string.
    pub guess_lang: bool,
    /// Appended after [`DEFAULT_STYLESHEET`].
    pub extra_css: Option<String>,
    /// Emitted as `<base href>` so relative links and images resolve.
    pub base_href: Option<String>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            guess_lang: true,
            extra_css: None,
            base_href: None,
        }
    }
}

/// Renders `markdown` into a complete HTML document titled `title`.
pub fn markdown_to_html(markdown: &str, title: &str, options: &HtmlOptions) -> String {
    let body = render_body(markdown, options.guess_lang);

    let mut head = String::new();
    head.push_str("<meta charset=\"UTF-8\">\n");
    head.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    if let Some(base) = &options.base_href {
        head.push_str(&format!("<base href=\"{}\">\n", escape_html(base)));
    }
    head.push_str(&format!("<style>{DEFAULT_STYLESHEET}</style>\n"));
    if let Some(css) = options.extra_css.as_deref().filter(|c| !c.trim().is_empty()) {
        head.push_str(&format!("<style>\n{css}\n</style>\n"));
    }

    format!("<!DOCTYPE html>\n<html>\n<head>\n{head}</head>\n<body>\n{body}</body>\n</html>\n")
}

/// Renders the `<body>` contents only.
pub fn render_body(markdown: &str, guess_lang: bool) -> String {
    let events: Vec<Event> = Parser::new_ext(markdown, parser_options()).collect();
    let headings = collect_headings(&events);
    let toc = render_toc(&headings);
    let mut slugs = headings.iter().map(|h| h.id.clone());

    let mut out: Vec<Event> = Vec::with_capacity(events.len());
    let mut iter = events.into_iter();
    while let Some(event) = iter.next() {
        match event {
            Event::Start(Tag::Heading {
                level,
                classes,
                attrs,
                ..
            }) => {
                out.push(Event::Start(Tag::Heading {
                    level,
                    id: slugs.next().map(CowStr::from),
                    classes,
                    attrs,
                }));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match &kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                let mut code = String::new();
                for inner in iter.by_ref() {
                    match inner {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(t) => code.push_str(&t),
                        _ => {}
                    }
                }
                out.push(Event::Html(highlight_code(&code, lang.as_deref(), guess_lang).into()));
            }
            Event::Start(Tag::Paragraph) => {
                let mut inner = Vec::new();
                for e in iter.by_ref() {
                    if matches!(e, Event::End(TagEnd::Paragraph)) {
                        break;
                    }
                    inner.push(e);
                }
                if is_toc_marker(&inner) {
                    out.push(Event::Html(toc.clone().into()));
                } else {
                    out.push(Event::Start(Tag::Paragraph));
                    out.extend(inner.into_iter().map(soft_to_hard));
                    out.push(Event::End(TagEnd::Paragraph));
                }
            }
            other => out.push(soft_to_hard(other)),
        }
    }

    let mut html = String::with_capacity(markdown.len() * 2);
    pulldown_cmark::html::push_html(&mut html, out.into_iter());
    html
}

fn parser_options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts
}

fn soft_to_hard(e: Event<'_>) -> Event<'_> {
    match e {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    }
}

// ── Headings and TOC ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct TocEntry {
    level: u8,
    id: String,
    text: String,
}

fn level_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn collect_headings(events: &[Event<'_>]) -> Vec<TocEntry> {
    let mut used = HashSet::new();
    let mut out = Vec::new();
    let mut current: Option<(u8, String)> = None;
    for e in events {
        match e {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((level_number(*level), String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = current.take() {
                    let id = unique_slug(slugify(&text), &mut used);
                    out.push(TocEntry {
                        level,
                        id,
                        text: text.trim().to_string(),
                    });
                }
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some((_, buf)) = current.as_mut() {
                    buf.push_str(t);
                }
            }
            _ => {}
        }
    }
    out
}

/// Heading text → anchor id: lowercase, word characters only, runs of
/// spaces and hyphens collapsed to one `-`.
pub fn slugify(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    RE_SLUG_SEP
        .replace_all(kept.trim(), "-")
        .to_lowercase()
}

fn unique_slug(mut id: String, used: &mut HashSet<String>) -> String {
    while id.is_empty() || used.contains(&id) {
        id = match RE_SLUG_COUNT.captures(&id) {
            Some(c) => {
                let n: u64 = c[2].parse().unwrap_or(0);
                format!("{}_{}", &c[1], n + 1)
            }
            None => format!("{id}_1"),
        };
    }
    used.insert(id.clone());
    id
}

fn is_toc_marker(inner: &[Event<'_>]) -> bool {
    let mut text = String::new();
    for e in inner {
        match e {
            Event::Text(t) => text.push_str(t),
            _ => return false,
        }
    }
    text.trim() == "[TOC]"
}

fn render_toc(headings: &[TocEntry]) -> String {
    let (roots, children) = nest_headings(headings);
    let mut html = String::from("<div class=\"toc\">\n");
    if !roots.is_empty() {
        write_toc_list(&mut html, headings, &children, &roots);
    }
    html.push_str("</div>\n");
    html
}

/// Builds the heading tree as index lists: top-level entries and the
/// children of each entry.
///
/// A heading nests under the closest preceding heading of a lower level,
/// even when levels are skipped (`#`, `###`, `##` keeps both under `#`).
fn nest_headings(headings: &[TocEntry]) -> (Vec<usize>, Vec<Vec<usize>>) {
    let mut roots = Vec::new();
    let mut children = vec![Vec::new(); headings.len()];
    let Some(first) = headings.first() else {
        return (roots, children);
    };
    roots.push(0);
    // levels.len() == parents.len() + 1
    let mut levels = vec![first.level];
    let mut parents: Vec<usize> = Vec::new();
    let mut last = 0;

    for (i, h) in headings.iter().enumerate().skip(1) {
        if levels.last().is_some_and(|&top| h.level < top) {
            levels.pop();
            let to_pop = parents
                .iter()
                .rev()
                .take_while(|&&p| h.level <= headings[p].level)
                .count();
            levels.truncate(levels.len() - to_pop);
            parents.truncate(parents.len() - to_pop);
            levels.push(h.level);
        }
        if levels.last() == Some(&h.level) {
            match parents.last() {
                Some(&p) => children[p].push(i),
                None => roots.push(i),
            }
        } else {
            children[last].push(i);
            parents.push(last);
            levels.push(h.level);
        }
        last = i;
    }
    (roots, children)
}

fn write_toc_list(html: &mut String, headings: &[TocEntry], children: &[Vec<usize>], items: &[usize]) {
    html.push_str("<ul>\n");
    for &i in items {
        let h = &headings[i];
        html.push_str(&format!(
            "<li><a href=\"#{}\">{}</a>",
            escape_html(&h.id),
            escape_html(&h.text)
        ));
        if !children[i].is_empty() {
            html.push('\n');
            write_toc_list(html, headings, children, &children[i]);
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ul>\n");
}

// ── Code blocks ──────────────────────────────────────────────────────────

fn highlight_code(code: &str, lang: Option<&str>, guess: bool) -> String {
    let syntax = match lang {
        Some(l) => SYNTAXES
            .find_syntax_by_token(l)
            .or_else(|| SYNTAXES.find_syntax_by_extension(l)),
        None if guess => guess_syntax(code),
        None => None,
    };

    let highlighted = syntax
        .zip(THEMES.themes.get(CODE_THEME))
        .and_then(|(s, theme)| highlighted_html_for_string(code, &SYNTAXES, s, theme).ok());

    let inner = highlighted.unwrap_or_else(|| format!("<pre><code>{}</code></pre>", escape_html(code)));
    format!("<div class=\"codehilite\">{inner}</div>\n")
}

fn guess_syntax(code: &str) -> Option<&'static SyntaxReference> {
    let first = code.lines().next().unwrap_or_default();
    if let Some(s) = SYNTAXES.find_syntax_by_first_line(first) {
        return Some(s);
    }
    let ext = if code.contains("fn ") && (code.contains("let ") || code.contains("->")) {
        "rs"
    } else if code.contains("#include") {
        "c"
    } else if code.contains("def ") || (code.contains("import ") && !code.contains(" from '")) {
        "py"
    } else if code.contains("function ") || code.contains("const ") || code.contains("=>") {
        "js"
    } else if code.trim_start().starts_with('<') {
        "html"
    } else if code.to_ascii_uppercase().contains("SELECT ") {
        "sql"
    } else {
        return None;
    };
    SYNTAXES.find_syntax_by_extension(ext)
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
