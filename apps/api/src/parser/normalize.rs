use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Glyphs PDF producers commonly emit in place of plain ASCII sequences.
const GLYPH_REPLACEMENTS: &[(char, &str)] = &[
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{00A0}', " "),
    ('\u{2007}', " "),
    ('\u{202F}', " "),
    ('\u{2022}', "-"),
    ('\u{25CF}', "-"),
    ('\u{2013}', "-"),
    ('\u{2014}', "-"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
];

/// Normalizes extracted text into plain, single-spaced lines.
///
/// Control characters are dropped, known glyphs are replaced, runs of spaces
/// and tabs collapse to one space, lines are trimmed and consecutive blank
/// lines collapse to a single blank line. Leading and trailing blank lines are
/// removed.
pub fn normalize_text(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        if let Some((_, replacement)) = GLYPH_REPLACEMENTS.iter().find(|(g, _)| *g == c) {
            cleaned.push_str(replacement);
        } else if c == '\r' {
            continue;
        } else if c == '\n' || c == '\t' || !c.is_control() {
            cleaned.push(c);
        }
    }

    let mut out = String::with_capacity(cleaned.len());
    let mut blank_run = false;
    for line in cleaned.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run = true;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run {
                out.push('\n');
            }
        }
        blank_run = false;
        out.push_str(&line);
    }
    out
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"'()\[\]]+"#).expect("url pattern is valid")
    })
}

/// Finds bare URLs in text, e.g. a portfolio link typed into a resume.
pub fn find_urls(text: &str) -> Vec<String> {
    url_pattern()
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(&['.', ',', ';', ':'][..]).to_string())
        .collect()
}

/// De-duplicates links, keeping first occurrence order.
pub fn dedup_links(links: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && seen.insert(l.clone()))
        .collect()
}
