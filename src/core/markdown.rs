//! Markdown extraction for documentation bundles.
//!
//! Validators read structured data out of bundle documents: pipe tables,
//! heading-delimited sections, and inline system references. Regex only,
//! no markdown dependency; the subset handled here is exactly what the
//! bundle templates emit.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct MarkdownTable {
    pub headers: Vec<String>,
    /// One map per data row, keyed by header text.
    pub rows: Vec<HashMap<String, String>>,
}

impl MarkdownTable {
    /// First non-empty cell among several candidate column names.
    pub fn cell<'a>(row: &'a HashMap<String, String>, candidates: &[&str]) -> Option<&'a str> {
        for name in candidates {
            if let Some(value) = row.get(*name) {
                let trimmed = value.trim_matches('`').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed);
                }
            }
        }
        None
    }
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").unwrap())
}

fn separator_cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^:?-+:?$").unwrap())
}

fn parse_row(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn is_table_line(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|') && t.ends_with('|')
}

/// Extract every pipe table in the document, in order.
pub fn extract_tables(content: &str) -> Vec<MarkdownTable> {
    let lines: Vec<&str> = content.lines().collect();
    let mut tables = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !is_table_line(lines[i]) || i + 1 >= lines.len() || !is_table_line(lines[i + 1]) {
            i += 1;
            continue;
        }

        let headers = parse_row(lines[i]);
        let separator = parse_row(lines[i + 1]);
        let separator_ok = !separator.is_empty()
            && separator.len() == headers.len()
            && separator.iter().all(|c| separator_cell_re().is_match(c));
        if headers.is_empty() || !separator_ok {
            i += 1;
            continue;
        }

        let mut rows = Vec::new();
        let mut j = i + 2;
        while j < lines.len() && is_table_line(lines[j]) {
            let cells = parse_row(lines[j]);
            let mut row = HashMap::new();
            for (k, header) in headers.iter().enumerate() {
                row.insert(header.clone(), cells.get(k).cloned().unwrap_or_default());
            }
            rows.push(row);
            j += 1;
        }

        tables.push(MarkdownTable { headers, rows });
        i = j;
    }

    tables
}

/// First table following a heading whose text contains `header_contains`
/// (case-insensitive).
pub fn extract_table_by_header(content: &str, header_contains: &str) -> Option<MarkdownTable> {
    let needle = header_contains.to_lowercase();
    let headings: Vec<_> = heading_re().captures_iter(content).collect();

    let target = headings
        .iter()
        .find(|cap| cap[2].trim().to_lowercase().contains(&needle))?;
    let start = target.get(0)?.end();

    let end = headings
        .iter()
        .filter_map(|cap| cap.get(0))
        .map(|m| m.start())
        .find(|&pos| pos > start)
        .unwrap_or(content.len());

    extract_tables(&content[start..end]).into_iter().next()
}

/// Content under an exact heading at `level`, up to the next heading of the
/// same or higher level.
pub fn extract_section(content: &str, heading: &str, level: usize) -> Option<String> {
    let pattern = format!(
        r"(?mi)^{}\s+{}\s*$",
        "#".repeat(level),
        regex::escape(heading)
    );
    let re = Regex::new(&pattern).ok()?;
    let start = re.find(content)?.end();

    let boundary = Regex::new(&format!(r"(?m)^#{{1,{max}}}\s+", max = level)).ok()?;
    let end = boundary
        .find_at(content, start)
        .map(|m| m.start())
        .unwrap_or(content.len());

    Some(content[start..end].trim().to_string())
}

/// System-path references in free markdown text: backtick-wrapped paths
/// and markdown link targets containing a slash.
pub fn extract_path_refs(text: &str) -> Vec<String> {
    static BACKTICK: OnceLock<Regex> = OnceLock::new();
    static LINK: OnceLock<Regex> = OnceLock::new();
    let backtick = BACKTICK.get_or_init(|| Regex::new(r"`([^`]+/[^`]+)`").unwrap());
    let link = LINK.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());

    let mut refs = Vec::new();
    for cap in backtick.captures_iter(text) {
        refs.push(cap[1].to_string());
    }
    for cap in link.captures_iter(text) {
        let target = &cap[2];
        if target.contains('/') && !target.starts_with("http") {
            refs.push(target.to_string());
        }
    }
    refs
}
