//! Heuristic structuring: raw extracted text → Markdown.
//!
//! Extracted PDF text has no markup, only line breaks and whitespace. This
//! module applies a small, deterministic rule set that recovers paragraphs
//! and section headings well enough for reading and indexing. It is a
//! best-effort heuristic, not a parser:
//!
//! - short ALL-CAPS sentences ("SEE ATTACHED.") are promoted to headings;
//! - headings longer than 59 chars, or in sentence case, stay plain text;
//! - short numbered items ("3. Results") become headings, not list items,
//!   because the heading test runs first.
//!
//! These misfires are accepted.
//!
//! One rule goes beyond plain line heuristics: lines that are already
//! Markdown table rows (`| a | b |`) are never promoted. A title-case header
//! row such as `| Region | Total |` would otherwise become `## | Region ...`
//! and break the inlined table.
//!
//! ## Rule Order
//!
//! 1. Normalise line endings (CRLF → LF)
//! 2. Trim every line; collapse each run of blank lines to one blank line
//!    and drop leading/trailing blank lines
//! 3. Classify each non-blank line: table row, heading, list item, or text
//! 4. Ensure the document ends with exactly one newline (empty stays empty)

use once_cell::sync::Lazy;
use regex::Regex;

/// Lines at or above this many chars are never headings.
pub const MAX_HEADING_CHARS: usize = 60;

/// Apply all structuring rules to raw extracted text.
pub fn structure_markdown(raw: &str) -> String {
    let s = normalise_line_endings(raw);
    let lines = collapse_blank_lines(&s);
    let body: Vec<String> = lines
        .into_iter()
        .map(|line| match classify_line(line) {
            LineKind::Heading => format!("## {line}"),
            LineKind::Blank | LineKind::TableRow | LineKind::ListItem | LineKind::Text => {
                line.to_string()
            }
        })
        .collect();
    ensure_final_newline(&body.join("\n"))
}

/// How a single trimmed line is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    /// `| a | b |` rows emitted by the table formatter.
    TableRow,
    Heading,
    ListItem,
    Text,
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Collapse blank-line runs ─────────────────────────────────────────

/// Trimmed lines with every run of blank lines reduced to a single `""`.
fn collapse_blank_lines(input: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    let mut pending_blank = false;

    for line in input.lines().map(str::trim) {
        if line.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if pending_blank {
            out.push("");
            pending_blank = false;
        }
        out.push(line);
    }
    out
}

// ── Rule 3: Classify lines ───────────────────────────────────────────────────

static RE_ENUMERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+").unwrap());
static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*•]\s+|^\d+\.\s+").unwrap());

/// Classify one already-trimmed line.
pub fn classify_line(line: &str) -> LineKind {
    if line.is_empty() {
        return LineKind::Blank;
    }
    if is_table_row(line) {
        return LineKind::TableRow;
    }
    if is_heading(line) {
        return LineKind::Heading;
    }
    if RE_LIST_ITEM.is_match(line) {
        return LineKind::ListItem;
    }
    LineKind::Text
}

fn is_heading(line: &str) -> bool {
    line.chars().count() < MAX_HEADING_CHARS
        && (is_all_uppercase(line) || is_title_case(line) || RE_ENUMERATOR.is_match(line))
}

fn is_table_row(line: &str) -> bool {
    line.len() > 2 && line.starts_with('|') && line.ends_with('|')
}

/// At least one cased char, and no lowercase ones.
fn is_all_uppercase(line: &str) -> bool {
    let mut cased = false;
    for c in line.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

/// Every word-like run starts with one uppercase letter followed only by
/// lowercase letters; uncased chars (digits, spaces, punctuation) reset the
/// run. Requires at least one cased char.
fn is_title_case(line: &str) -> bool {
    let mut cased = false;
    let mut in_word = false;
    for c in line.chars() {
        if c.is_uppercase() {
            if in_word {
                return false;
            }
            in_word = true;
            cased = true;
        } else if c.is_lowercase() {
            if !in_word {
                return false;
            }
            cased = true;
        } else {
            in_word = false;
        }
    }
    cased
}

// ── Rule 4: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_caps_line_becomes_heading() {
        assert_eq!(structure_markdown("INTRODUCTION"), "## INTRODUCTION\n");
    }

    #[test]
    fn normal_sentence_is_unchanged() {
        assert_eq!(
            structure_markdown("This is a normal sentence."),
            "This is a normal sentence.\n"
        );
    }

    #[test]
    fn title_case_and_enumerated_lines_become_headings() {
        assert_eq!(classify_line("Background And Motivation"), LineKind::Heading);
        assert_eq!(classify_line("12. Results"), LineKind::Heading);
        assert_eq!(classify_line("1. Introduction"), LineKind::Heading);
    }

    #[test]
    fn long_lines_are_never_headings() {
        let long = "A".repeat(MAX_HEADING_CHARS);
        assert_eq!(classify_line(&long), LineKind::Text);
        let short = "A".repeat(MAX_HEADING_CHARS - 1);
        assert_eq!(classify_line(&short), LineKind::Heading);
    }

    #[test]
    fn bullets_pass_through() {
        assert_eq!(classify_line("- first point"), LineKind::ListItem);
        assert_eq!(classify_line("• second point"), LineKind::ListItem);
        assert_eq!(structure_markdown("* third point"), "* third point\n");
    }

    #[test]
    fn accepted_false_positive_short_caps_sentence() {
        assert_eq!(structure_markdown("SEE ATTACHED."), "## SEE ATTACHED.\n");
    }

    #[test]
    fn accepted_false_negative_sentence_case_heading() {
        assert_eq!(
            structure_markdown("Related work on scanning"),
            "Related work on scanning\n"
        );
    }

    #[test]
    fn title_case_rules() {
        assert!(is_title_case("Hello World"));
        assert!(is_title_case("Chapter 3: The End"));
        assert!(!is_title_case("Hello world"));
        assert!(!is_title_case("HELLO"));
        assert!(!is_title_case("123"));
        assert!(!is_title_case("McDonald Farms"));
    }

    #[test]
    fn uppercase_rules() {
        assert!(is_all_uppercase("PART II: 2024"));
        assert!(!is_all_uppercase("PART ii"));
        assert!(!is_all_uppercase("2024"));
    }

    #[test]
    fn collapses_blank_runs_to_one() {
        let out = structure_markdown("alpha text\n\n\n\n   \nbeta text\n\ngamma text");
        assert_eq!(out, "alpha text\n\nbeta text\n\ngamma text\n");
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn trims_leading_and_trailing_blank_lines() {
        assert_eq!(structure_markdown("\n\n  body text  \n\n\n"), "body text\n");
    }

    #[test]
    fn table_rows_are_not_promoted() {
        let md = "| NAME | AGE |\n| ---- | --- |\n| Ann  | 31  |";
        assert_eq!(structure_markdown(md), format!("{md}\n"));

        let title_case = "| Region | Total |\n| ------ | ----- |\n| North  | 120   |";
        assert_eq!(structure_markdown(title_case), format!("{title_case}\n"));
    }

    #[test]
    fn crlf_input_is_normalised() {
        assert_eq!(
            structure_markdown("SUMMARY\r\nplain text here\r\n"),
            "## SUMMARY\nplain text here\n"
        );
    }

    #[test]
    fn blank_input_stays_empty() {
        assert_eq!(structure_markdown("  \n\n \n"), "");
    }
}
