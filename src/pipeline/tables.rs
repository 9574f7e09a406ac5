//! Table detection on layout text and Markdown rendering of tables.
//!
//! Detection works on the layout-preserving page text produced by
//! [`super::pdf`]: a table is a run of consecutive lines that each split into
//! the same number (≥ `min_columns`) of cells when cut at gaps of two or more
//! spaces. This is column clustering on whitespace, not ruling-line analysis,
//! so borderless tables are found.
//!
//! Multi-column prose clusters the same way, so a candidate block is dropped
//! when its cells read like sentences: more than [`MAX_AVG_WORDS_PER_CELL`]
//! words per cell on average, or most cells ending in `.`, `!` or `?`.
//! Such pages keep their columns only in the flowing text.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// A rectangular grid of cell strings. Row 0 is the header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, padding every row to the header's column count.
    ///
    /// Cells beyond the header's width are dropped; missing cells become `""`.
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Tuning knobs for [`detect_tables`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDetection {
    pub min_rows: usize,
    pub min_columns: usize,
}

impl Default for TableDetection {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
        }
    }
}

/// Render a table as a GitHub-flavoured Markdown table.
///
/// Column width is the longest cell (in chars) of that column across all
/// rows, so output depends only on the table's content. An empty table
/// renders as `""`.
///
/// ```text
/// | Name  | Age |
/// | ----- | --- |
/// | Alice | 30  |
/// ```
pub fn format_table(table: &Table) -> String {
    let Some(header) = table.rows.first() else {
        return String::new();
    };

    let widths: Vec<usize> = (0..header.len())
        .map(|col| {
            table
                .rows
                .iter()
                .map(|row| row[col].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render_row = |row: &[String]| -> String {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| pad_right(cell, w))
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let separator: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();

    let mut lines = Vec::with_capacity(table.rows.len() + 1);
    lines.push(render_row(header));
    lines.push(format!("| {} |", separator.join(" | ")));
    lines.extend(table.rows[1..].iter().map(|row| render_row(row)));
    lines.join("\n")
}

/// Left-justify by char count.
fn pad_right(cell: &str, width: usize) -> String {
    let len = cell.chars().count();
    let mut out = String::with_capacity(cell.len() + width.saturating_sub(len));
    out.push_str(cell);
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(len)));
    out
}

static RE_COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Split one layout line into cells at runs of 2+ whitespace characters.
fn split_cells(line: &str) -> Vec<String> {
    RE_COLUMN_GAP
        .split(line.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Cells of a table average at most this many words.
pub const MAX_AVG_WORDS_PER_CELL: f32 = 4.0;

/// Whether a candidate block is running text laid out in columns.
fn looks_like_prose(block: &[Vec<String>]) -> bool {
    let cells: Vec<&str> = block
        .iter()
        .flatten()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if cells.is_empty() {
        return false;
    }

    let words: usize = cells.iter().map(|c| c.split_whitespace().count()).sum();
    let avg_words = words as f32 / cells.len() as f32;
    let sentences = cells
        .iter()
        .filter(|c| c.ends_with(['.', '!', '?']))
        .count();

    avg_words > MAX_AVG_WORDS_PER_CELL || sentences * 2 > cells.len()
}

/// Find whitespace-aligned tables in layout text, in reading order.
pub fn detect_tables(layout_text: &str, opts: TableDetection) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut block: Vec<Vec<String>> = Vec::new();

    let mut flush = |block: &mut Vec<Vec<String>>| {
        if block.len() < opts.min_rows {
            block.clear();
        } else if looks_like_prose(block) {
            debug!("Skipping {}-row column block that reads as prose", block.len());
            block.clear();
        } else {
            tables.push(Table::new(std::mem::take(block)));
        }
    };

    for line in layout_text.lines() {
        let cells = split_cells(line);
        let aligned = cells.len() >= opts.min_columns
            && block.first().is_none_or(|first| first.len() == cells.len());

        if aligned {
            block.push(cells);
            continue;
        }

        flush(&mut block);
        // A row with a different column count may start the next table.
        if cells.len() >= opts.min_columns {
            block.push(cells);
        }
    }
    flush(&mut block);

    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> Table {
        Table::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn formats_header_separator_and_rows() {
        let t = table(&[&["Name", "Age"], &["Alice", "30"], &["Bob", "4"]]);
        assert_eq!(
            format_table(&t),
            "| Name  | Age |\n| ----- | --- |\n| Alice | 30  |\n| Bob   | 4   |"
        );
    }

    #[test]
    fn every_row_has_the_same_rendered_width() {
        let t = table(&[
            &["a", "bb", "ccc"],
            &["dddd", "", "e"],
            &["f", "gggggg", "h"],
        ]);
        let md = format_table(&t);
        let widths: Vec<usize> = md.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{md}");
        assert_eq!(format_table(&t), md, "formatting must be deterministic");
    }

    #[test]
    fn width_does_not_depend_on_row_order() {
        let a = table(&[&["h", "k"], &["long cell", "x"], &["s", "y"]]);
        let b = table(&[&["h", "k"], &["s", "y"], &["long cell", "x"]]);
        let first_line = |t: &Table| format_table(t).lines().next().unwrap().to_string();
        assert_eq!(first_line(&a), first_line(&b));
    }

    #[test]
    fn missing_cells_are_padded_empty() {
        let t = Table::new(vec![
            vec!["A".into(), "B".into()],
            vec![String::new(), "2".into()],
            vec!["1".into()],
        ]);
        assert_eq!(t.column_count(), 2);
        assert_eq!(t.rows()[2], vec!["1".to_string(), String::new()]);
        assert_eq!(
            format_table(&t),
            "| A | B |\n| - | - |\n|   | 2 |\n| 1 |   |"
        );
    }

    #[test]
    fn width_counts_chars_not_bytes() {
        let t = table(&[&["Tên", "x"], &["Hà Nội", "y"]]);
        let md = format_table(&t);
        let widths: Vec<usize> = md.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{md}");
    }

    #[test]
    fn empty_table_renders_nothing() {
        assert_eq!(format_table(&Table::default()), "");
    }

    #[test]
    fn detects_aligned_block() {
        let text = "Quarterly results\n\nRegion     Revenue\nNorth      1200\nSouth      900\n\nClosing remarks.";
        let tables = detect_tables(text, TableDetection::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows()[0], vec!["Region", "Revenue"]);
        assert_eq!(tables[0].rows().len(), 3);
    }

    #[test]
    fn single_aligned_line_is_not_a_table() {
        let text = "Name    Value\nplain prose follows here";
        assert!(detect_tables(text, TableDetection::default()).is_empty());
    }

    #[test]
    fn column_count_change_splits_tables() {
        let text = "a  b\nc  d\nx  y  z\n1  2  3";
        let tables = detect_tables(text, TableDetection::default());
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].column_count(), 2);
        assert_eq!(tables[1].column_count(), 3);
    }

    #[test]
    fn two_column_prose_is_not_a_table() {
        let text = "\
The committee met on Monday to     Budget figures were reviewed and
discuss the proposal in detail.    approved without any amendments.
Members raised several points      The chair closed the session early.";
        assert!(detect_tables(text, TableDetection::default()).is_empty());
    }

    #[test]
    fn sentence_cells_are_not_a_table() {
        let text = "Done.    Agreed.\nNoted.   Filed.";
        assert!(detect_tables(text, TableDetection::default()).is_empty());
    }

    #[test]
    fn short_labelled_values_are_still_a_table() {
        let text = "Item          Unit price    Qty\nGreen tea     1.50          12\nBlack coffee  2.25          3";
        let tables = detect_tables(text, TableDetection::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows()[1], vec!["Green tea", "1.50", "12"]);
    }

    #[test]
    fn respects_minimum_rows() {
        let text = "a  b\nc  d";
        let opts = TableDetection {
            min_rows: 3,
            min_columns: 2,
        };
        assert!(detect_tables(text, opts).is_empty());
    }
}
