//! Table formatting for human-readable CLI output.

use comfy_table::{
    Attribute, Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::semantic::{BatchReport, IndexStats, SearchResult, thresholds};

/// Longest title shown in a results table before truncation.
const MAX_TITLE_WIDTH: usize = 60;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    pub fn add_cells(mut self, row: Vec<Cell>) -> Self {
        self.table.add_row(row);
        self
    }

    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Score cell colored by how close the match is.
fn score_cell(score: f32) -> Cell {
    let color = if score >= thresholds::VERY_SIMILAR {
        Color::Green
    } else if score >= thresholds::SIMILAR {
        Color::Cyan
    } else if score >= thresholds::RELATED {
        Color::Yellow
    } else {
        Color::DarkGrey
    };
    Cell::new(format!("{score:.4}")).fg(color)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Ranked search results.
pub fn create_results_table(results: &[SearchResult]) -> String {
    let mut builder =
        TableBuilder::new().set_headers(vec!["#", "Document", "Score", "Title", "Type", "Date"]);

    for (rank, result) in results.iter().enumerate() {
        let meta = &result.metadata;
        builder = builder.add_cells(vec![
            Cell::new(rank + 1),
            Cell::new(&result.document_id),
            score_cell(result.score),
            Cell::new(truncate(&meta.title, MAX_TITLE_WIDTH)),
            Cell::new(&meta.doc_type),
            Cell::new(meta.date.map(|d| d.to_string()).unwrap_or_default()),
        ]);
    }

    builder.build()
}

pub fn create_stats_table(stats: &IndexStats) -> String {
    TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(vec!["Model".to_string(), stats.model_name.clone()])
        .add_row(vec!["Dimension".to_string(), stats.dimension.to_string()])
        .add_row(vec!["Vectors".to_string(), stats.count.to_string()])
        .add_row(vec!["Active documents".to_string(), stats.active_count.to_string()])
        .add_row(vec!["Tombstones".to_string(), stats.tombstone_count.to_string()])
        .build()
}

/// Per-document failures of a batch add. Empty string when nothing failed.
pub fn create_failures_table(report: &BatchReport) -> String {
    if report.failed.is_empty() {
        return String::new();
    }
    let mut builder = TableBuilder::new().set_headers(vec!["Document", "Error", "Reason"]);
    for failure in &report.failed {
        builder = builder.add_cells(vec![
            Cell::new(&failure.document_id),
            Cell::new(&failure.status_code).fg(Color::Red),
            Cell::new(&failure.reason),
        ]);
    }
    builder.build()
}
