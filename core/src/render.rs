//! Spreadsheet rendering
//!
//! Every workbook is built fully in memory and returned as bytes. A failure at
//! any point aborts the whole workbook; nothing partial is ever returned.

use crate::coverage::FieldCoverageItem;
use crate::error::{MigcheckError, Result};
use crate::report::ReconciliationGroup;
use crate::schema_diff::{IndexDescriptor, SchemaComparisonResult};
use crate::tabular::TabularResult;
use indexmap::IndexMap;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatPattern, Workbook, Worksheet};
use serde::{Deserialize, Serialize};

const HEADER_FILL: u32 = 0x1E90FF;
const HIGHLIGHT_FILL: u32 = 0xFFCDD2;
const REPORT_HEADER_FILL: u32 = 0xD3D3D3;
const BLOCK_HEADER_FILL: u32 = 0xB0C4DE;

const HEADER_ROW_HEIGHT: f64 = 25.0;
const DATA_ROW_HEIGHT: f64 = 20.0;

/// Rows (header included) inspected when sizing columns
const WIDTH_SAMPLE_ROWS: u32 = 100;
const MIN_COLUMN_WIDTH: f64 = 10.0;
const MAX_COLUMN_WIDTH: f64 = 50.0;
const MAX_SCHEMA_COLUMN_WIDTH: f64 = 60.0;

/// First column (0-based) of the target block on the index sheet
const TARGET_BLOCK_COLUMN: u16 = 7;
const INDEX_HEADERS: [&str; 6] = ["Index Name", "Columns", "Primary Key", "Unique", "Clustered", "Non-Clustered"];

pub const PRESENT_GLYPH: &str = "✓";
pub const ABSENT_GLYPH: &str = "✗";

/// One line of the per-entry query log written next to the exported data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub sheet_name: String,
    pub sql_query: String,
    pub comments: String,
}

/// A homogeneous record collection with a fixed column layout per kind
#[derive(Debug, Clone, PartialEq)]
pub enum RecordSet {
    QueryLog(Vec<QueryLogEntry>),
    FieldCoverage(Vec<FieldCoverageItem>),
}

/// Rendered cells of one record, plus whether the row gets the highlight fill
struct RecordRow {
    cells: Vec<String>,
    highlight: bool,
}

fn glyph(present: bool) -> String {
    if present { PRESENT_GLYPH } else { ABSENT_GLYPH }.to_string()
}

impl RecordSet {
    pub fn len(&self) -> usize {
        match self {
            RecordSet::QueryLog(items) => items.len(),
            RecordSet::FieldCoverage(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            RecordSet::QueryLog(_) => &["SheetName", "SQL_Query", "Comments"],
            RecordSet::FieldCoverage(_) => &["Database Field", "JSON Status"],
        }
    }

    fn rows(&self) -> Vec<RecordRow> {
        match self {
            RecordSet::QueryLog(items) => items
                .iter()
                .map(|e| RecordRow {
                    cells: vec![e.sheet_name.clone(), e.sql_query.clone(), e.comments.clone()],
                    highlight: false,
                })
                .collect(),
            RecordSet::FieldCoverage(items) => items
                .iter()
                .map(|item| RecordRow {
                    cells: vec![item.field_name.clone(), glyph(item.is_in_json)],
                    highlight: !item.is_in_json,
                })
                .collect(),
        }
    }
}

/// Content of one worksheet
#[derive(Debug, Clone, PartialEq)]
pub enum SheetPayload {
    Table(TabularResult),
    Records(RecordSet),
}

impl From<TabularResult> for SheetPayload {
    fn from(table: TabularResult) -> Self {
        SheetPayload::Table(table)
    }
}

impl From<RecordSet> for SheetPayload {
    fn from(records: RecordSet) -> Self {
        SheetPayload::Records(records)
    }
}

/// Display width of a cell text: CJK and full-width characters count 2.2,
/// uppercase letters 1.3, everything else 1.0. Empty text counts 10.
pub fn text_width(text: &str) -> f64 {
    if text.is_empty() {
        return 10.0;
    }
    text.chars()
        .map(|c| {
            if is_wide(c) {
                2.2
            } else if c.is_numeric() {
                1.0
            } else if c.is_uppercase() {
                1.3
            } else {
                1.0
            }
        })
        .sum()
}

fn is_wide(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2B73F
            | 0x2B740..=0x2B81F
            | 0x3000..=0x303F
            | 0xFF00..=0xFFEF
    )
}

/// Running maximum of text widths per column
struct ColumnWidths {
    widths: Vec<f64>,
    sample_rows: Option<u32>,
}

impl ColumnWidths {
    fn new(columns: usize, sample_rows: Option<u32>) -> Self {
        Self {
            widths: vec![0.0; columns],
            sample_rows,
        }
    }

    fn seed(&mut self, col: usize, width: f64) {
        self.widths[col] = self.widths[col].max(width);
    }

    /// Record a non-empty cell text, ignoring rows outside the sample
    fn observe(&mut self, row: u32, col: usize, text: &str) {
        if text.is_empty() || self.sample_rows.is_some_and(|limit| row >= limit) {
            return;
        }
        if col >= self.widths.len() {
            self.widths.resize(col + 1, 0.0);
        }
        self.seed(col, text_width(text));
    }

    fn apply(&self, worksheet: &mut Worksheet, max: f64) -> Result<()> {
        for (col, width) in self.widths.iter().enumerate() {
            let clamped = (width * 1.2).clamp(MIN_COLUMN_WIDTH, max);
            worksheet.set_column_width(to_col(col)?, clamped)?;
        }
        Ok(())
    }
}

fn to_col(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| MigcheckError::render(format!("Column {index} exceeds the sheet limit")))
}

fn to_row(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| MigcheckError::render(format!("Row {index} exceeds the sheet limit")))
}

fn fill(format: Format, rgb: u32) -> Format {
    format
        .set_pattern(FormatPattern::Solid)
        .set_background_color(Color::RGB(rgb))
}

/// Cell formats shared by the data sheets
struct TableStyles {
    header: Format,
    data: Format,
    highlighted: Format,
}

impl TableStyles {
    fn new() -> Self {
        let header = fill(Format::new().set_bold(), HEADER_FILL)
            .set_font_color(Color::White)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        let data = Format::new()
            .set_num_format("@")
            .set_align(FormatAlign::Left)
            .set_align(FormatAlign::VerticalCenter);
        let highlighted = fill(data.clone(), HIGHLIGHT_FILL);
        Self {
            header,
            data,
            highlighted,
        }
    }
}

pub struct SpreadsheetRenderer;

impl SpreadsheetRenderer {
    /// Render one worksheet per entry, in insertion order, named by the key
    pub fn render_workbook(sheets: &IndexMap<String, SheetPayload>) -> Result<Vec<u8>> {
        let styles = TableStyles::new();
        let mut workbook = Workbook::new();

        for (name, payload) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(name.as_str())?;

            match payload {
                SheetPayload::Table(table) => {
                    let rows: Vec<RecordRow> = table
                        .rows()
                        .iter()
                        .map(|row| RecordRow {
                            cells: row.iter().map(ToString::to_string).collect(),
                            highlight: false,
                        })
                        .collect();
                    Self::write_table(worksheet, &styles, table.columns(), &rows)?;
                }
                // An empty record collection has no layout to show
                SheetPayload::Records(records) if records.is_empty() => {}
                SheetPayload::Records(records) => {
                    Self::write_table(worksheet, &styles, records.columns(), &records.rows())?;
                }
            }
        }

        log::debug!("Rendered workbook with {} sheets", sheets.len());
        Ok(workbook.save_to_buffer()?)
    }

    fn write_table<S: AsRef<str>>(
        worksheet: &mut Worksheet,
        styles: &TableStyles,
        columns: &[S],
        rows: &[RecordRow],
    ) -> Result<()> {
        if columns.is_empty() {
            return Ok(());
        }

        let mut widths = ColumnWidths::new(columns.len(), Some(WIDTH_SAMPLE_ROWS));
        for (col, name) in columns.iter().enumerate() {
            let name = name.as_ref();
            worksheet.write_string_with_format(0, to_col(col)?, name, &styles.header)?;
            widths.seed(col, text_width(name));
        }
        worksheet.set_row_height(0, HEADER_ROW_HEIGHT)?;

        for (index, row) in rows.iter().enumerate() {
            let row_num = to_row(index + 1)?;
            let format = if row.highlight { &styles.highlighted } else { &styles.data };
            for (col, text) in row.cells.iter().enumerate() {
                worksheet.write_string_with_format(row_num, to_col(col)?, text, format)?;
                widths.observe(row_num, col, text);
            }
            worksheet.set_row_height(row_num, DATA_ROW_HEIGHT)?;
        }

        worksheet.autofilter(0, 0, to_row(rows.len())?, to_col(columns.len() - 1)?)?;
        widths.apply(worksheet, MAX_COLUMN_WIDTH)
    }

    /// One block per group: title and summary, a grey header, then every
    /// record with mismatching rows filled light red.
    pub fn render_validation_report(groups: &[ReconciliationGroup]) -> Result<Vec<u8>> {
        let title = Format::new().set_bold().set_font_size(12);
        let summary = Format::new().set_italic().set_font_size(10);
        let header = fill(Format::new().set_bold(), REPORT_HEADER_FILL);
        let mismatch = fill(Format::new(), HIGHLIGHT_FILL);

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Validation Report")?;

        let mut row: u32 = 0;
        for group in groups {
            if row > 0 {
                worksheet.set_row_height(row, DATA_ROW_HEIGHT)?;
                row += 1;
            }

            worksheet.write_string_with_format(row, 0, group.group_key().unwrap_or_default(), &title)?;
            worksheet.write_string_with_format(row, 1, group.summary(), &summary)?;
            worksheet.set_row_height(row, DATA_ROW_HEIGHT)?;
            row += 1;

            for (col, name) in ["Column", "Source", "Target"].into_iter().enumerate() {
                worksheet.write_string_with_format(row, to_col(col)?, name, &header)?;
            }
            worksheet.set_row_height(row, DATA_ROW_HEIGHT)?;
            row += 1;

            for record in group.records() {
                let cells = [
                    record.display_column_name(),
                    record.source_value.clone(),
                    record.target_value.clone(),
                ];
                for (col, text) in cells.iter().enumerate() {
                    if record.is_match {
                        worksheet.write_string(row, to_col(col)?, text)?;
                    } else {
                        worksheet.write_string_with_format(row, to_col(col)?, text, &mismatch)?;
                    }
                }
                worksheet.set_row_height(row, DATA_ROW_HEIGHT)?;
                row += 1;
            }
        }

        worksheet.autofit();
        Ok(workbook.save_to_buffer()?)
    }

    /// Summary sheet of primary keys plus a side-by-side index sheet
    pub fn render_schema_comparison(results: &[SchemaComparisonResult]) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        Self::write_schema_summary(workbook.add_worksheet(), results)?;
        Self::write_index_details(workbook.add_worksheet(), results)?;
        Ok(workbook.save_to_buffer()?)
    }

    fn write_schema_summary(worksheet: &mut Worksheet, results: &[SchemaComparisonResult]) -> Result<()> {
        worksheet.set_name("Table Comparison")?;
        let header = fill(Format::new().set_bold(), HEADER_FILL).set_font_color(Color::White);
        let wrapped = Format::new().set_text_wrap();

        let headers = ["Source Table", "Source Primary Keys", "Target Table", "Target Primary Keys"];
        let mut widths = ColumnWidths::new(headers.len(), None);
        for (col, name) in headers.iter().enumerate() {
            worksheet.write_string_with_format(0, to_col(col)?, *name, &header)?;
            widths.observe(0, col, name);
        }

        for (index, result) in results.iter().enumerate() {
            let row = to_row(index + 1)?;
            let source_keys = result.source_primary_keys.join("\n");
            let target_keys = result.target_primary_keys.join("\n");

            worksheet.write_string(row, 0, &result.source_table_name)?;
            worksheet.write_string_with_format(row, 1, &source_keys, &wrapped)?;
            worksheet.write_string(row, 2, &result.target_table_name)?;
            worksheet.write_string_with_format(row, 3, &target_keys, &wrapped)?;

            widths.observe(row, 0, &result.source_table_name);
            widths.observe(row, 1, &source_keys);
            widths.observe(row, 2, &result.target_table_name);
            widths.observe(row, 3, &target_keys);
        }

        widths.apply(worksheet, MAX_SCHEMA_COLUMN_WIDTH)
    }

    fn write_index_details(worksheet: &mut Worksheet, results: &[SchemaComparisonResult]) -> Result<()> {
        worksheet.set_name("Index Details")?;
        let border = Format::new().set_border(FormatBorder::Thin);
        let block_title = border.clone().set_bold();
        let block_header = fill(border.clone().set_bold(), BLOCK_HEADER_FILL);

        let width = INDEX_HEADERS.len() as u16;
        let last_col = TARGET_BLOCK_COLUMN + width - 1;
        let mut widths = ColumnWidths::new(usize::from(last_col) + 1, Some(WIDTH_SAMPLE_ROWS));
        let mut row: u32 = 0;

        for result in results {
            if row > 0 {
                row += 2;
            }

            let source_title = format!("Source: {}", result.source_table_name);
            let target_title = format!("Target: {}", result.target_table_name);
            worksheet.merge_range(row, 0, row, width - 1, &source_title, &block_title)?;
            worksheet.merge_range(row, TARGET_BLOCK_COLUMN, row, last_col, &target_title, &block_title)?;
            worksheet.write_blank(row, width, &border)?;
            widths.observe(row, 0, &source_title);
            widths.observe(row, usize::from(TARGET_BLOCK_COLUMN), &target_title);
            row += 1;

            for (offset, name) in INDEX_HEADERS.iter().enumerate() {
                let offset = to_col(offset)?;
                worksheet.write_string_with_format(row, offset, *name, &block_header)?;
                worksheet.write_string_with_format(row, TARGET_BLOCK_COLUMN + offset, *name, &block_header)?;
                widths.observe(row, usize::from(offset), name);
                widths.observe(row, usize::from(TARGET_BLOCK_COLUMN + offset), name);
            }
            worksheet.write_blank(row, width, &border)?;
            row += 1;

            let line_count = result.source_indexes.len().max(result.target_indexes.len());
            for line in 0..line_count {
                let sides = [
                    (0, result.source_indexes.get(line)),
                    (TARGET_BLOCK_COLUMN, result.target_indexes.get(line)),
                ];
                for (start, index) in sides {
                    let cells = index.map(index_cells).unwrap_or_default();
                    for offset in 0..width {
                        let col = start + offset;
                        match cells.get(usize::from(offset)) {
                            Some(text) => {
                                worksheet.write_string_with_format(row, col, text, &border)?;
                                widths.observe(row, usize::from(col), text);
                            }
                            None => {
                                worksheet.write_blank(row, col, &border)?;
                            }
                        }
                    }
                }
                worksheet.write_blank(row, width, &border)?;
                row += 1;
            }
        }

        if !results.is_empty() {
            widths.apply(worksheet, MAX_SCHEMA_COLUMN_WIDTH)?;
        }
        Ok(())
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

fn index_cells(index: &IndexDescriptor) -> Vec<String> {
    vec![
        index.index_name.clone(),
        index.columns_display.clone(),
        yes_no(index.is_primary_key),
        yes_no(index.is_unique),
        yes_no(index.is_clustered),
        yes_no(index.is_non_clustered),
    ]
}
