//! Spreadsheet output.
//!
//! The table is first saved as a plain sheet. A second pass reopens that
//! file, checks it is a workbook and replaces it with a formatted copy:
//! column widths, frozen header, autofilter and link styling. A failed
//! second pass leaves the plain file in place.

use crate::core::{LoadResult, OutputTable, Storage};
use crate::utils::error::{EtlError, Result};
use rust_xlsxwriter::{Color, Format, FormatUnderline, Url, Workbook, Worksheet};
use std::io::Cursor;

const WORKSHEET_PART: &str = "xl/worksheets/sheet1.xml";
const WIDTH_PADDING: usize = 2;

/// Longest text Excel keeps in one cell.
pub const MAX_CELL_CHARS: usize = 32_767;
/// Hyperlink targets must stay below this length.
pub const MAX_URL_CHARS: usize = 2_080;

#[derive(Debug, Clone)]
pub struct SheetOptions {
    pub sheet_name: String,
    pub hyperlink_column: Option<String>,
    pub max_column_width: usize,
}

impl Default for SheetOptions {
    fn default() -> Self {
        Self {
            sheet_name: "Trials".to_string(),
            hyperlink_column: None,
            max_column_width: 100,
        }
    }
}

/// `min(longest cell text + 2, max)` per column, header included.
pub fn column_widths(table: &OutputTable, max_width: usize) -> Vec<usize> {
    table
        .header()
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let longest = table
                .rows()
                .iter()
                .filter_map(|row| row.values().nth(index))
                .map(|value| value.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0);
            (longest + WIDTH_PADDING).min(max_width)
        })
        .collect()
}

fn row_number(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| EtlError::ProcessingError {
        message: format!("row {} exceeds the sheet size", index),
    })
}

fn col_number(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| EtlError::ProcessingError {
        message: format!("column {} exceeds the sheet size", index),
    })
}

/// Cuts `value` to at most `max` characters.
pub fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

fn cell_text<'v>(value: &'v str, row: usize, column: &str) -> &'v str {
    let text = truncate_chars(value, MAX_CELL_CHARS);
    if text.len() < value.len() {
        tracing::warn!(
            "⚠️ Row {} column '{}' has {} characters, truncated to {}",
            row,
            column,
            value.chars().count(),
            MAX_CELL_CHARS
        );
    }
    text
}

fn write_cells(worksheet: &mut Worksheet, table: &OutputTable, link_col: Option<usize>) -> Result<()> {
    let link_format = Format::new()
        .set_font_color(Color::Blue)
        .set_underline(FormatUnderline::Single);

    for (col, name) in table.header().iter().enumerate() {
        worksheet.write_string(0, col_number(col)?, name)?;
    }

    for (index, row) in table.rows().iter().enumerate() {
        let row_num = row_number(index + 1)?;
        for ((col, value), name) in row.values().enumerate().zip(table.header()) {
            if value.is_empty() {
                continue;
            }
            let col_num = col_number(col)?;
            if Some(col) == link_col && value.chars().count() < MAX_URL_CHARS {
                worksheet.write_url_with_format(row_num, col_num, Url::new(value), &link_format)?;
            } else {
                if Some(col) == link_col {
                    tracing::warn!(
                        "⚠️ Row {} column '{}' is too long for a hyperlink, writing it as text",
                        index + 1,
                        name
                    );
                }
                worksheet.write_string(row_num, col_num, cell_text(value, index + 1, name))?;
            }
        }
    }
    Ok(())
}

/// Header in row 0, data from row 1, no styling.
pub fn render_plain(table: &OutputTable, sheet_name: &str) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;
    write_cells(worksheet, table, None)?;
    Ok(workbook.save_to_buffer()?)
}

pub fn render_formatted(table: &OutputTable, options: &SheetOptions) -> Result<Vec<u8>> {
    let link_col = options
        .hyperlink_column
        .as_deref()
        .and_then(|column| table.column_index(column));

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&options.sheet_name)?;
    write_cells(worksheet, table, link_col)?;

    for (col, width) in column_widths(table, options.max_column_width)
        .into_iter()
        .enumerate()
    {
        worksheet.set_column_width(col_number(col)?, width as f64)?;
    }

    worksheet.set_freeze_panes(1, 0)?;

    if !table.header().is_empty() {
        let last_row = row_number(table.len())?;
        let last_col = col_number(table.header().len() - 1)?;
        worksheet.autofilter(0, 0, last_row, last_col)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Rejects bytes that are not a zip archive holding a worksheet.
pub fn verify_workbook(bytes: &[u8]) -> Result<()> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    if archive.file_names().any(|name| name == WORKSHEET_PART) {
        Ok(())
    } else {
        Err(EtlError::FormatError {
            message: format!("workbook has no {}", WORKSHEET_PART),
        })
    }
}

pub struct SpreadsheetWriter<'a, S: Storage> {
    storage: &'a S,
    options: SheetOptions,
}

impl<'a, S: Storage> SpreadsheetWriter<'a, S> {
    pub fn new(storage: &'a S, options: SheetOptions) -> Self {
        Self { storage, options }
    }

    pub async fn write(&self, filename: &str, table: &OutputTable) -> Result<()> {
        let bytes = render_plain(table, &self.options.sheet_name)?;
        self.storage.write_file(filename, &bytes).await?;
        tracing::info!("💾 {} trials saved to '{}'", table.len(), filename);
        Ok(())
    }

    pub async fn format(&self, filename: &str, table: &OutputTable) -> Result<()> {
        let existing = self.storage.read_file(filename).await?;
        verify_workbook(&existing)?;

        let bytes = render_formatted(table, &self.options)?;
        self.storage.write_file(filename, &bytes).await?;
        Ok(())
    }

    /// Write errors propagate; formatting errors are logged and reported
    /// as `formatted: false`.
    pub async fn write_and_format(&self, filename: &str, table: &OutputTable) -> Result<LoadResult> {
        self.write(filename, table).await?;

        let formatted = match self.format(filename, table).await {
            Ok(()) => {
                tracing::info!("🎨 Spreadsheet '{}' formatted successfully", filename);
                true
            }
            Err(e) => {
                tracing::error!("❌ Error formatting spreadsheet '{}': {}", filename, e);
                false
            }
        };

        Ok(LoadResult {
            path: self.storage.locate(filename),
            rows: table.len(),
            formatted,
        })
    }
}
