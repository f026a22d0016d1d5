use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};
use tracing::{debug, warn};

use crate::valuation::tools::error::Result;
use crate::valuation::tools::model::Dataset;

/// Header of the column holding the row identifier.
pub const ID_COLUMN: &str = "address";
/// Name of the worksheet written to Excel output.
pub const VALUATIONS_SHEET: &str = "Valuations";

/// A dataset laid out as header plus string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Serialisation used when persisting a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Xlsx,
    Json,
}

impl OutputFormat {
    /// Picks the format from the file extension, falling back to CSV.
    pub fn detect(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("xlsx") => OutputFormat::Xlsx,
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Xlsx => write!(f, "xlsx"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Lays the dataset out as a table: the identifier column first, then the
/// union of all field names in sorted order. Fields a row lacks are empty.
///
/// A field that shares its name with the identifier column is written under
/// the first free `{name}_{n}` header so every column header stays unique.
pub fn build_table(dataset: &Dataset) -> Table {
    let fields: BTreeSet<&str> = dataset
        .iter()
        .flat_map(|(_, record)| record.keys().map(String::as_str))
        .collect();

    let mut columns = Vec::with_capacity(fields.len() + 1);
    columns.push(ID_COLUMN.to_string());
    columns.extend(fields.iter().map(|field| field_header(field, &fields)));

    let rows = dataset
        .iter()
        .map(|(id, record)| {
            let mut cells = Vec::with_capacity(columns.len());
            cells.push(id.clone());
            for field in &fields {
                cells.push(record.get(*field).map(|value| value.to_cell()).unwrap_or_default());
            }
            cells
        })
        .collect();

    Table { columns, rows }
}

fn field_header(field: &str, fields: &BTreeSet<&str>) -> String {
    if field != ID_COLUMN {
        return field.to_string();
    }

    let mut counter = 1;
    loop {
        let candidate = format!("{field}_{counter}");
        if !fields.contains(candidate.as_str()) {
            warn!(field, header = %candidate, "field renamed to avoid the identifier column");
            return candidate;
        }
        counter += 1;
    }
}

/// Writes the dataset to `path` using the requested format.
pub fn write_dataset(path: &Path, dataset: &Dataset, format: OutputFormat) -> Result<()> {
    debug!(path = %path.display(), %format, rows = dataset.len(), "writing dataset");
    match format {
        OutputFormat::Csv => write_csv(path, &build_table(dataset)),
        OutputFormat::Xlsx => write_xlsx(path, &build_table(dataset)),
        OutputFormat::Json => write_json(path, dataset),
    }
}

pub fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the table to a single `Valuations` sheet with a bold, frozen
/// header row and an autofilter over the data.
pub fn write_xlsx(path: &Path, table: &Table) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(VALUATIONS_SHEET)?;

    for (col, header) in (0u16..).zip(&table.columns) {
        worksheet.write_string_with_format(0, col, header, &header_format)?;
    }
    for (row, cells) in (1u32..).zip(&table.rows) {
        for (col, cell) in (0u16..).zip(cells) {
            if !cell.is_empty() {
                worksheet.write_string(row, col, cell)?;
            }
        }
    }

    if !table.rows.is_empty() {
        let mut valuations = rust_xlsxwriter::Table::new();
        valuations.set_autofilter(true);
        let last_col = (table.columns.len() as u16).saturating_sub(1);
        worksheet.add_table(0, 0, table.rows.len() as u32, last_col, &valuations)?;
    }
    worksheet.set_freeze_panes(1, 0)?;
    worksheet.autofit();

    workbook.save(path)?;
    Ok(())
}

/// Writes the dataset as a JSON object keyed by row identifier.
pub fn write_json(path: &Path, dataset: &Dataset) -> Result<()> {
    let json_string = serde_json::to_string_pretty(dataset)?;
    fs::write(path, json_string)?;
    Ok(())
}
