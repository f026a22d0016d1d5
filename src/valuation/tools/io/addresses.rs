use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use tracing::debug;

use crate::valuation::tools::error::{Result, ToolError};
use crate::valuation::tools::model::PropertyQuery;

/// Reads the list of queries from `path`.
///
/// Workbooks (`.xlsx`) are read from their first sheet; every other file is
/// treated as headerless CSV. Both layouts carry the address in the first
/// column and the postal code in the second.
pub fn read_queries(path: &Path) -> Result<Vec<PropertyQuery>> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }

    let is_workbook = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));

    let queries = if is_workbook {
        read_workbook_queries(path)?
    } else {
        read_csv_queries(File::open(path)?)?
    };
    debug!(path = %path.display(), count = queries.len(), "read queries");
    Ok(queries)
}

/// Parses headerless `address,zipcode` CSV rows.
pub fn read_csv_queries<R: Read>(reader: R) -> Result<Vec<PropertyQuery>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut queries = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        let address = record.get(0).unwrap_or_default();
        if address.is_empty() {
            continue;
        }
        let zipcode = record.get(1).ok_or_else(|| {
            ToolError::InvalidInput(format!("line {line}: expected address and postal code"))
        })?;
        queries.push(PropertyQuery::new(address, zipcode));
    }

    Ok(queries)
}

fn read_workbook_queries(path: &Path) -> Result<Vec<PropertyQuery>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ToolError::InvalidInput(format!("{} has no sheets", path.display())))?
        .map_err(ToolError::from)?;

    let mut queries = Vec::new();
    for (idx, row) in range.rows().enumerate() {
        let address = cell_to_string(row.first());
        if address.is_empty() {
            continue;
        }
        let zipcode = cell_to_string(row.get(1));
        if zipcode.is_empty() {
            return Err(ToolError::InvalidInput(format!(
                "row {}: expected address and postal code",
                idx + 1
            )));
        }
        queries.push(PropertyQuery::new(address, zipcode));
    }

    Ok(queries)
}

/// Removes repeated queries, keeping the first occurrence of each.
pub fn dedupe_queries(queries: Vec<PropertyQuery>) -> Vec<PropertyQuery> {
    let mut seen = HashSet::new();
    queries
        .into_iter()
        .filter(|query| seen.insert(query.clone()))
        .collect()
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.trim().to_string(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
