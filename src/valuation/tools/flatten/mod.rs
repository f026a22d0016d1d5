use serde_json::Value;

use crate::valuation::tools::error::{Result, ToolError};
use crate::valuation::tools::model::{FieldValue, FlatRecord, RawRecord, json_kind};

/// Sections merged into a row when the caller does not choose any. Later
/// entries take precedence when a field name repeats.
pub const DEFAULT_SECTIONS: [&str; 4] = [
    "extended_data",
    "zestimate",
    "full_address",
    "local_realestate",
];

/// Merges the fields of the named sections of `record` into one flat record.
///
/// Sections are merged in the order given and a field defined by several
/// sections keeps the value of the last one. Top-level entries that are not
/// named (links, scores, identifiers) are dropped. Values nested below the
/// first level are carried unchanged.
pub fn flatten<S: AsRef<str>>(record: &RawRecord, sections: &[S]) -> Result<FlatRecord> {
    let mut flat = FlatRecord::new();

    for name in sections {
        let name = name.as_ref();
        let section = record
            .section(name)
            .ok_or_else(|| ToolError::MissingSection(name.to_string()))?;

        let Value::Object(fields) = section else {
            return Err(ToolError::MalformedSection {
                section: name.to_string(),
                found: json_kind(section),
            });
        };

        for (field, value) in fields {
            flat.insert(field.clone(), FieldValue::from_json(value.clone()));
        }
    }

    Ok(flat)
}
