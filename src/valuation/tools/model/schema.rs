use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;

use crate::valuation::tools::model::RawRecord;

/// Sections of a deep-search response whose field layout is known up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KnownSection {
    ExtendedData,
    Zestimate,
    FullAddress,
    LocalRealestate,
}

impl KnownSection {
    pub const ALL: [KnownSection; 4] = [
        KnownSection::ExtendedData,
        KnownSection::Zestimate,
        KnownSection::FullAddress,
        KnownSection::LocalRealestate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            KnownSection::ExtendedData => "extended_data",
            KnownSection::Zestimate => "zestimate",
            KnownSection::FullAddress => "full_address",
            KnownSection::LocalRealestate => "local_realestate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.name() == name)
    }

    /// Field names the provider documents for this section.
    pub fn expected_fields(self) -> &'static [&'static str] {
        match self {
            KnownSection::ExtendedData => &[
                "bathrooms",
                "bedrooms",
                "complete",
                "finished_sqft",
                "fips_county",
                "last_sold_date",
                "last_sold_price",
                "lot_size_sqft",
                "tax_assessment",
                "tax_assessment_year",
                "usecode",
                "year_built",
            ],
            KnownSection::Zestimate => &[
                "amount",
                "amount_change_30days",
                "amount_currency",
                "amount_last_updated",
                "valuation_range_high",
                "valuation_range_low",
            ],
            KnownSection::FullAddress => {
                &["city", "latitude", "longitude", "state", "street", "zipcode"]
            }
            KnownSection::LocalRealestate => &[
                "fsbo_link",
                "overview_link",
                "region_id",
                "region_name",
                "region_type",
                "sale_link",
                "zillow_home_value_index",
            ],
        }
    }
}

impl fmt::Display for KnownSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Deviation between a response section and its documented layout.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaIssue {
    /// A documented field is absent.
    MissingField {
        section: KnownSection,
        field: String,
    },
    /// A field the layout does not document is present.
    UnexpectedField {
        section: KnownSection,
        field: String,
    },
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaIssue::MissingField { section, field } => {
                write!(f, "{section}: missing field '{field}'")
            }
            SchemaIssue::UnexpectedField { section, field } => {
                write!(f, "{section}: unexpected field '{field}'")
            }
        }
    }
}

/// Compares the requested sections of `record` with their documented layout.
///
/// Sections that are unknown, absent, or not mappings are skipped; flattening
/// is responsible for rejecting the latter two.
pub fn schema_issues<S: AsRef<str>>(record: &RawRecord, sections: &[S]) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();

    for name in sections {
        let Some(section) = KnownSection::from_name(name.as_ref()) else {
            continue;
        };
        let Some(Value::Object(fields)) = record.section(section.name()) else {
            continue;
        };

        let expected: BTreeSet<&str> = section.expected_fields().iter().copied().collect();
        for field in &expected {
            if !fields.contains_key(*field) {
                issues.push(SchemaIssue::MissingField {
                    section,
                    field: field.to_string(),
                });
            }
        }
        for field in fields.keys() {
            if !expected.contains(field.as_str()) {
                issues.push(SchemaIssue::UnexpectedField {
                    section,
                    field: field.clone(),
                });
            }
        }
    }

    issues
}
