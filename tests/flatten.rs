use std::collections::BTreeSet;

use serde_json::json;
use valuation_tools::ToolError;
use valuation_tools::flatten::{DEFAULT_SECTIONS, flatten};
use valuation_tools::model::schema::{KnownSection, SchemaIssue, schema_issues};
use valuation_tools::model::{FieldValue, RawRecord};

fn deep_search_response() -> serde_json::Value {
    json!({
        "extended_data": {
            "bathrooms": "2.0",
            "bedrooms": "3",
            "complete": true,
            "finished_sqft": "2090",
            "fips_county": "36081",
            "last_sold_date": null,
            "last_sold_price": null,
            "lot_size_sqft": "3841",
            "tax_assessment": "1072000.0",
            "tax_assessment_year": "2017",
            "usecode": "SingleFamily",
            "year_built": "1925"
        },
        "full_address": {
            "city": "Forest Hills",
            "latitude": "40.710752",
            "longitude": "-73.843789",
            "state": "NY",
            "street": "100-39 75th Ave",
            "zipcode": "11375"
        },
        "links": {
            "comparables": "https://example.com/comparables",
            "home_details": "https://example.com/details"
        },
        "local_realestate": {
            "fsbo_link": "https://example.com/fsbo",
            "overview_link": "https://example.com/overview",
            "region_id": "273757",
            "region_name": "Forest Hills",
            "region_type": "neighborhood",
            "sale_link": "https://example.com/sale",
            "zillow_home_value_index": null
        },
        "similarity_score": null,
        "zestimate": {
            "amount": 1376218,
            "amount_change_30days": 2881,
            "amount_currency": "USD",
            "amount_last_updated": "04/07/2018",
            "valuation_range_high": 1445029,
            "valuation_range_low": 1307407
        },
        "zpid": "32005113"
    })
}

fn record(value: serde_json::Value) -> RawRecord {
    RawRecord::from_json(value).expect("raw record")
}

#[test]
fn later_sections_override_earlier_ones() {
    let raw = record(json!({"a": {"x": 1, "y": 2}, "b": {"y": 3, "z": 4}}));

    let flat = flatten(&raw, &["a", "b"]).expect("flattened");

    assert_eq!(flat.len(), 3);
    assert_eq!(flat["x"], FieldValue::from_json(json!(1)));
    assert_eq!(flat["y"], FieldValue::from_json(json!(3)));
    assert_eq!(flat["z"], FieldValue::from_json(json!(4)));

    let reversed = flatten(&raw, &["b", "a"]).expect("flattened");
    assert_eq!(reversed["y"], FieldValue::from_json(json!(2)));
}

#[test]
fn default_sections_keep_only_their_fields() {
    let raw = record(deep_search_response());

    let flat = flatten(&raw, &DEFAULT_SECTIONS).expect("flattened");

    let mut expected: BTreeSet<&str> = BTreeSet::new();
    for section in KnownSection::ALL {
        expected.extend(section.expected_fields().iter().copied());
    }
    let keys: BTreeSet<&str> = flat.keys().map(String::as_str).collect();
    assert_eq!(keys, expected);

    assert!(!flat.contains_key("zpid"));
    assert!(!flat.contains_key("comparables"));
    assert!(!flat.contains_key("similarity_score"));
    assert_eq!(flat["city"], FieldValue::String("Forest Hills".into()));
    assert_eq!(flat["complete"], FieldValue::Boolean(true));
    assert_eq!(flat["last_sold_price"], FieldValue::Null);
    assert_eq!(flat["amount"].to_cell(), "1376218");
}

#[test]
fn flatten_is_repeatable() {
    let raw = record(deep_search_response());

    let first = flatten(&raw, &DEFAULT_SECTIONS).expect("flattened");
    let second = flatten(&raw, &DEFAULT_SECTIONS).expect("flattened");

    assert_eq!(first, second);
}

#[test]
fn no_sections_yield_empty_record() {
    let raw = record(deep_search_response());
    let sections: [&str; 0] = [];

    let flat = flatten(&raw, &sections).expect("flattened");

    assert!(flat.is_empty());
}

#[test]
fn empty_section_contributes_nothing() {
    let raw = record(json!({"a": {"x": 1}, "b": {}}));

    let flat = flatten(&raw, &["a", "b"]).expect("flattened");

    assert_eq!(flat.keys().collect::<Vec<_>>(), vec!["x"]);
}

#[test]
fn missing_section_is_an_error() {
    let raw = record(json!({"a": {"x": 1}}));

    let err = flatten(&raw, &["a", "zestimate"]).expect_err("missing section");

    assert!(matches!(err, ToolError::MissingSection(name) if name == "zestimate"));
}

#[test]
fn scalar_section_is_rejected() {
    let raw = record(deep_search_response());

    let err = flatten(&raw, &["zestimate", "zpid"]).expect_err("scalar section");

    match err {
        ToolError::MalformedSection { section, found } => {
            assert_eq!(section, "zpid");
            assert_eq!(found, "string");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn deeper_nesting_passes_through() {
    let nested = json!({"low": 1, "high": [2, 3]});
    let raw = record(json!({"a": {"range": nested.clone(), "x": "y"}}));

    let flat = flatten(&raw, &["a"]).expect("flattened");

    assert_eq!(flat["range"], FieldValue::Nested(nested));
    assert_eq!(flat["range"].to_cell(), r#"{"high":[2,3],"low":1}"#);
}

#[test]
fn non_object_response_is_rejected() {
    let err = RawRecord::from_json(json!(["not", "an", "object"])).expect_err("rejected");

    assert!(matches!(err, ToolError::InvalidResponse(_)));
}

#[test]
fn schema_issues_report_deviations() {
    let raw = record(json!({
        "zestimate": {
            "amount": 1,
            "amount_currency": "USD",
            "amount_change_30days": 0,
            "amount_last_updated": "01/01/2020",
            "valuation_range_high": 2,
            "valuation_range_low": 0,
            "percentile": "90"
        },
        "full_address": {"city": "Forest Hills"},
        "custom": {"anything": true}
    }));

    let issues = schema_issues(&raw, &["zestimate", "full_address", "custom"]);

    assert!(issues.contains(&SchemaIssue::UnexpectedField {
        section: KnownSection::Zestimate,
        field: "percentile".into(),
    }));
    assert!(issues.contains(&SchemaIssue::MissingField {
        section: KnownSection::FullAddress,
        field: "zipcode".into(),
    }));
    assert_eq!(issues.len(), 6);
}

#[test]
fn complete_response_has_no_schema_issues() {
    let raw = record(deep_search_response());

    assert!(schema_issues(&raw, &DEFAULT_SECTIONS).is_empty());
}
