use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::valuation::tools::error::{Result, ToolError};
use crate::valuation::tools::model::RawRecord;

/// Status code the provider reports for a successful lookup.
const SUCCESS_CODE: &str = "0";

/// Element of a parsed XML document. Mixed content is not needed for the
/// deep-search payload, so text is kept separately from children.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    fn path(&self, names: &[&str]) -> Option<&Element> {
        names.iter().try_fold(self, |element, name| element.child(name))
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Decodes a deep-search XML reply into the section layout used throughout
/// the crate (`extended_data`, `zestimate`, `full_address`,
/// `local_realestate`, `links`, plus the scalar `zpid`).
///
/// A reply whose message code is not `0` is reported as
/// [`ToolError::ProviderRejected`].
pub fn parse_deep_search(xml: &str) -> Result<RawRecord> {
    let root = parse_document(xml)?;

    let code = root
        .path(&["message", "code"])
        .map(|code| code.text.as_str())
        .unwrap_or_default();
    if code != SUCCESS_CODE {
        let message = root
            .path(&["message", "text"])
            .map(|text| text.text.clone())
            .unwrap_or_default();
        return Err(ToolError::ProviderRejected {
            code: code.to_string(),
            message,
        });
    }

    let result = root
        .path(&["response", "results", "result"])
        .ok_or_else(|| ToolError::InvalidResponse("deep-search reply has no result".into()))?;

    let mut sections = Map::new();
    sections.insert("zpid".into(), text_of(result.child("zpid")));
    sections.insert("links".into(), links_section(result));
    sections.insert("full_address".into(), full_address_section(result));
    sections.insert("zestimate".into(), zestimate_section(result));
    sections.insert("local_realestate".into(), local_realestate_section(result));
    sections.insert("extended_data".into(), extended_data_section(result));
    sections.insert("similarity_score".into(), Value::Null);

    RawRecord::from_json(Value::Object(sections))
}

fn links_section(result: &Element) -> Value {
    let links = result.child("links");
    let field = |tag: &str| text_of(links.and_then(|links| links.child(tag)));

    let mut section = Map::new();
    section.insert("home_details".into(), field("homedetails"));
    section.insert("graphs_and_data".into(), field("graphsanddata"));
    section.insert("map_this_home".into(), field("mapthishome"));
    section.insert("comparables".into(), field("comparables"));
    Value::Object(section)
}

fn full_address_section(result: &Element) -> Value {
    let address = result.child("address");

    let mut section = Map::new();
    for field in ["street", "zipcode", "city", "state", "latitude", "longitude"] {
        section.insert(
            field.into(),
            text_of(address.and_then(|address| address.child(field))),
        );
    }
    Value::Object(section)
}

fn zestimate_section(result: &Element) -> Value {
    let zestimate = result.child("zestimate");
    let at = |names: &[&str]| zestimate.and_then(|zestimate| zestimate.path(names));

    let mut section = Map::new();
    section.insert("amount".into(), integer_of(at(&["amount"])));
    section.insert(
        "amount_currency".into(),
        at(&["amount"])
            .and_then(|amount| amount.attribute("currency"))
            .map(|currency| Value::String(currency.to_string()))
            .unwrap_or(Value::Null),
    );
    section.insert("amount_last_updated".into(), text_of(at(&["last-updated"])));
    section.insert(
        "amount_change_30days".into(),
        integer_of(at(&["valueChange"])),
    );
    section.insert(
        "valuation_range_low".into(),
        integer_of(at(&["valuationRange", "low"])),
    );
    section.insert(
        "valuation_range_high".into(),
        integer_of(at(&["valuationRange", "high"])),
    );
    Value::Object(section)
}

fn local_realestate_section(result: &Element) -> Value {
    let region = result.path(&["localRealEstate", "region"]);
    let attribute = |name: &str| {
        region
            .and_then(|region| region.attribute(name))
            .map(|value| Value::String(value.to_string()))
            .unwrap_or(Value::Null)
    };
    let link = |tag: &str| text_of(region.and_then(|region| region.path(&["links", tag])));

    let mut section = Map::new();
    section.insert("region_name".into(), attribute("name"));
    section.insert("region_id".into(), attribute("id"));
    section.insert("region_type".into(), attribute("type"));
    section.insert(
        "zillow_home_value_index".into(),
        text_of(region.and_then(|region| region.child("zindexValue"))),
    );
    section.insert("overview_link".into(), link("overview"));
    section.insert("fsbo_link".into(), link("forSaleByOwner"));
    section.insert("sale_link".into(), link("forSale"));
    Value::Object(section)
}

fn extended_data_section(result: &Element) -> Value {
    const FIELDS: [(&str, &str); 11] = [
        ("fips_county", "FIPScounty"),
        ("usecode", "useCode"),
        ("tax_assessment_year", "taxAssessmentYear"),
        ("tax_assessment", "taxAssessment"),
        ("year_built", "yearBuilt"),
        ("lot_size_sqft", "lotSizeSqFt"),
        ("finished_sqft", "finishedSqFt"),
        ("bathrooms", "bathrooms"),
        ("bedrooms", "bedrooms"),
        ("last_sold_date", "lastSoldDate"),
        ("last_sold_price", "lastSoldPrice"),
    ];

    let mut section = Map::new();
    for (field, tag) in FIELDS {
        section.insert(field.into(), text_of(result.child(tag)));
    }
    section.insert("complete".into(), Value::Bool(true));
    Value::Object(section)
}

/// Text content of an element; absent or empty elements become `null`.
fn text_of(element: Option<&Element>) -> Value {
    match element {
        Some(element) if !element.text.is_empty() => Value::String(element.text.clone()),
        _ => Value::Null,
    }
}

/// Whole-dollar amounts are kept numeric; anything else falls back to text.
fn integer_of(element: Option<&Element>) -> Value {
    match text_of(element) {
        Value::String(text) => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        other => other,
    }
}

fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => stack.push(start_element(&reader, &start)?),
            Event::Empty(start) => {
                let element = start_element(&reader, &start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.decode().map_err(xml_error)?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&data.decode().map_err(xml_error)?);
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(current) = stack.last_mut() {
                    if let Some(ch) = reference.resolve_char_ref().map_err(xml_error)? {
                        current.text.push(ch);
                    } else {
                        let name = reference.decode().map_err(xml_error)?;
                        let resolved = resolve_predefined_entity(&name).ok_or_else(|| {
                            ToolError::InvalidResponse(format!("unknown XML entity '&{name};'"))
                        })?;
                        current.text.push_str(resolved);
                    }
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    ToolError::InvalidResponse("unbalanced closing tag in XML reply".into())
                })?;
                attach(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ToolError::InvalidResponse("XML reply ended inside an element".into()));
    }
    root.ok_or_else(|| ToolError::InvalidResponse("XML reply has no root element".into()))
}

fn start_element(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element {
        name: local_name(start.name().as_ref()),
        ..Element::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        let value = attribute
            .decode_and_unescape_value(reader.decoder())
            .map_err(xml_error)?;
        element
            .attributes
            .insert(local_name(attribute.key.as_ref()), value.into_owned());
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

/// Drops a namespace prefix such as `SearchResults:`.
fn local_name(name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

fn xml_error(err: impl std::fmt::Display) -> ToolError {
    ToolError::InvalidResponse(format!("malformed XML reply: {err}"))
}
