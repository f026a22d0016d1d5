use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use serde_json::json;
use valuation_tools::ToolError;
use valuation_tools::flatten::{DEFAULT_SECTIONS, flatten};
use valuation_tools::io::client::{HttpValuationClient, ValuationClient, decode_body};
use valuation_tools::model::{FieldValue, PropertyQuery};

const DEEP_SEARCH_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<SearchResults:searchresults xmlns:SearchResults="http://www.zillow.com/static/xsd/SearchResults.xsd">
  <request><address>100-39 75th Ave</address><citystatezip>11375</citystatezip></request>
  <message><text>Request successfully processed</text><code>0</code></message>
  <response>
    <results>
      <result>
        <zpid>32005113</zpid>
        <links>
          <homedetails>https://example.com/homedetails/32005113_zpid/</homedetails>
          <graphsanddata>https://example.com/graphs?zpid=32005113&amp;view=all</graphsanddata>
          <mapthishome>https://example.com/map/32005113_zpid/</mapthishome>
          <comparables>https://example.com/comps/32005113_zpid/</comparables>
        </links>
        <address>
          <street>100-39 75th Ave</street>
          <zipcode>11375</zipcode>
          <city>Forest Hills</city>
          <state>NY</state>
          <latitude>40.710752</latitude>
          <longitude>-73.843789</longitude>
        </address>
        <FIPScounty>36081</FIPScounty>
        <useCode>SingleFamily</useCode>
        <taxAssessmentYear>2017</taxAssessmentYear>
        <taxAssessment>1072000.0</taxAssessment>
        <yearBuilt>1925</yearBuilt>
        <lotSizeSqFt>3841</lotSizeSqFt>
        <finishedSqFt>2090</finishedSqFt>
        <bathrooms>2.0</bathrooms>
        <bedrooms>3</bedrooms>
        <zestimate>
          <amount currency="USD">1376218</amount>
          <last-updated>04/07/2018</last-updated>
          <oneWeekChange deprecated="true"></oneWeekChange>
          <valueChange duration="30" currency="USD">2881</valueChange>
          <valuationRange>
            <low currency="USD">1307407</low>
            <high currency="USD">1445029</high>
          </valuationRange>
          <percentile>0</percentile>
        </zestimate>
        <localRealEstate>
          <region name="Forest Hills" id="273757" type="neighborhood">
            <zindexValue></zindexValue>
            <links>
              <overview>https://example.com/local-info/overview</overview>
              <forSaleByOwner>https://example.com/fsbo</forSaleByOwner>
              <forSale>https://example.com/for-sale</forSale>
            </links>
          </region>
        </localRealEstate>
      </result>
    </results>
  </response>
</SearchResults:searchresults>"#;

const NO_MATCH_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<SearchResults:searchresults xmlns:SearchResults="http://www.zillow.com/static/xsd/SearchResults.xsd">
  <message><text>Error: no exact match found for input address</text><code>508</code></message>
</SearchResults:searchresults>"#;

/// Answers a single request with the given status line and body, and hands
/// the raw request back through the returned channel.
fn serve_once(status: &str, content_type: &str, body: &str) -> (String, Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener bound");
    let url = format!(
        "http://{}/webservice/GetDeepSearchResults.htm",
        listener.local_addr().expect("local address")
    );
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("connection accepted");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = stream.read(&mut buf).expect("request read");
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
        }
        stream.write_all(response.as_bytes()).expect("response written");
        let _ = sender.send(String::from_utf8_lossy(&request).into_owned());
    });

    (url, receiver)
}

fn query() -> PropertyQuery {
    PropertyQuery::new("100-39 75th Ave", "11375")
}

#[test]
fn server_error_maps_to_provider_error() {
    let (url, _request) = serve_once("500 Internal Server Error", "text/plain", "upstream down");
    let client = HttpValuationClient::new(url, "test-key").expect("client built");

    let err = client.fetch(&query()).expect_err("server error");

    match err {
        ToolError::Provider { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream down");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn array_body_is_an_invalid_response() {
    let (url, _request) = serve_once("200 OK", "application/json", "[]");
    let client = HttpValuationClient::new(url, "test-key").expect("client built");

    let err = client.fetch(&query()).expect_err("array body");

    assert!(matches!(err, ToolError::InvalidResponse(_)));
}

#[test]
fn json_object_body_is_returned_with_query_parameters_sent() {
    let body = json!({
        "zpid": "32005113",
        "zestimate": {"amount": 1376218, "amount_currency": "USD"}
    })
    .to_string();
    let (url, request) = serve_once("200 OK", "application/json", &body);
    let client = HttpValuationClient::new(url, "test-key").expect("client built");

    let raw = client.fetch(&query()).expect("record fetched");
    let flat = flatten(&raw, &["zestimate"]).expect("flattened");

    assert_eq!(flat["amount"].to_cell(), "1376218");
    assert_eq!(flat["amount_currency"], FieldValue::String("USD".into()));

    let request = request.recv().expect("request captured");
    let request_line = request.lines().next().unwrap_or_default();
    assert!(request_line.starts_with("GET /webservice/GetDeepSearchResults.htm?"));
    assert!(request_line.contains("zws-id=test-key"));
    assert!(request_line.contains("citystatezip=11375"));
}

#[test]
fn xml_deep_search_reply_is_decoded_into_sections() {
    let (url, _request) = serve_once("200 OK", "text/xml", DEEP_SEARCH_XML);
    let client = HttpValuationClient::new(url, "test-key").expect("client built");

    let raw = client.fetch(&query()).expect("record fetched");
    let flat = flatten(&raw, &DEFAULT_SECTIONS).expect("flattened");

    assert_eq!(flat["amount"], FieldValue::from_json(json!(1376218)));
    assert_eq!(flat["amount_currency"], FieldValue::String("USD".into()));
    assert_eq!(flat["amount_change_30days"], FieldValue::from_json(json!(2881)));
    assert_eq!(flat["valuation_range_low"], FieldValue::from_json(json!(1307407)));
    assert_eq!(flat["valuation_range_high"], FieldValue::from_json(json!(1445029)));
    assert_eq!(flat["amount_last_updated"], FieldValue::String("04/07/2018".into()));
    assert_eq!(flat["city"], FieldValue::String("Forest Hills".into()));
    assert_eq!(flat["fips_county"], FieldValue::String("36081".into()));
    assert_eq!(flat["region_id"], FieldValue::String("273757".into()));
    assert_eq!(flat["region_type"], FieldValue::String("neighborhood".into()));
    assert_eq!(flat["zillow_home_value_index"], FieldValue::Null);
    assert_eq!(flat["last_sold_price"], FieldValue::Null);
    assert_eq!(flat["complete"], FieldValue::Boolean(true));
    assert!(!flat.contains_key("percentile"));
    assert!(!flat.contains_key("home_details"));
}

#[test]
fn deep_search_links_resolve_entities() {
    let raw = decode_body(DEEP_SEARCH_XML).expect("decoded");

    let links = flatten(&raw, &["links"]).expect("flattened");

    assert_eq!(
        links["graphs_and_data"],
        FieldValue::String("https://example.com/graphs?zpid=32005113&view=all".into())
    );
    assert_eq!(
        raw.section("zpid"),
        Some(&serde_json::Value::String("32005113".into()))
    );
}

#[test]
fn deep_search_error_code_is_rejected() {
    let err = decode_body(NO_MATCH_XML).expect_err("no match");

    match err {
        ToolError::ProviderRejected { code, message } => {
            assert_eq!(code, "508");
            assert!(message.contains("no exact match"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn truncated_xml_is_an_invalid_response() {
    let err = decode_body("<searchresults><message><code>0</code>").expect_err("truncated");

    assert!(matches!(err, ToolError::InvalidResponse(_)));
}
