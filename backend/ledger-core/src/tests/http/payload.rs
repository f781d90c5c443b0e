use crate::error::ErrorKind;
use crate::http::payload::{Payload, decode, is_binary_content_type};

use serde::Deserialize;
use serde_json::json;

#[test]
fn given_binary_content_types_when_checked_then_detected() {
    for content_type in [
        "application/pdf",
        "application/octet-stream",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "image/png",
        "APPLICATION/ZIP; name=export.zip",
    ] {
        assert!(is_binary_content_type(content_type), "{content_type}");
    }

    for content_type in ["application/json", "application/vnd.api+json", "text/plain; charset=utf-8"] {
        assert!(!is_binary_content_type(content_type), "{content_type}");
    }
}

/// **VALUE**: Invoice PDFs come back untouched.
///
/// **BUG THIS CATCHES**: Binary exports run through the JSON decoder and
/// failing, or being lossily converted to text.
#[test]
fn given_pdf_body_when_decoded_then_blob_keeps_bytes() {
    let bytes = vec![0x25, 0x50, 0x44, 0x46, 0xff, 0x00];

    let payload = decode(Some("application/pdf"), bytes.clone()).unwrap();

    let blob = payload.into_blob().expect("pdf decodes to a blob");
    assert_eq!(blob.content_type, "application/pdf");
    assert_eq!(blob.bytes, bytes);
}

#[test]
fn given_json_body_when_decoded_then_json_payload() {
    let payload = decode(Some("application/json; charset=utf-8"), br#"{"id":"7"}"#.to_vec()).unwrap();

    assert_eq!(payload.as_json(), Some(&json!({ "id": "7" })));
}

#[test]
fn given_empty_body_when_decoded_then_empty_payload() {
    assert_eq!(decode(None, Vec::new()).unwrap(), Payload::Empty);
    assert_eq!(decode(Some("application/json"), b"  \n".to_vec()).unwrap(), Payload::Empty);
}

#[test]
fn given_malformed_json_with_json_content_type_when_decoded_then_unknown_error() {
    let error = decode(Some("application/json"), b"{not json".to_vec()).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Unknown);
}

#[test]
fn given_plain_text_when_decoded_then_string_payload() {
    let payload = decode(Some("text/plain"), b"pong".to_vec()).unwrap();

    assert_eq!(payload, Payload::Json(json!("pong")));
}

#[derive(Debug, Deserialize, PartialEq)]
struct TaxCode {
    code: String,
    rate: f64,
}

#[test]
fn given_json_payload_when_typed_then_deserializes() {
    let payload = Payload::Json(json!({ "code": "VAT20", "rate": 0.2 }));

    let tax: TaxCode = payload.into_json().unwrap();

    assert_eq!(tax, TaxCode { code: "VAT20".into(), rate: 0.2 });
}

#[test]
fn given_wrong_shape_when_typed_then_unknown_error() {
    let payload = Payload::Json(json!({ "code": 5 }));

    let error = payload.into_json::<TaxCode>().unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Unknown);
}

#[test]
fn given_empty_payload_when_typed_as_option_then_none() {
    let value: Option<TaxCode> = Payload::Empty.into_json().unwrap();

    assert!(value.is_none());
}
