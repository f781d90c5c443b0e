use crate::config::ApiConfig;
use crate::http::descriptor::RequestDescriptor;
use crate::http::transport::Transport;

fn transport(base_url: &str) -> Transport {
    Transport::new(&ApiConfig::with_base_url(base_url)).unwrap()
}

#[test]
fn given_base_url_without_trailing_slash_when_joined_then_path_nests_under_it() {
    let transport = transport("https://ledger.example.com/api/v1");

    let url = transport.url_for(&RequestDescriptor::get("/accounts")).unwrap();

    assert_eq!(url.as_str(), "https://ledger.example.com/api/v1/accounts");
}

#[test]
fn given_query_pairs_when_joined_then_encoded_in_order() {
    let transport = transport("http://127.0.0.1:3000/api/");
    let descriptor = RequestDescriptor::get("payments")
        .with_query("from", "2026-01-01")
        .with_query("memo", "rent & rates");

    let url = transport.url_for(&descriptor).unwrap();

    assert_eq!(url.path(), "/api/payments");
    assert_eq!(url.query(), Some("from=2026-01-01&memo=rent+%26+rates"));
}
