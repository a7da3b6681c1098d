//! Helpers driven by the shared application config and HTTP types

use axum::http::{header, HeaderMap, HeaderValue};
use mucts_common::AppConfig;
use mucts_helpers::{get_cdn_url, get_id_card_info, id_card_verify, is_mobile, Gender};

#[test]
fn test_cdn_url_follows_app_environment() {
    let local = AppConfig {
        cdn_url: "https://static.example.com/assets/".to_string(),
        ..AppConfig::default()
    };
    let production = AppConfig {
        env: "production".to_string(),
        ..local.clone()
    };

    assert_eq!(
        get_cdn_url(&local, "/js/app.js"),
        "https://static.example.com/assets/js/app.js"
    );
    assert_eq!(
        get_cdn_url(&production, "/js/app.js"),
        "https://static.example.com/assets/js/app.min.js"
    );
    assert_eq!(
        get_cdn_url(&production, "css/site.min.css"),
        "https://static.example.com/assets/css/site.min.css"
    );
    assert_eq!(
        get_cdn_url(&production, "img/logo.png"),
        "https://static.example.com/assets/img/logo.png"
    );
}

#[test]
fn test_is_mobile_on_axum_headers() {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static("Mozilla/5.0 (Linux; Android 14; Pixel 8) Mobile Safari"),
    );
    assert!(is_mobile(&headers));

    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static("Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0"),
    );
    assert!(!is_mobile(&headers));
}

#[test]
fn test_id_card_info_agrees_with_verification() {
    let id = "11010519491231002X";
    assert!(id_card_verify(id));

    let info = get_id_card_info(id).unwrap();
    assert_eq!(info.birthday.to_string(), "1949-12-31");
    assert_eq!(info.gender, Gender::Female);

    assert!(get_id_card_info("110105194912310021").is_none());
}
