//! CDN asset links

use std::sync::LazyLock;

use mucts_common::AppConfig;
use regex::Regex;

static ASSET_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(js|css)$").expect("asset extension pattern is valid"));

/// Absolute asset URL under the configured CDN.
///
/// In production, `app.js` / `app.css` are served as `app.min.js` /
/// `app.min.css` unless the file already names a minified build.
pub fn get_cdn_url(config: &AppConfig, file: &str) -> String {
    let uri = format!(
        "{}/{}",
        config.cdn_url.trim_matches('/'),
        file.trim_start_matches('/')
    );

    let minified = file.contains(".min.js") || file.contains(".min.css");
    if config.is_production() && !minified {
        return ASSET_EXTENSION.replace(&uri, ".min.$1").into_owned();
    }
    uri
}
