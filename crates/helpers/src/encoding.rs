//! Charset detection, transcoding and character-based string helpers

use std::fmt;
use std::str::FromStr;

use encoding_rs::{Encoding, BIG5, GBK};

use crate::{HelperError, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Charsets the detector considers, in detection order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Ascii,
    Utf8,
    /// GB2312 and its GBK superset
    Gbk,
    Big5,
}

impl Charset {
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Ascii => "ASCII",
            Charset::Utf8 => "UTF-8",
            Charset::Gbk => "GBK",
            Charset::Big5 => "BIG5",
        }
    }

    fn legacy(&self) -> Option<&'static Encoding> {
        match self {
            Charset::Gbk => Some(GBK),
            Charset::Big5 => Some(BIG5),
            Charset::Ascii | Charset::Utf8 => None,
        }
    }

    fn decode<'a>(&self, bytes: &'a [u8]) -> Option<std::borrow::Cow<'a, str>> {
        match self {
            Charset::Ascii => bytes
                .is_ascii()
                .then(|| String::from_utf8_lossy(bytes)),
            Charset::Utf8 => std::str::from_utf8(bytes).ok().map(Into::into),
            legacy => legacy
                .legacy()?
                .decode_without_bom_handling_and_without_replacement(bytes),
        }
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Charset::Ascii if text.is_ascii() => Ok(text.as_bytes().to_vec()),
            Charset::Ascii => Err(HelperError::Encoding(
                "text cannot be represented in ASCII".to_string(),
            )),
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            legacy => {
                let encoding = legacy
                    .legacy()
                    .ok_or_else(|| HelperError::Encoding(legacy.name().to_string()))?;
                let (bytes, _, had_errors) = encoding.encode(text);
                if had_errors {
                    return Err(HelperError::Encoding(format!(
                        "text cannot be represented in {}",
                        legacy.name()
                    )));
                }
                Ok(bytes.into_owned())
            }
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Charset {
    type Err = HelperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASCII" | "US-ASCII" => Ok(Charset::Ascii),
            "UTF-8" | "UTF8" => Ok(Charset::Utf8),
            "GBK" | "GB2312" | "CP936" => Ok(Charset::Gbk),
            "BIG5" | "BIG-5" => Ok(Charset::Big5),
            other => Err(HelperError::InvalidInput(format!(
                "Unknown charset: {}. Supported charsets: ASCII, UTF-8, GBK, GB2312, BIG5",
                other
            ))),
        }
    }
}

/// First charset of ASCII, UTF-8, GBK, BIG5 that decodes `bytes` cleanly
pub fn detect_encoding(bytes: &[u8]) -> Option<Charset> {
    [Charset::Ascii, Charset::Utf8, Charset::Gbk, Charset::Big5]
        .into_iter()
        .find(|charset| charset.decode(bytes).is_some())
}

/// Transcode `input` from its detected charset to `output`.
///
/// Empty input, or input already in the target charset, comes back as is.
pub fn charset_encode(input: &[u8], output: &str) -> Result<Vec<u8>> {
    let target: Charset = output.parse()?;
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let source = detect_encoding(input)
        .ok_or_else(|| HelperError::Encoding("unable to detect input charset".to_string()))?;
    if source == target {
        return Ok(input.to_vec());
    }

    let text = source
        .decode(input)
        .ok_or_else(|| HelperError::Encoding(format!("input is not valid {}", source)))?;
    target.encode(&text)
}

/// Length in characters
pub fn mb_strlen(s: &str) -> usize {
    s.chars().count()
}

/// Character-based substring; `postfix` is appended only when text was cut
/// off at the end. `None` (or zero) length takes the rest of the string.
pub fn mb_substr(s: &str, start: usize, length: Option<usize>, postfix: &str) -> String {
    let total = mb_strlen(s);
    let length = match length {
        Some(n) if n > 0 => n,
        _ => total.saturating_sub(start),
    };

    let mut out: String = s.chars().skip(start).take(length).collect();
    if total > start + length {
        out.push_str(postfix);
    }
    out
}

/// `bytes` without a leading UTF-8 byte-order mark
pub fn filter_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}
