//! MuCTS Helpers
//!
//! Small stateless utilities shared by MuCTS services:
//! - Random IPs, strings, digits and GUIDs
//! - Date formatting, relative date arithmetic and ages
//! - Chinese resident ID card validation
//! - Charset detection and transcoding
//! - Byte packing, CDN asset links, Luhn check digits
//! - Mobile device detection, RSA key export, outbound HTTP requests

use thiserror::Error;

pub mod bytes;
pub mod cdn;
pub mod datetime;
pub mod device;
pub mod encoding;
pub mod id_card;
pub mod luhn;
pub mod random;
pub mod request;
pub mod rsa_keys;

pub use cdn::get_cdn_url;
pub use device::is_mobile;
pub use id_card::{get_id_card_info, id_card_verify, Gender, IdCardInfo};
pub use luhn::{luhn, luhn_valid};
pub use random::{com_create_guid, ipv4_random, numeric_random, str_random, uuid_short};
pub use request::{api_request, ApiRequest, ApiResponse, BodyFormat};
pub use rsa_keys::{export_rsa_key, RsaKeyPair, DEFAULT_RSA_BITS};

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("Invalid format string: {0}")]
    InvalidFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Crypto error: {0}")]
    Crypto(String),
}

pub type Result<T> = std::result::Result<T, HelperError>;
