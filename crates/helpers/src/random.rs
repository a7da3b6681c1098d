//! Random identifiers

use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};

/// Inclusive public address blocks allocated to mainland China carriers
const CN_IPV4_RANGES: [([u8; 4], [u8; 4]); 15] = [
    ([36, 56, 0, 0], [36, 63, 255, 255]),
    ([58, 30, 0, 0], [58, 63, 255, 255]),
    ([59, 151, 0, 0], [59, 151, 127, 255]),
    ([60, 194, 0, 0], [60, 195, 255, 255]),
    ([61, 232, 0, 0], [61, 237, 255, 255]),
    ([106, 80, 0, 0], [106, 95, 255, 255]),
    ([116, 13, 0, 0], [116, 13, 255, 255]),
    ([118, 112, 0, 0], [118, 126, 255, 255]),
    ([121, 76, 0, 0], [121, 77, 255, 255]),
    ([123, 232, 0, 0], [123, 235, 255, 255]),
    ([139, 196, 0, 0], [139, 215, 255, 255]),
    ([171, 8, 0, 0], [171, 15, 255, 255]),
    ([182, 80, 0, 0], [182, 92, 255, 255]),
    ([210, 25, 0, 0], [210, 47, 255, 255]),
    ([222, 16, 0, 0], [222, 95, 255, 255]),
];

/// A random address from one of the mainland China blocks
pub fn ipv4_random() -> Ipv4Addr {
    let mut rng = rand::thread_rng();
    let (start, end) = CN_IPV4_RANGES[rng.gen_range(0..CN_IPV4_RANGES.len())];
    let ip = rng.gen_range(u32::from(Ipv4Addr::from(start))..=u32::from(Ipv4Addr::from(end)));
    Ipv4Addr::from(ip)
}

/// `length` random ASCII letters and digits
pub fn str_random(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// `length` random decimal digits; may start with `0`
pub fn numeric_random(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Windows-style GUID: `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`
pub fn com_create_guid() -> String {
    let mut entropy = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut entropy);
    let hex = format!("{:X}", md5::compute(entropy));

    format!(
        "{{{}-{}-{}-{}-{}}}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Decimal id from the current microsecond clock plus three random digits.
///
/// Ids from one process increase with time; two ids minted in the same
/// microsecond differ only by their random suffix.
pub fn uuid_short() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or_default();
    format!("{}{:03}", micros, rand::thread_rng().gen_range(0..1000u16))
}
