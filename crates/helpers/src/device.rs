//! Mobile client detection from request headers

use http::header::{ACCEPT, USER_AGENT, VIA};
use http::HeaderMap;

/// Case-insensitive user agent fragments that mark a handset or tablet
const MOBILE_AGENTS: &[&str] = &[
    "mobile", "iphone", "android", "phone", "wap", "netfront", "java", "opera mobi",
    "opera mini", "ucweb", "windows ce", "symbian", "series", "webos", "sony", "blackberry",
    "dopod", "nokia", "samsung", "palmsource", "xda", "pieplus", "meizu", "midp", "cldc",
    "motorola", "foma", "docomo", "up.browser", "up.link", "blazer", "helio", "hosin", "huawei",
    "novarra", "coolpad", "techfaith", "alcatel", "amoi", "ktouch", "nexian", "ericsson",
    "philips", "sagem", "wellcom", "bunjalloo", "maui", "smartphone", "iemobile", "spice",
    "bird", "zte-", "longcos", "pantech", "gionee", "portalmmm", "jig browser", "hiptop",
    "benq", "haier", "^lct", "320x320", "240x320", "176x220", "windows phone", "cect",
    "compal", "ctl", "nec", "tcl", "daxian", "dbtel", "eastcom", "konka", "kejian", "lenovo",
    "mot", "soutec", "sgh", "sed", "capitel", "panasonic", "sonyericsson", "sharp", "panda",
    "zte", "acer", "acoon", "acs-", "abacho", "ahong", "airness", "anywhereyougo.com",
    "applewebkit/525", "applewebkit/532", "asus", "audio", "au-mic", "avantogo", "becker",
    "bilbo", "bleu", "cdm-", "danger", "elaine", "eric", "etouch", "fly ", "fly_", "fly-",
    "go.web", "goodaccess", "gradiente", "grundig", "hedy", "hitachi", "htc", "hutchison",
    "inno", "ipad", "ipaq", "ipod", "jbrowser", "kddi", "kgt", "kwc", "lg", "lg2", "lg3",
    "lg4", "lg5", "lg7", "lg8", "lg9", "lg-", "lge-", "lge9", "maemo", "mercator", "meridian",
    "micromax", "mini", "mitsu", "mmm", "mmp", "mobi", "mot-", "moto", "nec-", "newgen",
    "nf-browser", "nintendo", "nitro", "nook", "obigo", "palm", "pg-", "playstation", "pocket",
    "pt-", "qc-", "qtek", "rover", "sama", "samu", "sanyo", "sch-", "scooter", "sec-", "sendo",
    "sgh-", "siemens", "sie-", "softbank", "sprint", "spv", "tablet", "talkabout", "tcl-",
    "teleca", "telit", "tianyu", "tim-", "toshiba", "tsm", "utec", "utstar", "verykool",
    "virgin", "vk-", "voda", "voxtel", "vx", "wellco", "wig browser", "wii", "wireless", "xde",
    "pad", "gt-p1000",
];

fn header_str<'a>(headers: &'a HeaderMap, name: impl http::header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Whether the request looks like it came from a mobile device.
///
/// Any `x-wap-profile` or `Via` header counts, as does a user agent with a
/// known mobile token, or an `Accept` that lists WML ahead of HTML.
pub fn is_mobile(headers: &HeaderMap) -> bool {
    if headers.contains_key("x-wap-profile") || headers.contains_key(VIA) {
        return true;
    }

    if let Some(agent) = header_str(headers, USER_AGENT) {
        let agent = agent.to_ascii_lowercase();
        if MOBILE_AGENTS.iter().any(|token| agent.contains(token)) {
            return true;
        }
    }

    if let Some(accept) = header_str(headers, ACCEPT) {
        if let Some(wml) = accept.find("vnd.wap.wml") {
            return accept.find("text/html").map_or(true, |html| wml < html);
        }
    }

    false
}
