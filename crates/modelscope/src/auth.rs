//! Session-cookie handling: CSRF token derivation and trace ids.
//!
//! The service authenticates write requests with a CSRF header whose value
//! is embedded in the browser session cookie. Cookie key naming differs
//! between deployments, so extraction probes a list of known keys in
//! priority order.

use std::sync::LazyLock;

use regex::Regex;

/// Cookie keys that may carry the CSRF token, in priority order.
const TOKEN_KEYS: &[&str] = &["csrf_token", "csrftoken", "csrf_session", "XSRF-TOKEN"];

/// Compiled `key=value` matchers, one per entry in [`TOKEN_KEYS`].
static TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    TOKEN_KEYS
        .iter()
        .map(|key| Regex::new(&format!(r"{key}=([^;]+)")).expect("valid regex"))
        .collect()
});

/// Extract the CSRF token from a raw `Cookie` header value.
///
/// The first matching key in priority order wins. The captured value is
/// stripped of surrounding quotes and percent-decoded. Returns an empty
/// string when no key matches; the caller decides whether that is fatal.
pub fn extract_csrf_token(cookie: &str) -> String {
    for pattern in TOKEN_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(cookie) {
            let raw = captures[1].trim().trim_matches('"');
            if raw.contains('%') {
                return percent_decode(raw);
            }
            return raw.to_string();
        }
    }
    String::new()
}

/// Generate a fresh per-request trace id for the `X-Modelscope-Trace-Id`
/// header.
pub fn generate_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Decode `%XX` escapes in a cookie value. Invalid escapes are passed
/// through unchanged rather than rejected; cookie values are not trusted
/// input and a garbled token fails loudly at the server anyway.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 3 <= bytes.len() {
            if let Some(byte) = hex_pair(bytes[i + 1], bytes[i + 2]) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse two ASCII hex digits into a byte.
fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi as u8) * 16 + lo as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_csrf_token_extracted() {
        let token = extract_csrf_token("csrf_token=abc123; other=x");
        assert_eq!(token, "abc123");
    }

    #[test]
    fn quoted_xsrf_token_unwrapped() {
        let token = extract_csrf_token("session=1; XSRF-TOKEN=\"xyz\"");
        assert_eq!(token, "xyz");
    }

    #[test]
    fn missing_token_yields_empty_string() {
        assert_eq!(extract_csrf_token("session=1; theme=dark"), "");
    }

    #[test]
    fn first_matching_key_wins() {
        let token = extract_csrf_token("XSRF-TOKEN=late; csrf_token=early");
        assert_eq!(token, "early");
    }

    #[test]
    fn percent_encoded_value_decoded() {
        let token = extract_csrf_token("csrftoken=a%3Db%2Fc");
        assert_eq!(token, "a=b/c");
    }

    #[test]
    fn invalid_escape_passed_through() {
        let token = extract_csrf_token("csrf_token=a%zz%4");
        assert_eq!(token, "a%zz%4");
    }

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(generate_trace_id(), generate_trace_id());
    }
}
