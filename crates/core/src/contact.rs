//! Contact-channel normalisation and outbound deep links.
//!
//! Normalisation is idempotent: feeding an already-normalised value back
//! through produces the same value.

/// Strip `@` and URL prefixes from an Instagram handle.
pub fn normalize_instagram(raw: &str) -> String {
    let handle = raw.trim();
    let handle = handle
        .strip_prefix("https://www.instagram.com/")
        .or_else(|| handle.strip_prefix("https://instagram.com/"))
        .or_else(|| handle.strip_prefix("http://instagram.com/"))
        .or_else(|| handle.strip_prefix("www.instagram.com/"))
        .or_else(|| handle.strip_prefix("instagram.com/"))
        .unwrap_or(handle);
    handle.trim_start_matches('@').trim_end_matches('/').trim().to_string()
}

/// Strip URL prefixes from a LinkedIn handle, keeping only the username.
pub fn normalize_linkedin(raw: &str) -> String {
    let handle = raw.trim();
    let handle = handle
        .strip_prefix("https://www.linkedin.com/in/")
        .or_else(|| handle.strip_prefix("https://linkedin.com/in/"))
        .or_else(|| handle.strip_prefix("www.linkedin.com/in/"))
        .or_else(|| handle.strip_prefix("linkedin.com/in/"))
        .unwrap_or(handle);
    handle.trim_start_matches('@').trim_end_matches('/').trim().to_string()
}

/// Normalise a WhatsApp number to E.164-ish form: `+` plus digits only.
/// A leading `00` becomes `+`; a single leading `0` is treated as an
/// Austrian national prefix and becomes `+43`.
pub fn normalize_whatsapp(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }
    if let Some(rest) = digits.strip_prefix("00") {
        return format!("+{rest}");
    }
    if let Some(rest) = digits.strip_prefix('0') {
        return format!("+43{rest}");
    }
    format!("+{digits}")
}

/// Percent-encode for a URL query component (RFC 3986 unreserved set).
fn percent_encode(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            other => {
                encoded.push('%');
                encoded.push_str(&format!("{other:02X}"));
            }
        }
    }
    encoded
}

/// Form-encode (spaces as `+`) for wa.me text parameters.
fn form_encode(text: &str) -> String {
    percent_encode(text).replace("%20", "+")
}

pub fn mailto_link(address: &str, subject: &str, body: &str) -> String {
    format!("mailto:{address}?subject={}&body={}", percent_encode(subject), percent_encode(body))
}

pub fn whatsapp_link(number: &str, text: &str) -> String {
    let normalized = normalize_whatsapp(number);
    let digits: String = normalized.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("https://wa.me/{digits}?text={}", form_encode(text))
}

pub fn instagram_link(handle: &str) -> String {
    format!("https://instagram.com/{}", normalize_instagram(handle))
}

pub fn linkedin_link(handle: &str) -> String {
    format!("https://linkedin.com/in/{}", normalize_linkedin(handle))
}
