//! Filename resolution for downloads.
//!
//! A destination name comes from, in order:
//! 1. the `Content-Disposition` header (`filename*` before `filename`)
//! 2. the last path segment of the URL
//! 3. a synthesized `dloadNNNNN` name built from the clock
//!
//! The synthesized name only has second resolution, so two calls in the same
//! second collide. Callers that need distinct names must pass explicit paths.

use url::Url;

use super::constants::{SYNTHESIZED_NAME_DIGITS, SYNTHESIZED_NAME_PREFIX};

/// Resolves the file name for a download. Never returns an empty string.
#[must_use]
pub fn resolve_filename(url: &str, content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(filename_from_content_disposition)
        .unwrap_or_else(|| default_filename(url))
}

/// File name for a URL when no response header is available.
#[must_use]
pub fn default_filename(url: &str) -> String {
    filename_from_url(url).unwrap_or_else(synthesized_filename)
}

/// Last path segment of `url`, ignoring query string and fragment.
///
/// Returns `None` when the path is empty or ends with `/`.
#[must_use]
pub fn filename_from_url(url: &str) -> Option<String> {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        // Relative or otherwise unparsable input: split by hand.
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or("");
            path.rsplit('/').next().map(str::to_string)
        }
    }?;

    (!segment.is_empty()).then_some(segment)
}

/// Name built from the low-order digits of the current unix time.
#[must_use]
pub fn synthesized_filename() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let digits = secs.to_string();
    let tail = &digits[digits.len().saturating_sub(SYNTHESIZED_NAME_DIGITS)..];
    format!("{SYNTHESIZED_NAME_PREFIX}{tail}")
}

/// Extracts a safe file name from a `Content-Disposition` header value.
///
/// Handles:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example%20file.pdf` (RFC 5987)
///
/// The extended `filename*` parameter wins over `filename`. Only the final
/// path segment of the value is kept, so `../../etc/passwd` yields `passwd`.
#[must_use]
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let params = parse_header_params(header);
    let lookup = |key: &str| {
        params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.trim().is_empty())
    };

    let raw = lookup("filename*")
        .map(strip_charset_prefix)
        .filter(|value| !value.is_empty())
        .or_else(|| lookup("filename"))?;

    let unquoted = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let decoded = urlencoding::decode(unquoted)
        .map_or_else(|_| unquoted.to_string(), std::borrow::Cow::into_owned);
    final_segment(&decoded)
}

/// Drops the `charset'language'` prefix of an RFC 5987 extended value.
fn strip_charset_prefix(value: &str) -> &str {
    let mut parts = value.splitn(3, '\'');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(encoded)) => encoded,
        _ => value,
    }
}

fn final_segment(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

/// Splits `value; key=val; key2="quoted; val"` into lowercase keys and values.
///
/// The leading disposition type is skipped. Quoted values keep their content
/// with backslash escapes resolved.
fn parse_header_params(header: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = header.chars().peekable();

    // Skip the disposition type.
    for c in chars.by_ref() {
        if c == ';' {
            break;
        }
    }

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ';').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ';') {
            key.push(c);
        }
        let key = key.trim().to_ascii_lowercase();

        if chars.next_if_eq(&'=').is_none() {
            // Bare token without a value.
            continue;
        }
        while chars.next_if(|c| *c == ' ' || *c == '\t').is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    c => value.push(c),
                }
            }
            // Discard anything between the closing quote and the next `;`.
            while chars.next_if(|c| *c != ';').is_some() {}
        } else {
            while let Some(c) = chars.next_if(|c| *c != ';') {
                value.push(c);
            }
            value = value.trim().to_string();
        }

        if !key.is_empty() {
            params.push((key, value));
        }
    }

    params
}
