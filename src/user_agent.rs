//! Default User-Agent string for outgoing HTTP requests.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/x011/dload";

/// Default User-Agent for every request made by [`HttpClient`](crate::HttpClient).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("dload/{version} (+{PROJECT_UA_URL})")
}
