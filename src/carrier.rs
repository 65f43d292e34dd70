//! Mutable carriers passed to instruction transformers; the translation unit of work that
//! a migration chain threads through one transformer after another.

use std::collections::HashMap;

use axum::http::{HeaderMap, Method, StatusCode, Uri};

/// The mutable request-side carrier. Transformers mutate `body` in place; the rest of the
/// fields are read-only snapshots taken from the original request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// The decoded JSON body, mutated in place by each applied transformer.
    pub body: serde_json::Value,
    /// A read-only snapshot of the request headers.
    pub headers: HeaderMap,
    /// Cookies parsed from the `Cookie` header, if any.
    pub cookies: HashMap<String, String>,
    /// Query parameters parsed from the request URI.
    pub query: HashMap<String, String>,
    /// The request method, for transformers that branch on it.
    pub method: Method,
    /// The request URI, for transformers that need the path.
    pub uri: Uri,
}

impl RequestInfo {
    pub fn new(body: serde_json::Value, headers: HeaderMap, method: Method, uri: Uri) -> Self {
        let cookies = parse_cookies(&headers);
        let query = parse_query(&uri);
        Self {
            body,
            headers,
            cookies,
            query,
            method,
            uri,
        }
    }
}

/// The mutable response-side carrier.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    /// The decoded JSON body, mutated in place by each applied transformer.
    pub body: serde_json::Value,
    /// The HEAD handler's status code. Transformers may override it.
    pub status: StatusCode,
    /// Mutable response headers, flushed to the real response after migration.
    pub headers: HeaderMap,
    /// `Set-Cookie` values appended to the response on flush.
    pub set_cookies: Vec<String>,
}

impl ResponseInfo {
    pub fn new(body: serde_json::Value, status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            body,
            status,
            headers,
            set_cookies: Vec::new(),
        }
    }

    /// Queue a `Set-Cookie` header value, applied to the underlying response on flush.
    pub fn set_cookie(&mut self, value: impl Into<String>) {
        self.set_cookies.push(value.into());
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(axum::http::header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                cookies.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }
    cookies
}

fn parse_query(uri: &Uri) -> HashMap<String, String> {
    let mut query = HashMap::new();
    if let Some(raw) = uri.query() {
        for pair in raw.split('&') {
            if pair.is_empty() {
                continue;
            }
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();
            query.insert(
                urlencoding_decode(key),
                urlencoding_decode(value),
            );
        }
    }
    query
}

fn urlencoding_decode(s: &str) -> String {
    // Minimal '+' / '%XX' decoding; query values here are only used for version detection
    // and transformer convenience, not as a general-purpose URL codec.
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '+' => out.push(' '),
            '%' => {
                let hi = chars.next();
                let lo = chars.next();
                match (hi.and_then(|c| c.to_digit(16)), lo.and_then(|c| c.to_digit(16))) {
                    (Some(hi), Some(lo)) => out.push(((hi << 4) | lo) as u8 as char),
                    _ => out.push('%'),
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_params() {
        let uri: Uri = "/x?a=1&b=two%20words&c".parse().unwrap();
        let q = parse_query(&uri);
        assert_eq!(q.get("a").map(String::as_str), Some("1"));
        assert_eq!(q.get("b").map(String::as_str), Some("two words"));
        assert_eq!(q.get("c").map(String::as_str), Some(""));
    }

    #[test]
    fn parses_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, "a=1; b=2".parse().unwrap());
        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
        assert_eq!(cookies.get("b").map(String::as_str), Some("2"));
    }
}
