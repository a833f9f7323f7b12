//! Cookie header parsing and `Set-Cookie` rendering.

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Duration, Utc};

use super::CookieOptions;
use crate::error::StoreError;

const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Find a named cookie across all `Cookie` headers of a request.
pub fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| parse_cookie(h, name))
}

/// Parse a specific cookie from a Cookie header value.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let trimmed = part.trim();
        if let Some(value) = trimmed.strip_prefix(name)
            && let Some(value) = value.strip_prefix('=')
        {
            return Some(value.trim_matches('"'));
        }
    }
    None
}

/// Render a `Set-Cookie` value.
///
/// Positive `max_age` emits `Max-Age` and a matching `Expires`; anything
/// else expires the cookie immediately.
pub fn make_cookie(name: &str, value: &str, options: &CookieOptions, now: DateTime<Utc>) -> String {
    let mut parts = vec![format!("{}={}", name, value)];
    if !options.path.is_empty() {
        parts.push(format!("Path={}", options.path));
    }
    if let Some(domain) = &options.domain {
        parts.push(format!("Domain={domain}"));
    }
    if options.max_age > 0 {
        let expires = Duration::try_seconds(options.max_age)
            .and_then(|age| now.checked_add_signed(age))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        parts.push(format!("Expires={}", expires.format(EXPIRES_FORMAT)));
        parts.push(format!("Max-Age={}", options.max_age));
    } else {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        parts.push(format!("Expires={}", epoch.format(EXPIRES_FORMAT)));
        parts.push("Max-Age=0".into());
    }
    if options.http_only {
        parts.push("HttpOnly".into());
    }
    if options.secure {
        parts.push("Secure".into());
    }
    if let Some(same_site) = options.same_site {
        parts.push(format!("SameSite={}", same_site.as_str()));
    }
    parts.join("; ")
}

/// Append a `Set-Cookie` header to a response.
pub fn set_cookie(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
    options: &CookieOptions,
) -> Result<(), StoreError> {
    let cookie = make_cookie(name, value, options, Utc::now());
    let value = HeaderValue::from_str(&cookie).map_err(|_| StoreError::InvalidHeader)?;
    headers.append(header::SET_COOKIE, value);
    Ok(())
}
