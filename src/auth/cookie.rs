//! Session cookie formatting and parsing.

use axum::http::{header, HeaderMap};

use crate::config::CookieConfig;

/// Attributes of the cookie that carries the session token.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub secure: bool,
    pub max_age_secs: i64,
}

impl SessionCookie {
    pub fn new(cfg: &CookieConfig, ttl: time::Duration) -> Self {
        Self {
            name: cfg.name.clone(),
            secure: cfg.secure,
            max_age_secs: ttl.whole_seconds(),
        }
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn build(&self, token: &str) -> String {
        self.format(token, self.max_age_secs)
    }

    /// `Set-Cookie` value that makes the browser drop the session.
    pub fn clear(&self) -> String {
        self.format("", 0)
    }

    fn format(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!("{}={}; HttpOnly", self.name, value);
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str(&format!("; SameSite=Lax; Path=/; Max-Age={max_age}"));
        cookie
    }

    /// The session token from the request's `Cookie` header, if present and non-empty.
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        extract_cookie(headers, &self.name)
    }
}

pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn cookie(secure: bool) -> SessionCookie {
        SessionCookie::new(
            &CookieConfig {
                name: "token".into(),
                secure,
            },
            time::Duration::days(7),
        )
    }

    #[test]
    fn session_cookie_attributes() {
        let value = cookie(false).build("abc.def.ghi");
        assert_eq!(
            value,
            "token=abc.def.ghi; HttpOnly; SameSite=Lax; Path=/; Max-Age=604800"
        );
        assert!(cookie(true).build("x").contains("; Secure;"));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        assert_eq!(
            cookie(false).clear(),
            "token=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
        );
    }

    #[test]
    fn extracts_named_cookie_and_ignores_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc123; other=xyz"),
        );
        assert_eq!(extract_cookie(&headers, "token"), Some("abc123".into()));
        assert_eq!(extract_cookie(&headers, "missing"), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert_eq!(cookie(false).extract(&headers), None);
    }
}
