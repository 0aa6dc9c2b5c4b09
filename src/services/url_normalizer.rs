//! 网址规范化 - 业务能力层
//!
//! 把用户输入的网站字符串变成稳定的缓存 key，纯函数，无 I/O。

use std::fmt;

use url::Url;

use crate::error::{ScrapeError, ScrapeResult};

/// 规范化后的网址：`http://host[:port][/path]`
///
/// - scheme 统一为 http
/// - host 小写且去掉开头的 `www.`
/// - 去掉默认端口（80 / 443）、query、fragment 和末尾的 `/`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 规范化网站地址
///
/// 空输入、无法解析、没有 host 或非 http(s) scheme 都返回 `InvalidInput`。
/// 幂等：`normalize(normalize(x)) == normalize(x)`。
pub fn normalize(raw: &str) -> ScrapeResult<NormalizedUrl> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScrapeError::invalid_input("website is empty"));
    }

    let with_scheme = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|e| ScrapeError::invalid_input(format!("'{}': {}", trimmed, e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ScrapeError::invalid_input(format!(
                "'{}': unsupported scheme '{}'",
                trimmed, other
            )))
        }
    }

    let host = parsed
        .host_str()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let mut host = host.as_str();
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest;
    }
    if host.is_empty() {
        return Err(ScrapeError::invalid_input(format!("'{}': missing host", trimmed)));
    }

    let mut normalized = format!("http://{}", host);
    if let Some(port) = parsed.port() {
        if port != 80 && port != 443 {
            normalized.push_str(&format!(":{}", port));
        }
    }
    normalized.push_str(parsed.path().trim_end_matches('/'));

    Ok(NormalizedUrl(normalized))
}

/// 输入是否以 `scheme://` 开头（query 或 path 里出现的 `://` 不算）
fn has_scheme(input: &str) -> bool {
    let Some((scheme, _)) = input.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().map_or(false, |c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_inputs_share_one_key() {
        let expected = "http://example.com";
        for raw in [
            "example.com",
            "EXAMPLE.com/",
            "http://example.com",
            "https://www.example.com/",
            "  www.Example.COM  ",
            "http://example.com:80",
            "https://example.com:443/?utm=x#top",
        ] {
            assert_eq!(normalize(raw).unwrap().as_str(), expected, "input: {}", raw);
        }
    }

    #[test]
    fn test_path_and_custom_port_are_kept() {
        assert_eq!(
            normalize("https://Shop.Example.com:8080/About/").unwrap().as_str(),
            "http://shop.example.com:8080/About"
        );
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "example.com/a/b/",
            "https://www.x.io:9000/p?q=1",
            "sub.domain.org",
            "www.www.example.com",
            "https://WWW.www.Example.com/",
        ] {
            let once = normalize(raw).unwrap();
            let twice = normalize(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_repeated_www_is_stripped() {
        assert_eq!(
            normalize("www.www.example.com").unwrap().as_str(),
            "http://example.com"
        );
    }

    #[test]
    fn test_url_inside_query_or_path() {
        assert_eq!(
            normalize("example.com/?next=http://other.com").unwrap().as_str(),
            "http://example.com"
        );
        assert_eq!(
            normalize("example.com/go/https://other.com").unwrap().as_str(),
            "http://example.com/go/https://other.com"
        );
        assert!(normalize("ftp://example.com/?back=http://x.com")
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn test_invalid_inputs() {
        for raw in ["", "   ", "ftp://example.com", "http://", "http://www./"] {
            let err = normalize(raw).unwrap_err();
            assert!(err.is_invalid_input(), "input: {:?}", raw);
        }
    }
}
