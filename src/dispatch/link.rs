//! Normalization of user supplied media links.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static BAD_CHARACTERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[\s<>'"\x00-\x1F|{}\[\]^]"#).expect("bad character pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Not a usable http(s) link. Carries the input after rewriting.
    BadLink(String),

    /// Well formed, but the host is not allow-listed.
    UnsupportedDomain(Vec<String>),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::BadLink(link) => write!(f, "Bad link: *{link}*"),
            ValidationError::UnsupportedDomain(domains) => write!(
                f,
                "Unsupported domain, provide a link within one of these: {}",
                domains.join(", ")
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Turns raw input into the identifier a request is stored under.
///
/// `www.` is stripped wherever it occurs and a missing scheme defaults to
/// https. The host must then match one of `allowed_domains` exactly.
pub fn normalize(raw: &str, allowed_domains: &[String]) -> Result<Url, ValidationError> {
    let mut link = raw.replace("www.", "");
    if !link.starts_with("http") {
        link = format!("https://{link}");
    }

    if BAD_CHARACTERS.is_match(&link) {
        return Err(ValidationError::BadLink(link));
    }

    let url = Url::parse(&link).map_err(|_| ValidationError::BadLink(link.clone()))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ValidationError::BadLink(link));
    }

    match url.host_str() {
        Some(host) if allowed_domains.iter().any(|d| d == host) => Ok(url),
        _ => Err(ValidationError::UnsupportedDomain(allowed_domains.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains() -> Vec<String> {
        vec![
            "imdb.com".to_string(),
            "open.spotify.com".to_string(),
        ]
    }

    #[test]
    fn test_adds_scheme_and_strips_www() {
        let url = normalize("www.imdb.com/title/tt0111161/", &domains()).unwrap();
        assert_eq!(url.as_str(), "https://imdb.com/title/tt0111161/");

        let url = normalize("http://www.imdb.com/title/tt0111161", &domains()).unwrap();
        assert_eq!(url.as_str(), "http://imdb.com/title/tt0111161");
    }

    #[test]
    fn test_serialization_is_normalized() {
        let url = normalize("https://IMDB.com", &domains()).unwrap();
        assert_eq!(url.to_string(), "https://imdb.com/");
    }

    #[test]
    fn test_host_only_link_gets_root_path() {
        // Stored keys always carry a path, so a bare host is keyed with "/".
        let url = normalize("open.spotify.com", &domains()).unwrap();
        assert_eq!(url.as_str(), "https://open.spotify.com/");
        let url = normalize("open.spotify.com/", &domains()).unwrap();
        assert_eq!(url.as_str(), "https://open.spotify.com/");
    }

    #[test]
    fn test_bad_characters() {
        for raw in [
            "imdb.com/title/tt 1",
            "imdb.com/<script>",
            "imdb.com/\"x\"",
            "imdb.com/a|b",
            "imdb.com/{x}",
            "imdb.com/^",
        ] {
            assert!(
                matches!(normalize(raw, &domains()), Err(ValidationError::BadLink(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_bad_scheme() {
        let err = normalize("httpx://imdb.com/title", &domains()).unwrap_err();
        assert_eq!(err, ValidationError::BadLink("httpx://imdb.com/title".to_string()));
        assert_eq!(err.to_string(), "Bad link: *httpx://imdb.com/title*");
    }

    #[test]
    fn test_unsupported_domain() {
        let err = normalize("youtube.com/watch?v=1", &domains()).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedDomain(domains()));
        assert_eq!(
            err.to_string(),
            "Unsupported domain, provide a link within one of these: imdb.com, open.spotify.com"
        );

        // subdomains are not implied
        assert!(normalize("m.imdb.com/title", &domains()).is_err());
        assert!(normalize("spotify.com/album/1", &domains()).is_err());
    }
}
