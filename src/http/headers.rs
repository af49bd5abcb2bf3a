//! Bridge between HTTP headers and call metadata.

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use super::options::{MetadataAnnotator, OutgoingHeaderMatcher};
use crate::context::{HttpRequestInfo, MetadataMap, METADATA_HEADER_PREFIX};

const PASSTHROUGH: [&str; 3] = ["cache-control", "cookie", "pragma"];

/// Standard cache and cookie headers pass unchanged, `grpc-metadata-*` keys
/// lose their prefix, everything else stays server side.
pub fn default_outgoing_header_matcher(key: &str) -> Option<String> {
    let key = key.to_ascii_lowercase();
    if PASSTHROUGH.contains(&key.as_str()) {
        return Some(key);
    }
    key.strip_prefix(METADATA_HEADER_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}

/// Annotator copying every request cookie into incoming metadata, keyed by cookie name.
pub fn cookie_annotator() -> MetadataAnnotator {
    Arc::new(|request: &HttpRequestInfo, md: &mut MetadataMap| {
        for value in request.headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for pair in value.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    if !name.is_empty() {
                        md.insert(name, value);
                    }
                }
            }
        }
    })
}

/// Copy outgoing metadata selected by `matcher` into response headers.
pub(crate) fn forward_metadata(
    outgoing: &MetadataMap,
    matcher: &OutgoingHeaderMatcher,
    headers: &mut HeaderMap,
) {
    for (key, values) in outgoing.iter() {
        let Some(name) = matcher(key) else {
            continue;
        };
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::debug!(key, "metadata key is not a valid header name");
            continue;
        };
        for value in values {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.append(name.clone(), value);
                }
                Err(_) => tracing::debug!(key, "metadata value is not a valid header value"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Uri, Version};

    #[test]
    fn default_matcher_policy() {
        assert_eq!(default_outgoing_header_matcher("Cache-Control").as_deref(), Some("cache-control"));
        assert_eq!(default_outgoing_header_matcher("pragma").as_deref(), Some("pragma"));
        assert_eq!(
            default_outgoing_header_matcher("Grpc-Metadata-Location").as_deref(),
            Some("location")
        );
        assert_eq!(default_outgoing_header_matcher("x-internal-trace"), None);
        assert_eq!(default_outgoing_header_matcher("grpc-metadata-"), None);
    }

    #[test]
    fn cookies_become_metadata() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("session=abc; theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("lang=en"));
        let request = HttpRequestInfo {
            method: Method::GET,
            uri: Uri::from_static("/"),
            version: Version::HTTP_11,
            headers,
        };

        let mut md = MetadataMap::new();
        cookie_annotator()(&request, &mut md);
        assert_eq!(md.get("session"), Some("abc"));
        assert_eq!(md.get("theme"), Some("dark"));
        assert_eq!(md.get("lang"), Some("en"));
    }

    #[test]
    fn forwarding_appends_every_value() {
        let mut outgoing = MetadataMap::new();
        outgoing.set("grpc-metadata-x-page", vec!["1".into(), "2".into()]);
        outgoing.insert("secret", "hidden");

        let matcher: OutgoingHeaderMatcher = Arc::new(default_outgoing_header_matcher);
        let mut headers = HeaderMap::new();
        forward_metadata(&outgoing, &matcher, &mut headers);

        let pages: Vec<_> = headers.get_all("x-page").iter().collect();
        assert_eq!(pages, ["1", "2"]);
        assert!(headers.get("secret").is_none());
    }
}
