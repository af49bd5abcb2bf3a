//! Path template parsing.
//!
//! Templates name their parameters as `{name}` or `{name:regex}`. The regex
//! part may itself contain balanced braces (`{id:[1-5]{8,}}`), so parameters
//! are found by brace depth, not by the first closing brace.

use regex::Regex;

/// Error returned for malformed templates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("unbalanced braces in {0:?}")]
    UnbalancedBraces(String),
    #[error("invalid regex for parameter {name:?} in {pattern:?}: {reason}")]
    InvalidRegex {
        pattern: String,
        name: String,
        reason: String,
    },
}

/// A `{...}` span of the template, by byte offset of its braces.
#[derive(Debug, Clone, Copy)]
struct Span {
    open: usize,
    close: usize,
}

/// Extract the ordered parameter names of a path template.
pub fn parse(pattern: &str) -> Result<Vec<String>, PatternError> {
    Ok(brace_spans(pattern)?
        .into_iter()
        .map(|span| split_param(pattern, span).0.to_string())
        .collect())
}

fn brace_spans(pattern: &str) -> Result<Vec<Span>, PatternError> {
    let mut spans = Vec::new();
    let mut depth: i32 = 0;
    let mut open = 0;

    for (i, b) in pattern.bytes().enumerate() {
        match b {
            b'{' => {
                depth += 1;
                if depth == 1 {
                    open = i;
                }
            }
            b'}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(PatternError::UnbalancedBraces(pattern.to_string()));
                }
                if depth == 0 {
                    spans.push(Span { open, close: i });
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(PatternError::UnbalancedBraces(pattern.to_string()));
    }
    Ok(spans)
}

/// Split a span into its name and optional regex.
fn split_param(pattern: &str, span: Span) -> (&str, Option<&str>) {
    let inner = &pattern[span.open + 1..span.close];
    match inner.find(':') {
        Some(colon) => (&inner[..colon], Some(&inner[colon + 1..])),
        None => (inner, None),
    }
}

/// A template compiled into an anchored regex.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    names: Vec<String>,
}

impl CompiledPattern {
    /// Compile `pattern`. Parameters without a regex match one path segment.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let spans = brace_spans(pattern)?;
        let mut source = String::from("^");
        let mut names = Vec::with_capacity(spans.len());
        let mut last = 0;

        for (index, span) in spans.iter().enumerate() {
            source.push_str(&regex::escape(&pattern[last..span.open]));
            let (name, expr) = split_param(pattern, *span);
            let expr = expr.unwrap_or("[^/]+");

            // Validate each parameter regex on its own so errors name the parameter.
            Regex::new(expr).map_err(|e| PatternError::InvalidRegex {
                pattern: pattern.to_string(),
                name: name.to_string(),
                reason: e.to_string(),
            })?;

            source.push_str(&format!("(?P<p{index}>{expr})"));
            names.push(name.to_string());
            last = span.close + 1;
        }
        source.push_str(&regex::escape(&pattern[last..]));
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| PatternError::InvalidRegex {
            pattern: pattern.to_string(),
            name: String::new(),
            reason: e.to_string(),
        })?;
        Ok(Self { regex, names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Match a decoded request path, returning the captured variables in template order.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .enumerate()
                .filter_map(|(index, name)| {
                    caps.name(&format!("p{index}"))
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_parameter_names() {
        let cases: &[(&str, &[&str])] = &[
            ("/api/users/{id}", &["id"]),
            ("/api/users/{id:[0-5]+}", &["id"]),
            ("/api/users/{id:[1-5]{8,}}", &["id"]),
            ("/api/users/{id}/names/{name}", &["id", "name"]),
            ("/api/users", &[]),
        ];

        for (pattern, names) in cases {
            let parsed = parse(pattern).unwrap();
            assert_eq!(parsed, names.iter().map(|s| s.to_string()).collect::<Vec<_>>(), "{pattern}");
        }
    }

    #[test]
    fn rejects_unbalanced_braces() {
        for pattern in ["/api/users/{id", "/api/users/{id:{}", "/api/users/id}", "/a/}{"] {
            assert!(
                matches!(parse(pattern), Err(PatternError::UnbalancedBraces(_))),
                "{pattern}"
            );
        }
    }

    #[test]
    fn compiled_pattern_matches_segments() {
        let compiled = CompiledPattern::compile("/api/users/{id}/names/{name}").unwrap();
        let vars = compiled.captures("/api/users/7/names/bob").unwrap();
        assert_eq!(
            vars,
            vec![("id".to_string(), "7".to_string()), ("name".to_string(), "bob".to_string())]
        );
        assert!(compiled.captures("/api/users/7/names").is_none());
        assert!(compiled.captures("/api/users/7/8/names/bob").is_none());
    }

    #[test]
    fn compiled_pattern_honours_regex() {
        let compiled = CompiledPattern::compile("/api/users/{id:[1-5]{3,}}").unwrap();
        assert!(compiled.captures("/api/users/123").is_some());
        assert!(compiled.captures("/api/users/12").is_none());
        assert!(compiled.captures("/api/users/126").is_none());
    }

    #[test]
    fn literal_parts_are_escaped() {
        let compiled = CompiledPattern::compile("/v1/files.list").unwrap();
        assert!(compiled.captures("/v1/files.list").is_some());
        assert!(compiled.captures("/v1/filesXlist").is_none());
    }
}
