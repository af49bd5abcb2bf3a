//! Route lookup.
//!
//! # Responsibilities
//! - Compile every route template once, at startup
//! - Match a request path and verb to a route, extracting path variables
//! - Tell "no such path" apart from "path exists, wrong verb"
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in registration order, first match wins
//! - Variables are returned still percent-encoded; the path decoder decodes them,
//!   so `%2F` never splits a segment

use std::sync::Arc;

use axum::http::Method;

use super::descriptor::RouteDescriptor;
use super::pattern::{CompiledPattern, PatternError};

#[derive(Debug)]
struct CompiledRoute {
    pattern: CompiledPattern,
    route: Arc<RouteDescriptor>,
}

/// Result of a route lookup.
#[derive(Debug)]
pub enum RouteMatch {
    Matched {
        route: Arc<RouteDescriptor>,
        vars: Vec<(String, String)>,
    },
    /// The path matched at least one route, but none with this verb.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

/// The compiled HTTP route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, route: Arc<RouteDescriptor>) -> Result<(), PatternError> {
        let pattern = CompiledPattern::compile(route.path_pattern())?;
        tracing::debug!(
            method = %route.http_method(),
            pattern = route.path_pattern(),
            full_method = route.full_method(),
            "Route registered"
        );
        self.routes.push(CompiledRoute { pattern, route });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Look up `path` (still percent-encoded) for `method`. Matched variables keep their encoding.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteMatch {
        let mut allowed = Vec::new();

        for compiled in &self.routes {
            let Some(captures) = compiled.pattern.captures(path) else {
                continue;
            };
            if compiled.route.http_method() != method {
                allowed.push(compiled.route.http_method().clone());
                continue;
            }

            return RouteMatch::Matched {
                route: Arc::clone(&compiled.route),
                vars: captures,
            };
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            allowed.dedup();
            RouteMatch::MethodNotAllowed { allowed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::errors::Status;
    use crate::routing::HttpRule;
    use crate::service::{unary, MethodInfo};

    fn route(rule: HttpRule) -> Arc<RouteDescriptor> {
        let handler = unary(|_ctx: RequestContext, _req: ()| async move { Ok::<(), Status>(()) });
        let info = Arc::new(MethodInfo::new("users.v1.UserService", "GetUser"));
        Arc::new(RouteDescriptor::new(rule, info, handler).unwrap())
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.add(route(HttpRule::get("/api/users/{id}"))).unwrap();
        router.add(route(HttpRule::delete("/api/users/{id}"))).unwrap();
        router.add(route(HttpRule::get("/api/files/{name:.+}"))).unwrap();
        router
    }

    #[test]
    fn matches_verb_and_path() {
        match router().lookup(&Method::DELETE, "/api/users/7") {
            RouteMatch::Matched { route, vars } => {
                assert_eq!(route.http_method(), &Method::DELETE);
                assert_eq!(vars, vec![("id".to_string(), "7".to_string())]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_verb_is_method_not_allowed() {
        match router().lookup(&Method::POST, "/api/users/7") {
            RouteMatch::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::GET, Method::DELETE]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_path_is_not_found() {
        assert!(matches!(router().lookup(&Method::GET, "/api/orders/1"), RouteMatch::NotFound));
    }

    #[test]
    fn variables_keep_their_encoding() {
        match router().lookup(&Method::GET, "/api/users/john%2Fdoe") {
            RouteMatch::Matched { vars, .. } => assert_eq!(vars[0].1, "john%2Fdoe"),
            other => panic!("unexpected {other:?}"),
        }
        match router().lookup(&Method::GET, "/api/files/a/b.txt") {
            RouteMatch::Matched { vars, .. } => assert_eq!(vars[0].1, "a/b.txt"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
