//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store registered endpoints and mounted groups
//! - Look up the matching route for a request
//! - Invoke the endpoint handler or forward to the mounted group
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in registration order; first match wins
//! - Explicit no-match (`None`) rather than a silent default

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::OriginalUri,
    http::{uri::PathAndQuery, Method, Request, Uri},
    response::{IntoResponse, Response},
    BoxError, Router,
};
use tower::ServiceExt;

use crate::pipeline::{BoxFuture, PipelineError};
use crate::routing::matcher::{
    ExactPathMatcher, Matcher, MethodMatcher, MountPrefixMatcher, RoutingOptions,
};

/// A terminal request handler.
pub type Handler =
    Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Result<Response, BoxError>> + Send + Sync>;

/// Adapt an async function into a [`Handler`].
pub fn handler<F, Fut, R, E>(f: F) -> Handler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse,
    E: Into<BoxError>,
{
    Arc::new(move |req| {
        let fut = f(req);
        Box::pin(async move {
            fut.await
                .map(IntoResponse::into_response)
                .map_err(Into::into)
        })
    })
}

/// One entry of the route table.
pub enum Route {
    /// A terminal handler for one method and path.
    Endpoint {
        method: MethodMatcher,
        path: ExactPathMatcher,
        handler: Handler,
    },
    /// A sub-router owning every path under a prefix.
    Mount {
        prefix: MountPrefixMatcher,
        group: Router,
    },
}

impl Route {
    /// Human-readable label for logs, e.g. `GET /` or `/api/auth/*`.
    pub fn label(&self) -> String {
        match self {
            Route::Endpoint { method, path, .. } => format!("{} {}", method.method(), path.path()),
            Route::Mount { prefix, .. } => {
                format!("{}/*", prefix.prefix().trim_end_matches('/'))
            }
        }
    }

    fn matches(&self, req: &Request<Body>, options: &RoutingOptions) -> bool {
        match self {
            Route::Endpoint { method, path, .. } => {
                method.matches(req, options) && path.matches(req, options)
            }
            Route::Mount { prefix, .. } => prefix.matches(req, options),
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Route").field(&self.label()).finish()
    }
}

/// The application's route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    options: RoutingOptions,
}

impl RouteTable {
    pub fn new(options: RoutingOptions) -> Self {
        Self {
            routes: Vec::new(),
            options,
        }
    }

    pub fn set_options(&mut self, options: RoutingOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &RoutingOptions {
        &self.options
    }

    pub fn endpoint(&mut self, method: Method, path: &str, handler: Handler) {
        self.routes.push(Route::Endpoint {
            method: MethodMatcher::new(method),
            path: ExactPathMatcher::new(path),
            handler,
        });
    }

    pub fn mount(&mut self, prefix: &str, group: Router) {
        self.routes.push(Route::Mount {
            prefix: MountPrefixMatcher::new(prefix),
            group,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First registered route matching the request.
    pub fn find(&self, req: &Request<Body>) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(req, &self.options))
    }

    /// Run the matching route. `Ok(None)` means nothing matched.
    pub async fn dispatch(&self, mut req: Request<Body>) -> Result<Option<Response>, PipelineError> {
        let Some(route) = self.find(&req) else {
            return Ok(None);
        };

        let fail = |source: BoxError| PipelineError::Route {
            route: route.label(),
            source,
        };

        match route {
            Route::Endpoint { handler, .. } => handler(req).await.map(Some).map_err(fail),
            Route::Mount { prefix, group } => {
                let original = req.uri().clone();
                let inner_path = prefix
                    .strip(original.path(), &self.options)
                    .unwrap_or("/");
                *req.uri_mut() = rebase_uri(&original, inner_path).map_err(fail)?;
                if req.extensions().get::<OriginalUri>().is_none() {
                    req.extensions_mut().insert(OriginalUri(original));
                }

                let response = group.clone().oneshot(req).await.map_err(|e| fail(e.into()))?;
                Ok(Some(response))
            }
        }
    }
}

/// Replace the path of `uri`, keeping its query string.
fn rebase_uri(uri: &Uri, path: &str) -> Result<Uri, BoxError> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use std::convert::Infallible;

    fn req(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn echo_group(tag: &'static str) -> Router {
        Router::new().fallback(move |uri: Uri, OriginalUri(original): OriginalUri| async move {
            format!("{tag} {uri} {original}")
        })
    }

    #[tokio::test]
    async fn test_endpoint_dispatch() {
        let mut table = RouteTable::default();
        table.endpoint(Method::GET, "/", handler(|_| async { Ok::<_, Infallible>("root") }));

        let response = table.dispatch(req(Method::GET, "/")).await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "root");

        assert!(table.dispatch(req(Method::POST, "/")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mount_strips_prefix_and_keeps_query() {
        let mut table = RouteTable::default();
        table.mount("/api/auth", echo_group("auth"));

        let response = table
            .dispatch(req(Method::POST, "/api/auth/sign-in?x=1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            body_string(response).await,
            "auth /sign-in?x=1 /api/auth/sign-in?x=1"
        );
    }

    #[tokio::test]
    async fn test_first_registered_mount_wins() {
        let mut table = RouteTable::default();
        table.mount("/api", echo_group("first"));
        table.mount("/api/auth", echo_group("second"));

        let response = table
            .dispatch(req(Method::GET, "/api/auth/me"))
            .await
            .unwrap()
            .unwrap();
        assert!(body_string(response).await.starts_with("first /auth/me"));
    }

    #[tokio::test]
    async fn test_mounted_router_sees_its_own_routes() {
        let group = Router::new().route("/status", get(|| async { "up" }));
        let mut table = RouteTable::default();
        table.mount("/svc", group);

        let response = table.dispatch(req(Method::GET, "/svc/status")).await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "up");

        let response = table.dispatch(req(Method::GET, "/svc/other")).await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handler_error_is_labelled() {
        let mut table = RouteTable::default();
        table.endpoint(Method::GET, "/boom", handler(|_| async { Err::<&str, _>("nope") }));

        let err = table.dispatch(req(Method::GET, "/boom")).await.unwrap_err();
        assert_eq!(err.to_string(), "route `GET /boom` failed: nope");
    }

    #[test]
    fn test_route_labels() {
        let mut table = RouteTable::default();
        table.endpoint(Method::GET, "/", handler(|_| async { Ok::<_, Infallible>("") }));
        table.mount("/api/auth/", Router::new());

        let labels: Vec<String> = table.routes.iter().map(Route::label).collect();
        assert_eq!(labels, vec!["GET /", "/api/auth/*"]);
    }
}
