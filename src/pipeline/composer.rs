//! The request pipeline composer.
//!
//! # Responsibilities
//! - Own the ordered stage list and the route table
//! - Run every request through the stages, then dispatch it
//! - Convert any unhandled fault into one 500 response
//! - Enforce the request deadline (408) without skipping response hooks
//! - Run response hooks once the final response is known

use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    response::{IntoResponse, Response},
    BoxError, Router,
};
use futures_util::FutureExt;
use tower::Service;

use crate::http::response;
use crate::pipeline::error::PipelineError;
use crate::pipeline::exchange::{Exchange, Outcome};
use crate::pipeline::stage::{BoxFuture, Flow, Stage};
use crate::routing::{handler, RouteTable, RoutingOptions};

/// An immutable, cheaply cloneable request pipeline.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .stage(CorsStage::new(&config.cors)?)
///     .get("/", |_req| async { Ok::<_, Infallible>("hello") })
///     .mount("/api/auth", auth::routes())
///     .build();
///
/// let response = pipeline.handle(request).await;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

struct Inner {
    stages: Vec<Box<dyn Stage>>,
    routes: RouteTable,
    timeout: Option<Duration>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Names of the registered stages, in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.inner.stages.iter().map(|s| s.name()).collect()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    /// Process one request. Always yields a response.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let mut exchange = Exchange::from_request(&request);

        let run = AssertUnwindSafe(self.run(request, &mut exchange)).catch_unwind();
        let result = match self.inner.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| limit),
            None => Ok(run.await),
        };

        let mut response = match result {
            Ok(Ok(Ok(response))) => response,
            Ok(Ok(Err(err))) => fault(&mut exchange, err),
            Ok(Err(payload)) => {
                fault(&mut exchange, PipelineError::Panic(panic_message(&*payload)))
            }
            Err(limit) => timed_out(&mut exchange, limit),
        };

        self.finish(&exchange, &mut response);
        response
    }

    async fn run(
        &self,
        mut request: Request<Body>,
        exchange: &mut Exchange,
    ) -> Result<Response, PipelineError> {
        for stage in &self.inner.stages {
            let flow = stage
                .on_request(&mut request, exchange)
                .await
                .map_err(|source| PipelineError::Stage {
                    stage: stage.name(),
                    source,
                })?;

            if let Flow::Respond(response) = flow {
                tracing::debug!(
                    stage = stage.name(),
                    status = %response.status(),
                    path = %exchange.uri().path(),
                    "Stage short-circuited request"
                );
                exchange.set_outcome(Outcome::ShortCircuited { stage: stage.name() });
                return Ok(response);
            }
        }

        match self.inner.routes.dispatch(request).await? {
            Some(response) => {
                exchange.set_outcome(Outcome::Dispatched);
                Ok(response)
            }
            None => {
                tracing::debug!(
                    method = %exchange.method(),
                    path = %exchange.uri().path(),
                    "No route matched"
                );
                exchange.set_outcome(Outcome::NotFound);
                Ok(response::not_found())
            }
        }
    }

    fn finish(&self, exchange: &Exchange, response: &mut Response) {
        for stage in self.inner.stages.iter().rev() {
            let hook = std::panic::catch_unwind(AssertUnwindSafe(|| {
                stage.on_response(exchange, response)
            }));
            if let Err(payload) = hook {
                tracing::error!(
                    stage = stage.name(),
                    panic = %panic_message(&*payload),
                    "Response hook panicked"
                );
            }
        }
    }
}

fn fault(exchange: &mut Exchange, err: PipelineError) -> Response {
    tracing::error!(
        method = %exchange.method(),
        path = %exchange.uri().path(),
        request_id = exchange.request_id().unwrap_or("-"),
        error = %err,
        "Unhandled fault in request pipeline"
    );
    exchange.set_outcome(Outcome::Faulted);
    response::internal_server_error()
}

fn timed_out(exchange: &mut Exchange, limit: Duration) -> Response {
    tracing::warn!(
        method = %exchange.method(),
        path = %exchange.uri().path(),
        request_id = exchange.request_id().unwrap_or("-"),
        timeout_ms = limit.as_millis() as u64,
        "Request timed out"
    );
    exchange.set_outcome(Outcome::TimedOut);
    response::request_timeout()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Service<Request<Body>> for Pipeline {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let pipeline = self.clone();
        Box::pin(async move { Ok(pipeline.handle(request).await) })
    }
}

/// Builder for [`Pipeline`].
///
/// Stages execute in the order they are added. Routes are matched in the
/// order they are registered.
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
    routes: RouteTable,
    timeout: Option<Duration>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            routes: RouteTable::default(),
            timeout: None,
        }
    }

    /// Append a stage to the chain.
    pub fn stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Answer `408` when stages plus dispatch take longer than `limit`.
    /// Response hooks still run for the timed-out request.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn routing(mut self, options: RoutingOptions) -> Self {
        self.routes.set_options(options);
        self
    }

    /// Register a terminal endpoint.
    pub fn route<F, Fut, R, E>(mut self, method: Method, path: &str, f: F) -> Self
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: IntoResponse,
        E: Into<BoxError>,
    {
        self.routes.endpoint(method, path, handler(f));
        self
    }

    pub fn get<F, Fut, R, E>(self, path: &str, f: F) -> Self
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: IntoResponse,
        E: Into<BoxError>,
    {
        self.route(Method::GET, path, f)
    }

    /// Delegate every request under `prefix` to a sub-router.
    pub fn mount(mut self, prefix: &str, group: Router) -> Self {
        self.routes.mount(prefix, group);
        self
    }

    pub fn build(self) -> Pipeline {
        tracing::debug!(
            stages = ?self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            routes = self.routes.len(),
            "Pipeline built"
        );
        Pipeline {
            inner: Arc::new(Inner {
                stages: self.stages,
                routes: self.routes,
                timeout: self.timeout,
            }),
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
