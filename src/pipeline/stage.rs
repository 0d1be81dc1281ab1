//! The `Stage` trait and its helpers.

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
    BoxError,
};

use crate::pipeline::error::Rejection;
use crate::pipeline::exchange::Exchange;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = futures_util::future::BoxFuture<'a, T>;

/// What the pipeline should do after a stage has seen the request.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next stage (or to route dispatch).
    Continue,
    /// Stop here and answer with this response.
    Respond(Response),
}

impl Flow {
    /// Short-circuit with anything that converts into a response.
    pub fn respond(response: impl IntoResponse) -> Self {
        Flow::Respond(response.into_response())
    }
}

impl From<Rejection> for Flow {
    fn from(rejection: Rejection) -> Self {
        Flow::Respond(rejection.into_response())
    }
}

/// One unit of the request-processing chain.
///
/// `on_request` may pass the request through, transform it (typically by
/// attaching derived data to its extensions), or short-circuit with a
/// response. Returning `Err` is reserved for unexpected faults; client
/// errors are answered with [`Flow::Respond`] carrying a [`Rejection`].
///
/// `on_response` runs once per request after the final response is known,
/// in reverse registration order, regardless of which branch produced it.
pub trait Stage: Send + Sync + 'static {
    /// Name used in logs and in [`Pipeline::stage_names`](crate::pipeline::Pipeline::stage_names).
    fn name(&self) -> &'static str;

    /// Inspect or transform the inbound request.
    fn on_request<'a>(
        &'a self,
        request: &'a mut Request<Body>,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Flow, BoxError>>;

    /// Observe or decorate the final response.
    fn on_response(&self, _exchange: &Exchange, _response: &mut Response) {}
}

/// A stage built from a synchronous closure.
///
/// ```ignore
/// let deny_all = FnStage::new("deny-all", |_req, _exchange| {
///     Ok(Flow::from(Rejection::forbidden("closed")))
/// });
/// ```
pub struct FnStage<F> {
    name: &'static str,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut Request<Body>, &mut Exchange) -> Result<Flow, BoxError> + Send + Sync + 'static,
{
    pub fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(&mut Request<Body>, &mut Exchange) -> Result<Flow, BoxError> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_request<'a>(
        &'a self,
        request: &'a mut Request<Body>,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Flow, BoxError>> {
        let flow = (self.func)(request, exchange);
        Box::pin(std::future::ready(flow))
    }
}

/// Future for stages that never act on the request.
pub(crate) fn pass<'a>() -> BoxFuture<'a, Result<Flow, BoxError>> {
    Box::pin(std::future::ready(Ok(Flow::Continue)))
}
