//! Custom request checks.
//!
//! A [`SecurityStage`] runs an ordered list of [`SecurityRule`]s; the first
//! rule that refuses a request answers it.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    BoxError,
};

use crate::config::SecurityConfig;
use crate::pipeline::{BoxFuture, Exchange, Flow, Rejection, Stage};

/// A single check applied to every request.
pub trait SecurityRule: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn check(&self, request: &Request<Body>) -> Result<(), Rejection>;
}

/// Refuses clients whose `User-Agent` contains a listed fragment
/// (case-insensitive).
#[derive(Debug, Clone)]
pub struct UserAgentDenylist {
    fragments: Vec<String>,
}

impl UserAgentDenylist {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fragments: fragments
                .into_iter()
                .map(|f| f.as_ref().to_ascii_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }
}

impl SecurityRule for UserAgentDenylist {
    fn name(&self) -> &'static str {
        "user_agent_denylist"
    }

    fn check(&self, request: &Request<Body>) -> Result<(), Rejection> {
        let Some(agent) = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(());
        };
        let agent = agent.to_ascii_lowercase();
        if self.fragments.iter().any(|f| agent.contains(f.as_str())) {
            return Err(Rejection::forbidden("client not allowed"));
        }
        Ok(())
    }
}

/// Refuses request targets longer than `max` bytes.
#[derive(Debug, Clone, Copy)]
pub struct MaxUriLength {
    max: usize,
}

impl MaxUriLength {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl SecurityRule for MaxUriLength {
    fn name(&self) -> &'static str {
        "max_uri_length"
    }

    fn check(&self, request: &Request<Body>) -> Result<(), Rejection> {
        let uri = request.uri();
        let len = uri.path_and_query().map_or(uri.path().len(), |pq| pq.as_str().len());
        if len > self.max {
            return Err(Rejection::new(StatusCode::URI_TOO_LONG, "request target too long"));
        }
        Ok(())
    }
}

/// Runs the configured rules in order.
#[derive(Default)]
pub struct SecurityStage {
    rules: Vec<Box<dyn SecurityRule>>,
}

impl SecurityStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules derived from configuration. Disabled config yields a stage
    /// with no rules.
    pub fn from_config(config: &SecurityConfig) -> Self {
        let mut stage = Self::new();
        if !config.enabled {
            return stage;
        }
        if config.max_uri_length > 0 {
            stage = stage.with_rule(MaxUriLength::new(config.max_uri_length));
        }
        if !config.blocked_user_agents.is_empty() {
            stage = stage.with_rule(UserAgentDenylist::new(&config.blocked_user_agents));
        }
        stage
    }

    pub fn with_rule(mut self, rule: impl SecurityRule) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl Stage for SecurityStage {
    fn name(&self) -> &'static str {
        "security"
    }

    fn on_request<'a>(
        &'a self,
        request: &'a mut Request<Body>,
        exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Flow, BoxError>> {
        let request: &Request<Body> = request;
        let refused = self
            .rules
            .iter()
            .find_map(|rule| rule.check(request).err().map(|r| (rule.name(), r)));

        let flow = match refused {
            Some((rule, rejection)) => {
                tracing::warn!(
                    rule,
                    status = %rejection.status(),
                    path = %request.uri().path(),
                    request_id = exchange.request_id().unwrap_or("-"),
                    "Request refused by security rule"
                );
                Flow::from(rejection)
            }
            None => Flow::Continue,
        };
        Box::pin(std::future::ready(Ok(flow)))
    }
}
