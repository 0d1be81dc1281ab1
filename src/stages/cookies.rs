//! `Cookie` header decoding.

use std::collections::HashMap;

use axum::{
    body::Body,
    http::{header, Request},
    BoxError,
};
use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::pipeline::{BoxFuture, Exchange, Flow, Rejection, Stage};

/// Prefix marking a cookie value as serialized JSON.
const JSON_PREFIX: &str = "j:";

/// Cookies sent with the request, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    values: HashMap<String, String>,
}

impl Cookies {
    /// Parse one `Cookie` header value into this set.
    ///
    /// The first occurrence of a name wins; pairs without `=` are skipped.
    pub fn extend_from_header(&mut self, header: &str) {
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() || self.values.contains_key(name) {
                continue;
            }
            self.values.insert(name.to_string(), decode_value(value.trim()));
        }
    }

    /// The decoded value as sent. A `j:` cookie comes back as its raw
    /// `j:{...}` text; use [`Cookies::json`] for the parsed value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// The value of a `j:`-prefixed cookie, parsed as JSON.
    pub fn json(&self, name: &str) -> Option<Value> {
        let raw = self.get(name)?.strip_prefix(JSON_PREFIX)?;
        serde_json::from_str(raw).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn decode_value(value: &str) -> String {
    let value = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    };

    if !value.contains('%') {
        return value.to_string();
    }
    match percent_decode_str(value).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

/// Parses `Cookie` headers into [`Cookies`].
#[derive(Debug, Clone, Default)]
pub struct CookieStage;

impl CookieStage {
    pub fn new() -> Self {
        Self
    }

    fn parse(request: &Request<Body>) -> Result<Cookies, Rejection> {
        let mut cookies = Cookies::default();
        for value in request.headers().get_all(header::COOKIE) {
            let value = value
                .to_str()
                .map_err(|_| Rejection::bad_request("malformed Cookie header"))?;
            cookies.extend_from_header(value);
        }
        Ok(cookies)
    }
}

impl Stage for CookieStage {
    fn name(&self) -> &'static str {
        "cookies"
    }

    fn on_request<'a>(
        &'a self,
        request: &'a mut Request<Body>,
        _exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Flow, BoxError>> {
        let flow = match Self::parse(request) {
            Ok(cookies) => {
                request.extensions_mut().insert(cookies);
                Flow::Continue
            }
            Err(rejection) => Flow::from(rejection),
        };
        Box::pin(std::future::ready(Ok(flow)))
    }
}
