//! Request body decoding.
//!
//! # Responsibilities
//! - Decode `application/json` (and `+json`) bodies
//! - Decode `application/x-www-form-urlencoded` bodies, optionally nested
//! - Inflate `gzip` and `deflate` bodies
//! - Enforce size, charset, encoding and parameter limits
//!
//! # Design Decisions
//! - `Content-Length` is checked before any byte is read (uncompressed bodies)
//! - Limits apply to the inflated size
//! - The decoded bytes are put back as the request body, so downstream
//!   extractors (`Json`, `Form`) keep working
//! - Every request leaves this stage with a `ParsedBody`, empty object by default

use std::collections::BTreeMap;
use std::io::Read;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, Request},
    BoxError,
};
use flate2::read::{GzDecoder, ZlibDecoder};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::BodyConfig;
use crate::pipeline::{BoxFuture, Exchange, Flow, Rejection, Stage};

/// Bracket nesting deeper than this is kept as a literal key.
const MAX_DEPTH: usize = 5;

/// Numeric segments above this decode as object keys, not array positions.
const MAX_INDEX: usize = 20;

/// The decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

impl ParsedBody {
    pub fn empty() -> Self {
        ParsedBody(Value::Object(Map::new()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Why a body could not be decoded.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request entity too large")]
    TooLarge,

    #[error("too many parameters")]
    TooManyParameters,

    #[error("unsupported charset \"{0}\"")]
    UnsupportedCharset(String),

    #[error("unsupported content encoding \"{0}\"")]
    UnsupportedEncoding(String),

    #[error("request body could not be inflated")]
    Inflate(#[source] std::io::Error),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("JSON body must be an object or an array")]
    NotStructured,

    #[error("request body could not be read")]
    Read(#[source] BoxError),
}

impl From<BodyError> for Rejection {
    fn from(err: BodyError) -> Self {
        let message = err.to_string();
        match err {
            BodyError::TooLarge | BodyError::TooManyParameters => {
                Rejection::payload_too_large(message)
            }
            BodyError::UnsupportedCharset(_) | BodyError::UnsupportedEncoding(_) => {
                Rejection::unsupported_media_type(message)
            }
            BodyError::InvalidJson(_)
            | BodyError::NotStructured
            | BodyError::Inflate(_)
            | BodyError::Read(_) => Rejection::bad_request(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    UrlEncoded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Identity,
    Gzip,
    /// zlib-wrapped deflate, as sent by HTTP clients.
    Deflate,
}

impl Encoding {
    fn from_header(value: Option<&str>) -> Result<Self, BodyError> {
        let Some(value) = value else {
            return Ok(Encoding::Identity);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(Encoding::Identity),
            "gzip" | "x-gzip" => Ok(Encoding::Gzip),
            "deflate" => Ok(Encoding::Deflate),
            other => Err(BodyError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Decodes JSON and URL-encoded request bodies into [`ParsedBody`].
#[derive(Debug, Clone)]
pub struct BodyStage {
    config: BodyConfig,
}

impl BodyStage {
    pub fn new(config: &BodyConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    async fn decode(&self, request: &mut Request<Body>) -> Result<ParsedBody, BodyError> {
        let Some((kind, charset)) = content_type(request) else {
            return Ok(ParsedBody::empty());
        };

        if let Some(charset) = charset {
            if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("utf8") {
                return Err(BodyError::UnsupportedCharset(charset));
            }
        }

        let encoding = Encoding::from_header(header_str(request, header::CONTENT_ENCODING))?;

        let limit = match kind {
            BodyKind::Json => self.config.json_limit,
            BodyKind::UrlEncoded => self.config.urlencoded_limit,
        };

        if encoding == Encoding::Identity {
            let declared = header_str(request, header::CONTENT_LENGTH).and_then(|v| v.parse::<usize>().ok());
            if declared.is_some_and(|len| len > limit) {
                return Err(BodyError::TooLarge);
            }
        }

        let body = std::mem::take(request.body_mut());
        let raw = read_limited(body, limit).await?;
        let bytes = match encoding {
            Encoding::Identity => raw,
            Encoding::Gzip => inflate(GzDecoder::new(&raw[..]), limit)?,
            Encoding::Deflate => inflate(ZlibDecoder::new(&raw[..]), limit)?,
        };

        if encoding != Encoding::Identity {
            let headers = request.headers_mut();
            headers.remove(header::CONTENT_ENCODING);
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        }
        *request.body_mut() = Body::from(bytes.clone());

        match kind {
            BodyKind::Json => parse_json(&bytes),
            BodyKind::UrlEncoded => {
                parse_urlencoded(&bytes, self.config.parameter_limit, self.config.extended)
            }
        }
    }
}

impl Stage for BodyStage {
    fn name(&self) -> &'static str {
        "body"
    }

    fn on_request<'a>(
        &'a self,
        request: &'a mut Request<Body>,
        _exchange: &'a mut Exchange,
    ) -> BoxFuture<'a, Result<Flow, BoxError>> {
        Box::pin(async move {
            match self.decode(request).await {
                Ok(parsed) => {
                    request.extensions_mut().insert(parsed);
                    Ok(Flow::Continue)
                }
                Err(err) => {
                    tracing::debug!(error = %err, "Rejected request body");
                    Ok(Flow::from(Rejection::from(err)))
                }
            }
        })
    }
}

fn header_str(request: &Request<Body>, name: header::HeaderName) -> Option<&str> {
    request.headers().get(name).and_then(|v| v.to_str().ok())
}

/// The body kind and charset parameter, if the body is one this stage decodes.
fn content_type(request: &Request<Body>) -> Option<(BodyKind, Option<String>)> {
    let value = header_str(request, header::CONTENT_TYPE)?;
    let mut parts = value.split(';');
    let essence = parts.next()?.trim().to_ascii_lowercase();

    let kind = if essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
    {
        BodyKind::Json
    } else if essence == "application/x-www-form-urlencoded" {
        BodyKind::UrlEncoded
    } else {
        return None;
    };

    let charset = parts.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    });

    Some((kind, charset))
}

async fn read_limited(body: Body, limit: usize) -> Result<Bytes, BodyError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(BodyError::TooLarge),
        Err(err) => Err(BodyError::Read(err)),
    }
}

/// Inflate at most `limit` bytes; anything beyond is `TooLarge`.
fn inflate(decoder: impl Read, limit: usize) -> Result<Bytes, BodyError> {
    let mut inflated = Vec::new();
    decoder
        .take(limit as u64 + 1)
        .read_to_end(&mut inflated)
        .map_err(BodyError::Inflate)?;
    if inflated.len() > limit {
        return Err(BodyError::TooLarge);
    }
    Ok(Bytes::from(inflated))
}

fn parse_json(bytes: &[u8]) -> Result<ParsedBody, BodyError> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    match first {
        None => Ok(ParsedBody::empty()),
        Some(b'{') | Some(b'[') => serde_json::from_slice(bytes)
            .map(ParsedBody)
            .map_err(|e| BodyError::InvalidJson(e.to_string())),
        Some(_) => Err(BodyError::NotStructured),
    }
}

fn parse_urlencoded(bytes: &[u8], parameter_limit: usize, extended: bool) -> Result<ParsedBody, BodyError> {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(bytes)
        .into_owned()
        .collect();
    if pairs.len() > parameter_limit {
        return Err(BodyError::TooManyParameters);
    }

    let mut root = BTreeMap::new();
    for (key, value) in pairs {
        let segments = if extended {
            key_segments(&key)
        } else {
            vec![key]
        };
        let Some((head, rest)) = segments.split_first() else {
            continue;
        };
        let node = Node::from_segments(rest, value);
        let merged = match root.remove(head) {
            Some(existing) => merge(existing, node),
            None => node,
        };
        root.insert(head.clone(), merged);
    }
    Ok(ParsedBody(Node::Map(root).into_value()))
}

/// Split `a[b][]` into `["a", "b", ""]`.
///
/// A key without a complete bracket group stays whole. Text after the last
/// group is dropped; groups past `MAX_DEPTH` stay glued together as one
/// literal segment.
fn key_segments(key: &str) -> Vec<String> {
    let open = match key.find('[') {
        Some(open) if open > 0 && key[open..].contains(']') => open,
        _ => return vec![key.to_string()],
    };

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            break;
        };
        if segments.len() > MAX_DEPTH {
            segments.push(rest.to_string());
            break;
        }
        segments.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }
    segments
}

/// Form values under construction. Arrays keep explicit positions until
/// the end, so sparse indices compact the way `a[3]=x` expects.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(Value),
    Seq(BTreeMap<usize, Node>),
    Map(BTreeMap<String, Node>),
}

impl Node {
    /// The value for one pair, nested innermost segment first.
    fn from_segments(segments: &[String], value: String) -> Self {
        segments
            .iter()
            .rev()
            .fold(Node::Leaf(Value::String(value)), |child, segment| {
                if segment.is_empty() {
                    Node::Seq(BTreeMap::from([(0, child)]))
                } else if let Some(index) = array_index(segment) {
                    Node::Seq(BTreeMap::from([(index, child)]))
                } else {
                    Node::Map(BTreeMap::from([(segment.clone(), child)]))
                }
            })
    }

    fn is_branch(&self) -> bool {
        !matches!(self, Node::Leaf(_))
    }

    fn into_value(self) -> Value {
        match self {
            Node::Leaf(value) => value,
            Node::Seq(items) => Value::Array(items.into_values().map(Node::into_value).collect()),
            Node::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(key, node)| (key, node.into_value()))
                    .collect(),
            ),
        }
    }
}

fn array_index(segment: &str) -> Option<usize> {
    let index: usize = segment.parse().ok()?;
    (index <= MAX_INDEX && index.to_string() == segment).then_some(index)
}

fn push(items: &mut BTreeMap<usize, Node>, node: Node) {
    let next = items.keys().next_back().map_or(0, |last| last + 1);
    items.insert(next, node);
}

fn indexed(items: BTreeMap<usize, Node>) -> BTreeMap<String, Node> {
    items
        .into_iter()
        .map(|(index, node)| (index.to_string(), node))
        .collect()
}

/// Combine a later pair into what earlier pairs built. Nothing is dropped:
/// values meeting values become arrays, arrays meeting keys become indexed
/// objects, and a bare value meeting keys becomes a key set to `true`.
fn merge(target: Node, source: Node) -> Node {
    match (target, source) {
        (Node::Leaf(first), Node::Leaf(second)) => {
            Node::Seq(BTreeMap::from([(0, Node::Leaf(first)), (1, Node::Leaf(second))]))
        }
        (Node::Leaf(first), Node::Seq(items)) => {
            let mut seq = BTreeMap::from([(0, Node::Leaf(first))]);
            for item in items.into_values() {
                push(&mut seq, item);
            }
            Node::Seq(seq)
        }
        (Node::Leaf(first), map @ Node::Map(_)) => {
            Node::Seq(BTreeMap::from([(0, Node::Leaf(first)), (1, map)]))
        }
        (Node::Seq(mut items), leaf @ Node::Leaf(_)) => {
            push(&mut items, leaf);
            Node::Seq(items)
        }
        (Node::Map(mut map), Node::Leaf(value)) => {
            if let Value::String(key) = value {
                map.entry(key).or_insert(Node::Leaf(Value::Bool(true)));
            }
            Node::Map(map)
        }
        (Node::Seq(mut target), Node::Seq(source)) => {
            for (index, item) in source {
                match target.remove(&index) {
                    Some(existing) if existing.is_branch() && item.is_branch() => {
                        target.insert(index, merge(existing, item));
                    }
                    Some(existing) => {
                        target.insert(index, existing);
                        push(&mut target, item);
                    }
                    None => {
                        target.insert(index, item);
                    }
                }
            }
            Node::Seq(target)
        }
        (Node::Seq(items), map @ Node::Map(_)) => merge(Node::Map(indexed(items)), map),
        (map @ Node::Map(_), Node::Seq(items)) => merge(map, Node::Map(indexed(items))),
        (Node::Map(mut target), Node::Map(source)) => {
            for (key, item) in source {
                let merged = match target.remove(&key) {
                    Some(existing) => merge(existing, item),
                    None => item,
                };
                target.insert(key, merged);
            }
            Node::Map(target)
        }
    }
}
