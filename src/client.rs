//! Remote record operations against the AbraFlexi REST API.
//!
//! One call here is one backend interaction. Transport faults and
//! unparseable bodies surface as [`OperationError::RemoteUnavailable`] and
//! are never retried in this layer; a silent retry of a create could
//! duplicate records.
//!
//! Wire conventions:
//! - records live in the `winstrom` envelope, keyed by evidence name;
//! - column projection travels as `detail=custom:a,b,c` (`*` maps to
//!   `detail=full`);
//! - filter expressions travel as a parenthesized, percent-encoded path
//!   segment (`/faktura-vydana/(nazev begins 'A').json`);
//! - a create is a PUT of `{"winstrom": {evidence: [data]}}`, with dry-run
//!   as the `dry-run=true` query parameter.

use std::time::Duration;

use reqwest::blocking::RequestBuilder;
use reqwest::Method;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::error::{ErrorDetail, OperationError};

/// Default timeout for HTTP requests (10 seconds).
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One record as returned by the server: an ordered field-key → value map.
pub type Record = Map<String, Value>;

/// Optional query parameters for list/show operations.
///
/// Unset members are omitted from the request entirely so the server's own
/// defaults apply; they are never sent as sentinel values. A limit of 0 is
/// the server's "no limit" convention and is forwarded as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub limit: Option<u32>,
    pub start: Option<u32>,
    /// Server-side filter expression, e.g. `nazev begins 'A'`.
    pub filter: Option<String>,
    /// Ordering, e.g. `nazev@A`.
    pub order: Option<String>,
    /// Detail level (summary, full, id, custom:...); overrides the column
    /// projection when set.
    pub detail: Option<String>,
    pub relations: Option<String>,
    pub includes: Option<String>,
    pub dry_run: bool,
    pub add_row_count: bool,
}

/// Outcome of a successful create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateResult {
    /// HTTP response code: 201 for a committed create, 200 for a
    /// successful dry-run.
    pub code: u16,
    pub dry_run: bool,
    /// Server-assigned numeric identifier; absent on dry-run.
    pub id: Option<String>,
    /// Canonical record reference reported by the server; absent on
    /// dry-run.
    pub record_ident: Option<String>,
    /// Formatted mandatory-field warnings carried through a forced create.
    pub warnings: Vec<String>,
}

/// Blocking client for the three record operations.
pub struct RecordClient {
    config: Config,
    http: reqwest::blocking::Client,
}

impl RecordClient {
    pub fn new(config: Config) -> Result<Self, OperationError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| OperationError::RemoteUnavailable {
                url: config.url.clone().unwrap_or_default(),
                message: e.to_string(),
            })?;

        Ok(Self { config, http })
    }

    /// List records of an evidence with the given column projection.
    ///
    /// A server result with zero matching records is an empty vector, not
    /// an error.
    pub fn list(
        &self,
        resource: &str,
        columns: &[String],
        params: &QueryParams,
    ) -> Result<Vec<Record>, OperationError> {
        let mut url = format!("{}/{}", self.company_base()?, resource);
        if let Some(filter) = &params.filter {
            url.push_str("/(");
            url.push_str(&encode_filter(filter));
            url.push(')');
        }
        url.push_str(".json");

        let request = self
            .request(Method::GET, &url)
            .query(&query_pairs(columns, params));
        let body = self.send_json(request, &url)?;

        Ok(records_from_envelope(&body, resource))
    }

    /// Fetch a single record by id.
    ///
    /// The server wraps the record as the sole element of a collection;
    /// an empty collection (or a 404) is [`OperationError::RecordNotFound`].
    pub fn show(&self, resource: &str, id: &str) -> Result<Record, OperationError> {
        let url = format!("{}/{}/{}.json", self.company_base()?, resource, id);
        let not_found = || OperationError::RecordNotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        };

        let response = self
            .request(Method::GET, &url)
            .query(&[("detail", "full")])
            .send()
            .map_err(|e| self.remote(&url, e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(not_found());
        }
        let response = response
            .error_for_status()
            .map_err(|e| self.remote(&url, e.to_string()))?;
        let body: Value = response
            .json()
            .map_err(|e| self.remote(&url, e.to_string()))?;

        records_from_envelope(&body, resource)
            .into_iter()
            .next()
            .ok_or_else(not_found)
    }

    /// Submit a payload as a new record.
    ///
    /// With `dry_run`, the server validates without committing and answers
    /// 200 instead of 201. Any other code is [`OperationError::ServerRejected`]
    /// carrying the code and every server-reported error entry.
    pub fn create(
        &self,
        resource: &str,
        payload: &Record,
        dry_run: bool,
    ) -> Result<CreateResult, OperationError> {
        let url = format!("{}/{}.json", self.company_base()?, resource);
        let body = json!({ "winstrom": { resource: [payload] } });

        let mut request = self.request(Method::PUT, &url).json(&body);
        if dry_run {
            request = request.query(&[("dry-run", "true")]);
        }

        let response = request
            .send()
            .map_err(|e| self.remote(&url, e.to_string()))?;
        let code = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| self.remote(&url, e.to_string()))?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if code == 201 || (dry_run && code == 200) {
            if body.is_null() {
                return Err(self.remote(&url, "malformed response body".to_string()));
            }
            let first = &body["winstrom"]["results"][0];
            return Ok(CreateResult {
                code,
                dry_run,
                id: id_string(first.get("id")),
                record_ident: first
                    .get("ref")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                warnings: Vec::new(),
            });
        }

        Err(OperationError::ServerRejected {
            code,
            errors: collect_server_errors(&body),
        })
    }

    /// Companies available on the server (`{url}/c.json`). Lives outside
    /// the per-company base, so listing works before a company is chosen.
    pub fn companies(&self) -> Result<Vec<Record>, OperationError> {
        let base = self.server_base()?;
        let url = format!("{}/c.json", base);
        let body = self.send_json(self.request(Method::GET, &url), &url)?;

        let company = &body["companies"]["company"];
        Ok(match company {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_object)
                .cloned()
                .collect(),
            Value::Object(item) => vec![item.clone()],
            _ => Vec::new(),
        })
    }

    /// Detail of the configured company, for connection probing.
    pub fn company_info(&self) -> Result<Record, OperationError> {
        let url = format!("{}.json", self.company_base()?);
        let body = self.send_json(self.request(Method::GET, &url), &url)?;

        body["company"]
            .as_object()
            .cloned()
            .ok_or_else(|| self.remote(&url, "company detail missing from response".to_string()))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some(user) = &self.config.user {
            request = request.basic_auth(user, self.config.password.as_deref());
        }
        request
    }

    fn send_json(&self, request: RequestBuilder, url: &str) -> Result<Value, OperationError> {
        request
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.remote(url, e.to_string()))?
            .json()
            .map_err(|e| self.remote(url, e.to_string()))
    }

    fn remote(&self, url: &str, message: String) -> OperationError {
        OperationError::RemoteUnavailable {
            url: url.to_string(),
            message,
        }
    }

    fn server_base(&self) -> Result<String, OperationError> {
        self.config
            .server_base()
            .ok_or_else(|| OperationError::RemoteUnavailable {
                url: String::new(),
                message: "connection is not configured (url is required)".to_string(),
            })
    }

    fn company_base(&self) -> Result<String, OperationError> {
        self.config
            .company_base()
            .ok_or_else(|| OperationError::RemoteUnavailable {
                url: self.config.url.clone().unwrap_or_default(),
                message: "connection is not configured (url and company are required)"
                    .to_string(),
            })
    }
}

/// Build the query string for a list request. Only explicitly set
/// parameters are forwarded.
fn query_pairs(columns: &[String], params: &QueryParams) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    let detail = match &params.detail {
        Some(detail) => detail.clone(),
        None if columns.is_empty() || columns.iter().any(|c| c == "*") => "full".to_string(),
        None => format!("custom:{}", columns.join(",")),
    };
    pairs.push(("detail".to_string(), detail));

    if let Some(limit) = params.limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(start) = params.start {
        pairs.push(("start".to_string(), start.to_string()));
    }
    if let Some(order) = &params.order {
        pairs.push(("order".to_string(), order.clone()));
    }
    if let Some(relations) = &params.relations {
        pairs.push(("relations".to_string(), relations.clone()));
    }
    if let Some(includes) = &params.includes {
        pairs.push(("includes".to_string(), includes.clone()));
    }
    if params.dry_run {
        pairs.push(("dry-run".to_string(), "true".to_string()));
    }
    if params.add_row_count {
        pairs.push(("add-row-count".to_string(), "true".to_string()));
    }

    pairs
}

/// Percent-encode a filter expression for use as a URL path segment.
/// Unreserved characters (RFC 3986) pass through untouched.
fn encode_filter(filter: &str) -> String {
    let mut encoded = String::with_capacity(filter.len());
    for byte in filter.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Pull the record list out of the winstrom envelope. The server reports a
/// single record either as a one-element array or as a lone object.
fn records_from_envelope(body: &Value, resource: &str) -> Vec<Record> {
    match &body["winstrom"][resource] {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .cloned()
            .collect(),
        Value::Object(item) => vec![item.clone()],
        _ => Vec::new(),
    }
}

/// Gather every error entry from a rejected-write body:
/// `winstrom.results[*].errors[*]` plus the top-level `winstrom.message`.
fn collect_server_errors(body: &Value) -> Vec<ErrorDetail> {
    let mut errors = Vec::new();
    let winstrom = &body["winstrom"];

    if let Some(results) = winstrom.get("results").and_then(Value::as_array) {
        for result in results {
            if let Some(entries) = result.get("errors").and_then(Value::as_array) {
                errors.extend(entries.iter().map(ErrorDetail::from_value));
            }
        }
    }

    if let Some(message) = winstrom.get("message").and_then(Value::as_str) {
        errors.push(ErrorDetail::Message(message.to_string()));
    }

    errors
}

/// The server reports ids as strings or numbers depending on version.
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
