//! Evidence schema discovery and caching.
//!
//! Every AbraFlexi evidence describes its fields through the server-side
//! `/properties.json` endpoint: internal key, display name, type and the
//! mandatory/writable flags, plus the allowed values for `select` fields.
//! This module fetches that metadata on first use, keeps it for the life of
//! the process, and answers the field queries record creation needs.
//!
//! Discovery is a plain authenticated GET; it never establishes a company
//! session first, and any failure degrades to
//! [`OperationError::SchemaUnavailable`] so that surrounding operations can
//! proceed without validation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::OperationError;

/// Default timeout for HTTP requests (10 seconds).
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Field type as declared by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Numeric,
    Date,
    DateTime,
    Logic,
    Relation,
    Select,
    Other(String),
}

impl FieldType {
    pub fn parse(s: &str) -> Self {
        match s {
            "string" => FieldType::String,
            "integer" => FieldType::Integer,
            "numeric" => FieldType::Numeric,
            "date" => FieldType::Date,
            "datetime" => FieldType::DateTime,
            "logic" => FieldType::Logic,
            "relation" => FieldType::Relation,
            "select" => FieldType::Select,
            other => FieldType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Numeric => "numeric",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Logic => "logic",
            FieldType::Relation => "relation",
            FieldType::Select => "select",
            FieldType::Other(s) => s,
        }
    }
}

/// One allowed value of a `select` field, in server-declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectValue {
    pub key: String,
    pub label: String,
}

/// Server-declared metadata for a single evidence field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Internal field key (`propertyName`).
    pub key: String,
    /// Human-readable name.
    pub display_name: String,
    pub field_type: FieldType,
    pub mandatory: bool,
    pub writable: bool,
    /// Allowed values when `field_type` is `Select`, empty otherwise.
    pub values: Vec<SelectValue>,
}

impl FieldDescriptor {
    /// Parse one `property` entry. Entries without a `propertyName` are
    /// skipped by the caller.
    fn from_property(prop: &Map<String, Value>) -> Option<Self> {
        let key = prop.get("propertyName")?.as_str()?.to_string();
        let display_name = prop
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&key)
            .to_string();
        let field_type = FieldType::parse(
            prop.get("type").and_then(Value::as_str).unwrap_or("unknown"),
        );

        Some(Self {
            display_name,
            field_type,
            mandatory: flag(prop.get("mandatory")),
            writable: flag(prop.get("isWritable")),
            values: parse_select_values(prop),
            key,
        })
    }
}

/// AbraFlexi encodes boolean attributes as the strings "true"/"false".
fn flag(value: Option<&Value>) -> bool {
    matches!(value.and_then(Value::as_str), Some("true"))
}

/// Extract `values.value[]` entries (`{"@key": ..., "$": label}`) in their
/// declared order. Entries without `@key` are dropped; a missing label
/// falls back to the key.
fn parse_select_values(prop: &Map<String, Value>) -> Vec<SelectValue> {
    let Some(entries) = prop
        .get("values")
        .and_then(|v| v.get("value"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|item| {
            let key = item.get("@key")?.as_str()?.to_string();
            let label = item
                .get("$")
                .and_then(Value::as_str)
                .unwrap_or(&key)
                .to_string();
            Some(SelectValue { key, label })
        })
        .collect()
}

/// The full field schema of one evidence, immutable once fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSchema {
    fields: Vec<FieldDescriptor>,
}

impl ResourceSchema {
    /// Parse a `/properties.json` response body.
    ///
    /// Accepts the property list either at the top level or inside the
    /// `winstrom` envelope; a lone property object is treated as a
    /// single-element list.
    pub fn from_response(resource: &str, body: &Value) -> Result<Self, OperationError> {
        let root = body.get("winstrom").unwrap_or(body);
        let property = root
            .get("properties")
            .and_then(|p| p.get("property"))
            .ok_or_else(|| OperationError::SchemaUnavailable {
                resource: resource.to_string(),
                message: "malformed properties response".to_string(),
            })?;

        let fields = match property {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(FieldDescriptor::from_property)
                .collect(),
            Value::Object(prop) => FieldDescriptor::from_property(prop)
                .into_iter()
                .collect(),
            _ => {
                return Err(OperationError::SchemaUnavailable {
                    resource: resource.to_string(),
                    message: "malformed properties response".to_string(),
                })
            }
        };

        Ok(Self { fields })
    }

    /// All fields in server-declared order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Fields required at creation time: mandatory and writable. A
    /// mandatory but non-writable field is server-computed and must never
    /// be demanded from the caller.
    pub fn mandatory_fields(&self) -> Vec<&FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| f.mandatory && f.writable)
            .collect()
    }

    pub fn writable_fields(&self) -> Vec<&FieldDescriptor> {
        self.fields.iter().filter(|f| f.writable).collect()
    }

    /// Allowed value keys and labels for a `select` field; empty when the
    /// field is absent or of another type.
    pub fn select_values(&self, key: &str) -> &[SelectValue] {
        match self.get(key) {
            Some(field) if field.field_type == FieldType::Select => &field.values,
            _ => &[],
        }
    }

    /// Mandatory-and-writable fields the payload does not provide.
    ///
    /// A field counts as missing when the key is absent, the value is null,
    /// or the value is an empty string. Deliberately a presence check only;
    /// the server stays authoritative for type and enum validation.
    pub fn missing_mandatory(&self, payload: &Map<String, Value>) -> Vec<&FieldDescriptor> {
        self.mandatory_fields()
            .into_iter()
            .filter(|field| match payload.get(&field.key) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            })
            .collect()
    }
}

/// Format a field for user-facing messages: `key (displayName) [type]`,
/// appending the allowed select keys in declared order.
pub fn format_field_info(field: &FieldDescriptor) -> String {
    let mut info = format!(
        "{} ({}) [{}]",
        field.key,
        field.display_name,
        field.field_type.as_str()
    );

    if field.field_type == FieldType::Select && !field.values.is_empty() {
        let keys: Vec<&str> = field.values.iter().map(|v| v.key.as_str()).collect();
        info.push_str(" - allowed: ");
        info.push_str(&keys.join(", "));
    }

    info
}

/// Process-lifetime cache of evidence schemas, populated lazily.
///
/// Safe for concurrent readers. Population is coalescible: racing callers
/// may both fetch, but the first insert wins and both observe the same
/// fully-populated entry. Entries are never evicted; only
/// [`SchemaCache::set_connection`] clears the map, wholesale.
#[derive(Debug)]
pub struct SchemaCache {
    config: Config,
    entries: Mutex<HashMap<String, Arc<ResourceSchema>>>,
}

impl SchemaCache {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Reconfigure the connection used for discovery and drop every cached
    /// schema. Stale metadata after a context switch is worse than a cache
    /// miss.
    pub fn set_connection(&mut self, config: Config) {
        self.config = config;
        self.lock().clear();
    }

    /// Return the schema for an evidence, fetching it on first use.
    pub fn load(&self, resource: &str) -> Result<Arc<ResourceSchema>, OperationError> {
        if let Some(entry) = self.lock().get(resource) {
            return Ok(Arc::clone(entry));
        }

        // Fetch outside the lock so a slow server never blocks readers of
        // other resources.
        let fetched = Arc::new(self.fetch(resource)?);

        let mut entries = self.lock();
        let entry = entries
            .entry(resource.to_string())
            .or_insert(fetched);
        Ok(Arc::clone(entry))
    }

    pub fn mandatory_fields(&self, resource: &str) -> Result<Vec<FieldDescriptor>, OperationError> {
        let schema = self.load(resource)?;
        Ok(schema.mandatory_fields().into_iter().cloned().collect())
    }

    pub fn writable_fields(&self, resource: &str) -> Result<Vec<FieldDescriptor>, OperationError> {
        let schema = self.load(resource)?;
        Ok(schema.writable_fields().into_iter().cloned().collect())
    }

    pub fn field_info(
        &self,
        resource: &str,
        key: &str,
    ) -> Result<Option<FieldDescriptor>, OperationError> {
        Ok(self.load(resource)?.get(key).cloned())
    }

    pub fn select_values(
        &self,
        resource: &str,
        key: &str,
    ) -> Result<Vec<SelectValue>, OperationError> {
        Ok(self.load(resource)?.select_values(key).to_vec())
    }

    /// Mandatory-and-writable fields missing from a candidate payload.
    pub fn missing_mandatory_fields(
        &self,
        resource: &str,
        payload: &Map<String, Value>,
    ) -> Result<Vec<FieldDescriptor>, OperationError> {
        let schema = self.load(resource)?;
        Ok(schema
            .missing_mandatory(payload)
            .into_iter()
            .cloned()
            .collect())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ResourceSchema>>> {
        // A poisoned lock only means a panicking reader; the map itself
        // stays consistent, so recover the guard.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fetch(&self, resource: &str) -> Result<ResourceSchema, OperationError> {
        let unavailable = |message: String| OperationError::SchemaUnavailable {
            resource: resource.to_string(),
            message,
        };

        let base = self
            .config
            .company_base()
            .ok_or_else(|| unavailable("connection is not configured".to_string()))?;
        let url = format!("{}/{}/properties.json", base, resource);

        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| unavailable(e.to_string()))?;

        let mut request = client.get(&url);
        if let Some(user) = &self.config.user {
            request = request.basic_auth(user, self.config.password.as_deref());
        }

        let body: Value = request
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| unavailable(e.to_string()))?
            .json()
            .map_err(|e| unavailable(e.to_string()))?;

        ResourceSchema::from_response(resource, &body)
    }
}
