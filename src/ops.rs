//! Record operation orchestration.
//!
//! [`Session`] ties the schema cache and the record client together and
//! enforces the create policy: an empty payload is refused with
//! mandatory-field guidance, missing mandatory fields block the write
//! unless forced, and a forced write still carries the warnings into the
//! outcome. Each invocation is atomic; there is no retry loop and no state
//! across invocations beyond the schema cache.

use serde_json::{Map, Value};

use crate::client::{QueryParams, Record, RecordClient};
use crate::config::Config;
use crate::error::OperationError;
use crate::schema::{format_field_info, SchemaCache};

/// Option names that configure the operation itself and must never be
/// mistaken for record data when collecting ad-hoc key/value fields.
pub const RESERVED_OPTIONS: &[&str] = &[
    "columns",
    "limit",
    "start",
    "order",
    "filter",
    "detail",
    "relations",
    "includes",
    "dry-run",
    "add-row-count",
    "data",
    "force",
];

/// The three supported record operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Show,
    Create,
}

impl Operation {
    /// Parse an operation name. Anything unrecognized is a terminal
    /// [`OperationError::UnsupportedOperation`].
    pub fn parse(s: &str) -> Result<Self, OperationError> {
        match s {
            "list" => Ok(Operation::List),
            "show" => Ok(Operation::Show),
            "create" => Ok(Operation::Create),
            other => Err(OperationError::UnsupportedOperation {
                operation: other.to_string(),
            }),
        }
    }
}

/// Structured result of any record operation, detailed enough for any
/// presentation layer to render without re-querying the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Records(Vec<Record>),
    Record(Record),
    Created(crate::client::CreateResult),
}

/// Input for a create: a pre-structured JSON object, or raw key/value
/// pairs collected from the command line.
#[derive(Debug, Clone)]
pub enum CreateInput {
    Json(Map<String, Value>),
    Fields(Vec<(String, String)>),
}

/// Build a create payload from ad-hoc key/value pairs, skipping reserved
/// control options.
pub fn collect_payload(pairs: &[(String, String)]) -> Map<String, Value> {
    let mut payload = Map::new();
    for (key, value) in pairs {
        if RESERVED_OPTIONS.contains(&key.as_str()) {
            continue;
        }
        payload.insert(key.clone(), Value::String(value.clone()));
    }
    payload
}

/// One configured connection to a backend: a record client plus the
/// process-lifetime schema cache.
pub struct Session {
    client: RecordClient,
    schema: SchemaCache,
}

impl Session {
    pub fn new(config: Config) -> Result<Self, OperationError> {
        Ok(Self {
            client: RecordClient::new(config.clone())?,
            schema: SchemaCache::new(config),
        })
    }

    /// Switch to a different backend or company context. Rebuilds the
    /// client and drops every cached schema.
    pub fn set_connection(&mut self, config: Config) -> Result<(), OperationError> {
        self.client = RecordClient::new(config.clone())?;
        self.schema.set_connection(config);
        Ok(())
    }

    pub fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    pub fn client(&self) -> &RecordClient {
        &self.client
    }

    pub fn run_list(
        &self,
        resource: &str,
        columns: &[String],
        params: &QueryParams,
    ) -> Result<OperationOutcome, OperationError> {
        Ok(OperationOutcome::Records(
            self.client.list(resource, columns, params)?,
        ))
    }

    pub fn run_show(&self, resource: &str, id: &str) -> Result<OperationOutcome, OperationError> {
        Ok(OperationOutcome::Record(self.client.show(resource, id)?))
    }

    /// Create a record.
    ///
    /// Payload assembly and validation happen before any network write:
    /// an empty payload fails with the evidence's mandatory-field list as
    /// guidance; missing mandatory fields fail unless `force` is set, in
    /// which case the write proceeds and the warnings stay visible in the
    /// outcome. Schema discovery is best-effort - without metadata the
    /// write goes through unvalidated and the server decides.
    pub fn run_create(
        &self,
        resource: &str,
        input: CreateInput,
        dry_run: bool,
        force: bool,
    ) -> Result<OperationOutcome, OperationError> {
        let payload = match input {
            CreateInput::Json(map) => map,
            CreateInput::Fields(pairs) => collect_payload(&pairs),
        };

        if payload.is_empty() {
            let mandatory = self
                .schema
                .mandatory_fields(resource)
                .map(|fields| fields.iter().map(format_field_info).collect())
                .unwrap_or_default();
            return Err(OperationError::NoDataProvided {
                resource: resource.to_string(),
                mandatory,
            });
        }

        let missing: Vec<String> = self
            .schema
            .missing_mandatory_fields(resource, &payload)
            .map(|fields| fields.iter().map(format_field_info).collect())
            .unwrap_or_default();

        if !missing.is_empty() && !force {
            return Err(OperationError::MissingMandatoryFields {
                resource: resource.to_string(),
                fields: missing,
            });
        }

        let mut result = self.client.create(resource, &payload, dry_run)?;
        result.warnings = missing;
        Ok(OperationOutcome::Created(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_parse() {
        assert_eq!(Operation::parse("list").unwrap(), Operation::List);
        assert_eq!(Operation::parse("show").unwrap(), Operation::Show);
        assert_eq!(Operation::parse("create").unwrap(), Operation::Create);
    }

    #[test]
    fn operation_parse_unknown() {
        let err = Operation::parse("delete").unwrap_err();
        match err {
            OperationError::UnsupportedOperation { operation } => {
                assert_eq!(operation, "delete");
            }
            other => panic!("expected UnsupportedOperation, got {other:?}"),
        }
    }

    #[test]
    fn collect_payload_skips_reserved_options() {
        let pairs = vec![
            ("nazev".to_string(), "Acme".to_string()),
            ("limit".to_string(), "20".to_string()),
            ("force".to_string(), "true".to_string()),
            ("kod".to_string(), "ACME".to_string()),
        ];
        let payload = collect_payload(&pairs);

        assert_eq!(payload.len(), 2);
        assert_eq!(payload["nazev"], json!("Acme"));
        assert_eq!(payload["kod"], json!("ACME"));
        assert!(!payload.contains_key("limit"));
        assert!(!payload.contains_key("force"));
    }

    #[test]
    fn collect_payload_preserves_order() {
        let pairs = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        let payload = collect_payload(&pairs);
        let keys: Vec<&String> = payload.keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn create_without_data_fails_before_any_network_call() {
        // Unconfigured session: if the orchestrator tried to write, the
        // client would report RemoteUnavailable instead.
        let session = Session::new(Config::default()).unwrap();
        let result = session.run_create("adresar", CreateInput::Fields(Vec::new()), false, false);

        match result {
            Err(OperationError::NoDataProvided { resource, mandatory }) => {
                assert_eq!(resource, "adresar");
                // No schema reachable, so guidance degrades to empty.
                assert!(mandatory.is_empty());
            }
            other => panic!("expected NoDataProvided, got {other:?}"),
        }
    }

    #[test]
    fn create_payload_of_only_reserved_options_counts_as_empty() {
        let session = Session::new(Config::default()).unwrap();
        let pairs = vec![
            ("limit".to_string(), "10".to_string()),
            ("dry-run".to_string(), "true".to_string()),
        ];
        let result = session.run_create("adresar", CreateInput::Fields(pairs), false, false);
        assert!(matches!(result, Err(OperationError::NoDataProvided { .. })));
    }
}
