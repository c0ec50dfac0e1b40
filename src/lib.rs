//! AbraFlexi command-line client.
//!
//! Schema-aware record access for AbraFlexi (FlexiBee) servers. The engine
//! discovers per-evidence field metadata from the server, validates create
//! payloads against the mandatory-field set, and runs generic
//! list/show/create operations with consistent option handling. It is a
//! thin, validated pass-through to the remote API: no local persistence,
//! no joins, no schema mutation.
//!
//! # Example
//!
//! Ad-hoc command-line options become record fields, with the engine's
//! control options filtered out:
//!
//! ```
//! use abraflexi_cli::collect_payload;
//!
//! let pairs = vec![
//!     ("nazev".to_string(), "Acme s.r.o.".to_string()),
//!     ("limit".to_string(), "20".to_string()),
//! ];
//! let payload = collect_payload(&pairs);
//!
//! assert!(payload.contains_key("nazev"));
//! assert!(!payload.contains_key("limit")); // reserved control option
//! ```
//!
//! # Error policy
//!
//! Validation failures ([`OperationError::NoDataProvided`],
//! [`OperationError::MissingMandatoryFields`]) are reported before any
//! network write. Transport and server errors keep the original detail;
//! nothing is retried automatically.

mod client;
mod config;
mod error;
mod ops;
mod schema;

pub use client::{CreateResult, QueryParams, Record, RecordClient};
pub use config::Config;
pub use error::{ErrorDetail, OperationError};
pub use ops::{
    collect_payload, CreateInput, Operation, OperationOutcome, Session, RESERVED_OPTIONS,
};
pub use schema::{
    format_field_info, FieldDescriptor, FieldType, ResourceSchema, SchemaCache, SelectValue,
};
