//! AbraFlexi CLI
//!
//! Command-line client for an AbraFlexi server: generic record operations
//! plus evidence/company listing and a connection status probe. Connection
//! parameters come from the `ABRAFLEXI_*` environment variables.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

use abraflexi_cli::{
    Config, CreateInput, Operation, OperationError, OperationOutcome, QueryParams, Record,
    Session,
};

#[derive(Parser)]
#[command(name = "abraflexi-cli")]
#[command(about = "Interact with an AbraFlexi server from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interact with records of a specific evidence
    Record {
        /// Evidence name (e.g. faktura-vydana, banka)
        evidence: String,

        /// Operation: list, show, create
        #[arg(default_value = "list")]
        operation: String,

        /// Record id (for show)
        id: Option<String>,

        /// Comma separated list of columns
        #[arg(long, short = 'c', default_value = "id,kod,nazev")]
        columns: String,

        /// Limit results (0 fetches all)
        #[arg(long, short = 'l', default_value_t = 20)]
        limit: u32,

        /// Start offset for pagination
        #[arg(long, short = 's')]
        start: Option<u32>,

        /// Ordering of results (e.g. nazev@A)
        #[arg(long, short = 'o')]
        order: Option<String>,

        /// Filtering query (e.g. nazev begins 'A')
        #[arg(long, short = 'f')]
        filter: Option<String>,

        /// Level of detail (summary, full, id, custom:...)
        #[arg(long, short = 'd')]
        detail: Option<String>,

        /// Include relations
        #[arg(long, short = 'r')]
        relations: Option<String>,

        /// Include related objects
        #[arg(long, short = 'i')]
        includes: Option<String>,

        /// Test run without making changes
        #[arg(long)]
        dry_run: bool,

        /// Add total row count to the query
        #[arg(long)]
        add_row_count: bool,

        /// JSON data for create operation
        #[arg(long)]
        data: Option<String>,

        /// Record field as key=value (repeatable, for create)
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,

        /// Force create even if mandatory fields are missing
        #[arg(long)]
        force: bool,
    },

    /// List all available evidences
    ListEvidences,

    /// List all available companies
    ListCompanies,

    /// Show configured connection and server state
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_env();

    let result = match cli.command {
        Commands::Record {
            evidence,
            operation,
            id,
            columns,
            limit,
            start,
            order,
            filter,
            detail,
            relations,
            includes,
            dry_run,
            add_row_count,
            data,
            fields,
            force,
        } => run_record(RecordArgs {
            config,
            evidence,
            operation,
            id,
            columns,
            limit,
            start,
            order,
            filter,
            detail,
            relations,
            includes,
            dry_run,
            add_row_count,
            data,
            fields,
            force,
        }),

        Commands::ListEvidences => run_list_evidences(config),
        Commands::ListCompanies => run_list_companies(config),
        Commands::Status => run_status(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

struct RecordArgs {
    config: Config,
    evidence: String,
    operation: String,
    id: Option<String>,
    columns: String,
    limit: u32,
    start: Option<u32>,
    order: Option<String>,
    filter: Option<String>,
    detail: Option<String>,
    relations: Option<String>,
    includes: Option<String>,
    dry_run: bool,
    add_row_count: bool,
    data: Option<String>,
    fields: Vec<String>,
    force: bool,
}

fn run_record(args: RecordArgs) -> Result<(), u8> {
    let session = Session::new(args.config).map_err(|e| report(&e))?;
    let operation = Operation::parse(&args.operation).map_err(|e| report(&e))?;

    match operation {
        Operation::List => {
            let columns: Vec<String> = args
                .columns
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            let params = QueryParams {
                limit: Some(args.limit),
                start: args.start,
                filter: args.filter,
                order: args.order,
                detail: args.detail,
                relations: args.relations,
                includes: args.includes,
                dry_run: args.dry_run,
                add_row_count: args.add_row_count,
            };

            let outcome = session
                .run_list(&args.evidence, &columns, &params)
                .map_err(|e| report(&e))?;
            if let OperationOutcome::Records(records) = outcome {
                if records.is_empty() {
                    println!("No records found.");
                } else {
                    render_table(&columns, &records);
                }
            }
            Ok(())
        }

        Operation::Show => {
            let Some(id) = args.id else {
                eprintln!("\x1b[31mID is required for show operation\x1b[0m");
                return Err(2);
            };

            let outcome = session
                .run_show(&args.evidence, &id)
                .map_err(|e| report(&e))?;
            if let OperationOutcome::Record(record) = outcome {
                render_record(&record);
            }
            Ok(())
        }

        Operation::Create => {
            let input = build_create_input(args.data.as_deref(), &args.fields)?;
            let outcome = session
                .run_create(&args.evidence, input, args.dry_run, args.force)
                .map_err(|e| report_create_failure(&e))?;

            if let OperationOutcome::Created(result) = outcome {
                for warning in &result.warnings {
                    println!("\x1b[33mWarning: missing mandatory field: {}\x1b[0m", warning);
                }
                if result.dry_run {
                    println!("\x1b[32mDry-run successful. Record would be created.\x1b[0m");
                } else {
                    println!("\x1b[32mRecord created successfully!\x1b[0m");
                }
                if let Some(id) = &result.id {
                    println!("ID: {}", id);
                }
                if let Some(ident) = &result.record_ident {
                    println!("Record Ident: {}", ident);
                }
            }
            Ok(())
        }
    }
}

/// Assemble create input from `--data` JSON or repeated `--field key=value`
/// options. `--data` wins when both are given.
fn build_create_input(data: Option<&str>, fields: &[String]) -> Result<CreateInput, u8> {
    if let Some(json_data) = data {
        let parsed: Value = serde_json::from_str(json_data).map_err(|_| {
            eprintln!("\x1b[31mInvalid JSON data provided\x1b[0m");
            2u8
        })?;
        let Value::Object(map) = parsed else {
            eprintln!("\x1b[31mInvalid JSON data provided: expected an object\x1b[0m");
            return Err(2);
        };
        return Ok(CreateInput::Json(map));
    }

    let mut pairs = Vec::new();
    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            eprintln!("\x1b[31mInvalid field '{}': expected key=value\x1b[0m", field);
            return Err(2);
        };
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(CreateInput::Fields(pairs))
}

fn run_list_evidences(config: Config) -> Result<(), u8> {
    let session = Session::new(config).map_err(|e| report(&e))?;
    let columns = vec![
        "evidenceName".to_string(),
        "evidencePath".to_string(),
        "dbName".to_string(),
    ];
    let params = QueryParams {
        limit: Some(0),
        ..Default::default()
    };

    let outcome = session
        .run_list("evidence-list", &columns, &params)
        .map_err(|e| report(&e))?;
    if let OperationOutcome::Records(records) = outcome {
        if records.is_empty() {
            println!("No evidences found.");
        } else {
            render_table(&columns, &records);
        }
    }
    Ok(())
}

fn run_list_companies(config: Config) -> Result<(), u8> {
    let session = Session::new(config).map_err(|e| report(&e))?;
    let companies = session.client().companies().map_err(|e| report(&e))?;

    if companies.is_empty() {
        println!("No companies found.");
        return Ok(());
    }

    // Raw /c.json company entries use dbNazev for the database name.
    let columns = vec![
        "dbNazev".to_string(),
        "nazev".to_string(),
        "stavEnum".to_string(),
    ];
    render_table(&columns, &companies);
    Ok(())
}

fn run_status(config: Config) -> Result<(), u8> {
    println!("Configured AbraFlexi connection:");
    println!("URL: {}", config.url.as_deref().unwrap_or("Not set"));
    println!("User: {}", config.user.as_deref().unwrap_or("Not set"));
    println!("Company: {}", config.company.as_deref().unwrap_or("Not set"));

    if !config.is_complete() {
        eprintln!("\x1b[31mSome AbraFlexi connection parameters are missing.\x1b[0m");
        return Err(2);
    }

    println!();
    println!("Checking server and company state...");

    let session = Session::new(config).map_err(|e| report(&e))?;
    let info = session.client().company_info().map_err(|e| report(&e))?;

    println!("Company Name: {}", field_text(&info, "nazev"));
    println!("Company DB: {}", field_text(&info, "dbNazev"));
    println!("Company State: {}", field_text(&info, "stavEnum"));
    println!("\x1b[32mServer and company are reachable and configured correctly.\x1b[0m");
    Ok(())
}

fn field_text(record: &Record, key: &str) -> String {
    match record.get(key) {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Report a failure and map it to the process exit code.
fn report(err: &OperationError) -> u8 {
    eprintln!("\x1b[31mError: {}\x1b[0m", err);
    err.exit_code() as u8
}

/// Create failures carry field lists and server detail worth spelling out.
fn report_create_failure(err: &OperationError) -> u8 {
    match err {
        OperationError::NoDataProvided { resource, mandatory } => {
            eprintln!("\x1b[31mNo data provided for create operation\x1b[0m");
            eprintln!(
                "Usage: record {} create --data '{{\"field\":\"value\"}}' or --field key=value",
                resource
            );
            if mandatory.is_empty() {
                eprintln!("No mandatory field information found for evidence '{}'", resource);
            } else {
                eprintln!("Mandatory fields for '{}':", resource);
                for field in mandatory {
                    eprintln!("  - {}", field);
                }
            }
        }
        OperationError::MissingMandatoryFields { fields, .. } => {
            eprintln!("\x1b[33mWarning: the following mandatory fields are missing:\x1b[0m");
            for field in fields {
                eprintln!("  \x1b[33m- {}\x1b[0m", field);
            }
            eprintln!("\x1b[31mRecord creation aborted. Use --force to create anyway.\x1b[0m");
        }
        OperationError::ServerRejected { code, errors } => {
            eprintln!("\x1b[31mFailed to create record\x1b[0m");
            eprintln!("\x1b[31mResponse code: {}\x1b[0m", code);
            for error in errors {
                eprintln!("\x1b[31m{}\x1b[0m", error);
            }
        }
        other => {
            eprintln!("\x1b[31mError: {}\x1b[0m", other);
        }
    }
    err.exit_code() as u8
}

/// Render a scalar for display; nested structures collapse to compact JSON.
fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn render_record(record: &Record) {
    for (key, value) in record {
        println!("\x1b[32m{}\x1b[0m: {}", key, render_value(Some(value)));
    }
}

/// Width-aligned plain-text table.
fn render_table(columns: &[String], records: &[Record]) {
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|col| render_value(record.get(col)))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("{:<width$}", col, width = *w))
        .collect();
    println!("{}", header.join("  "));
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ")
    );

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect();
        let line = line.join("  ");
        println!("{}", line.trim_end());
    }
}
