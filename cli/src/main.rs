use std::fs;
use std::path::{Path, PathBuf};

use catalog_core::{
    CatalogationLevel, DecimalConvention, DictionaryMode, Document, Element, ElementKind,
    MediaKind, StaticDictionary, ValidationResult, validate,
};
use catalog_db::{CatalogConfig, DocumentTypeRegistry};
use catalog_query::{
    ExpressionValidation, QueryOptions, SearchExpression, evaluate, validate_query_text,
};
use catalog_sqlite::{Migration, TermStore};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_PREFIX: &str = "cat_";

/// CLI-specific decimal separator enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliDecimal {
    Point,
    Comma,
}

impl From<CliDecimal> for DecimalConvention {
    fn from(decimal: CliDecimal) -> Self {
        match decimal {
            CliDecimal::Point => Self::Point,
            CliDecimal::Comma => Self::Comma,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "catalog")]
#[command(about = "Inspect catalog schemas, validate records and run queries", version)]
struct Cli {
    /// Configuration file (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the elements of a document type in canonical order.
    Inspect(InspectArgs),
    /// Validate document JSON files.
    Validate(ValidateArgs),
    /// Parse and validate a query, printing its canonical form.
    CheckQuery(CheckQueryArgs),
    /// Evaluate a query against document JSON files.
    Eval(EvalArgs),
    /// Maintain dictionary terms.
    Terms(TermsArgs),
    /// SQLite dictionary migration and seeding operations.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args)]
struct SchemaArgs {
    /// Directory of document type definitions (defaults to the configured sources).
    #[arg(long)]
    schemas: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct DbArgs {
    /// Dictionary database file (defaults to dictionary.path in the configuration).
    #[arg(long)]
    db: Option<PathBuf>,
    /// Table prefix (defaults to dictionary.prefix, then "cat_").
    #[arg(long)]
    prefix: Option<String>,
}

#[derive(Debug, Args)]
struct InspectArgs {
    #[command(flatten)]
    schemas: SchemaArgs,
    /// Document type sid.
    document_type: String,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[command(flatten)]
    schemas: SchemaArgs,
    /// Dictionary database used for closed dictionaries.
    #[arg(long)]
    dictionary: Option<PathBuf>,
    /// Table prefix of the dictionary database.
    #[arg(long)]
    prefix: Option<String>,
    /// Print results as JSON.
    #[arg(long)]
    json: bool,
    /// Document JSON files.
    #[arg(required = true)]
    documents: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckQueryArgs {
    #[command(flatten)]
    schemas: SchemaArgs,
    /// Accept metafields only storage can answer.
    #[arg(long)]
    allow_storage_only: bool,
    /// Drop unparseable fragments instead of failing.
    #[arg(long)]
    lenient: bool,
    /// Query text.
    query: String,
}

#[derive(Debug, Args)]
struct EvalArgs {
    #[command(flatten)]
    schemas: SchemaArgs,
    /// Decimal separator of stored values (defaults to the configuration).
    #[arg(long)]
    decimal: Option<CliDecimal>,
    /// Query text.
    query: String,
    /// Document JSON files.
    #[arg(required = true)]
    documents: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct TermsArgs {
    #[command(subcommand)]
    operation: TermsOperation,
}

#[derive(Debug, Subcommand)]
enum TermsOperation {
    /// Add a term to the dictionary of a field.
    Add(TermsAddArgs),
    /// Remove one term, every term of a field, or every term of a document type.
    Remove(TermsRemoveArgs),
    /// List the terms of a field or of a whole document type.
    List(TermsListArgs),
}

#[derive(Debug, Args)]
struct TermsAddArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Complete field path, e.g. SI.CD.TSK.
    field: String,
    term: String,
    /// Reference URL for the term.
    #[arg(long)]
    url: Option<String>,
}

#[derive(Debug, Args)]
struct TermsRemoveArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Complete field path, or a document type sid.
    target: String,
    /// Term to remove; without it every term of the target is removed.
    term: Option<String>,
}

#[derive(Debug, Args)]
struct TermsListArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Complete field path, or a document type sid.
    target: String,
    /// Only terms starting with this text (case-insensitive).
    #[arg(long)]
    starts_with: Option<String>,
    /// Print terms as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(subcommand)]
    operation: MigrateOperation,
}

#[derive(Debug, Subcommand)]
enum MigrateOperation {
    /// Create the term table.
    Up(DbArgs),
    /// Drop the term table.
    Down(DbArgs),
    /// Seed the dictionary from a directory of seed files.
    Seed(MigrateSeedArgs),
    /// Drop, recreate, and reseed from a directory.
    Refresh(MigrateSeedArgs),
    /// Show table status.
    Status(DbArgs),
}

#[derive(Debug, Args)]
struct MigrateSeedArgs {
    #[command(flatten)]
    db: DbArgs,
    /// Directory with JSON or YAML seed files.
    #[arg(long)]
    source: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = Context::load(cli.config.as_deref()).and_then(|ctx| match cli.command {
        Command::Inspect(args) => run_inspect(&ctx, args),
        Command::Validate(args) => run_validate(&ctx, args),
        Command::CheckQuery(args) => run_check_query(&ctx, args),
        Command::Eval(args) => run_eval(&ctx, args),
        Command::Terms(args) => run_terms(&ctx, args),
        Command::Migrate(args) => run_migrate(&ctx, args),
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Configuration shared by every command; flags override it.
struct Context {
    config: CatalogConfig,
}

impl Context {
    fn load(path: Option<&Path>) -> Result<Self, String> {
        let config = match path {
            Some(path) => CatalogConfig::load(path).map_err(|err| {
                format!("Failed to load configuration '{}': {err}", path.display())
            })?,
            None => CatalogConfig::default(),
        };
        debug!(config = ?path, "Loaded configuration");
        Ok(Self { config })
    }

    fn registry(&self, args: &SchemaArgs) -> Result<DocumentTypeRegistry, String> {
        if let Some(dir) = &args.schemas {
            return DocumentTypeRegistry::from_dir(dir).map_err(|err| {
                format!("Failed to load definitions from '{}': {err}", dir.display())
            });
        }
        let sources = &self.config.schemas;
        if sources.dirs.is_empty() && sources.bundles.is_empty() {
            return Err(
                "No definition sources: pass --schemas or list schemas in the configuration file"
                    .to_string(),
            );
        }
        self.config
            .registry_builder()
            .build()
            .map_err(|err| format!("Failed to load definitions: {err}"))
    }

    fn database(&self, db: Option<PathBuf>, prefix: Option<String>) -> Result<(PathBuf, String), String> {
        let configured = self.config.dictionary.as_ref();
        let path = db
            .or_else(|| configured.map(|d| d.path.clone()))
            .ok_or("No dictionary database: pass --db or set dictionary.path in the configuration file")?;
        let prefix = prefix
            .or_else(|| configured.map(|d| d.prefix.clone()))
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        Ok((path, prefix))
    }

    fn query_options(
        &self,
        lenient: bool,
        allow_storage_only: bool,
        decimal: Option<CliDecimal>,
    ) -> QueryOptions {
        QueryOptions {
            lenient_parsing: lenient || self.config.query.lenient_parsing,
            allow_storage_only_metafields: allow_storage_only
                || self.config.query.allow_storage_only_metafields,
            decimal_convention: decimal
                .map(Into::into)
                .unwrap_or(self.config.decimal_separator),
        }
    }
}

// ---------------------------------------------------------------------------
// inspect command
// ---------------------------------------------------------------------------

fn run_inspect(ctx: &Context, args: InspectArgs) -> Result<(), String> {
    let registry = ctx.registry(&args.schemas)?;
    let schema = registry.get(&args.document_type).ok_or_else(|| {
        format!(
            "Unknown document type '{}' (available: {})",
            args.document_type,
            registry.sids().join(", ")
        )
    })?;

    match &schema.version {
        Some(version) => println!("{}: {} (version {version})", schema.sid, schema.label),
        None => println!("{}: {}", schema.sid, schema.label),
    }
    for element in schema.elements() {
        let depth = element.complete_path.matches('.').count();
        println!("{}{}", "  ".repeat(depth), describe_element(element));
    }
    Ok(())
}

fn describe_element(element: &Element) -> String {
    let mut parts = vec![element.sid.clone()];
    match &element.kind {
        ElementKind::Paragraph => parts.push("paragraph".to_string()),
        ElementKind::StructuredField => parts.push("structured".to_string()),
        ElementKind::SimpleField(field) => {
            parts.push(format!("{:?}", field.field_type).to_lowercase());
            if field.length > 0 {
                let op = if field.fixed_length { "=" } else { "<=" };
                parts.push(format!("length{op}{}", field.length));
            }
            if field.dictionary != DictionaryMode::None {
                parts.push(format!("dictionary={:?}", field.dictionary).to_lowercase());
            }
            if field.media != MediaKind::None {
                parts.push(format!("media={:?}", field.media).to_lowercase());
            }
            if field.required_for_saving {
                parts.push("required-for-saving".to_string());
            }
        }
    }
    if element.repeatable {
        parts.push("repeatable".to_string());
    }
    if element.required_at_level != CatalogationLevel::None {
        parts.push(format!("level={}", element.required_at_level));
    }
    parts.join(" ")
}

// ---------------------------------------------------------------------------
// validate command
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DocumentReport<'a> {
    file: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

fn run_validate(ctx: &Context, args: ValidateArgs) -> Result<(), String> {
    let registry = ctx.registry(&args.schemas)?;
    let dictionary = match (args.dictionary, &ctx.config.dictionary) {
        (None, None) => {
            warn!("No dictionary configured, closed dictionary fields reject every value");
            StaticDictionary::default()
        }
        (db, _) => {
            let (path, prefix) = ctx.database(db, args.prefix)?;
            load_dictionary(&path, &prefix, &registry)?
        }
    };

    let outcomes: Vec<(PathBuf, Result<ValidationResult, String>)> = args
        .documents
        .par_iter()
        .map(|path| {
            let outcome = read_document(path).and_then(|mut document| {
                let schema = registry.get(&document.document_type).ok_or_else(|| {
                    format!("Unknown document type '{}'", document.document_type)
                })?;
                Ok(validate(&mut document, schema, &dictionary))
            });
            (path.clone(), outcome)
        })
        .collect();

    let rejected = outcomes
        .iter()
        .filter(|(_, outcome)| !outcome.as_ref().is_ok_and(|r| r.can_be_saved))
        .count();

    if args.json {
        let reports: Vec<DocumentReport<'_>> = outcomes
            .iter()
            .map(|(file, outcome)| DocumentReport {
                file: file.as_path(),
                result: outcome.as_ref().ok(),
                error: outcome.as_ref().err().map(String::as_str),
            })
            .collect();
        let raw = serde_json::to_string_pretty(&reports)
            .map_err(|err| format!("Failed to serialize results: {err}"))?;
        println!("{raw}");
    } else {
        for (file, outcome) in &outcomes {
            match outcome {
                Ok(result) => {
                    let verdict = if result.can_be_saved {
                        "ok"
                    } else {
                        "cannot be saved"
                    };
                    println!(
                        "{}: {verdict}, level {}",
                        file.display(),
                        result.catalogation_level
                    );
                    for finding in &result.errors {
                        println!("  [{:?}] {}", finding.kind, finding.message);
                    }
                }
                Err(err) => println!("{}: {err}", file.display()),
            }
        }
    }

    if rejected > 0 {
        return Err(format!(
            "{rejected} of {} document(s) cannot be saved",
            outcomes.len()
        ));
    }
    Ok(())
}

/// Reads the dictionaries of every registered document type into memory so
/// that documents can be validated in parallel.
fn load_dictionary(
    path: &Path,
    prefix: &str,
    registry: &DocumentTypeRegistry,
) -> Result<StaticDictionary, String> {
    let conn = open_db(path)?;
    let store = TermStore::new(&conn, prefix).map_err(|err| err.to_string())?;
    let mut dictionary = StaticDictionary::default();
    for sid in registry.sids() {
        let terms = store.all_terms(sid).map_err(|err| {
            format!("Failed to read dictionary '{}': {err}", path.display())
        })?;
        for (field_path, field_terms) in terms {
            dictionary = dictionary.with_terms(&field_path, field_terms);
        }
    }
    Ok(dictionary)
}

// ---------------------------------------------------------------------------
// check-query and eval commands
// ---------------------------------------------------------------------------

fn print_findings(validation: &ExpressionValidation) {
    for finding in &validation.errors {
        println!("  {finding}");
    }
}

fn run_check_query(ctx: &Context, args: CheckQueryArgs) -> Result<(), String> {
    let registry = ctx.registry(&args.schemas)?;
    let options = ctx.query_options(args.lenient, args.allow_storage_only, None);
    let (validation, expr) = validate_query_text(&args.query, |sid| registry.get(sid), &options);

    if !validation.is_valid {
        println!("Query is not valid:");
        print_findings(&validation);
        return Err(format!("{} problem(s) found", validation.errors.len()));
    }
    if let Some(expr) = expr {
        println!("{expr}");
        if expr.is_storage_only() {
            println!(
                "note: storage-only metafields: {}",
                expr.storage_only_metafields().join(", ")
            );
        }
    }
    Ok(())
}

fn run_eval(ctx: &Context, args: EvalArgs) -> Result<(), String> {
    let registry = ctx.registry(&args.schemas)?;
    let options = ctx.query_options(false, false, args.decimal);
    let (validation, expr) = validate_query_text(&args.query, |sid| registry.get(sid), &options);

    let expr: SearchExpression = match expr {
        Some(expr) if validation.is_valid => expr,
        _ => {
            println!("Query is not valid:");
            print_findings(&validation);
            return Err(format!("{} problem(s) found", validation.errors.len()));
        }
    };
    let schema = registry
        .get(&expr.source)
        .ok_or_else(|| format!("Unknown document type '{}'", expr.source))?;

    let outcomes: Vec<(PathBuf, Result<bool, String>)> = args
        .documents
        .par_iter()
        .map(|path| {
            let outcome = read_document(path).and_then(|document| {
                evaluate(&expr, &document, schema, options.decimal_convention)
                    .map_err(|err| err.to_string())
            });
            (path.clone(), outcome)
        })
        .collect();

    let mut failed = 0usize;
    for (file, outcome) in &outcomes {
        match outcome {
            Ok(true) => println!("{}: match", file.display()),
            Ok(false) => println!("{}: no match", file.display()),
            Err(err) => {
                failed += 1;
                println!("{}: error: {err}", file.display());
            }
        }
    }

    if failed > 0 {
        return Err(format!("{failed} document(s) could not be evaluated"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// terms command
// ---------------------------------------------------------------------------

fn run_terms(ctx: &Context, args: TermsArgs) -> Result<(), String> {
    match args.operation {
        TermsOperation::Add(a) => run_terms_add(ctx, a),
        TermsOperation::Remove(a) => run_terms_remove(ctx, a),
        TermsOperation::List(a) => run_terms_list(ctx, a),
    }
}

fn run_terms_add(ctx: &Context, args: TermsAddArgs) -> Result<(), String> {
    let (path, prefix) = ctx.database(args.db.db, args.db.prefix)?;
    let conn = open_db(&path)?;
    let store = TermStore::new(&conn, prefix).map_err(|err| err.to_string())?;
    let added = store
        .add_term(&args.field, &args.term, args.url.as_deref())
        .map_err(|err| format!("Failed to add term: {err}"))?;
    if added {
        println!("Added '{}' to {}.", args.term, args.field);
    } else {
        println!("'{}' is already in {}.", args.term, args.field);
    }
    Ok(())
}

fn run_terms_remove(ctx: &Context, args: TermsRemoveArgs) -> Result<(), String> {
    let (path, prefix) = ctx.database(args.db.db, args.db.prefix)?;
    let conn = open_db(&path)?;
    let store = TermStore::new(&conn, prefix).map_err(|err| err.to_string())?;
    let is_field = args.target.contains('.');

    let removed = match (&args.term, is_field) {
        (Some(term), true) => store
            .remove_term(&args.target, term)
            .map(usize::from),
        (None, true) => store.remove_all_terms(&args.target),
        (None, false) => store.remove_all_terms_for_document_type(&args.target),
        (Some(_), false) => {
            return Err(format!(
                "'{}' is not a field path; a term can only be removed from a field",
                args.target
            ));
        }
    }
    .map_err(|err| format!("Failed to remove terms: {err}"))?;

    println!("Removed {removed} term(s) from {}.", args.target);
    Ok(())
}

fn run_terms_list(ctx: &Context, args: TermsListArgs) -> Result<(), String> {
    let (path, prefix) = ctx.database(args.db.db, args.db.prefix)?;
    let conn = open_db(&path)?;
    let store = TermStore::new(&conn, prefix).map_err(|err| err.to_string())?;
    let read_error = |err: catalog_sqlite::SqliteError| format!("Failed to list terms: {err}");

    if args.target.contains('.') {
        let entries = store
            .terms_with_urls(&args.target, args.starts_with.as_deref())
            .map_err(read_error)?;
        if args.json {
            let raw = serde_json::to_string_pretty(&entries)
                .map_err(|err| format!("Failed to serialize terms: {err}"))?;
            println!("{raw}");
        } else {
            for entry in &entries {
                match &entry.url {
                    Some(url) => println!("{}\t{url}", entry.term),
                    None => println!("{}", entry.term),
                }
            }
        }
        return Ok(());
    }

    if args.starts_with.is_some() {
        warn!("--starts-with only applies to a field path; ignored");
    }
    let grouped = store.all_terms_with_urls(&args.target).map_err(read_error)?;
    if args.json {
        let raw = serde_json::to_string_pretty(&grouped)
            .map_err(|err| format!("Failed to serialize terms: {err}"))?;
        println!("{raw}");
    } else {
        for (field, entries) in &grouped {
            println!("{field}:");
            for entry in entries {
                match &entry.url {
                    Some(url) => println!("  {}\t{url}", entry.term),
                    None => println!("  {}", entry.term),
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// migrate command
// ---------------------------------------------------------------------------

fn run_migrate(ctx: &Context, args: MigrateArgs) -> Result<(), String> {
    match args.operation {
        MigrateOperation::Up(db) => run_migrate_up(ctx, db),
        MigrateOperation::Down(db) => run_migrate_down(ctx, db),
        MigrateOperation::Seed(a) => run_migrate_seed(ctx, a, false),
        MigrateOperation::Refresh(a) => run_migrate_seed(ctx, a, true),
        MigrateOperation::Status(db) => run_migrate_status(ctx, db),
    }
}

fn open_migration(ctx: &Context, args: DbArgs) -> Result<(Migration, PathBuf, String), String> {
    let (path, prefix) = ctx.database(args.db, args.prefix)?;
    let conn = open_db(&path)?;
    let migration = Migration::new(conn, &prefix)
        .map_err(|err| format!("Failed to initialize migration: {err}"))?;
    Ok((migration, path, prefix))
}

fn run_migrate_up(ctx: &Context, args: DbArgs) -> Result<(), String> {
    let (mut migration, path, prefix) = open_migration(ctx, args)?;
    migration
        .up()
        .map_err(|err| format!("Migration up failed: {err}"))?;
    println!(
        "Migration up complete. Term table created with prefix '{prefix}' in '{}'.",
        path.display()
    );
    Ok(())
}

fn run_migrate_down(ctx: &Context, args: DbArgs) -> Result<(), String> {
    let (mut migration, path, prefix) = open_migration(ctx, args)?;
    migration
        .down()
        .map_err(|err| format!("Migration down failed: {err}"))?;
    println!(
        "Migration down complete. Term table with prefix '{prefix}' dropped from '{}'.",
        path.display()
    );
    Ok(())
}

fn run_migrate_seed(ctx: &Context, args: MigrateSeedArgs, refresh: bool) -> Result<(), String> {
    let (mut migration, _, _) = open_migration(ctx, args.db)?;
    let report = if refresh {
        migration.refresh(&args.source)
    } else {
        migration.seed(&args.source)
    }
    .map_err(|err| format!("Seed failed: {err}"))?;

    if refresh {
        println!("Refresh complete (table dropped, recreated, and reseeded):");
    } else {
        println!("Seed complete:");
    }
    println!("  Files read: {}", report.files);
    println!("  Terms inserted: {}", report.terms_inserted);
    println!("  Duplicates skipped: {}", report.duplicates_skipped);
    Ok(())
}

fn run_migrate_status(ctx: &Context, args: DbArgs) -> Result<(), String> {
    let (migration, _, _) = open_migration(ctx, args)?;
    let status = migration
        .status()
        .map_err(|err| format!("Failed to get migration status: {err}"))?;
    println!("Migration Status:");
    println!(
        "  Tables exist: {}",
        if status.tables_exist { "yes" } else { "no" }
    );
    println!("  Term count: {}", status.term_count);
    println!("  Field count: {}", status.field_count);
    println!("  Document type count: {}", status.document_type_count);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_db(path: &Path) -> Result<Connection, String> {
    Connection::open(path)
        .map_err(|err| format!("Failed to open database '{}': {err}", path.display()))
}

fn read_document(path: &Path) -> Result<Document, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    Document::from_json(&raw).map_err(|err| format!("Failed to parse '{}': {err}", path.display()))
}
