//! ora-pg-migrate CLI - Oracle to PostgreSQL schema and PL/SQL conversion.

use clap::{Parser, Subcommand};
use ora_pg_migrate::model::TableReference;
use ora_pg_migrate::{
    Config, MigrateError, MigrationScript, SchemaRegistry, SymbolResolver, TransformContext,
    Transformer,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "ora-pg-migrate")]
#[command(about = "Oracle to PostgreSQL schema and PL/SQL conversion")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the registry into a PostgreSQL migration script
    Convert {
        /// Output file (overrides output.path; stdout when neither is set)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit stub bodies for functions and procedures
        #[arg(long)]
        spec_only: bool,

        /// Exit successfully even when some objects failed to convert
        #[arg(long)]
        keep_going: bool,
    },

    /// Resolve the Oracle type of a column reference or call expression
    ResolveType {
        /// Schema the expression is evaluated in
        #[arg(long)]
        schema: String,

        /// Expression, e.g. "e.salary" or "pkg.get_rate(1)"
        #[arg(long)]
        expr: String,

        /// FROM clause entries as table or schema.table, with optional :alias
        #[arg(long)]
        from: Vec<String>,
    },

    /// Resolve the schema owning a table or view, following synonyms
    ResolveTable {
        /// Schema the name is seen from
        #[arg(long)]
        schema: String,

        /// Table, view or synonym name
        #[arg(long)]
        name: String,
    },

    /// Show which indexes convert and why the others do not
    IndexReport,

    /// Validate the configuration and registry snapshot
    Validate,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let registry = SchemaRegistry::load(&config.input.registry)?;
    info!(
        "Loaded {} objects from {:?}",
        registry.object_count(),
        config.input.registry
    );

    match cli.command {
        Commands::Convert {
            output,
            spec_only,
            keep_going,
        } => {
            if spec_only {
                config.conversion.spec_only = true;
            }
            let script = Transformer::with_builtins().convert_registry(
                &registry,
                &config.conversion,
                config.output.include_comments,
            );
            let sql = script.to_sql(&script_header(&config));

            match output.as_deref().or(config.output.path.as_deref()) {
                Some(path) => {
                    std::fs::write(path, &sql)?;
                    println!("Conversion completed!");
                    println!("  Output: {}", path.display());
                    print_summary(&script);
                }
                None => print!("{}", sql),
            }

            for failure in &script.failures {
                eprintln!(
                    "  ✗ {} {} ({}): {}",
                    failure.kind,
                    failure.input,
                    failure.strategy.as_deref().unwrap_or("no strategy"),
                    failure.message
                );
            }

            if script.has_failures() {
                if keep_going {
                    warn!(
                        "{} objects failed to convert; keeping partial script",
                        script.failures.len()
                    );
                } else {
                    return Err(MigrateError::unsupported(
                        "migration script",
                        format!(
                            "{} objects failed to convert (use --keep-going to accept a partial script)",
                            script.failures.len()
                        ),
                    ));
                }
            }
        }

        Commands::ResolveType { schema, expr, from } => {
            let from = from
                .iter()
                .map(|f| TableReference::parse(f))
                .collect::<Result<Vec<_>, _>>()?;
            let resolver = SymbolResolver::with_config(&registry, &config.conversion);
            let data_type = resolver.resolve_column_type_text(&expr, &schema, &from);

            if cli.output_json {
                let value = serde_json::json!({
                    "schema": schema,
                    "expression": expr,
                    "type": data_type,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", data_type);
            }
        }

        Commands::ResolveTable { schema, name } => {
            let resolver = SymbolResolver::with_config(&registry, &config.conversion);
            let resolved = resolver.resolve_table_or_view(&name, &schema)?;

            if cli.output_json {
                let value = serde_json::json!({
                    "schema": resolved.schema,
                    "name": resolved.name,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}.{}", resolved.schema, resolved.name);
            }
        }

        Commands::IndexReport => {
            let indexes: Vec<_> = registry
                .indexes
                .iter()
                .filter(|i| config.conversion.includes_schema(&i.schema))
                .cloned()
                .collect();
            let ctx = TransformContext::new(&registry, &config.conversion);
            let result = Transformer::with_builtins().indexes.convert_all(&indexes, &ctx);

            if cli.output_json {
                let unsupported: Vec<_> = result
                    .unsupported
                    .iter()
                    .map(|ddl| {
                        serde_json::json!({
                            "index": ddl.original_name,
                            "schema": ddl.schema,
                            "table": ddl.table,
                            "reason": ddl.notes,
                            "suggested_action": ddl.suggested_action,
                        })
                    })
                    .collect();
                let value = serde_json::json!({
                    "total": result.total(),
                    "supported": result.supported_count(),
                    "unsupported": unsupported,
                    "conflicting": result.conflicting,
                    "strategy_usage": result.strategy_usage,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", result.summary());
                for ddl in result.supported.iter().chain(result.unsupported.iter()) {
                    println!("  {}", ddl.summary());
                }
                println!("\nStrategy usage:");
                for (strategy, count) in &result.strategy_usage {
                    println!("  {}: {}", strategy, count);
                }
                println!();
                print!("{}", result.unsupported_report());
            }
        }

        Commands::Validate => {
            if cli.output_json {
                let value = serde_json::json!({
                    "config_hash": config.hash(),
                    "tables": registry.tables.len(),
                    "views": registry.views.len(),
                    "synonyms": registry.synonyms.len(),
                    "indexes": registry.indexes.len(),
                    "object_types": registry.object_types.len(),
                    "package_specs": registry.package_specs.len(),
                    "package_bodies": registry.package_bodies.len(),
                    "functions": registry.functions.len(),
                    "procedures": registry.procedures.len(),
                    "triggers": registry.triggers.len() + registry.trigger_metadata.len(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Configuration and registry are valid");
                println!("  Config hash: {}", config.hash());
                println!("  Tables: {}", registry.tables.len());
                println!("  Views: {}", registry.views.len());
                println!("  Synonyms: {}", registry.synonyms.len());
                println!("  Indexes: {}", registry.indexes.len());
                println!("  Object types: {}", registry.object_types.len());
                println!(
                    "  Packages: {} specs, {} bodies",
                    registry.package_specs.len(),
                    registry.package_bodies.len()
                );
                println!(
                    "  Routines: {} functions, {} procedures",
                    registry.functions.len(),
                    registry.procedures.len()
                );
                println!(
                    "  Triggers: {}",
                    registry.triggers.len() + registry.trigger_metadata.len()
                );
            }
        }
    }

    Ok(())
}

fn script_header(config: &Config) -> String {
    format!(
        "-- Generated by ora-pg-migrate {}\n-- Registry: {}\n-- Config hash: {}\n",
        env!("CARGO_PKG_VERSION"),
        config.input.registry.display(),
        config.hash()
    )
}

fn print_summary(script: &MigrationScript) {
    println!("  Statements: {}", script.statement_count());
    for section in script.sections.iter().filter(|s| !s.statements.is_empty()) {
        println!("    {}: {}", section.name, section.statements.len());
    }
    println!("  {}", script.index_result.summary());
    println!("  Failures: {}", script.failures.len());
    if !script.skipped.is_empty() {
        println!("  Skipped: {}", script.skipped.len());
        for skipped in &script.skipped {
            println!("    {} ({})", skipped.input, skipped.message);
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries the generated SQL
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
