mod cli;
mod observability;
mod output;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Map, Value, json};

use apimodel_query::config::loader::load_config;
use apimodel_query::{PolicyAxis, QueryEngine, QueryError};

use cli::{Cli, Commands};
use output::{print_error, print_field, print_success, print_value};

fn main() {
    if let Err(e) = run() {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    observability::init_tracing_with_level(&cfg.logging.level);
    let engine = QueryEngine::from_config(&cfg)?;

    match &cli.command {
        Commands::Check(args) => {
            match engine.validate(&args.resource, args.method.as_deref(), &args.query) {
                Ok(parsed) => {
                    print_value(&serde_json::to_value(&parsed)?)?;
                    print_success("query is valid");
                }
                Err(QueryError::Validation(errors)) => {
                    print_value(&serde_json::to_value(&errors)?)?;
                    bail!("query rejected with status {}", errors.status_code());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Plan(args) => {
            let prepared = engine.prepare(&args.resource, args.method.as_deref(), &args.query)?;
            print_value(&serde_json::to_value(&prepared)?)?;
        }
        Commands::Sql(args) => {
            let built = engine.render_sql(&args.resource, args.method.as_deref(), &args.query)?;
            println!("{built}");
            for (position, param) in built.params.iter().enumerate() {
                print_field(&format!("${}", position + 1), param);
            }
        }
        Commands::Policy(args) => {
            let schema = engine.schema(&args.resource)?;
            let mut axes = Map::new();
            for axis in PolicyAxis::ALL {
                axes.insert(axis.name().to_string(), serde_json::to_value(schema.policy(axis))?);
            }
            axes.insert(
                "raw_clauses".to_string(),
                serde_json::to_value(&schema.allowed_raw_clauses)?,
            );
            print_field("Resource", &schema.name);
            print_field("Table", &schema.table_identity().to_string());
            print_value(&Value::Object(axes))?;
        }
        Commands::Resources => {
            let names = engine.registry().names();
            if names.is_empty() {
                println!("No resources configured.");
            } else {
                print_value(&json!(names))?;
            }
        }
    }

    Ok(())
}
