//! Agora query CLI
//!
//! Runs a JSON query specification against the forum store and prints the
//! result as JSON.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use agora_kernel::models::forum_registry;
use agora_kernel::{Config, QueryEngine, QuerySpec, db};

#[derive(Debug, Parser)]
#[command(name = "agora-query", about = "Run dynamic queries against the forum store")]
struct Cli {
    /// JSON query specification file; reads stdin when omitted.
    #[arg(long, global = true)]
    spec: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(flatten)]
    Run(RunCommand),
    /// Print the compiled SQL and any skipped filters without running it.
    Explain,
}

/// Subcommands that execute against the store.
#[derive(Debug, Subcommand)]
enum RunCommand {
    /// Print matching rows.
    Find,
    /// Print the number of matching rows.
    Count,
    /// Print whether any row matches.
    Exists,
    /// Print one page of rows with the total count.
    Page,
    /// Print projected values of matching rows.
    Pluck,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let spec = read_spec(cli.spec.as_deref())?;

    let config = Config::from_env().context("failed to load configuration")?;
    let engine = QueryEngine::with_path_cache_capacity(
        Arc::new(forum_registry()),
        config.path_cache_capacity,
    );

    let output = match cli.command {
        Command::Run(command) => run(&engine, &config, &spec, command).await?,
        Command::Explain => explain(&engine, &spec)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(
    engine: &QueryEngine,
    config: &Config,
    spec: &QuerySpec,
    command: RunCommand,
) -> Result<serde_json::Value> {
    let store = db::connect_store(config)
        .await
        .context("failed to connect to store")?;
    info!(entity = spec.target_type(), ?command, "running query");

    let output = match command {
        RunCommand::Find => serde_json::Value::Array(engine.find(&*store, spec).await?),
        RunCommand::Count => serde_json::json!(engine.count(&*store, spec).await?),
        RunCommand::Exists => serde_json::json!(engine.exists(&*store, spec).await?),
        RunCommand::Page => serde_json::to_value(engine.find_page(&*store, spec).await?)?,
        RunCommand::Pluck => serde_json::Value::Array(engine.pluck(&*store, spec).await?),
    };
    Ok(output)
}

fn read_spec(path: Option<&std::path::Path>) -> Result<QuerySpec> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read query spec from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("invalid query spec")
}

fn explain(engine: &QueryEngine, spec: &QuerySpec) -> Result<serde_json::Value> {
    use sea_query::PostgresQueryBuilder;

    let plan = engine.compile(spec)?;
    let skipped: Vec<serde_json::Value> = plan
        .predicates()
        .skipped()
        .iter()
        .map(|s| {
            serde_json::json!({
                "field_path": s.field_path,
                "operator": s.operator,
                "reason": s.reason.to_string(),
            })
        })
        .collect();
    Ok(serde_json::json!({
        "find": plan.build_find().to_string(PostgresQueryBuilder),
        "count": plan.build_count().to_string(PostgresQueryBuilder),
        "exists": plan.build_exists().to_string(PostgresQueryBuilder),
        "skipped_filters": skipped,
    }))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn explain_does_not_need_a_store_command() {
        let cli = Cli::try_parse_from(["agora-query", "explain"]).unwrap();
        assert!(matches!(cli.command, Command::Explain));
    }

    #[test]
    fn store_commands_parse_with_global_spec() {
        let cli = Cli::try_parse_from(["agora-query", "count", "--spec", "q.json"]).unwrap();
        assert!(matches!(cli.command, Command::Run(RunCommand::Count)));
        assert_eq!(cli.spec, Some(PathBuf::from("q.json")));

        assert!(Cli::try_parse_from(["agora-query", "delete"]).is_err());
    }
}
