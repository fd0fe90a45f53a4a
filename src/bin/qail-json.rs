//! qail-json — inspect and try JSON adaptation against PostgreSQL
//!
//! # Usage
//!
//! ```bash
//! # Look up the json oids on a server
//! qail-json oids --database-url postgres://localhost/mydb
//!
//! # Render a value as a quoted json literal
//! qail-json quote '{"a": 100}'
//!
//! # Decode json[] text as the driver would
//! qail-json decode --oid 199 '{"{\"a\": 1}",NULL}'
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use qail_json::config::Settings;
use qail_json::prelude::*;

#[derive(Parser)]
#[command(name = "qail-json")]
#[command(author = "QAIL Contributors")]
#[command(version = "0.3.0")]
#[command(about = "🪝 JSON adaptation for PostgreSQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    qail-json oids --type-name jsonb
    qail-json quote '{\"name\": \"O'\\''Brien\"}'
    qail-json decode --oid 199 '{\"[1, 2]\",NULL}'")]
struct Cli {
    /// Database connection URL (overrides qail.toml)
    #[arg(long, env = "QAIL_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a JSON type's oids in pg_type
    Oids {
        /// Type name (defaults to qail.toml json.type_name, then "json")
        #[arg(short, long)]
        type_name: Option<String>,
    },
    /// Print the quoted SQL literal for a JSON document
    Quote {
        /// JSON text
        json: String,

        /// Indent the output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Decode received text through the default json/jsonb typecasters
    Decode {
        /// Column type oid
        #[arg(short, long, default_value_t = JSON_OID)]
        oid: u32,

        /// Raw column text
        text: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("qail_json=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let settings = Settings::load()?;

    match &cli.command {
        Commands::Oids { type_name } => {
            let type_name = type_name.as_deref().unwrap_or(&settings.json.type_name);
            let url = cli
                .database_url
                .clone()
                .or_else(|| settings.postgres.url.clone())
                .context(
                    "No database URL. Use --database-url, set QAIL_DATABASE_URL \
                     or add [postgres] url to qail.toml",
                )?;
            show_oids(&url, type_name, cli.verbose).await
        }
        Commands::Quote { json, pretty } => {
            let style = if *pretty {
                JsonStyle::Pretty
            } else {
                settings.json.style()
            };
            quote_json(json, style)
        }
        Commands::Decode { oid, text } => decode_text(*oid, text),
    }
}

async fn show_oids(url: &str, type_name: &str, verbose: bool) -> anyhow::Result<()> {
    if verbose {
        println!("{} {}", "Connecting to:".dimmed(), url);
    }

    let mut session = PgSession::connect(url)
        .await
        .context("Failed to connect")?;
    let (oid, array_oid) = get_json_oids(&mut session, type_name).await?;
    session.close().await?;

    println!("{}", format!("Type '{}'", type_name).green().bold());
    println!("  {} {}", "oid:".dimmed(), oid.to_string().cyan());
    match array_oid {
        Some(array_oid) => println!("  {} {}", "array oid:".dimmed(), array_oid.to_string().cyan()),
        None => println!("  {} {}", "array oid:".dimmed(), "(none)".yellow()),
    }
    Ok(())
}

fn quote_json(text: &str, style: JsonStyle) -> anyhow::Result<()> {
    let value: serde_json::Value = serde_json::from_str(text).context("Input is not valid JSON")?;

    let registry = TypeRegistry::new();
    registry.set_style(style);
    let literal = Json::new(value).getquoted_in(&registry)?;

    println!("{}", literal);
    Ok(())
}

fn decode_text(oid: u32, text: &str) -> anyhow::Result<()> {
    register_default_json(None, true, None)?;
    register_default_jsonb(None, true, None)?;

    let value = TypeRegistry::global().typecast(None, oid, Some(text))?;
    println!(
        "{} {}",
        format!("{}:", oid_to_name(oid)).dimmed(),
        serde_json::to_string_pretty(&value)?
    );
    if is_array_oid(oid) {
        if let Some(items) = value.as_array() {
            println!("{} {}", "elements:".dimmed(), items.len());
        }
    }
    Ok(())
}
