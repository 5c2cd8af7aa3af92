//! CLI entry point for the FreshGraph triple validator.
//!
//! Reads a JSON array of triples from stdin and writes one validation result
//! per triple, in order, as a JSON array on stdout.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use freshgraph_core::TripleInput;
use freshgraph_ontology::{seed, validate, Ontology};

#[derive(Parser)]
#[command(name = "freshgraph-validate")]
#[command(about = "Validate triples against a FreshGraph ontology")]
struct Cli {
    /// Exported ontology (JSON). Defaults to the built-in FreshMart ontology.
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Pretty-print the output.
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let ontology = match &cli.schema {
        Some(path) => Ontology::load_json(path)?,
        None => seed::freshmart()?,
    };

    let input = std::io::read_to_string(std::io::stdin())?;
    let triples: Vec<TripleInput> = serde_json::from_str(&input)?;

    let results = triples
        .iter()
        .map(|t| validate(&ontology, t))
        .collect::<Result<Vec<_>, _>>()?;

    let invalid = results.iter().filter(|r| !r.is_valid).count();
    tracing::info!(total = results.len(), invalid, "Validation complete");

    if cli.pretty {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("{}", serde_json::to_string(&results)?);
    }
    Ok(())
}
