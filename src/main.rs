//! `kustomap` maps the kustomize overlay graph reachable from one node id and
//! attaches a TLS trust bundle for every host involved.
//!
//! ```text
//! kustomap github:acme/app/overlays/prod@main
//! kustomap gitlab:team/infra/env/dev@main --base-url https://gitlab.example.com -o graph.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use ca_trust::{Collector, TrustConfig};
use clap::Parser;
use colored::Colorize;
use git_archive_fetch::{ArchiveClient, FetchConfig};
use overlay_graph::{BuildConfig, BuildOutcome, GraphBuilder, KustomizationScanner};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kustomap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Map kustomize overlay dependencies across GitHub/GitLab repositories", long_about = None)]
struct Cli {
    /// Starting node, `github|gitlab:owner/repo[/path]@ref`
    node_id: String,

    /// Provider instance of the starting node (default: public github.com / gitlab.com)
    #[arg(long, env = "KUSTOMAP_BASE_URL")]
    base_url: Option<String>,

    /// Skip TLS chain collection
    #[arg(long)]
    no_trust: bool,

    /// Write the graph JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let fetch_cfg = FetchConfig::from_env().context("fetch config")?;
    let build_cfg = BuildConfig::from_env(&fetch_cfg.work_dir);

    let mut outcome = build(&cli, fetch_cfg.clone(), build_cfg.clone()).await?;

    if !cli.no_trust {
        let collector = Collector::from_config(&TrustConfig::from_env()).context("trust config")?;
        collector.collect_and_attach(&mut outcome.graph).await;

        // Hosts with private CAs fail the first pass; their chains are now known.
        if !outcome.errors.is_empty() && !outcome.graph.ca_bundle.is_empty() {
            info!(failed = outcome.errors.len(), "retrying with captured trust bundle");
            let bundle = match &fetch_cfg.extra_ca_pem {
                Some(extra) => format!("{extra}\n{}", outcome.graph.ca_bundle),
                None => outcome.graph.ca_bundle.clone(),
            };
            outcome = build(&cli, fetch_cfg.with_ca_bundle(bundle), build_cfg).await?;
            collector.collect_and_attach(&mut outcome.graph).await;
        }
    }

    let json = serde_json::to_string_pretty(&outcome.graph)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
            info!(path = %path.display(), "graph written");
        }
        None => println!("{json}"),
    }

    Ok(report(&outcome))
}

async fn build(cli: &Cli, fetch_cfg: FetchConfig, build_cfg: BuildConfig) -> Result<BuildOutcome> {
    let client = ArchiveClient::from_config(fetch_cfg).context("http client")?;
    let builder = GraphBuilder::new(client, KustomizationScanner, build_cfg);
    builder
        .build(&cli.node_id, cli.base_url.as_deref())
        .await
        .with_context(|| format!("build graph from {}", cli.node_id))
}

fn report(outcome: &BuildOutcome) -> ExitCode {
    let graph = &outcome.graph;
    for cycle in graph.cycles() {
        warn!(cycle = %cycle.join(" -> "), "dependency cycle");
    }

    if outcome.errors.is_empty() {
        eprintln!(
            "{} {} node(s), {} edge(s)",
            "OK".green().bold(),
            graph.len(),
            graph.edges.len()
        );
        return ExitCode::SUCCESS;
    }

    eprintln!(
        "{} {} of {} node(s) failed",
        "error".red().bold(),
        outcome.errors.len(),
        graph.len()
    );
    for e in &outcome.errors {
        eprintln!("  {} {}", e.node.yellow(), e.failure);
    }
    ExitCode::FAILURE
}
