use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use prism_core::{
    CancelToken, ChannelPair, EngineConfig, ProjectionMethod, Wavelength,
    build_dataset_with_cancel, export_correlations_json, export_dataset_json,
};
use prism_core::time::unix_millis_to_iso8601;
use prism_store::{Workspace, default_base_dir, load_config};

#[derive(Parser)]
#[command(name = "prism", about = "Multi-channel correlation and manifold projection engine")]
struct Cli {
    /// Workspace to operate on
    #[arg(long, global = true, default_value = "default")]
    workspace: String,

    /// Config file (defaults to <data dir>/prism.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import session export JSON files
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Import channel payload JSON files
    Channel {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Project every stored constraint into the 3D manifold
    Build {
        /// pca, umap or tsne (overrides the config)
        #[arg(long)]
        method: Option<String>,

        /// Print the full dataset as JSON
        #[arg(long)]
        json: bool,

        /// Stop UMAP/t-SNE iterations after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Correlate two channels' payloads
    Correlate {
        primary: Wavelength,
        secondary: Wavelength,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export stored sessions to a JSON file
    Export { path: PathBuf },

    /// Show workspace statistics
    Stats,

    /// Delete all sessions and channel payloads in the workspace
    Clear,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn open_workspace(cli: &Cli) -> Result<Workspace> {
    Workspace::open(&cli.workspace, &default_base_dir()).context("failed to open workspace")
}

fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    load_config(cli.config.as_deref(), &default_base_dir()).context("failed to load config")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Import { files } => cmd_import(&cli, files),
        Commands::Channel { files } => cmd_channel(&cli, files),
        Commands::Build {
            method,
            json,
            timeout_ms,
        } => cmd_build(&cli, method.as_deref(), *json, *timeout_ms),
        Commands::Correlate {
            primary,
            secondary,
            json,
        } => cmd_correlate(&cli, ChannelPair::new(*primary, *secondary), *json),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Stats => cmd_stats(&cli),
        Commands::Clear => cmd_clear(&cli),
    }
}

fn cmd_import(cli: &Cli, files: &[PathBuf]) -> Result<()> {
    let ws = open_workspace(cli)?;
    let mut total = 0;
    for path in files {
        let n = ws
            .store()
            .import_sessions_file(path)
            .with_context(|| format!("failed to import {}", path.display()))?;
        println!("imported {n} session(s) from {}", path.display());
        total += n;
    }
    println!("done. sessions imported: {total}");
    Ok(())
}

fn cmd_channel(cli: &Cli, files: &[PathBuf]) -> Result<()> {
    let ws = open_workspace(cli)?;
    for path in files {
        let n = ws
            .store()
            .import_channel_file(path)
            .with_context(|| format!("failed to import {}", path.display()))?;
        println!("stored {n} channel payload(s) from {}", path.display());
    }
    Ok(())
}

fn cmd_build(cli: &Cli, method: Option<&str>, json: bool, timeout_ms: Option<u64>) -> Result<()> {
    let ws = open_workspace(cli)?;
    let mut config = engine_config(cli)?;
    if let Some(name) = method {
        // unknown names parse to Unsupported and take the raw-dimension fallback
        config.projection.method = name.parse::<ProjectionMethod>().unwrap_or_default();
    }

    let sessions = ws.sessions().context("failed to load sessions")?;
    let cancel = match timeout_ms {
        Some(ms) => CancelToken::with_timeout(Duration::from_millis(ms)),
        None => CancelToken::new(),
    };
    let dataset = build_dataset_with_cancel(&sessions, &config.projection, &cancel);

    if json {
        println!(
            "{}",
            export_dataset_json(&dataset).context("failed to serialize dataset")?
        );
        return Ok(());
    }

    let stats = &dataset.statistics;
    println!("method:      {}", stats.method);
    println!("sessions:    {}", stats.session_count);
    println!("points:      {}", stats.total_unique_constraints);
    println!("health:      {:.3}", stats.overall_health);
    println!("severity:    {:.3}", stats.average_severity);
    println!("confidence:  {:.3}", stats.projection_confidence);
    let variance: Vec<String> = stats
        .explained_variance
        .iter()
        .map(|v| format!("{v:.3}"))
        .collect();
    println!("variance:    [{}]", variance.join(", "));
    for (channel, count) in &stats.by_channel {
        println!("  {:<14} {count}", channel.as_str());
    }
    Ok(())
}

fn cmd_correlate(cli: &Cli, pair: ChannelPair, json: bool) -> Result<()> {
    let ws = open_workspace(cli)?;
    let config = engine_config(cli)?;
    let mut engine = ws.engine(&config).context("failed to load channel payloads")?;

    let Some(result) = engine.get_correlation(pair) else {
        let missing: Vec<&str> = [pair.primary, pair.secondary]
            .into_iter()
            .filter(|c| engine.channel_data(*c).is_none())
            .map(|c| c.as_str())
            .collect();
        bail!("no channel data for {}", missing.join(", "));
    };

    if json {
        println!(
            "{}",
            export_correlations_json(std::slice::from_ref(&result))
                .context("failed to serialize correlation")?
        );
        return Ok(());
    }

    println!("pair:        {}", result.pair);
    println!("samples:     {}", result.sample_count);
    println!("pearson:     {:.4}", result.correlation);
    println!("spearman:    {:.4}", result.rank_correlation);
    println!("p-value:     {:.4}", result.significance);
    println!("mutual info: {:.4}", result.mutual_information);
    println!(
        "transfer:    {:.4} -> / {:.4} <-",
        result.transfer_entropy.forward, result.transfer_entropy.reverse
    );
    println!("patterns:    {}", result.patterns.len());
    for p in &result.patterns {
        println!("  [{}] {} ({:.2}) {}", p.pattern_type, p.id, p.strength, p.description);
    }
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let ws = open_workspace(cli)?;
    ws.store()
        .export_sessions_file(path)
        .context("failed to export sessions")?;
    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let ws = open_workspace(cli)?;
    let config = engine_config(cli)?;
    let counts = ws.store().stats().context("failed to count rows")?;

    let payloads = ws
        .store()
        .load_channel_data()
        .context("failed to load channel payloads")?;
    let mut engine = ws.engine(&config).context("failed to load channel payloads")?;
    engine.get_configured_correlations();
    let engine_stats = engine.get_statistics();

    println!("workspace:   {}", ws.name());
    println!("sessions:    {}", counts.sessions);
    println!("constraints: {}", counts.constraints);
    println!("channels:    {}", counts.channels);
    for payload in &payloads {
        let sizes: Vec<String> = payload
            .summary()
            .iter()
            .map(|(name, n)| format!("{name}={n}"))
            .collect();
        println!("  {} {}", payload.wavelength().as_str(), sizes.join(" "));
    }
    let latest = ws
        .sessions()
        .context("failed to load sessions")?
        .iter()
        .map(|s| s.timestamp)
        .max()
        .filter(|&t| t > 0);
    if let Some(t) = latest {
        println!("latest:      {}", unix_millis_to_iso8601(t));
    }
    println!("correlated:  {}", engine_stats.cache_size);
    println!("patterns:    {}", engine_stats.total_patterns);
    if let Some(pair) = engine_stats.strongest_pair {
        println!(
            "strongest:   {pair} ({:.4})",
            engine_stats.strongest_correlation
        );
    }
    Ok(())
}

fn cmd_clear(cli: &Cli) -> Result<()> {
    let ws = open_workspace(cli)?;
    ws.store().clear().context("failed to clear workspace")?;
    println!("cleared workspace {}", ws.name());
    Ok(())
}
