mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use sg_av::{DurationProber, ToolRegistry};
use sg_pipeline::{CancellationToken, IngestPipeline, Lyrics, StoredArtifact, UploadRequest};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "songforged=trace,sg_pipeline=trace,sg_av=trace,sg_core=debug".to_string()
        } else {
            "songforged=info,sg_pipeline=info,sg_av=warn,sg_core=info".to_string()
        }
    });

    // Logs go to stderr so `--json` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ingest {
            file,
            artist,
            title,
            lyrics,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(ingest_file(
                &file,
                artist,
                title,
                lyrics.as_deref(),
                json,
                cli.config.as_deref(),
            ))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("songforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn ingest_file(
    file: &Path,
    artist: String,
    title: String,
    lyrics: Option<&Path>,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !file.exists() {
        anyhow::bail!("Input file does not exist: {:?}", file);
    }

    let tools = ToolRegistry::discover(&config.tools);
    let pipeline = IngestPipeline::from_config(&config, &tools)
        .context("Failed to set up ingest pipeline")?;

    let mut request = UploadRequest::from_file(file, artist, title);
    if let Some(path) = lyrics {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lyrics file: {:?}", path))?;
        let is_vtt = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("vtt"));
        request = request.with_lyrics(if is_vtt {
            Lyrics::vtt(text)
        } else {
            Lyrics::lrc(text)
        });
    }

    // Ctrl-C cancels the run; scratch files are still cleaned up.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling ingest");
            on_signal.cancel();
        }
    });

    let artifact = pipeline.ingest_with_cancel(request, &cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
    } else {
        print_artifact(&artifact, &config.media.root);
    }

    Ok(())
}

fn print_artifact(artifact: &StoredArtifact, root: &Path) {
    println!("Stored: {}", root.join(&artifact.relative_path).display());
    println!("URL: {}", artifact.url);
    println!("Name: {}", artifact.display_name);
    println!("Container: {} ({:?})", artifact.container, artifact.transcode);
    if artifact.duration.is_approximate() {
        println!("Duration: {} - re-probe once ffprobe is available", artifact.duration);
    } else {
        println!("Duration: {}", artifact.duration);
    }
    println!("Size: {} bytes", artifact.size);
    if let Some(ref lyrics) = artifact.lyrics_path {
        println!("Lyrics: {}", root.join(lyrics).display());
    }
    for warning in &artifact.warnings {
        println!("Warning: {:?}", warning);
    }
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let tools = ToolRegistry::discover(&config.tools);
    let prober = DurationProber::new(&tools, &config.probe);
    let size = std::fs::metadata(file).ok().map(|m| m.len());
    let duration = prober.probe(file, size).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&duration)?);
    } else {
        println!("File: {}", file.display());
        if let Some(size) = size {
            println!("Size: {} bytes", size);
        }
        println!("Duration: {}", duration);
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Durations will be estimated and uploads stored unconverted.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let (config, source) = match config::find_config(path) {
        Some(p) => {
            println!("Validating config: {:?}", p);
            (config::load_config(&p)?, p.display().to_string())
        }
        None => {
            println!("No config file found, using defaults");
            (config::Config::default(), "defaults".to_string())
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid ({})", source);
    } else {
        println!("Configuration loaded with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  ! {}", warning);
        }
    }
    println!("  Media root: {}", config.media.root.display());
    println!("  Audio subdir: {}", config.media.audio_subdir.display());
    println!("  Media URL: {}", config.media.media_url);
    println!("  Scratch dir: {}", config.scratch.dir().display());
    println!(
        "  Probe: timeout {}s, {} bytes/s, default {}s",
        config.probe.timeout_secs, config.probe.bytes_per_second, config.probe.default_duration_secs
    );
    println!(
        "  Transcode: {} @ {}, timeout {}s",
        config.transcode.codec, config.transcode.bitrate, config.transcode.timeout_secs
    );

    Ok(())
}
