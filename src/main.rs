mod cli;

use hdspush::{
    config::{self, Config, SinkKind},
    pipeline::Pipeline,
    upload, watch,
};
use hdspush_f4v::{
    live_edge_from_bytes, parse_file, F4vBox, HdsSegmentSplitter, LiveEdgeMode,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbosity flags
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hdspush=trace,hdspush_f4v=debug".to_string()
        } else if cli.quiet {
            "warn".to_string()
        } else {
            "hdspush=info,hdspush_f4v=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_thread_names(true)
        .init();

    match cli.command {
        Commands::Watch {
            sources,
            destination,
            url,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            config::apply_overrides(&mut config, sources, destination, url);
            config::validate_config(&config)?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_watch(config))
        }
        Commands::Split {
            files,
            destination,
            force_overwrite,
        } => split_files(&files, &destination, force_overwrite),
        Commands::Inspect { file, json } => inspect_file(&file, json),
        Commands::LiveEdge {
            bootstrap,
            whole_seconds,
        } => {
            let mode = if whole_seconds {
                LiveEdgeMode::WholeSeconds
            } else {
                LiveEdgeMode::Exact
            };
            print_live_edge(&bootstrap, mode)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hdspush {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_watch(config: Config) -> Result<()> {
    let sink = upload::create_sink(&config.upload)?;
    tracing::info!("Starting hdspush, uploading to {}", sink.describe());

    let cancel = CancellationToken::new();
    let pipeline = Pipeline::new(config.pipeline.clone(), config.upload.prefix.clone(), sink);
    let handle = pipeline.start(cancel.clone());

    let mut watcher = watch::FileWatcher::new(config.watch.clone());
    let watch_task = watcher.start(handle.sender(), cancel.clone())?;

    shutdown_signal(cancel.clone()).await;

    tracing::info!("Shutting down...");
    cancel.cancel();
    watcher.stop();
    if let Err(e) = watch_task.await {
        tracing::error!("Watcher task failed: {}", e);
    }
    handle.join().await;

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }
}

fn split_files(files: &[PathBuf], destination: &Path, force_overwrite: bool) -> Result<()> {
    let mut failures = 0usize;

    for file in files {
        let _span = tracing::info_span!("split", file = %file.display()).entered();

        let result = HdsSegmentSplitter::new(file, None)
            .and_then(|splitter| splitter.write_fragments(destination, force_overwrite));

        match result {
            Ok(summary) => {
                println!(
                    "{}: {} written, {} skipped",
                    file.display(),
                    summary.written,
                    summary.skipped
                );
            }
            Err(e) => {
                tracing::warn!("Problem while splitting: {}", e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} files could not be split", failures, files.len());
    }
    Ok(())
}

fn inspect_file(file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let boxes = parse_file(file)
        .with_context(|| format!("Failed to open {:?}", file))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to decode {:?}", file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&boxes)?);
        return Ok(());
    }

    let mut offset = 0u64;
    for decoded in &boxes {
        println!("[{:>10}] {} ({} bytes)", offset, decoded.box_type(), decoded.total_size());
        offset += decoded.total_size();

        match decoded {
            F4vBox::Bootstrap(abst) => {
                println!(
                    "    version {}, profile {}, live {}, update {}",
                    abst.version, abst.profile, abst.live, abst.update
                );
                match abst.current_media_time.to_datetime() {
                    Some(at) => println!("    current media time: {} ({})", abst.current_media_time.ticks, at),
                    None => println!("    current media time: {}", abst.current_media_time.ticks),
                }
                if let Some(ref movie) = abst.movie_identifier {
                    println!("    movie: {}", movie);
                }
                for table in &abst.segments {
                    println!("    segment runs: {}", table.entries.len());
                    for entry in &table.entries {
                        println!(
                            "      first segment {}, {} fragments/segment",
                            entry.first_segment, entry.fragments_per_segment
                        );
                    }
                }
                for table in &abst.fragment_tables {
                    println!("    fragment runs (time scale {}): {}", table.time_scale, table.entries.len());
                    for entry in &table.entries {
                        print!(
                            "      first fragment {}, timestamp {}, duration {}",
                            entry.first_fragment,
                            entry.first_fragment_timestamp.ticks,
                            entry.fragment_duration
                        );
                        if let Some(indicator) = entry.discontinuity_indicator {
                            print!(", discontinuity {}", indicator);
                        }
                        println!();
                    }
                }
            }
            F4vBox::RandomAccess(afra) => {
                println!(
                    "    time scale {}, {} local entries, {} global entries",
                    afra.time_scale,
                    afra.local_entries.len(),
                    afra.global_entries.len()
                );
                for entry in &afra.global_entries {
                    println!(
                        "      Seg{}-Frag{} at offset {}",
                        entry.segment_number, entry.fragment_number, entry.afra_offset
                    );
                }
            }
            F4vBox::MediaData(_) | F4vBox::Unimplemented(_) => {}
        }
    }

    Ok(())
}

fn print_live_edge(bootstrap: &Path, mode: LiveEdgeMode) -> Result<()> {
    let data = std::fs::read(bootstrap)
        .with_context(|| format!("Failed to read bootstrap file: {:?}", bootstrap))?;
    let edge = live_edge_from_bytes(data, mode)
        .with_context(|| format!("Failed to resolve live edge of {:?}", bootstrap))?;

    println!("{}", edge);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, searching default locations");
            config::load_config_or_default(None)?
        }
    };
    config::validate_config(&config)?;

    println!("✓ Configuration is valid");
    println!("  Watch paths: {}", config.watch.paths.len());
    println!("  Extensions: {}", config.watch.extensions.join(", "));
    println!(
        "  Workers: {} file, {} upload",
        config.pipeline.file_workers, config.pipeline.upload_workers
    );
    match config.upload.kind {
        SinkKind::Directory => println!(
            "  Sink: directory {}",
            config
                .upload
                .destination
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ),
        SinkKind::Http => println!(
            "  Sink: http {}",
            config.upload.base_url.as_deref().unwrap_or_default()
        ),
    }
    println!("  Prefix: {}", config.upload.prefix);

    Ok(())
}
