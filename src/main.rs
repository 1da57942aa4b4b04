use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

use spectro_tiles::{batches, discover, load_tiles, Config, Renderer, Tile};

/// Inspect and exercise the spectrogram tile pipeline.
#[derive(Parser, Debug)]
#[command(name = "spectro-tiles")]
#[command(about = "Stream spectrogram tiles from audio files for language-ID training")]
struct Args {
    /// Training config (YAML or JSON)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List the audio files a generator would cycle through
    Files {
        /// Directory or single file (default: train_data_dir from the config)
        source: Option<PathBuf>,
    },

    /// Pull tiles from a generator and report what came out
    Stream {
        /// Directory or single file (default: train_data_dir from the config)
        source: Option<PathBuf>,

        /// Reshuffle the file order after every pass
        #[arg(long)]
        shuffle: bool,

        /// Stop after one pass over the files
        #[arg(long)]
        once: bool,

        /// Stop after this many tiles
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Render on a worker thread ahead of consumption
        #[arg(long)]
        buffered: bool,

        /// Write every tile as a PNG into this directory
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Render every file once and write a per-file CSV report
    Scan {
        /// Directory or single file (default: train_data_dir from the config)
        source: Option<PathBuf>,

        /// CSV output path (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    match args.command {
        Cmd::Files { source } => {
            let source = resolve_source(&config, source)?;
            let files = discover(&source)?;
            for file in &files {
                println!("{}", file.display());
            }
            eprintln!("{} files", files.len());
        }
        Cmd::Stream {
            source,
            shuffle,
            once,
            limit,
            buffered,
            export,
        } => {
            if !once && limit.is_none() {
                bail!("an endless stream needs --once or --limit");
            }
            let source = resolve_source(&config, source)?;
            let generator = config.generator(&source, shuffle, once)?;
            let tiles: Box<dyn Iterator<Item = Tile>> = if buffered {
                Box::new(generator.into_buffered().context("starting tile producer")?)
            } else {
                Box::new(generator)
            };
            let tiles = tiles.take(limit.unwrap_or(usize::MAX));
            stream(tiles, config.batch_size, export.as_deref())?;
        }
        Cmd::Scan { source, output } => {
            let source = resolve_source(&config, source)?;
            scan(&config, &source, output.as_deref())?;
        }
    }

    Ok(())
}

fn resolve_source(config: &Config, source: Option<PathBuf>) -> Result<PathBuf> {
    source
        .or_else(|| config.train_data_dir.clone())
        .context("no source given and config has no train_data_dir")
}

// ---------------------------------------------------------------------------
// stream
// ---------------------------------------------------------------------------

fn stream(tiles: impl Iterator<Item = Tile>, batch_size: usize, export: Option<&Path>) -> Result<()> {
    if let Some(dir) = export {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut exported = 0usize;
    let exporting = tiles.inspect(|tile| {
        if let Some(dir) = export {
            let path = dir.join(format!("tile-{exported:06}.png"));
            match write_tile(tile, &path) {
                Ok(()) => exported += 1,
                Err(e) => log::warn!("{e:#}"),
            }
        }
    });

    let mut tile_count = 0usize;
    let mut batch_count = 0usize;
    for batch in batches(exporting, batch_size)? {
        let batch = batch?;
        tile_count += batch.len_of(ndarray::Axis(0));
        batch_count += 1;
        info!("batch {batch_count}: {:?}", batch.shape());
    }

    println!("{tile_count} tiles in {batch_count} batches of up to {batch_size}");
    Ok(())
}

fn write_tile(tile: &Tile, path: &Path) -> Result<()> {
    let (height, width, _) = tile.dim();
    let image = image::GrayImage::from_raw(width as u32, height as u32, tile.iter().copied().collect())
        .context("tile buffer does not match its shape")?;
    image
        .save(path)
        .with_context(|| format!("writing {}", path.display()))
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct FileReport {
    path: String,
    status: &'static str,
    tiles: usize,
    discarded: usize,
    error: String,
}

fn scan(config: &Config, source: &Path, output: Option<&Path>) -> Result<()> {
    let files = discover(source)?;
    let renderer = config.sox_renderer();

    let sink: Box<dyn std::io::Write> = match output {
        Some(path) => Box::new(
            std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(sink);

    let mut failed = 0usize;
    for file in &files {
        let report = scan_file(&renderer, config, file);
        if report.status == "failed" {
            failed += 1;
        }
        writer.serialize(&report).context("writing CSV report")?;
    }
    writer.flush().context("flushing CSV report")?;

    info!("scanned {} files, {failed} failed", files.len());
    Ok(())
}

fn scan_file(renderer: &impl Renderer, config: &Config, file: &Path) -> FileReport {
    let path = file.display().to_string();
    match load_tiles(renderer, file, config.pixel_per_second, config.tile_shape()) {
        Ok(mut tiles) => {
            let kept = tiles.by_ref().count();
            FileReport {
                path,
                status: if kept == 0 { "empty" } else { "ok" },
                tiles: kept,
                discarded: tiles.discarded(),
                error: String::new(),
            }
        }
        Err(err) => FileReport {
            path,
            status: "failed",
            tiles: 0,
            discarded: 0,
            error: err.to_string(),
        },
    }
}
