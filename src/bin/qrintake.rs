use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use qr_intake::config::{ScanConfig, UploadConfig};
use qr_intake::progress::{CancelToken, LogProgress};
use qr_intake::tools::load_rgb;
use qr_intake::upload::{DirectoryStore, UploadCoordinator, UploadSink, describe_subject};
use qr_intake::watch::HotFolder;
use qr_intake::{BatchScanner, Group, QrDecoder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "qrintake", version, about = "Group event photos by QR separator cards")]
struct Cli {
    /// JSON scan configuration (defaults and QR_INTAKE_* variables otherwise)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the decode ladder on a single image
    Decode {
        #[arg(long)]
        image: PathBuf,
    },
    /// Scan files or folders and print the resulting groups
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Scan, group and copy each group into a directory store
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        upload_separators: bool,
    },
    /// Forward new files from a hot folder to a store as unassigned
    Watch {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 30)]
        buffer_secs: u64,
        #[arg(long, default_value_t = 2000)]
        interval_ms: u64,
    },
}

#[derive(Serialize)]
struct GroupSummary {
    subject: String,
    attendee_id: Option<String>,
    anchor: Option<String>,
    members: Vec<String>,
}

impl From<&Group> for GroupSummary {
    fn from(group: &Group) -> Self {
        Self {
            subject: group.subject().label().to_string(),
            attendee_id: group.subject().attendee_id().map(str::to_string),
            anchor: group.anchor().map(|r| r.source().display().to_string()),
            members: group
                .members()
                .iter()
                .map(|r| r.source().display().to_string())
                .collect(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Decode { image } => decode_cmd(&image, &config),
        Command::Scan { paths, json } => scan_cmd(&paths, config, json),
        Command::Upload {
            paths,
            out,
            upload_separators,
        } => upload_cmd(&paths, config, &out, upload_separators),
        Command::Watch {
            dir,
            out,
            buffer_secs,
            interval_ms,
        } => watch_cmd(
            &dir,
            &out,
            Duration::from_secs(buffer_secs),
            Duration::from_millis(interval_ms),
        ),
    }
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    let config = match path {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    Ok(config.with_env_overrides().validated())
}

fn scan_groups(paths: &[PathBuf], config: ScanConfig) -> Result<Vec<Group>> {
    let scanner = BatchScanner::new(config)?.with_progress(Arc::new(LogProgress));
    let report = scanner.scan_paths(paths)?;
    let t = &report.telemetry;
    log::info!(
        "separators: {} (native {}, resampled {}, contrast {}, full-res {}); undecodable: {}; mtime fallbacks: {}",
        t.separators,
        t.native_hits,
        t.resampled_hits,
        t.contrast_hits,
        t.full_resolution_hits,
        t.raster_failures,
        t.metadata_fallbacks
    );
    Ok(report.into_groups())
}

fn decode_cmd(image: &Path, config: &ScanConfig) -> Result<()> {
    let raster = load_rgb(image).with_context(|| format!("failed to load {}", image.display()))?;
    let (width, height) = raster.dimensions();
    println!("Image: {} ({}x{})", image.display(), width, height);

    let start = Instant::now();
    match QrDecoder::new(config).decode(&raster) {
        Some(hit) => {
            println!("Separator via {} strategy in {:.2?}", hit.strategy, start.elapsed());
            println!("  payload: {}", hit.payload);
        }
        None => println!("No QR code found ({:.2?})", start.elapsed()),
    }
    Ok(())
}

fn scan_cmd(paths: &[PathBuf], config: ScanConfig, json: bool) -> Result<()> {
    let groups = scan_groups(paths, config)?;

    if json {
        let summary: Vec<GroupSummary> = groups.iter().map(GroupSummary::from).collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{} groups", groups.len());
    for (i, group) in groups.iter().enumerate() {
        println!(
            "  Group {}: {} ({} photos)",
            i,
            describe_subject(group.subject()),
            group.members().len()
        );
        if let Some(anchor) = group.anchor() {
            println!("    separator: {}", anchor.source().display());
        }
        for member in group.members() {
            println!("    {}", member.source().display());
        }
    }
    Ok(())
}

fn upload_cmd(
    paths: &[PathBuf],
    config: ScanConfig,
    out: &Path,
    upload_separators: bool,
) -> Result<()> {
    let groups = scan_groups(paths, config)?;
    let coordinator = UploadCoordinator::with_config(
        DirectoryStore::new(out),
        UploadConfig { upload_separators },
    );

    let mut failed = 0;
    for group in &groups {
        let submission = coordinator.submit_group(group);
        println!(
            "{}: {}/{} uploaded",
            describe_subject(group.subject()),
            submission.succeeded(),
            submission.outcomes.len()
        );
        for failure in submission.failures() {
            failed += 1;
            if let Err(err) = &failure.result {
                eprintln!("  {}: {}", failure.source.display(), err);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} uploads failed");
    }
    Ok(())
}

fn watch_cmd(dir: &Path, out: &Path, buffer: Duration, interval: Duration) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let store = DirectoryStore::new(out);
    let mut folder = HotFolder::new(dir, buffer);

    folder
        .run(interval, &CancelToken::new(), |path| {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let result = std::fs::read(&path)
                .map_err(anyhow::Error::from)
                .and_then(|bytes| Ok(store.upload(&bytes, &file_name, None)?));
            match result {
                Ok(receipt) => log::info!("forwarded {file_name} -> {}", receipt.storage_url),
                Err(err) => log::warn!("{}: forward failed ({err:#})", path.display()),
            }
        })
        .with_context(|| format!("watching {} failed", dir.display()))
}
