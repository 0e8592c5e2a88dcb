use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tireprof_core::{CancelToken, PointSet, Profile, Pt3, Real};
use tireprof_pipeline::{run_profile_with, ProfileReport, ProfilerConfig};

/// Tire tread profile extraction from 3D scans.
#[derive(Debug, Parser)]
#[command(author, version, about = "Tire scan to tread profile pipeline")]
struct Args {
    /// Scan JSON: `{"points": [[x, y, z], ...]}`.
    #[arg(long, conflicts_with = "batch", requires = "rim_json")]
    input: Option<PathBuf>,

    /// Rim picks JSON in the same format as the scan.
    #[arg(long)]
    rim_json: Option<PathBuf>,

    /// Process every `<stem>.json` scan in DIR with its `<stem>.rim.json` picks.
    #[arg(long, value_name = "DIR")]
    batch: Option<PathBuf>,

    /// Optional ProfilerConfig JSON. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    tape_width: Option<Real>,

    #[arg(long)]
    ransac_thresh: Option<Real>,

    #[arg(long)]
    outer_band: Option<Real>,

    #[arg(long)]
    nbins: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Voxel edge for downsampling the scan before fitting.
    #[arg(long)]
    voxel: Option<Real>,

    /// Output directory; a `<stem>/` folder with report.json and profile.csv
    /// is written per scan. Without it the report is printed to stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Abandon a scan whose cylinder search runs longer than this.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// On-disk point list, shared by scans and rim picks.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PointFile {
    points: Vec<Pt3>,
}

#[derive(Debug, Clone)]
struct ScanJob {
    stem: String,
    scan: PathBuf,
    rim: PathBuf,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// File config with CLI flags layered on top.
fn resolve_config(args: &Args) -> Result<ProfilerConfig> {
    let mut config = match &args.config {
        Some(path) => load_json_file::<ProfilerConfig>(path)?,
        None => ProfilerConfig::default(),
    };
    if let Some(v) = args.tape_width {
        config.tape_width = v;
    }
    if let Some(v) = args.ransac_thresh {
        config.ransac_threshold = v;
    }
    if let Some(v) = args.outer_band {
        config.outer_band = v;
    }
    if let Some(v) = args.nbins {
        config.nbins = v;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.voxel.is_some() {
        config.voxel = args.voxel;
    }
    config.validate()?;
    Ok(config)
}

fn load_scan(job: &ScanJob, config: &ProfilerConfig) -> Result<(PointSet, Vec<Pt3>)> {
    let scan: PointFile = load_json_file(&job.scan)?;
    let rim: PointFile = load_json_file(&job.rim)?;
    let mut points = PointSet::new(scan.points);
    if let Some(voxel) = config.voxel {
        points = points.voxel_downsample(voxel);
    }
    info!(
        "{}: {} scan points, {} rim points",
        job.stem,
        points.len(),
        rim.points.len()
    );
    Ok((points, rim.points))
}

/// Run one scan, cancelling the cylinder search after `timeout`.
fn run_job(
    job: &ScanJob,
    config: &ProfilerConfig,
    timeout: Option<Duration>,
) -> Result<ProfileReport> {
    let (points, rim) = load_scan(job, config)?;
    let cancel = CancelToken::new();

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let watchdog = timeout.map(|limit| {
        let token = cancel.clone();
        thread::spawn(move || {
            if let Err(mpsc::RecvTimeoutError::Timeout) = done_rx.recv_timeout(limit) {
                token.cancel();
            }
        })
    });

    let result = run_profile_with(&points, &rim, config, Some(&cancel));
    drop(done_tx);
    if let Some(handle) = watchdog {
        join_watchdog(&job.stem, handle);
    }
    result.with_context(|| format!("profiling {}", job.stem))
}

/// `false` if the watchdog thread panicked; the job result stands either way.
fn join_watchdog(stem: &str, handle: thread::JoinHandle<()>) -> bool {
    let clean = handle.join().is_ok();
    if !clean {
        warn!("{stem}: timeout watchdog panicked");
    }
    clean
}

fn profile_csv(profile: &Profile) -> String {
    let cell = |v: Option<Real>| v.map(|v| v.to_string()).unwrap_or_default();
    let mut out = String::from("x_center,z_prime,z_std,delta_r_mean,samples\n");
    for bin in &profile.bins {
        let _ = writeln!(
            out,
            "{},{},{},{},{}",
            bin.x_center,
            cell(bin.z_prime),
            cell(bin.z_std),
            cell(bin.delta_r_mean),
            bin.sample_count
        );
    }
    out
}

fn write_outputs(out_dir: &Path, stem: &str, report: &ProfileReport) -> Result<PathBuf> {
    let dir = out_dir.join(stem);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    fs::write(dir.join("report.json"), serde_json::to_string_pretty(report)?)
        .with_context(|| format!("writing report in {}", dir.display()))?;
    fs::write(dir.join("profile.csv"), profile_csv(&report.profile))
        .with_context(|| format!("writing profile in {}", dir.display()))?;
    Ok(dir)
}

/// Scans in `dir`, sorted by name. Rim files are paired by stem.
fn discover_batch(dir: &Path) -> Result<Vec<ScanJob>> {
    let mut jobs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".json") || name.ends_with(".rim.json") {
            continue;
        }
        let stem = name.trim_end_matches(".json").to_string();
        let rim = dir.join(format!("{stem}.rim.json"));
        jobs.push(ScanJob {
            stem,
            scan: path,
            rim,
        });
    }
    jobs.sort_by(|a, b| a.stem.cmp(&b.stem));
    Ok(jobs)
}

fn run_batch(args: &Args, dir: &Path, config: &ProfilerConfig) -> Result<()> {
    let jobs = discover_batch(dir)?;
    if jobs.is_empty() {
        bail!("no scans found in {}", dir.display());
    }
    let timeout = args.timeout_secs.map(Duration::from_secs);
    let out_dir = args.out.clone().unwrap_or_else(|| dir.join("out"));

    let results: Vec<(String, Result<PathBuf>)> = jobs
        .par_iter()
        .map(|job| {
            let result = run_job(job, config, timeout)
                .and_then(|report| write_outputs(&out_dir, &job.stem, &report));
            (job.stem.clone(), result)
        })
        .collect();

    let mut failed = 0usize;
    for (stem, result) in &results {
        match result {
            Ok(path) => info!("{stem}: wrote {}", path.display()),
            Err(err) => {
                failed += 1;
                error!("{stem}: {err:#}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} scans failed", results.len());
    }
    Ok(())
}

fn run_single(args: &Args, scan: &Path, config: &ProfilerConfig) -> Result<()> {
    let Some(rim) = &args.rim_json else {
        bail!("--rim-json is required with --input");
    };
    let stem = scan
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scan")
        .to_string();
    let job = ScanJob {
        stem,
        scan: scan.to_path_buf(),
        rim: rim.clone(),
    };
    let report = run_job(&job, config, args.timeout_secs.map(Duration::from_secs))?;
    match &args.out {
        Some(out) => {
            let dir = write_outputs(out, &job.stem, &report)?;
            info!("wrote {}", dir.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;
    match (&args.batch, &args.input) {
        (Some(dir), _) => run_batch(&args, dir, &config),
        (None, Some(scan)) => run_single(&args, scan, &config),
        (None, None) => bail!("either --input or --batch is required"),
    }
}
