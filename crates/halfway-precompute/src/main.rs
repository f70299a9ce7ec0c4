//! halfway-precompute: offline builder for the precomputed pair index.
//!
//! For each configured dataset, reads its points file (an ordered JSON
//! array of `{name, lat, lng}` records), computes the midpoint and
//! distance of every unordered pair, buckets the pairs into the global
//! 5° grid, and writes the files the browser consumes at query time:
//!
//! - `points.json` — the ordered input points (index order matters:
//!   pair records reference points by position)
//! - `cell_counts.json` — `{"latBucket_lngBucket": pairCount, ...}`
//! - `cells/<latBucket>_<lngBucket>.json` — one array of
//!   `[indexA, indexB, midLat, midLng, distKm]` tuples per nonempty cell
//!
//! This is a batch job, rerun whenever a dataset changes; the browser
//! never mutates its output.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin halfway-precompute -- <DATASET>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use halfway_geo::grid::{GridConfig, PairIndex};
use halfway_geo::types::LatLng;
use serde::{Deserialize, Serialize};

/// One configured input/output pair.
struct Job {
    name: &'static str,
    /// Points file the index is built from.
    input: &'static str,
    /// Directory the index files are written under.
    output_dir: &'static str,
}

/// The datasets this tool knows how to build.
const JOBS: &[Job] = &[
    Job {
        name: "cities",
        input: "data/cities.json",
        output_dir: "site/pairs/cities",
    },
    Job {
        name: "capitals",
        input: "data/capitals.json",
        output_dir: "site/pairs/capitals",
    },
];

/// Build the precomputed pair index files for a dataset.
#[derive(Parser)]
#[command(name = "halfway-precompute", version)]
struct Cli {
    /// Which configured dataset(s) to build.
    #[arg(value_enum)]
    dataset: Dataset,
}

/// Dataset selector.
#[derive(Clone, Copy, ValueEnum)]
enum Dataset {
    /// The main cities dataset.
    Cities,
    /// National capitals only.
    Capitals,
    /// Every configured dataset.
    All,
}

impl Dataset {
    fn jobs(self) -> Vec<&'static Job> {
        match self {
            Self::Cities => JOBS.iter().filter(|j| j.name == "cities").collect(),
            Self::Capitals => JOBS.iter().filter(|j| j.name == "capitals").collect(),
            Self::All => JOBS.iter().collect(),
        }
    }
}

/// One input point record, echoed verbatim into `points.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PointRecord {
    name: String,
    lat: f64,
    lng: f64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    for job in cli.dataset.jobs() {
        eprintln!("Dataset: {} ({} -> {})", job.name, job.input, job.output_dir);
        if let Err(message) = build_job(job) {
            eprintln!("Error building {}: {message}", job.name);
            return ExitCode::FAILURE;
        }
        eprintln!();
    }

    ExitCode::SUCCESS
}

/// Build and write one dataset's index files.
fn build_job(job: &Job) -> Result<(), String> {
    let started = Instant::now();

    let raw = std::fs::read_to_string(job.input)
        .map_err(|e| format!("reading {}: {e}", job.input))?;
    let records: Vec<PointRecord> =
        serde_json::from_str(&raw).map_err(|e| format!("parsing {}: {e}", job.input))?;
    eprintln!("  {} points read in {:.1?}", records.len(), started.elapsed());

    let positions: Vec<LatLng> = records.iter().map(|r| LatLng::new(r.lat, r.lng)).collect();

    let build_start = Instant::now();
    let config = GridConfig::default();
    let index = PairIndex::build(&positions, &config);
    eprintln!(
        "  {} pairs bucketed into {} cells in {:.1?}",
        index.total_pairs(),
        index.cells().len(),
        build_start.elapsed(),
    );

    let write_start = Instant::now();
    write_index(job.output_dir, &records, &index)?;
    eprintln!(
        "  index written to {} in {:.1?} (total {:.1?})",
        job.output_dir,
        write_start.elapsed(),
        started.elapsed(),
    );
    Ok(())
}

/// Write `points.json`, `cell_counts.json`, and one file per nonempty
/// cell under `cells/`.
fn write_index(output_dir: &str, records: &[PointRecord], index: &PairIndex) -> Result<(), String> {
    let out = Path::new(output_dir);
    let cells_dir = out.join("cells");
    std::fs::create_dir_all(&cells_dir)
        .map_err(|e| format!("creating {}: {e}", cells_dir.display()))?;

    write_json(&out.join("points.json"), records)?;
    write_json(&out.join("cell_counts.json"), &index.counts())?;

    for (key, cell_records) in index.cells() {
        write_json(&cells_dir.join(format!("{key}.json")), cell_records)?;
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), String> {
    let json = serde_json::to_string(value)
        .map_err(|e| format!("serializing {}: {e}", path.display()))?;
    std::fs::write(path, json).map_err(|e| format!("writing {}: {e}", path.display()))
}
