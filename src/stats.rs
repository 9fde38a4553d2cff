//! Per-trial results and the files written at the end of an experiment.
//!
//! * `stats.<instance>.txt`: one line per trial and a summary
//! * `debug.<instance>.csv`: every trace point as `seconds,run,current_best`
//! * `best.<instance>.json`: the best tour over all trials

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::Serialize;

use crate::error::Result;
use crate::solver::RunReport;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; zero for fewer than two values.
pub fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let squares: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (squares / (values.len() - 1) as f64).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        Some(Self {
            mean: mean(values),
            stdev: stdev(values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean {:.2}  stdev {:.2}  min {:.2}  max {:.2}",
            self.mean, self.stdev, self.min, self.max
        )
    }
}

/// Index of the trial with the shortest best tour.
pub fn best_trial(reports: &[RunReport]) -> Option<usize> {
    reports
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.best_length.total_cmp(&b.best_length))
        .map(|(i, _)| i)
}

#[derive(Serialize)]
struct TraceRow {
    seconds: f64,
    run: usize,
    current_best: f64,
}

#[derive(Serialize)]
struct BestTour<'a> {
    instance: &'a str,
    run: usize,
    seed: u64,
    length: f64,
    optimum: Option<f64>,
    tour: &'a [usize],
}

/// Writes the stats, trace and best-tour files for `reports` into `dir`.
pub fn write_results(
    dir: &Path,
    instance: &str,
    optimum: Option<f64>,
    reports: &[RunReport],
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = vec![
        write_stats(dir, instance, optimum, reports)?,
        write_trace(dir, instance, reports)?,
    ];
    if let Some(best) = best_trial(reports) {
        written.push(write_best(dir, instance, optimum, best, &reports[best])?);
    }
    Ok(written)
}

fn write_stats(
    dir: &Path,
    instance: &str,
    optimum: Option<f64>,
    reports: &[RunReport],
) -> Result<PathBuf> {
    let path = dir.join(format!("stats.{}.txt", instance));
    let mut out = BufWriter::new(File::create(&path)?);
    writeln!(out, "instance {}", instance)?;
    if let Some(optimum) = optimum {
        writeln!(out, "optimum {:.6}", optimum)?;
    }
    for (run, report) in reports.iter().enumerate() {
        writeln!(
            out,
            "run {:>3}  seed {:>6}  best {:>12.6}  generations {:>8}  evaluations {:>14.2}  time {:>8.2}s",
            run,
            report.seed,
            report.best_length,
            report.generations,
            report.evaluations,
            report.elapsed_secs
        )?;
    }
    let lengths: Vec<f64> = reports.iter().map(|r| r.best_length).collect();
    if let Some(summary) = Summary::of(&lengths) {
        writeln!(out, "{}", summary)?;
    }
    out.flush()?;
    Ok(path)
}

fn write_trace(dir: &Path, instance: &str, reports: &[RunReport]) -> Result<PathBuf> {
    let path = dir.join(format!("debug.{}.csv", instance));
    let mut writer = WriterBuilder::new().has_headers(true).from_path(&path)?;
    for (run, report) in reports.iter().enumerate() {
        for point in &report.trace {
            writer.serialize(TraceRow {
                seconds: point.seconds,
                run,
                current_best: point.best_length,
            })?;
        }
    }
    writer.flush()?;
    Ok(path)
}

fn write_best(
    dir: &Path,
    instance: &str,
    optimum: Option<f64>,
    run: usize,
    report: &RunReport,
) -> Result<PathBuf> {
    let path = dir.join(format!("best.{}.json", instance));
    let out = BufWriter::new(File::create(&path)?);
    let best = BestTour {
        instance,
        run,
        seed: report.seed,
        length: report.best_length,
        optimum,
        tour: &report.best_tour,
    };
    serde_json::to_writer_pretty(out, &best)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::TracePoint;

    fn report(seed: u64, best_length: f64) -> RunReport {
        RunReport {
            seed,
            generations: 10,
            evaluations: 1234.5,
            elapsed_secs: 0.5,
            best_length,
            best_tour: vec![0, 1, 2, 0],
            trace: vec![
                TracePoint {
                    seconds: 0.0,
                    best_length: best_length + 5.0,
                },
                TracePoint {
                    seconds: 0.25,
                    best_length,
                },
            ],
        }
    }

    #[test]
    fn known_statistics() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert!((stdev(&values) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        let summary = Summary::of(&values).unwrap();
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 9.0);
        assert_eq!(stdev(&[3.0]), 0.0);
        assert!(Summary::of(&[]).is_none());
    }

    #[test]
    fn picks_shortest_trial() {
        let reports = [report(1, 30.0), report(2, 10.0), report(3, 20.0)];
        assert_eq!(best_trial(&reports), Some(1));
        assert_eq!(best_trial(&[]), None);
    }

    #[test]
    fn writes_result_files() {
        let dir = std::env::temp_dir().join(format!("evrp-ga-stats-{}", std::process::id()));
        let reports = [report(1, 30.0), report(2, 10.0)];
        let written = write_results(&dir, "tiny", Some(9.5), &reports).unwrap();
        assert_eq!(written.len(), 3);

        let stats = fs::read_to_string(dir.join("stats.tiny.txt")).unwrap();
        assert_eq!(stats.lines().filter(|l| l.starts_with("run")).count(), 2);
        assert!(stats.contains("mean 20.00"));

        let trace = fs::read_to_string(dir.join("debug.tiny.csv")).unwrap();
        let mut lines = trace.lines();
        assert_eq!(lines.next(), Some("seconds,run,current_best"));
        assert_eq!(lines.count(), 4);

        let best: serde_json::Value =
            serde_json::from_reader(File::open(dir.join("best.tiny.json")).unwrap()).unwrap();
        assert_eq!(best["run"], 1);
        assert_eq!(best["length"], 10.0);

        fs::remove_dir_all(&dir).unwrap();
    }
}
