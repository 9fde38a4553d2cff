use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{ArgAction, Parser};
use rayon::prelude::*;
use tracing::{info, warn, Level};

use evrp_ga::plotting::{plot_convergence, plot_solution};
use evrp_ga::stats::{best_trial, write_results, Summary};
use evrp_ga::{check_tour, read_problem, Config, Problem, RunReport, SolverState, Tour};

/// Genetic algorithm for electric vehicle routing instances.
#[derive(Parser)]
#[command(name = "evrp-ga", author, version, about)]
struct Args {
    /// Instance file in the `.evrp` format
    instance: PathBuf,

    /// JSON configuration; missing fields keep their defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of independent trials
    #[arg(short, long)]
    trials: Option<usize>,

    /// Seed of the first trial; trial `k` uses `seed + k`
    #[arg(short, long)]
    seed: Option<u64>,

    /// Output directory, `output-<timestamp>` by default
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Stop every trial after this many generations
    #[arg(short, long)]
    generations: Option<usize>,

    /// Stop every trial after this many seconds
    #[arg(long, value_name = "SECS")]
    time_limit: Option<f64>,

    /// Check every best tour for feasibility before reporting it
    #[arg(long)]
    validate: bool,

    /// Skip the PNG plots
    #[arg(long)]
    no_plots: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

// =================== MAIN FUNCTION ===================

fn main() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let config = load_config(&args)?;
    let problem = read_problem(&args.instance)
        .with_context(|| format!("reading instance {}", args.instance.display()))?;
    println!("Problem: {}", problem.name);
    println!(
        "Customers: {}, Stations: {}, Vehicles: {}, Capacity: {}, Battery: {}",
        problem.num_customers,
        problem.num_stations,
        problem.min_vehicles,
        problem.capacity,
        problem.battery_capacity
    );
    if let Some(optimum) = problem.optimum {
        println!("Optimum: {:.2}", optimum);
    }

    let output_dir = args.output.clone().unwrap_or_else(|| {
        let time = Local::now().format("%m-%d+%H_%M_%S").to_string();
        PathBuf::from(format!("output-{}", time))
    });
    create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    // Trials finish their current generation and report once this is set.
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        println!("\nInterrupted by user. Finishing gracefully...");
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("installing the Ctrl-C handler")?;

    info!(
        trials = config.trials,
        seed = config.seed,
        population = config.parameters.population_size,
        "running genetic algorithm"
    );
    let reports = (0..config.trials)
        .into_par_iter()
        .map(|trial| -> evrp_ga::Result<RunReport> {
            let seed = config.seed + trial as u64;
            let mut state = SolverState::new(&problem, config.parameters.clone(), seed)?;
            let report = state.run(&config.termination, &stop)?;
            info!(
                trial,
                best = report.best_length,
                generations = report.generations,
                "trial finished"
            );
            Ok(report)
        })
        .collect::<evrp_ga::Result<Vec<_>>>()
        .context("running the genetic algorithm")?;

    if args.validate {
        for (trial, report) in reports.iter().enumerate() {
            let mut tour = Tour::new(trial as u64, report.best_tour.clone());
            tour.evaluate(&problem);
            check_tour(&tour, &problem)
                .with_context(|| format!("best tour of trial {} is infeasible", trial))?;
        }
        println!("All best tours are feasible");
    }

    print_results(&problem, &reports);

    let written = write_results(&output_dir, &problem.name, problem.optimum, &reports)
        .context("writing statistics")?;
    for path in written {
        println!("Wrote {}", path.display());
    }

    if !args.no_plots {
        write_plots(&problem, &reports, &output_dir);
    }
    Ok(())
}

/// Reads the configuration file, if any, and applies the command line overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(trials) = args.trials {
        config.trials = trials;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(generations) = args.generations {
        config.termination.max_generations = Some(generations);
    }
    if let Some(limit) = args.time_limit {
        config.termination.time_limit_secs = Some(limit);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

// =================== OUTPUT FUNCTIONS ===================

fn print_results(problem: &Problem, reports: &[RunReport]) {
    println!("\nResults:");
    for (trial, report) in reports.iter().enumerate() {
        println!(
            "Trial {:>3} (seed {}): {:.2} after {} generations, {:.0} evaluations, {:.2}s",
            trial,
            report.seed,
            report.best_length,
            report.generations,
            report.evaluations,
            report.elapsed_secs
        );
    }

    let lengths: Vec<f64> = reports.iter().map(|r| r.best_length).collect();
    if let Some(summary) = Summary::of(&lengths) {
        println!("{}", summary);
    }

    let (Some(optimum), Some(best)) = (problem.optimum, best_trial(reports)) else {
        return;
    };
    let gap = (reports[best].best_length - optimum) / optimum * 100.0;
    println!("Gap to optimum: {:.2}%", gap);
    if gap <= 5.0 {
        println!("Result: EXCELLENT (Within 5% of optimum)");
    } else if gap <= 10.0 {
        println!("Result: GOOD (Within 10% of optimum)");
    } else if gap <= 20.0 {
        println!("Result: ACCEPTABLE (Within 20% of optimum)");
    } else {
        println!("Result: POOR (More than 20% from optimum)");
    }
}

fn write_plots(problem: &Problem, reports: &[RunReport], output_dir: &Path) {
    if let Some(best) = best_trial(reports) {
        let mut tour = Tour::new(best as u64, reports[best].best_tour.clone());
        tour.evaluate(problem);
        let path = output_dir.join(format!("solution.{}.png", problem.name));
        if let Err(e) = plot_solution(problem, &tour, &path) {
            warn!("Error generating solution plot: {}", e);
        }
    }
    let path = output_dir.join(format!("convergence.{}.png", problem.name));
    if let Err(e) = plot_convergence(reports, &path) {
        warn!("Error generating convergence plot: {}", e);
    }
}
