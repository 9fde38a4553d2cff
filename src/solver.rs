use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Parameters, Termination};
use crate::error::Result;
use crate::ga::{recombine, select_by_tournament, Mutations};
use crate::models::{Evaluations, NodeId, Problem, RouteSet, Tour, TourIds};
use crate::population::{greedy_population, sequential_tour};
use crate::routes::{close, open};

/// A new best length and when it was found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TracePoint {
    /// Seconds since the solver started, rounded to hundredths.
    pub seconds: f64,
    pub best_length: f64,
}

/// Outcome of one solver run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub seed: u64,
    pub generations: usize,
    pub evaluations: f64,
    pub elapsed_secs: f64,
    pub best_length: f64,
    pub best_tour: Vec<NodeId>,
    pub trace: Vec<TracePoint>,
}

// =================== GENETIC ALGORITHM CORE ===================

/// Everything one run of the genetic algorithm owns. Independent states can share a `Problem`.
pub struct SolverState<'p> {
    problem: &'p Problem,
    params: Parameters,
    seed: u64,
    rng: SmallRng,
    population: Vec<Tour>,
    ids: TourIds,
    evaluations: Evaluations,
    best: Tour,
    generation: usize,
    started: Instant,
    trace: Vec<TracePoint>,
}

impl<'p> SolverState<'p> {
    /// Builds and evaluates the greedy initial population. The incumbent stays unset until the
    /// first generation or report records it, so the first generation never counts as stagnant.
    pub fn new(problem: &'p Problem, params: Parameters, seed: u64) -> Result<Self> {
        params.validate()?;
        let started = Instant::now();
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut ids = TourIds::starting_at(0);
        let mut evaluations = Evaluations::default();
        let population = greedy_population(
            params.population_size,
            problem,
            &mut ids,
            &mut rng,
            &mut evaluations,
        )?;

        let mut state = Self {
            problem,
            params,
            seed,
            rng,
            population,
            ids,
            evaluations,
            best: Tour::new(0, Vec::new()),
            generation: 0,
            started,
            trace: Vec::new(),
        };
        state.evaluate_population();
        info!(
            seed,
            length = state.population[0].length_or_inf(),
            "initial population ready"
        );
        Ok(state)
    }

    /// Evaluates dirty tours and sorts the population, shortest first.
    fn evaluate_population(&mut self) {
        let mut evaluated = 0;
        for tour in self.population.iter_mut() {
            if tour.evaluate(self.problem) {
                evaluated += 1;
            }
        }
        self.evaluations.add_full(evaluated);
        self.population
            .sort_by(|a, b| a.length_or_inf().total_cmp(&b.length_or_inf()));
    }

    fn push_trace(&mut self) {
        let seconds = (self.elapsed_secs() * 100.0).round() / 100.0;
        self.trace.push(TracePoint {
            seconds,
            best_length: self.best.length_or_inf(),
        });
    }

    /// Re-evaluates the population and records a new best when it moved by more than the
    /// stagnation epsilon. Returns the gap between the old and new best.
    fn refresh_best(&mut self) -> f64 {
        self.evaluate_population();
        let gap = (self.population[0].length_or_inf() - self.best.length_or_inf()).abs();
        if gap > self.params.stagnation_epsilon {
            self.best = self.population[0].clone();
            self.push_trace();
            info!(
                generation = self.generation,
                length = self.best.length_or_inf(),
                "new best"
            );
        }
        gap
    }

    /// Runs one generation: selection, mutation, crossover, closing and replacement.
    pub fn run_generation(&mut self) -> Result<()> {
        let problem = self.problem;
        let gap = self.refresh_best();
        let stagnant = gap < self.params.stagnation_epsilon;

        let selected =
            select_by_tournament(&self.population, self.params.selection_size, &mut self.rng)?;
        let mut route_sets: Vec<RouteSet> =
            selected.into_iter().map(|tour| open(tour, problem)).collect();

        let mutations = Mutations::draw(&self.params, stagnant, &mut self.rng);
        mutations.apply(&mut route_sets, problem, &mut self.rng);

        recombine(
            &mut route_sets,
            problem,
            &self.params,
            &mut self.rng,
            &mut self.ids,
        )?;

        let mut offspring = route_sets
            .into_iter()
            .map(|route_set| {
                close(
                    route_set,
                    problem,
                    &self.params,
                    &mut self.rng,
                    &mut self.evaluations,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        if stagnant {
            for _ in 0..self.params.effective_fresh_solutions() {
                offspring.push(sequential_tour(problem, self.ids.next_id(), &mut self.rng)?);
            }
        }

        self.replace(offspring);
        self.generation += 1;
        debug!(
            generation = self.generation,
            evaluations = self.evaluations.total(),
            best = self.best.length_or_inf(),
            stagnant,
            "generation done"
        );
        Ok(())
    }

    /// Writes `offspring` over distinct random slots of the worse half of the population.
    fn replace(&mut self, offspring: Vec<Tour>) {
        let size = self.population.len();
        let lower = size - size / 2;
        let mut written = vec![false; size];

        for mut tour in offspring {
            let slot = loop {
                let slot = self.rng.gen_range(lower..size);
                if !written[slot] {
                    break slot;
                }
            };
            written[slot] = true;
            tour.id = self.ids.next_id();
            self.population[slot] = tour;
        }
    }

    /// Runs generations until the evaluation budget, the generation or time limit, or `stop`
    /// ends the run, then reports the best tour.
    pub fn run(&mut self, termination: &Termination, stop: &AtomicBool) -> Result<RunReport> {
        let budget = termination.max_evaluations_factor * self.problem.total_nodes() as f64;
        while self.evaluations.total() < budget
            && termination
                .max_generations
                .map_or(true, |max| self.generation < max)
            && termination
                .time_limit_secs
                .map_or(true, |limit| self.elapsed_secs() < limit)
            && !stop.load(Ordering::Relaxed)
        {
            self.run_generation()?;
        }
        Ok(self.report())
    }

    /// Evaluates what the last generation produced and summarizes the run.
    pub fn report(&mut self) -> RunReport {
        self.refresh_best();
        RunReport {
            seed: self.seed,
            generations: self.generation,
            evaluations: self.evaluations.total(),
            elapsed_secs: self.elapsed_secs(),
            best_length: self.best.length_or_inf(),
            best_tour: self.best.nodes.clone(),
            trace: self.trace.clone(),
        }
    }

    /// The incumbent. Empty and unevaluated before the first generation.
    pub fn best(&self) -> &Tour {
        &self.best
    }

    pub fn trace(&self) -> &[TracePoint] {
        &self.trace
    }

    pub fn evaluations(&self) -> f64 {
        self.evaluations.total()
    }

    pub fn population(&self) -> &[Tour] {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
