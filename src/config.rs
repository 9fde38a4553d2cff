use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};

/// Genetic algorithm parameters. Chances are percentages in `[0, 100]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub population_size: usize,
    /// Tournament winners taken into each generation.
    pub selection_size: usize,
    /// Fresh tours injected when the search stagnates. Only used in `(0, selection_size)`.
    pub fresh_solutions: usize,
    pub insertion_in_route_chance: u32,
    pub swap_chance: u32,
    pub insertion_between_routes_chance: u32,
    /// Share of the customers copied verbatim from the cut parent, in `[0.0, 1.0]`.
    pub crossover_cut_percentage: f64,
    /// Chance that the second parent donates the cut.
    pub crossover_cut_chance: u32,
    pub on_close_local_search_chance: u32,
    /// Best-length gap under which a generation counts as stagnant.
    pub stagnation_epsilon: f64,
    pub crossover_route_limit: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            population_size: 200,
            selection_size: 40,
            fresh_solutions: 15,
            insertion_in_route_chance: 5,
            swap_chance: 35,
            insertion_between_routes_chance: 35,
            crossover_cut_percentage: 0.2,
            crossover_cut_chance: 70,
            on_close_local_search_chance: 20,
            stagnation_epsilon: 0.1,
            crossover_route_limit: 22,
        }
    }
}

impl Parameters {
    /// Number of children produced by one recombination pass over `selected` tours.
    pub fn crossover_pairs(selected: usize) -> usize {
        let pairs = selected / 2;
        if pairs % 2 != 0 {
            pairs - 1
        } else {
            pairs
        }
    }

    /// Fresh tours actually injected on a stagnant generation.
    pub fn effective_fresh_solutions(&self) -> usize {
        if self.fresh_solutions > 0 && self.fresh_solutions < self.selection_size {
            self.fresh_solutions
        } else {
            0
        }
    }

    pub fn validate(&self) -> Result<()> {
        let chances = [
            ("insertion_in_route_chance", self.insertion_in_route_chance),
            ("swap_chance", self.swap_chance),
            ("insertion_between_routes_chance", self.insertion_between_routes_chance),
            ("crossover_cut_chance", self.crossover_cut_chance),
            ("on_close_local_search_chance", self.on_close_local_search_chance),
        ];
        for (name, value) in chances {
            if value > 100 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a percentage, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.crossover_cut_percentage) {
            return Err(Error::InvalidConfig(format!(
                "crossover_cut_percentage must be in [0, 1], got {}",
                self.crossover_cut_percentage
            )));
        }
        if self.selection_size < 2 {
            return Err(Error::InvalidConfig(
                "selection_size must be at least 2".to_string(),
            ));
        }
        // Every selected tour, child and fresh tour lands in a distinct slot of the worse half.
        let placed = self.selection_size
            + Self::crossover_pairs(self.selection_size)
            + self.effective_fresh_solutions();
        let half = self.population_size / 2;
        if placed > half {
            return Err(Error::InvalidConfig(format!(
                "{} tours are written back each generation but the worse half only has {} slots",
                placed, half
            )));
        }
        if self.selection_size + 2 > self.population_size {
            return Err(Error::InvalidConfig(format!(
                "selection_size {} is too close to population_size {}",
                self.selection_size, self.population_size
            )));
        }
        Ok(())
    }
}

/// When a single trial stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Termination {
    /// Evaluation budget per trial is this factor times the number of nodes.
    pub max_evaluations_factor: f64,
    pub max_generations: Option<usize>,
    pub time_limit_secs: Option<f64>,
}

impl Default for Termination {
    fn default() -> Self {
        Self {
            max_evaluations_factor: 25_000.0,
            max_generations: None,
            time_limit_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parameters: Parameters,
    pub termination: Termination,
    pub trials: usize,
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parameters: Parameters::default(),
            termination: Termination::default(),
            trials: 20,
            seed: 1,
        }
    }
}

impl Config {
    /// Reads a JSON configuration. Missing fields fall back to their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(Error::InvalidConfig("trials must be at least 1".to_string()));
        }
        if self.termination.max_evaluations_factor <= 0.0 {
            return Err(Error::InvalidConfig(
                "max_evaluations_factor must be positive".to_string(),
            ));
        }
        self.parameters.validate()
    }
}
