//! Genetic algorithm for the electric vehicle routing problem (EVRP).
//!
//! Vehicles leave a single depot, serve every customer exactly once within their load capacity
//! and may stop at charging stations so that no stretch between two charges drains the
//! battery. Tours are evolved with tournament selection, order crossover and three route
//! mutations; every offspring is made energy feasible before it enters the population.

pub mod config;
pub mod error;
pub mod ga;
pub mod instance;
pub mod local_search;
pub mod models;
pub mod plotting;
pub mod population;
pub mod repair;
pub mod routes;
pub mod solver;
pub mod stats;
pub mod validation;

pub use config::{Config, Parameters, Termination};
pub use error::{Error, Result};
pub use instance::{parse_instance, random_instance, read_instance, read_problem, Instance};
pub use models::{Evaluations, NodeId, Problem, Route, RouteSet, Tour, TourIds};
pub use solver::{RunReport, SolverState, TracePoint};
pub use validation::check_tour;
