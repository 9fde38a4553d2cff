use std::collections::HashSet;

use rand::Rng;

use crate::config::Parameters;
use crate::error::{Error, Result};
use crate::models::{NodeId, Problem, Route, RouteSet, Tour, TourIds};

/// Rejected draws allowed while looking for one tournament triple.
const TOURNAMENT_ATTEMPTS: usize = 1000;

/// `true` with probability `percent / 100`.
pub fn percent_chance<R: Rng>(rng: &mut R, percent: u32) -> bool {
    rng.gen_range(0..100) < percent
}

// =================== SELECTION ===================

/// Tournament selection of size three without replacement.
///
/// Each tournament draws three distinct individuals that have not won yet; the shortest one
/// wins and is copied out. Ties go to the earlier-compared candidate. The population must be
/// evaluated, dirty tours count as infinitely long.
///
/// # Arguments
/// * `population` - The evaluated population
/// * `size` - Number of winners to return
/// * `rng` - Random source
///
/// # Returns
/// * `Result<Vec<Tour>>` - The winners, in the order they won
pub fn select_by_tournament<R: Rng>(
    population: &[Tour],
    size: usize,
    rng: &mut R,
) -> Result<Vec<Tour>> {
    let n = population.len();
    let mut visited = vec![false; n];
    let mut selected = Vec::with_capacity(size);

    while selected.len() < size {
        let mut attempts = 0;
        let candidates = loop {
            if n >= 3 {
                let a = rng.gen_range(0..n);
                let b = rng.gen_range(0..n);
                let c = rng.gen_range(0..n);
                if a != b && b != c && a != c && !visited[a] && !visited[b] && !visited[c] {
                    break [a, b, c];
                }
            }
            attempts += 1;
            if attempts > TOURNAMENT_ATTEMPTS {
                return Err(Error::SelectionStuck {
                    attempts,
                    selected: selected.len(),
                });
            }
        };

        let mut winner = candidates[0];
        for &candidate in &candidates[1..] {
            if population[candidate].length_or_inf() < population[winner].length_or_inf() {
                winner = candidate;
            }
        }
        visited[winner] = true;
        selected.push(population[winner].clone());
    }
    Ok(selected)
}

// =================== CROSSOVER ===================

/// Order crossover on customer permutations.
///
/// `cut_parent[cut_start..cut_start + cut_len]` is copied verbatim; the remaining positions are
/// filled circularly from the end of the cut with the donor's customers, read circularly from
/// the same position and skipping those already placed.
pub fn order_crossover(
    cut_parent: &[NodeId],
    donor: &[NodeId],
    cut_start: usize,
    cut_len: usize,
) -> Vec<NodeId> {
    let len = cut_parent.len();
    if len == 0 {
        return Vec::new();
    }
    let mut child: Vec<Option<NodeId>> = vec![None; len];
    let mut placed = HashSet::with_capacity(len);

    for idx in cut_start..cut_start + cut_len {
        child[idx] = Some(cut_parent[idx]);
        placed.insert(cut_parent[idx]);
    }

    let end = (cut_start + cut_len) % len;
    let mut pos_child = end;
    for offset in 0..donor.len() {
        let gene = donor[(end + offset) % donor.len()];
        if placed.insert(gene) {
            child[pos_child] = Some(gene);
            pos_child = (pos_child + 1) % len;
        }
    }

    child.into_iter().flatten().collect()
}

/// Splits a customer permutation into capacity-feasible routes. Each route scans every
/// customer not yet placed, in permutation order, and takes those that still fit.
pub fn split_routes(permutation: &[NodeId], problem: &Problem, limit: usize) -> Result<Vec<Route>> {
    let mut placed = vec![false; permutation.len()];
    let mut remaining = permutation.len();
    let mut routes = Vec::new();

    while remaining > 0 {
        if routes.len() >= limit {
            return Err(Error::UnboundedRoutes {
                routes: routes.len() + 1,
            });
        }
        let mut route = vec![problem.depot];
        let mut load = 0;
        for (k, &customer) in permutation.iter().enumerate() {
            if !placed[k] && load + problem.demand(customer) <= problem.capacity {
                placed[k] = true;
                remaining -= 1;
                load += problem.demand(customer);
                route.push(customer);
            }
        }
        route.push(problem.depot);
        routes.push(route);
    }
    Ok(routes)
}

/// Pairs up consecutive route sets and appends one child per pair.
///
/// Parents are read from the customer order of their source tours. The child gets a fresh id
/// and an empty source tour that `close` fills in.
pub fn recombine<R: Rng>(
    route_sets: &mut Vec<RouteSet>,
    problem: &Problem,
    params: &Parameters,
    rng: &mut R,
    ids: &mut TourIds,
) -> Result<()> {
    let pairs = Parameters::crossover_pairs(route_sets.len());
    let customers = problem.num_customers;
    let cut_len = (params.crossover_cut_percentage * customers as f64).floor() as usize;

    for pair in 0..pairs {
        let first = route_sets[2 * pair].source.customer_order(problem);
        let second = route_sets[2 * pair + 1].source.customer_order(problem);
        for parent in [&first, &second] {
            if parent.len() != customers {
                return Err(Error::InvalidTour(format!(
                    "parent visits {} customers, expected {}",
                    parent.len(),
                    customers
                )));
            }
        }

        let cut_start = rng.gen_range(0..=customers - cut_len);
        let child = if percent_chance(rng, params.crossover_cut_chance) {
            order_crossover(&second, &first, cut_start, cut_len)
        } else {
            order_crossover(&first, &second, cut_start, cut_len)
        };
        let routes = split_routes(&child, problem, params.crossover_route_limit)?;
        route_sets.push(RouteSet {
            source: Tour::new(ids.next_id(), Vec::new()),
            routes,
        });
    }
    Ok(())
}

// =================== MUTATION ===================

fn two_routes<R: Rng>(count: usize, rng: &mut R) -> (usize, usize) {
    let r1 = rng.gen_range(0..count);
    let mut r2 = rng.gen_range(0..count - 1);
    if r2 >= r1 {
        r2 += 1;
    }
    (r1, r2)
}

/// Moves a random customer forward within each route of more than one customer.
pub fn mutate_insertion_in_route<R: Rng>(route_set: &mut RouteSet, rng: &mut R) {
    for route in route_set.routes.iter_mut() {
        let len = route.len();
        if len <= 3 {
            continue;
        }
        let p1 = rng.gen_range(1..=len - 3);
        let p2 = rng.gen_range(p1 + 1..=len - 2);
        let gene = route.remove(p2);
        route.insert(p1, gene);
    }
    route_set.mark_dirty();
}

/// Swaps one customer between two different routes when both stay within capacity.
pub fn mutate_swap<R: Rng>(route_set: &mut RouteSet, problem: &Problem, rng: &mut R) {
    let count = route_set.num_routes();
    if count < 2 {
        return;
    }
    let (r1, r2) = two_routes(count, rng);
    let p1 = rng.gen_range(1..route_set.routes[r1].len() - 1);
    let p2 = rng.gen_range(1..route_set.routes[r2].len() - 1);
    let g1 = route_set.routes[r1][p1];
    let g2 = route_set.routes[r2][p2];

    let load1 = problem.load(&route_set.routes[r1]) - problem.demand(g1) + problem.demand(g2);
    let load2 = problem.load(&route_set.routes[r2]) - problem.demand(g2) + problem.demand(g1);
    if load1 <= problem.capacity && load2 <= problem.capacity {
        route_set.routes[r1][p1] = g2;
        route_set.routes[r2][p2] = g1;
    }
    route_set.mark_dirty();
}

/// Moves one customer from one route into another.
///
/// A move is feasible when the receiving route stays strictly under capacity and the donor
/// keeps a customer, unless the set already has more routes than the minimum fleet. A donor
/// left without customers is dropped.
pub fn mutate_insertion_between_routes<R: Rng>(
    route_set: &mut RouteSet,
    problem: &Problem,
    rng: &mut R,
) {
    let count = route_set.num_routes();
    if count < 2 {
        return;
    }
    let (r1, r2) = two_routes(count, rng);
    let p1 = rng.gen_range(1..route_set.routes[r1].len() - 1);
    let p2 = rng.gen_range(1..route_set.routes[r2].len() - 1);
    let g1 = route_set.routes[r1][p1];
    let g2 = route_set.routes[r2][p2];
    let spare_route = count > problem.min_vehicles;

    let into_first = problem.load(&route_set.routes[r1]) + problem.demand(g2) < problem.capacity
        && (spare_route || route_set.routes[r2].len() > 3);
    let into_second = problem.load(&route_set.routes[r2]) + problem.demand(g1) < problem.capacity
        && (spare_route || route_set.routes[r1].len() > 3);

    if !into_first && !into_second {
        route_set.mark_dirty();
        return;
    }
    let (donor, taken, receiver, at) = if into_first && (!into_second || rng.gen_bool(0.5)) {
        (r2, p2, r1, p1)
    } else {
        (r1, p1, r2, p2)
    };

    let gene = route_set.routes[donor].remove(taken);
    route_set.routes[receiver].insert(at, gene);
    if route_set.routes[donor].len() <= 2 {
        route_set.routes.remove(donor);
    }
    route_set.mark_dirty();
}

/// Mutation operators switched on for one generation. Each operator is drawn once and then
/// runs over every selected route set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutations {
    pub insertion_in_route: bool,
    pub swap: bool,
    pub insertion_between_routes: bool,
}

impl Mutations {
    /// Both insertion operators are forced on when the search stagnates.
    pub fn draw<R: Rng>(params: &Parameters, stagnant: bool, rng: &mut R) -> Self {
        let insertion_in_route = stagnant || percent_chance(rng, params.insertion_in_route_chance);
        let swap = percent_chance(rng, params.swap_chance);
        let insertion_between_routes =
            stagnant || percent_chance(rng, params.insertion_between_routes_chance);
        Self {
            insertion_in_route,
            swap,
            insertion_between_routes,
        }
    }

    pub fn apply<R: Rng>(&self, route_sets: &mut [RouteSet], problem: &Problem, rng: &mut R) {
        if self.insertion_in_route {
            for route_set in route_sets.iter_mut() {
                mutate_insertion_in_route(route_set, rng);
            }
        }
        if self.swap {
            for route_set in route_sets.iter_mut() {
                mutate_swap(route_set, problem, rng);
            }
        }
        if self.insertion_between_routes {
            for route_set in route_sets.iter_mut() {
                mutate_insertion_between_routes(route_set, problem, rng);
            }
        }
    }
}
