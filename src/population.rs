use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::{Error, Result};
use crate::local_search::local_search;
use crate::models::{Evaluations, NodeId, Problem, Tour, TourIds};
use crate::repair::repair_route;

// =================== GREEDY CLUSTERS ===================

/// Builds a tour out of greedy clusters.
///
/// Each cluster starts from a random unvisited customer and grows with the nearest unvisited
/// customer that still fits, until none fits or the cluster holds `customers / min_vehicles`
/// customers. Every cluster becomes a depot-to-depot route that is
/// locally searched and then made energy feasible.
pub fn greedy_tour<R: Rng>(
    problem: &Problem,
    id: u64,
    rng: &mut R,
    evaluations: &mut Evaluations,
) -> Result<Tour> {
    let mut order: Vec<NodeId> = problem.customers().to_vec();
    order.shuffle(rng);

    let limit = (problem.num_customers / problem.min_vehicles).max(1);
    let mut visited = vec![false; problem.total_nodes()];
    let mut remaining = order.len();
    let mut clusters = 0;
    let mut nodes = vec![problem.depot];

    while remaining > 0 {
        clusters += 1;
        if clusters > problem.num_customers {
            return Err(Error::ClusterOverflow { clusters });
        }

        let unvisited: Vec<NodeId> = order.iter().copied().filter(|&c| !visited[c]).collect();
        let seed = unvisited[rng.gen_range(0..unvisited.len())];
        visited[seed] = true;
        remaining -= 1;

        let mut cluster = vec![seed];
        let mut load = problem.demand(seed);
        while cluster.len() < limit && remaining > 0 {
            let mut nearest = None;
            let mut best = f64::INFINITY;
            for &customer in &order {
                if visited[customer] || load + problem.demand(customer) > problem.capacity {
                    continue;
                }
                let distance = problem.distance(seed, customer);
                if distance < best {
                    best = distance;
                    nearest = Some(customer);
                }
            }
            let Some(customer) = nearest else {
                break;
            };
            visited[customer] = true;
            remaining -= 1;
            load += problem.demand(customer);
            cluster.push(customer);
        }

        let mut route = Vec::with_capacity(cluster.len() + 2);
        route.push(problem.depot);
        route.extend(cluster);
        route.push(problem.depot);
        // Searched before repair so the exchange never moves an inserted station.
        let lookups = local_search(&mut route, problem);
        evaluations.add_partial(lookups, problem);
        repair_route(&mut route, problem)?;
        nodes.extend_from_slice(&route[1..]);
    }

    Ok(Tour::new(id, nodes))
}

/// Builds `size` greedy tours with consecutive ids.
pub fn greedy_population<R: Rng>(
    size: usize,
    problem: &Problem,
    ids: &mut TourIds,
    rng: &mut R,
    evaluations: &mut Evaluations,
) -> Result<Vec<Tour>> {
    let population = (0..size)
        .map(|_| greedy_tour(problem, ids.next_id(), rng, evaluations))
        .collect::<Result<Vec<_>>>()?;
    debug!(size, "initial population built");
    Ok(population)
}

// =================== SEQUENTIAL FILL ===================

/// Fills routes first-fit from a shuffled customer list. Each route scans the unplaced
/// customers in order and takes every one that still fits, up to
/// `ceil(customers / min_vehicles)` customers.
pub fn sequential_tour<R: Rng>(problem: &Problem, id: u64, rng: &mut R) -> Result<Tour> {
    let mut order: Vec<NodeId> = problem.customers().to_vec();
    order.shuffle(rng);

    let limit = ((problem.num_customers + problem.min_vehicles - 1) / problem.min_vehicles).max(1);
    let mut placed = vec![false; problem.total_nodes()];
    let mut remaining = order.len();
    let mut nodes = vec![problem.depot];

    while remaining > 0 {
        let mut route = vec![problem.depot];
        let mut load = 0;
        for &customer in &order {
            if route.len() - 1 >= limit {
                break;
            }
            if placed[customer] || load + problem.demand(customer) > problem.capacity {
                continue;
            }
            placed[customer] = true;
            remaining -= 1;
            load += problem.demand(customer);
            route.push(customer);
        }
        route.push(problem.depot);
        repair_route(&mut route, problem)?;
        nodes.extend_from_slice(&route[1..]);
    }

    Ok(Tour::new(id, nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{random_instance, Instance};
    use crate::repair::is_energy_feasible;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn assert_feasible(tour: &Tour, problem: &Problem) {
        let mut customers = tour.customer_order(problem);
        customers.sort_unstable();
        assert_eq!(customers, problem.customers());
        assert_eq!(tour.nodes.first(), Some(&problem.depot));
        assert_eq!(tour.nodes.last(), Some(&problem.depot));
        for segment in tour.segments(problem) {
            assert!(problem.load(segment) <= problem.capacity);
        }
        assert!(is_energy_feasible(&tour.nodes, problem));
    }

    #[test]
    fn greedy_tours_are_feasible() {
        let problem = Problem::new(random_instance(30, 4, 11)).unwrap();
        let mut rng = SmallRng::seed_from_u64(5);
        let mut ids = TourIds::starting_at(0);
        let mut evaluations = Evaluations::default();
        let population =
            greedy_population(10, &problem, &mut ids, &mut rng, &mut evaluations).unwrap();
        assert_eq!(population.len(), 10);
        for (i, tour) in population.iter().enumerate() {
            assert_eq!(tour.id, i as u64);
            assert_feasible(tour, &problem);
        }
        assert!(evaluations.total() > 0.0);
    }

    #[test]
    fn greedy_clusters_respect_the_size_limit() {
        let problem = Problem::new(random_instance(20, 2, 3)).unwrap();
        let limit = problem.num_customers / problem.min_vehicles;
        let mut rng = SmallRng::seed_from_u64(1);
        let tour = greedy_tour(&problem, 0, &mut rng, &mut Evaluations::default()).unwrap();
        for segment in tour.segments(&problem) {
            let customers = segment
                .iter()
                .filter(|&&n| !problem.is_charging_station(n))
                .count();
            assert!(customers <= limit);
        }
    }

    #[test]
    fn sequential_tours_are_feasible() {
        let problem = Problem::new(random_instance(25, 3, 8)).unwrap();
        let mut rng = SmallRng::seed_from_u64(9);
        for id in 0..5 {
            let tour = sequential_tour(&problem, id, &mut rng).unwrap();
            assert_eq!(tour.id, id);
            assert_feasible(&tour, &problem);
        }
    }

    fn customers_per_route(tour: &Tour, problem: &Problem) -> Vec<Vec<NodeId>> {
        tour.segments(problem)
            .into_iter()
            .map(|segment| {
                segment
                    .iter()
                    .copied()
                    .filter(|&n| !problem.is_charging_station(n))
                    .collect()
            })
            .collect()
    }

    /// Customers 1 and 2 sit side by side but cannot share a vehicle; 3 and 4 are far off.
    fn crowded_pair() -> Problem {
        Problem::new(Instance {
            name: "pair".to_string(),
            dimension: 5,
            stations: 1,
            capacity: 10,
            vehicles: 1,
            energy_capacity: 1000.0,
            energy_consumption: 1.0,
            optimal_value: None,
            coords: vec![
                (0.0, 0.0),
                (50.0, 0.0),
                (51.0, 0.0),
                (0.0, 50.0),
                (0.0, 51.0),
                (25.0, 25.0),
            ],
            demands: vec![0, 5, 6, 4, 1, 0],
            depot: 0,
        })
        .unwrap()
    }

    #[test]
    fn greedy_clusters_skip_customers_that_do_not_fit() {
        let problem = crowded_pair();
        for seed in 0..200 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let tour = greedy_tour(&problem, 0, &mut rng, &mut Evaluations::default()).unwrap();
            assert_eq!(tour.segments(&problem).len(), 2, "seed {}", seed);
            assert_feasible(&tour, &problem);
        }
    }

    #[test]
    fn sequential_routes_are_filled_first_fit() {
        let problem = Problem::new(random_instance(40, 3, 17)).unwrap();
        let limit = (problem.num_customers + problem.min_vehicles - 1) / problem.min_vehicles;
        let mut rng = SmallRng::seed_from_u64(4);
        for id in 0..10 {
            let tour = sequential_tour(&problem, id, &mut rng).unwrap();
            let routes = customers_per_route(&tour, &problem);
            for (i, route) in routes.iter().enumerate() {
                let load = problem.load(route);
                for later in routes[i + 1..].iter().flatten() {
                    assert!(
                        route.len() >= limit || load + problem.demand(*later) > problem.capacity,
                        "customer {} would have fit route {}",
                        later,
                        i
                    );
                }
            }
        }
    }

    #[test]
    fn sequential_tour_packs_around_a_misfit() {
        let problem = crowded_pair();
        for seed in 0..50 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let tour = sequential_tour(&problem, 0, &mut rng).unwrap();
            assert_eq!(tour.segments(&problem).len(), 2, "seed {}", seed);
        }
    }
}
