//! Conversion between flat tours and the route sets the genetic operators work on.
//!
//! ```text
//! tour:   0 - 5 - 6 - 8 - 0 - 1 - 2 - 3 - 4 - 0 - 7 - 0     (8 is a station)
//! routes: [0, 5, 6, 0]  [0, 1, 2, 3, 4, 0]  [0, 7, 0]
//! ```

use rand::Rng;

use crate::config::Parameters;
use crate::error::Result;
use crate::ga::percent_chance;
use crate::local_search::local_search;
use crate::models::{Evaluations, Problem, Route, RouteSet, Tour};
use crate::repair::repair_route;

/// Splits `tour` at every depot visit and drops the charging stations. Depot-to-depot
/// segments without a customer produce no route.
pub fn open(tour: Tour, problem: &Problem) -> RouteSet {
    let routes: Vec<Route> = tour
        .segments(problem)
        .into_iter()
        .filter_map(|segment| {
            let mut route = Vec::with_capacity(segment.len());
            route.push(problem.depot);
            route.extend(
                segment[1..segment.len() - 1]
                    .iter()
                    .copied()
                    .filter(|&n| !problem.is_charging_station(n)),
            );
            route.push(problem.depot);
            (route.len() > 2).then_some(route)
        })
        .collect();

    RouteSet {
        source: tour,
        routes,
    }
}

/// Rebuilds a flat tour from `route_set`.
///
/// Each route is optionally improved by local search, made energy feasible and appended without
/// its leading depot. The result keeps the id of the source tour and must be re-evaluated.
pub fn close<R: Rng>(
    route_set: RouteSet,
    problem: &Problem,
    params: &Parameters,
    rng: &mut R,
    evaluations: &mut Evaluations,
) -> Result<Tour> {
    let RouteSet { source, routes } = route_set;
    let mut nodes = vec![problem.depot];

    for mut route in routes {
        if percent_chance(rng, params.on_close_local_search_chance) {
            let lookups = local_search(&mut route, problem);
            evaluations.add_partial(lookups, problem);
        }
        repair_route(&mut route, problem)?;
        nodes.extend_from_slice(&route[1..]);
    }

    Ok(Tour::new(source.id, nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn problem(battery: f64) -> Problem {
        Problem::new(Instance {
            name: "routes".to_string(),
            dimension: 4,
            stations: 1,
            capacity: 10,
            vehicles: 2,
            energy_capacity: battery,
            energy_consumption: 1.0,
            optimal_value: None,
            coords: vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (5.0, 5.0)],
            demands: vec![0, 3, 3, 3, 0],
            depot: 0,
        })
        .unwrap()
    }

    #[test]
    fn open_drops_stations_and_empty_segments() {
        let problem = problem(100.0);
        let tour = Tour::new(7, vec![0, 1, 4, 2, 0, 0, 3, 0]);
        let set = open(tour, &problem);
        assert_eq!(set.routes, vec![vec![0, 1, 2, 0], vec![0, 3, 0]]);
        assert_eq!(set.source.id, 7);
        assert_eq!(set.customers().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn open_without_two_depots_has_no_routes() {
        let problem = problem(100.0);
        let set = open(Tour::new(1, vec![0]), &problem);
        assert_eq!(set.num_routes(), 0);
    }

    #[test]
    fn close_restores_the_customer_order() {
        let problem = problem(100.0);
        let params = Parameters {
            on_close_local_search_chance: 0,
            ..Parameters::default()
        };
        let mut rng = SmallRng::seed_from_u64(3);
        let mut evaluations = Evaluations::default();

        let mut original = Tour::new(9, vec![0, 1, 2, 0, 3, 0]);
        original.evaluate(&problem);
        let closed = close(
            open(original.clone(), &problem),
            &problem,
            &params,
            &mut rng,
            &mut evaluations,
        )
        .unwrap();

        assert_eq!(closed.id, 9);
        assert!(closed.is_dirty());
        assert_eq!(closed.nodes, original.nodes);
        assert_eq!(evaluations.total(), 0.0);
    }

    #[test]
    fn close_repairs_energy() {
        // 0 -> 1 -> 2 -> 3 -> 0 is 40 long; the station in the middle is ~7.07 from everything.
        let problem = problem(25.0);
        let params = Parameters {
            on_close_local_search_chance: 100,
            ..Parameters::default()
        };
        let mut rng = SmallRng::seed_from_u64(3);
        let mut evaluations = Evaluations::default();

        let closed = close(
            open(Tour::new(1, vec![0, 1, 2, 3, 0]), &problem),
            &problem,
            &params,
            &mut rng,
            &mut evaluations,
        )
        .unwrap();

        assert!(closed.nodes.contains(&4));
        assert_eq!(closed.customer_order(&problem).len(), 3);
        assert!(crate::repair::is_energy_feasible(&closed.nodes, &problem));
        assert!(evaluations.total() > 0.0);
    }
}
