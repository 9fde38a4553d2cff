use crate::error::{Error, Result};
use crate::models::{Problem, Tour};

fn invalid(message: String) -> Error {
    Error::InvalidTour(message)
}

/// Checks that `tour` is a feasible solution of `problem`.
///
/// The tour must start and end at the depot, visit every customer exactly once, keep every
/// depot-to-depot segment within capacity and never run the battery flat between charges. An
/// evaluated tour must also carry the length its nodes actually add up to.
pub fn check_tour(tour: &Tour, problem: &Problem) -> Result<()> {
    let nodes = &tour.nodes;
    if nodes.first() != Some(&problem.depot) || nodes.last() != Some(&problem.depot) {
        return Err(invalid("tour must start and end at the depot".to_string()));
    }
    if let Some(&node) = nodes.iter().find(|&&n| n >= problem.total_nodes()) {
        return Err(invalid(format!("unknown node {}", node)));
    }

    let mut visits = vec![0usize; problem.total_nodes()];
    for &node in nodes {
        visits[node] += 1;
    }
    for &customer in problem.customers() {
        match visits[customer] {
            1 => {}
            0 => return Err(invalid(format!("customer {} is never visited", customer))),
            n => return Err(invalid(format!("customer {} is visited {} times", customer, n))),
        }
    }

    for segment in tour.segments(problem) {
        let load = problem.load(segment);
        if load > problem.capacity {
            return Err(invalid(format!(
                "route {:?} carries {} over a capacity of {}",
                segment, load, problem.capacity
            )));
        }
    }

    let mut battery = problem.battery_capacity;
    for arc in nodes.windows(2) {
        battery -= problem.energy_consumption(arc[0], arc[1]);
        if battery < -1e-9 {
            return Err(invalid(format!(
                "battery runs out between {} and {}",
                arc[0], arc[1]
            )));
        }
        if problem.is_charging_station(arc[1]) {
            battery = problem.battery_capacity;
        }
    }

    if let Some(length) = tour.length() {
        let actual = problem.path_length(nodes);
        if (length - actual).abs() > 1e-6 {
            return Err(invalid(format!(
                "cached length {} differs from actual length {}",
                length, actual
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;

    fn problem() -> Problem {
        Problem::new(Instance {
            name: "check".to_string(),
            dimension: 4,
            stations: 1,
            capacity: 6,
            vehicles: 2,
            energy_capacity: 30.0,
            energy_consumption: 1.0,
            optimal_value: None,
            coords: vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (5.0, 5.0)],
            demands: vec![0, 3, 3, 3, 0],
            depot: 0,
        })
        .unwrap()
    }

    #[test]
    fn accepts_feasible_tour() {
        let problem = problem();
        let mut tour = Tour::new(0, vec![0, 1, 2, 4, 0, 3, 0]);
        tour.evaluate(&problem);
        assert!(check_tour(&tour, &problem).is_ok());
    }

    #[test]
    fn rejects_missing_and_repeated_customers() {
        let problem = problem();
        assert!(check_tour(&Tour::new(0, vec![0, 1, 0, 2, 0]), &problem).is_err());
        assert!(check_tour(&Tour::new(0, vec![0, 1, 0, 2, 0, 3, 1, 0]), &problem).is_err());
    }

    #[test]
    fn rejects_overloaded_route() {
        let problem = problem();
        let err = check_tour(&Tour::new(0, vec![0, 1, 4, 2, 3, 0]), &problem).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn rejects_flat_battery() {
        let problem = problem();
        // 0 -> 1 -> 2 -> 0 is 10 + 10 + 14.14 without a charge.
        let err = check_tour(&Tour::new(0, vec![0, 1, 2, 0, 3, 0]), &problem).unwrap_err();
        assert!(err.to_string().contains("battery"));
    }

    #[test]
    fn rejects_stale_length() {
        let problem = problem();
        let mut tour = Tour::new(0, vec![0, 1, 2, 4, 0, 3, 0]);
        tour.evaluate(&problem);
        tour.nodes = vec![0, 1, 4, 2, 0, 3, 0];
        let err = check_tour(&tour, &problem).unwrap_err();
        assert!(err.to_string().contains("cached length"));
    }
}
