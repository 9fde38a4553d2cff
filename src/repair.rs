use tracing::trace;

use crate::error::{Error, Result};
use crate::models::{NodeId, Problem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Scanning,
    Backtracking,
}

/// Inserts charging stations into `route` until no stretch between two charges consumes
/// more than the battery capacity.
///
/// The route is walked left to right. When the next arc would overflow the battery the walk
/// looks for the nearest station reachable from the current node; if there is none it steps
/// back one arc at a time, never past the last point where the vehicle was charged.
///
/// # Returns
/// * `usize` - The number of stations inserted
pub fn repair_route(route: &mut Vec<NodeId>, problem: &Problem) -> Result<usize> {
    let battery = problem.battery_capacity;
    let mut state = Walk::Scanning;
    let mut i = 0;
    let mut consumed = 0.0;
    let mut last_charge = 0;
    let mut inserted = 0;

    loop {
        match state {
            Walk::Scanning => {
                if i + 1 >= route.len() {
                    return Ok(inserted);
                }
                let arc = problem.energy_consumption(route[i], route[i + 1]);
                if consumed + arc > battery {
                    state = Walk::Backtracking;
                } else {
                    consumed += arc;
                    i += 1;
                }
            }
            Walk::Backtracking => match problem.nearest_station(route[i], consumed) {
                Some(station) => {
                    route.insert(i + 1, station);
                    inserted += 1;
                    trace!(station, after = route[i], "charging stop inserted");
                    if inserted > problem.total_nodes() {
                        return Err(Error::InfeasibleRepair {
                            node: route[i],
                            consumed,
                        });
                    }
                    i += 1;
                    consumed = 0.0;
                    last_charge = i;
                    state = Walk::Scanning;
                }
                None => {
                    if i <= last_charge {
                        return Err(Error::InfeasibleRepair {
                            node: route[i],
                            consumed,
                        });
                    }
                    i -= 1;
                    consumed = (consumed - problem.energy_consumption(route[i], route[i + 1]))
                        .max(0.0);
                }
            },
        }
    }
}

/// True when no stretch of `nodes` between charges uses more than the battery.
pub fn is_energy_feasible(nodes: &[NodeId], problem: &Problem) -> bool {
    let mut consumed = 0.0;
    for arc in nodes.windows(2) {
        consumed += problem.energy_consumption(arc[0], arc[1]);
        if consumed > problem.battery_capacity + 1e-9 {
            return false;
        }
        if problem.is_charging_station(arc[1]) {
            consumed = 0.0;
        }
    }
    true
}
