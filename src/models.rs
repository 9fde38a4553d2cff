use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::instance::Instance;

pub type NodeId = usize;

/// A depot-to-depot node sequence without charging stations.
pub type Route = Vec<NodeId>;

// =================== PROBLEM MODEL ===================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Node {
    pub x: f64,
    pub y: f64,
}

/// The EVRP instance the search queries. Built once and shared read-only
/// between every solver running on it.
#[derive(Debug, Clone)]
pub struct Problem {
    pub name: String,
    pub nodes: Vec<Node>,
    pub depot: NodeId,
    pub num_customers: usize,
    pub num_stations: usize,
    pub capacity: u32,
    pub battery_capacity: f64,
    pub energy_rate: f64,
    pub min_vehicles: usize,
    pub optimum: Option<f64>,
    distances: Vec<Vec<f64>>,
    demands: Vec<u32>,
    charging: Vec<bool>,
    customers: Vec<NodeId>,
    stations: Vec<NodeId>,
}

impl Problem {
    /// Builds the model from a parsed instance. Nodes `0..dimension` are the depot and the
    /// customers, nodes `dimension..dimension + stations` are charging stations.
    pub fn new(instance: Instance) -> Result<Self> {
        let total = instance.dimension + instance.stations;
        if instance.coords.len() != total {
            return Err(Error::InvalidInstance(format!(
                "expected {} coordinates, found {}",
                total,
                instance.coords.len()
            )));
        }
        if instance.demands.len() != total {
            return Err(Error::InvalidInstance(format!(
                "expected {} demands, found {}",
                total,
                instance.demands.len()
            )));
        }
        if instance.depot >= instance.dimension {
            return Err(Error::InvalidInstance(format!(
                "depot {} is not one of the first {} nodes",
                instance.depot, instance.dimension
            )));
        }
        if instance.vehicles == 0 {
            return Err(Error::InvalidInstance("VEHICLES must be positive".to_string()));
        }
        if instance.dimension < 2 {
            return Err(Error::InvalidInstance(
                "an instance needs at least one customer".to_string(),
            ));
        }
        if let Some(node) = (0..instance.dimension).find(|&n| instance.demands[n] > instance.capacity)
        {
            return Err(Error::InvalidInstance(format!(
                "customer {} demands {} but vehicles carry {}",
                node, instance.demands[node], instance.capacity
            )));
        }

        let nodes: Vec<Node> = instance.coords.iter().map(|&(x, y)| Node { x, y }).collect();
        let distances = nodes
            .iter()
            .map(|a| {
                nodes
                    .iter()
                    .map(|b| ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt())
                    .collect()
            })
            .collect();

        let mut charging = vec![false; total];
        let mut demands = instance.demands;
        for node in instance.dimension..total {
            charging[node] = true;
            demands[node] = 0;
        }
        charging[instance.depot] = true;
        demands[instance.depot] = 0;

        let customers = (0..instance.dimension)
            .filter(|&n| n != instance.depot)
            .collect();
        let stations = (instance.dimension..total).collect();

        Ok(Self {
            name: instance.name,
            nodes,
            depot: instance.depot,
            num_customers: instance.dimension - 1,
            num_stations: instance.stations,
            capacity: instance.capacity,
            battery_capacity: instance.energy_capacity,
            energy_rate: instance.energy_consumption,
            min_vehicles: instance.vehicles,
            optimum: instance.optimal_value,
            distances,
            demands,
            charging,
            customers,
            stations,
        })
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn distance(&self, from: NodeId, to: NodeId) -> f64 {
        self.distances[from][to]
    }

    #[inline]
    pub fn energy_consumption(&self, from: NodeId, to: NodeId) -> f64 {
        self.energy_rate * self.distances[from][to]
    }

    #[inline]
    pub fn demand(&self, node: NodeId) -> u32 {
        self.demands[node]
    }

    /// True for charging stations and for the depot.
    #[inline]
    pub fn is_charging_station(&self, node: NodeId) -> bool {
        self.charging[node]
    }

    pub fn customers(&self) -> &[NodeId] {
        &self.customers
    }

    /// Charging stations proper, the depot excluded.
    pub fn stations(&self) -> &[NodeId] {
        &self.stations
    }

    /// Nearest station (by consumption) reachable from `from` after `consumed` energy has
    /// already been used since the last charge. `from` itself is never returned.
    pub fn nearest_station(&self, from: NodeId, consumed: f64) -> Option<NodeId> {
        let mut nearest = None;
        let mut best = f64::INFINITY;
        for &station in &self.stations {
            if station == from {
                continue;
            }
            let consumption = self.energy_consumption(from, station);
            if consumed + consumption <= self.battery_capacity && consumption < best {
                best = consumption;
                nearest = Some(station);
            }
        }
        nearest
    }

    /// Sum of arc distances along `nodes`.
    pub fn path_length(&self, nodes: &[NodeId]) -> f64 {
        nodes.windows(2).map(|arc| self.distance(arc[0], arc[1])).sum()
    }

    pub fn load(&self, nodes: &[NodeId]) -> u32 {
        nodes.iter().map(|&n| self.demand(n)).sum()
    }
}

// =================== SOLUTION REPRESENTATION ===================

/// A full encoded solution: all routes concatenated, depot-delimited, stations included.
///
/// ```text
/// nodes: 0 - 5 - 6 - 8 - 0 - 1 - 2 - 3 - 4 - 0 - 7 - 0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    pub id: u64,
    pub nodes: Vec<NodeId>,
    length: Option<f64>,
}

impl Tour {
    pub fn new(id: u64, nodes: Vec<NodeId>) -> Self {
        Self {
            id,
            nodes,
            length: None,
        }
    }

    /// Number of occupied positions.
    pub fn steps(&self) -> usize {
        self.nodes.len()
    }

    /// Cached length, `None` while the tour is dirty.
    pub fn length(&self) -> Option<f64> {
        self.length
    }

    /// Cached length, or infinity for a dirty tour so it sorts last.
    pub fn length_or_inf(&self) -> f64 {
        self.length.unwrap_or(f64::INFINITY)
    }

    pub fn is_dirty(&self) -> bool {
        self.length.is_none()
    }

    pub fn invalidate(&mut self) {
        self.length = None;
    }

    /// Recomputes the length if dirty. Returns `true` when a computation happened.
    pub fn evaluate(&mut self, problem: &Problem) -> bool {
        if self.length.is_some() {
            return false;
        }
        self.length = Some(problem.path_length(&self.nodes));
        true
    }

    /// Customers in visiting order, depot and stations stripped.
    pub fn customer_order(&self, problem: &Problem) -> Vec<NodeId> {
        self.nodes
            .iter()
            .copied()
            .filter(|&n| !problem.is_charging_station(n))
            .collect()
    }

    /// Depot-to-depot segments, stations kept.
    pub fn segments(&self, problem: &Problem) -> Vec<&[NodeId]> {
        let depots: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, &n)| n == problem.depot)
            .map(|(i, _)| i)
            .collect();
        depots
            .windows(2)
            .map(|pair| &self.nodes[pair[0]..=pair[1]])
            .collect()
    }
}

/// Routes opened from a tour for the mutation and crossover phase.
#[derive(Debug, Clone)]
pub struct RouteSet {
    /// The tour these routes were opened from. `close` writes the rebuilt tour into it.
    pub source: Tour,
    pub routes: Vec<Route>,
}

impl RouteSet {
    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }

    pub fn mark_dirty(&mut self) {
        self.source.invalidate();
    }

    /// Interior nodes of every route, in order.
    pub fn customers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.routes
            .iter()
            .flat_map(|route| route[1..route.len() - 1].iter().copied())
    }
}

// =================== SEARCH BOOKKEEPING ===================

/// Monotonic source of tour identifiers.
#[derive(Debug, Clone)]
pub struct TourIds {
    next: u64,
}

impl TourIds {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Fitness evaluation count. A full tour evaluation counts as one, a single distance lookup
/// during local search counts as `1 / total_nodes`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Evaluations {
    total: f64,
}

impl Evaluations {
    pub fn add_full(&mut self, count: usize) {
        self.total += count as f64;
    }

    pub fn add_partial(&mut self, lookups: usize, problem: &Problem) {
        self.total += lookups as f64 / problem.total_nodes() as f64;
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;

    fn square() -> Problem {
        Problem::new(Instance {
            name: "square".to_string(),
            dimension: 4,
            stations: 1,
            capacity: 10,
            vehicles: 1,
            energy_capacity: 100.0,
            energy_consumption: 2.0,
            optimal_value: None,
            coords: vec![(0.0, 0.0), (3.0, 0.0), (3.0, 4.0), (0.0, 4.0), (1.0, 1.0)],
            demands: vec![0, 2, 3, 4, 7],
            depot: 0,
        })
        .unwrap()
    }

    #[test]
    fn distances_and_energy() {
        let problem = square();
        assert_eq!(problem.distance(0, 2), 5.0);
        assert_eq!(problem.distance(2, 0), 5.0);
        assert_eq!(problem.energy_consumption(0, 2), 10.0);
        assert_eq!(problem.total_nodes(), 5);
        assert_eq!(problem.customers(), &[1, 2, 3]);
        assert_eq!(problem.stations(), &[4]);
    }

    #[test]
    fn station_flags_and_demands() {
        let problem = square();
        assert!(problem.is_charging_station(0));
        assert!(problem.is_charging_station(4));
        assert!(!problem.is_charging_station(2));
        assert_eq!(problem.demand(4), 0);
        assert_eq!(problem.demand(3), 4);
    }

    #[test]
    fn nearest_station_respects_budget() {
        let problem = square();
        // node 2 -> station 4 is sqrt(4 + 9) * 2 ~= 7.21
        assert_eq!(problem.nearest_station(2, 90.0), Some(4));
        assert_eq!(problem.nearest_station(2, 95.0), None);
        assert_eq!(problem.nearest_station(4, 0.0), None);
    }

    #[test]
    fn tour_length_is_cached_until_invalidated() {
        let problem = square();
        let mut tour = Tour::new(1, vec![0, 1, 2, 3, 0]);
        assert!(tour.is_dirty());
        assert!(tour.evaluate(&problem));
        assert_eq!(tour.length(), Some(14.0));
        assert!(!tour.evaluate(&problem));
        tour.invalidate();
        assert_eq!(tour.length_or_inf(), f64::INFINITY);
    }

    #[test]
    fn customer_order_and_segments() {
        let problem = square();
        let tour = Tour::new(1, vec![0, 1, 4, 2, 0, 3, 0]);
        assert_eq!(tour.customer_order(&problem), vec![1, 2, 3]);
        let segments = tour.segments(&problem);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], &[0, 1, 4, 2, 0]);
        assert_eq!(segments[1], &[0, 3, 0]);
    }
}
