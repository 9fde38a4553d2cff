//! Reader for the `.evrp` instance format.
//!
//! ```text
//! Name: E-n22-k4
//! OPTIMAL_VALUE: 384.678035
//! VEHICLES: 4
//! DIMENSION: 22
//! STATIONS: 8
//! CAPACITY: 6000
//! ENERGY_CAPACITY: 94
//! ENERGY_CONSUMPTION: 1.00
//! EDGE_WEIGHT_TYPE: EUC_2D
//! NODE_COORD_SECTION
//! 1 145 215
//! ...
//! DEMAND_SECTION
//! 1 0
//! ...
//! DEPOT_SECTION
//! 1
//! -1
//! EOF
//! ```
//!
//! Node ids are 1-based in the file and 0-based in memory. The sections must come in the
//! order `NODE_COORD_SECTION`, `DEMAND_SECTION`, `DEPOT_SECTION`: coordinate and demand
//! counts depend on headers read before them.

use std::fs;
use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::Problem;

/// Raw instance data, before distances are computed.
#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    /// Depot plus customers.
    pub dimension: usize,
    pub stations: usize,
    pub capacity: u32,
    pub vehicles: usize,
    pub energy_capacity: f64,
    pub energy_consumption: f64,
    pub optimal_value: Option<f64>,
    /// One entry per node, stations included.
    pub coords: Vec<(f64, f64)>,
    /// One entry per node; stations are left at zero.
    pub demands: Vec<u32>,
    pub depot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Header,
    Coordinates,
    Demands,
    Depot,
}

#[derive(Default)]
struct Headers {
    dimension: Option<usize>,
    stations: Option<usize>,
    capacity: Option<u32>,
    vehicles: Option<usize>,
    energy_capacity: Option<f64>,
    energy_consumption: Option<f64>,
    optimal_value: Option<f64>,
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

fn header_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?;
    let rest = rest.trim_start();
    Some(rest.strip_prefix(':').unwrap_or(rest).trim())
}

fn parse_number<T: std::str::FromStr>(value: &str, line: usize, key: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| parse_error(line, format!("{} is not a number: {:?}", key, value)))
}

/// Parses instance text. `name` is used when the file carries no `Name:` header.
pub fn parse_instance(text: &str, name: &str) -> Result<Instance> {
    let lines: Vec<&str> = text.lines().collect();
    let mut headers = Headers::default();
    let mut instance_name = name.to_string();
    let mut coords: Option<Vec<(f64, f64)>> = None;
    let mut demands: Option<Vec<u32>> = None;
    let mut depot: Option<usize> = None;
    let mut section = Section::Header;

    let mut k = 0;
    while k < lines.len() {
        let line = lines[k].trim();
        let line_no = k + 1;
        k += 1;

        if line.is_empty() {
            continue;
        }
        if let Some(value) = header_value(line, "Name") {
            instance_name = value.to_string();
        } else if let Some(value) = header_value(line, "DIMENSION") {
            headers.dimension = Some(parse_number(value, line_no, "DIMENSION")?);
        } else if let Some(value) = header_value(line, "EDGE_WEIGHT_TYPE") {
            if value != "EUC_2D" {
                return Err(parse_error(line_no, format!("unsupported edge weight {}", value)));
            }
        } else if let Some(value) = header_value(line, "CAPACITY") {
            headers.capacity = Some(parse_number(value, line_no, "CAPACITY")?);
        } else if let Some(value) = header_value(line, "VEHICLES") {
            headers.vehicles = Some(parse_number(value, line_no, "VEHICLES")?);
        } else if let Some(value) = header_value(line, "ENERGY_CAPACITY") {
            headers.energy_capacity = Some(parse_number(value, line_no, "ENERGY_CAPACITY")?);
        } else if let Some(value) = header_value(line, "ENERGY_CONSUMPTION") {
            headers.energy_consumption =
                Some(parse_number(value, line_no, "ENERGY_CONSUMPTION")?);
        } else if let Some(value) = header_value(line, "OPTIMAL_VALUE") {
            headers.optimal_value = Some(parse_number(value, line_no, "OPTIMAL_VALUE")?);
        } else if line.starts_with("STATIONS_COORD_SECTION") {
            // Station ids repeat what the coordinates already imply.
            continue;
        } else if let Some(value) = header_value(line, "STATIONS") {
            headers.stations = Some(parse_number(value, line_no, "STATIONS")?);
        } else if line.starts_with("NODE_COORD_SECTION") {
            if section >= Section::Coordinates {
                return Err(parse_error(line_no, "NODE_COORD_SECTION out of order"));
            }
            section = Section::Coordinates;
            let dimension = required(headers.dimension, line_no, "DIMENSION")?;
            let stations = required(headers.stations, line_no, "STATIONS")?;
            let total = dimension + stations;
            let mut values = vec![(0.0, 0.0); total];
            for _ in 0..total {
                let (row, row_no) = next_row(&lines, &mut k, "NODE_COORD_SECTION")?;
                let fields: Vec<&str> = row.split_whitespace().collect();
                if fields.len() < 3 {
                    return Err(parse_error(row_no, "expected `id x y`"));
                }
                let id = node_index(fields[0], row_no, total)?;
                values[id] = (
                    parse_number(fields[1], row_no, "x")?,
                    parse_number(fields[2], row_no, "y")?,
                );
            }
            coords = Some(values);
        } else if line.starts_with("DEMAND_SECTION") {
            if section != Section::Coordinates {
                return Err(parse_error(
                    line_no,
                    "DEMAND_SECTION must follow NODE_COORD_SECTION",
                ));
            }
            section = Section::Demands;
            let dimension = required(headers.dimension, line_no, "DIMENSION")?;
            let stations = headers.stations.unwrap_or(0);
            let mut values = vec![0; dimension + stations];
            for _ in 0..dimension {
                let (row, row_no) = next_row(&lines, &mut k, "DEMAND_SECTION")?;
                let fields: Vec<&str> = row.split_whitespace().collect();
                if fields.len() < 2 {
                    return Err(parse_error(row_no, "expected `id demand`"));
                }
                let id = node_index(fields[0], row_no, dimension)?;
                values[id] = parse_number(fields[1], row_no, "demand")?;
            }
            demands = Some(values);
        } else if line.starts_with("DEPOT_SECTION") {
            if section != Section::Demands {
                return Err(parse_error(line_no, "DEPOT_SECTION must follow DEMAND_SECTION"));
            }
            section = Section::Depot;
            let dimension = required(headers.dimension, line_no, "DIMENSION")?;
            let (row, row_no) = next_row(&lines, &mut k, "DEPOT_SECTION")?;
            depot = Some(node_index(row, row_no, dimension)?);
        } else if line == "EOF" || line == "-1" || line.starts_with("COMMENT") {
            continue;
        } else if section == Section::Header {
            warn!(line = line_no, "ignoring unknown header {:?}", line);
        }
    }

    let eof = lines.len();
    Ok(Instance {
        name: instance_name,
        dimension: required(headers.dimension, eof, "DIMENSION")?,
        stations: required(headers.stations, eof, "STATIONS")?,
        capacity: required(headers.capacity, eof, "CAPACITY")?,
        vehicles: required(headers.vehicles, eof, "VEHICLES")?,
        energy_capacity: required(headers.energy_capacity, eof, "ENERGY_CAPACITY")?,
        energy_consumption: required(headers.energy_consumption, eof, "ENERGY_CONSUMPTION")?,
        optimal_value: headers.optimal_value,
        coords: required(coords, eof, "NODE_COORD_SECTION")?,
        demands: required(demands, eof, "DEMAND_SECTION")?,
        depot: required(depot, eof, "DEPOT_SECTION")?,
    })
}

fn required<T>(value: Option<T>, line: usize, key: &str) -> Result<T> {
    value.ok_or_else(|| parse_error(line, format!("missing {}", key)))
}

fn next_row<'a>(lines: &[&'a str], k: &mut usize, section: &str) -> Result<(&'a str, usize)> {
    while *k < lines.len() {
        let row = lines[*k].trim();
        *k += 1;
        if !row.is_empty() {
            return Ok((row, *k));
        }
    }
    Err(parse_error(*k, format!("{} ended early", section)))
}

fn node_index(field: &str, line: usize, limit: usize) -> Result<usize> {
    let id: usize = parse_number(field.trim(), line, "node id")?;
    if id == 0 || id > limit {
        return Err(parse_error(line, format!("node id {} outside 1..={}", id, limit)));
    }
    Ok(id - 1)
}

/// Reads and parses an instance file. The file stem names instances without a `Name:` line.
pub fn read_instance<P: AsRef<Path>>(path: P) -> Result<Instance> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let fallback = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_instance(&text, &fallback)
}

/// Reads an instance file and builds the problem model from it.
pub fn read_problem<P: AsRef<Path>>(path: P) -> Result<Problem> {
    Problem::new(read_instance(path)?)
}

/// Generates a random instance on a 100 x 100 grid with the depot in the middle.
///
/// Demands are drawn from `1..=10`, vehicles carry 50 and the fleet is just large enough for the
/// total demand. The battery covers any two arcs in the grid, so every route can be repaired as
/// long as there is at least one station.
pub fn random_instance(customers: usize, stations: usize, seed: u64) -> Instance {
    let mut rng = SmallRng::seed_from_u64(seed);
    let dimension = customers + 1;
    let total = dimension + stations;

    let mut coords = Vec::with_capacity(total);
    coords.push((50.0, 50.0));
    for _ in 1..total {
        coords.push((rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)));
    }
    let mut demands = vec![0; total];
    for demand in demands.iter_mut().take(dimension).skip(1) {
        *demand = rng.gen_range(1..=10);
    }

    let capacity = 50;
    let total_demand: u32 = demands.iter().sum();
    let vehicles = ((total_demand + capacity - 1) / capacity).max(1) as usize;

    Instance {
        name: format!("random-n{}-s{}", customers, stations),
        dimension,
        stations,
        capacity,
        vehicles,
        energy_capacity: 300.0,
        energy_consumption: 1.0,
        optimal_value: None,
        coords,
        demands,
        depot: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "Name: tiny
COMMENT: hand made
OPTIMAL_VALUE: 42.5
VEHICLES: 2
DIMENSION: 4
STATIONS: 1
CAPACITY: 10
ENERGY_CAPACITY: 50
ENERGY_CONSUMPTION: 1.5
EDGE_WEIGHT_TYPE: EUC_2D
NODE_COORD_SECTION
1 0 0
2 10 0
3 0 10
4 10 10
5 5 5
DEMAND_SECTION
1 0
2 3
3 4
4 5
STATIONS_COORD_SECTION
5
DEPOT_SECTION
1
-1
EOF
";

    #[test]
    fn parses_headers_and_sections() {
        let instance = parse_instance(SMALL, "fallback").unwrap();
        assert_eq!(instance.name, "tiny");
        assert_eq!(instance.dimension, 4);
        assert_eq!(instance.stations, 1);
        assert_eq!(instance.capacity, 10);
        assert_eq!(instance.vehicles, 2);
        assert_eq!(instance.energy_capacity, 50.0);
        assert_eq!(instance.energy_consumption, 1.5);
        assert_eq!(instance.optimal_value, Some(42.5));
        assert_eq!(instance.coords[4], (5.0, 5.0));
        assert_eq!(instance.demands, vec![0, 3, 4, 5, 0]);
        assert_eq!(instance.depot, 0);
    }

    #[test]
    fn builds_problem() {
        let problem = Problem::new(parse_instance(SMALL, "x").unwrap()).unwrap();
        assert_eq!(problem.num_customers, 3);
        assert_eq!(problem.total_nodes(), 5);
        assert_eq!(problem.distance(0, 1), 10.0);
        assert_eq!(problem.energy_consumption(0, 1), 15.0);
        assert!(problem.is_charging_station(4));
        assert!(problem.is_charging_station(0));
    }

    #[test]
    fn rejects_non_euclidean_weights() {
        let text = SMALL.replace("EUC_2D", "GEO");
        assert!(matches!(
            parse_instance(&text, "x"),
            Err(Error::Parse { line: 10, .. })
        ));
    }

    #[test]
    fn rejects_sections_out_of_order() {
        let text = "DIMENSION: 2\nSTATIONS: 0\nDEMAND_SECTION\n1 0\n2 1\n";
        assert!(matches!(
            parse_instance(text, "x"),
            Err(Error::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn random_instances_are_reproducible() {
        let a = random_instance(12, 3, 7);
        let b = random_instance(12, 3, 7);
        assert_eq!(a.coords, b.coords);
        assert_eq!(a.demands, b.demands);
        let problem = Problem::new(a).unwrap();
        assert_eq!(problem.num_customers, 12);
        assert_eq!(problem.stations().len(), 3);
        let total: u32 = problem.customers().iter().map(|&c| problem.demand(c)).sum();
        assert!(total <= problem.capacity * problem.min_vehicles as u32);
    }

    #[test]
    fn reports_truncated_sections() {
        let cut = SMALL.split("DEMAND_SECTION").next().unwrap();
        let text = format!("{}DEMAND_SECTION\n1 0\n", cut);
        assert!(parse_instance(&text, "x").is_err());
    }
}
