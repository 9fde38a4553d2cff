use std::fmt;

use crate::models::NodeId;

/// Errors raised while loading an instance or running the search.
///
/// The search itself only fails for conditions that mean the instance or the
/// parameters are inconsistent: an unrepairable route, a selection or
/// clustering loop that cannot make progress, or a corrupted crossover child.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    Parse { line: usize, message: String },
    InvalidInstance(String),
    InvalidConfig(String),
    InvalidTour(String),
    /// No charging station is reachable while walking back to the last charge point.
    InfeasibleRepair { node: NodeId, consumed: f64 },
    /// Tournament rejection sampling exceeded its attempt bound.
    SelectionStuck { attempts: usize, selected: usize },
    /// Greedy clustering opened more clusters than there are customers.
    ClusterOverflow { clusters: usize },
    /// A crossover child needed more routes than allowed.
    UnboundedRoutes { routes: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "i/o error: {}", e),
            Error::Json(e) => write!(f, "json error: {}", e),
            Error::Csv(e) => write!(f, "csv error: {}", e),
            Error::Parse { line, message } => write!(f, "line {}: {}", line, message),
            Error::InvalidInstance(message) => write!(f, "invalid instance: {}", message),
            Error::InvalidConfig(message) => write!(f, "invalid configuration: {}", message),
            Error::InvalidTour(message) => write!(f, "invalid tour: {}", message),
            Error::InfeasibleRepair { node, consumed } => write!(
                f,
                "no charging station reachable while backtracking from node {} (consumed {:.2})",
                node, consumed
            ),
            Error::SelectionStuck { attempts, selected } => write!(
                f,
                "tournament selection stuck after {} draws with {} individuals selected",
                attempts, selected
            ),
            Error::ClusterOverflow { clusters } => {
                write!(f, "cluster construction did not finish after {} clusters", clusters)
            }
            Error::UnboundedRoutes { routes } => {
                write!(f, "crossover child split into {} routes", routes)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Json(value)
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Error::Csv(value)
    }
}
