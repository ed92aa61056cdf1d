//! MILP formulations of the static Dial-A-Ride Problem (DARP).
//!
//! Two encodings are provided: a location-based model (`model::lb`) with
//! eagerly enumerated precedence-elimination subsets, and an event-based
//! model (`model::laeb`) over a precomputed feasible state-transition graph.
//! Solving is delegated to an external MILP backend behind
//! [`solve::MilpSolver`]; a solved arc selection is decoded back into
//! per-vehicle itineraries by [`routes`].

use std::fmt;
use std::path::Path;
use fnv::{FnvHashMap, FnvHashSet};

pub mod data;
pub mod model;
pub mod solve;
pub mod routes;

pub use anyhow::Result;

pub type Map<K, V> = FnvHashMap<K, V>;
pub type Set<T> = FnvHashSet<T>;


/// Failures raised by model construction and route reconstruction.  Solver
/// outcomes (infeasible, unbounded, time-limit) are not errors; they are
/// reported through [`solve::SolveStatus`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A parameter table is missing an entry the formulation needs.
    MissingData { table: &'static str, key: String },
    /// Eager subset enumeration was refused: 2n customer nodes would mean
    /// 2^(2n) candidate subsets.
    SubsetOverflow { customer_nodes: usize },
    /// Route reconstruction was requested but the solve produced no
    /// variable assignment.
    NoSolution,
    /// A successor walk ran out of selected arcs before reaching the end
    /// depot.  The assignment is inconsistent with the constraint model.
    RouteBroken { from: String },
    /// The solver backend failed outright (not infeasibility).
    SolverFailure(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::MissingData { table, key } =>
                write!(f, "missing required data key {} in table {}", key, table),
            ModelError::SubsetOverflow { customer_nodes } =>
                write!(f, "refusing eager subset enumeration over {} customer nodes", customer_nodes),
            ModelError::NoSolution =>
                write!(f, "no solution available"),
            ModelError::RouteBroken { from } =>
                write!(f, "no successor arc leaving {} (incomplete assignment)", from),
            ModelError::SolverFailure(msg) =>
                write!(f, "solver failure: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}


mod logging_setup {
    use super::*;
    use tracing_subscriber::{EnvFilter, fmt, registry, prelude::*};
    use tracing_appender::{non_blocking, non_blocking::WorkerGuard};
    use std::fs::OpenOptions;

    fn build_and_set_global_subscriber<P>(logfile: Option<P>, is_test: bool) -> Option<WorkerGuard> where
        P: AsRef<Path>
    {
        let stderr_log = fmt::layer().with_writer(std::io::stderr);
        let env_filter = EnvFilter::from_default_env();
        let r = registry().with(stderr_log).with(env_filter);

        let flush_guard = match logfile {
            Some(p) => {
                let logfile = match OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(p) {
                    Ok(f) => f,
                    Err(_) => return None,
                };
                let (writer, _guard) = non_blocking::NonBlockingBuilder::default()
                    .lossy(false)
                    .finish(logfile);
                let json = fmt::layer()
                    .json()
                    .with_span_list(true)
                    .with_current_span(false)
                    .with_writer(writer);

                let r = r.with(json);
                if is_test { r.try_init().ok(); }
                else { r.init(); }
                Some(_guard)
            },
            None => {
                if is_test { r.try_init().ok(); }
                else { r.init(); }
                None
            }
        };
        return flush_guard
    }

    pub fn init_logging(logfile: Option<impl AsRef<Path>>) -> Option<WorkerGuard> {
        return build_and_set_global_subscriber(logfile, false);
    }

    pub fn init_test_logging(logfile: Option<impl AsRef<Path>>) -> Option<WorkerGuard> {
        return build_and_set_global_subscriber(logfile, true);
    }
}
pub use logging_setup::*;


pub(crate) mod utils {
    /// Iterator over the indices of set bits, low to high.
    pub struct Biterator {
        bits: u64,
    }

    impl Biterator {
        pub fn new(val: u64) -> Self {
            return Self { bits: val };
        }
    }

    impl Iterator for Biterator {
        type Item = u32;

        fn next(&mut self) -> Option<Self::Item> {
            if self.bits == 0 {
                return None;
            }
            let i = self.bits.trailing_zeros();
            self.bits &= self.bits - 1;
            return Some(i);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn biterate() {
            fn get_inds(val: u64) -> Vec<u32> {
                return Biterator::new(val).collect();
            }

            assert_eq!(get_inds(0), Vec::<u32>::new());
            assert_eq!(get_inds(1), vec![0u32]);
            assert_eq!(get_inds(0b010101010101), vec![0, 2, 4, 6, 8, 10]);
            assert_eq!(get_inds(0b01110010011), vec![0, 1, 4, 7, 8, 9]);
            assert_eq!(get_inds(0b1111111111), vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        }
    }
}
