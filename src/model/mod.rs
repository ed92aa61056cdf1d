//! MILP value types shared by both DARP encodings, and the tagged
//! [`Formulation`] dispatching between them.
//!
//! A model build is a deterministic, single-threaded transformation of an
//! immutable instance into one [`Milp`] value; nothing here talks to a
//! solver.

use crate::{ModelError, Result};
use crate::data::{LaebInstance, LbInstance};
use crate::routes::{self, Route};
use crate::solve::{MilpSolver, SolveOutcome};

pub mod lb;
pub mod laeb;

pub type VarId = usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarDomain {
    Binary,
    Continuous { lb: f64, ub: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Le,
    Ge,
    Eq,
}

/// One linear constraint `Σ coef · var  (≤ | ≥ | =)  rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constr {
    pub terms: Vec<(VarId, f64)>,
    pub cmp: Cmp,
    pub rhs: f64,
}

impl Constr {
    pub fn lhs(&self, a: &Assignment) -> f64 {
        return self.terms.iter().map(|&(v, coef)| coef * a.value(v)).sum();
    }

    pub fn satisfied(&self, a: &Assignment, tol: f64) -> bool {
        let lhs = self.lhs(a);
        return match self.cmp {
            Cmp::Le => lhs <= self.rhs + tol,
            Cmp::Ge => lhs >= self.rhs - tol,
            Cmp::Eq => (lhs - self.rhs).abs() <= tol,
        };
    }
}

/// An assembled model: variable domains, objective coefficients (aligned
/// with the variables) and constraint rows.  Box bounds such as time windows
/// live on the variable domains rather than as rows.
#[derive(Default, Debug, Clone)]
pub struct Milp {
    pub domains: Vec<VarDomain>,
    pub obj: Vec<f64>,
    pub constrs: Vec<Constr>,
}

impl Milp {
    pub fn add_binary(&mut self, obj: f64) -> VarId {
        self.domains.push(VarDomain::Binary);
        self.obj.push(obj);
        return self.domains.len() - 1;
    }

    pub fn add_continuous(&mut self, obj: f64, lb: f64, ub: f64) -> VarId {
        self.domains.push(VarDomain::Continuous { lb, ub });
        self.obj.push(obj);
        return self.domains.len() - 1;
    }

    /// Appends a constraint row and returns its index.
    pub fn add_constr(&mut self, terms: Vec<(VarId, f64)>, cmp: Cmp, rhs: f64) -> usize {
        debug_assert!(terms.iter().all(|&(v, _)| v < self.domains.len()));
        self.constrs.push(Constr { terms, cmp, rhs });
        return self.constrs.len() - 1;
    }

    pub fn num_vars(&self) -> usize {
        return self.domains.len();
    }

    pub fn num_constrs(&self) -> usize {
        return self.constrs.len();
    }

    pub fn objective_value(&self, a: &Assignment) -> f64 {
        return self.obj.iter().zip(a.0.iter()).map(|(c, x)| c * x).sum();
    }
}

/// A complete variable assignment returned by a solver, indexed by `VarId`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment(pub Vec<f64>);

impl Assignment {
    #[inline]
    pub fn value(&self, v: VarId) -> f64 {
        return self.0[v];
    }

    pub fn len(&self) -> usize {
        return self.0.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.0.is_empty();
    }
}

/// The two DARP encodings behind one capability: build, hand the MILP to a
/// solver, and decode an assignment back into itineraries.
pub enum Formulation {
    Lb(lb::LbModel),
    Laeb(laeb::LaebModel),
}

impl Formulation {
    pub fn build_lb(data: LbInstance) -> Result<Formulation> {
        return Ok(Formulation::Lb(lb::build(data)?));
    }

    pub fn build_laeb(data: LaebInstance) -> Result<Formulation> {
        return Ok(Formulation::Laeb(laeb::build(data)?));
    }

    pub fn milp(&self) -> &Milp {
        return match self {
            Formulation::Lb(m) => &m.milp,
            Formulation::Laeb(m) => &m.milp,
        };
    }

    /// Blocking handoff to the solver boundary.  Retry or backoff on a
    /// time-limit outcome is the caller's decision.
    pub fn solve(&self, solver: &dyn MilpSolver) -> Result<SolveOutcome> {
        return solver.solve(self.milp());
    }

    /// Decodes the solved arc selection into one itinerary per vehicle that
    /// departs the depot.  Calling this on an outcome without an assignment
    /// is a usage error ([`ModelError::NoSolution`]).
    pub fn routes(&self, outcome: &SolveOutcome) -> Result<Vec<Route>> {
        let assignment = outcome.assignment.as_ref().ok_or(ModelError::NoSolution)?;
        return match self {
            Formulation::Lb(m) => routes::reconstruct_lb(m, assignment),
            Formulation::Laeb(m) => routes::reconstruct_laeb(m, assignment),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constr_eval() {
        let mut milp = Milp::default();
        let x = milp.add_binary(1.0);
        let b = milp.add_continuous(0.0, 0.0, 10.0);
        milp.add_constr(vec![(x, 2.0), (b, -1.0)], Cmp::Le, 1.0);

        let a = Assignment(vec![1.0, 1.0]);
        assert_eq!(milp.constrs[0].lhs(&a), 1.0);
        assert!(milp.constrs[0].satisfied(&a, 1e-6));
        assert_eq!(milp.objective_value(&a), 1.0);

        let a = Assignment(vec![1.0, 0.5]);
        assert!(!milp.constrs[0].satisfied(&a, 1e-6));
    }

    #[test]
    fn routes_before_solve_is_a_usage_error() {
        use crate::data::examples;
        use crate::solve::{SolveOutcome, SolveStatus};

        let model = Formulation::build_lb(examples::single_request(30.0)).unwrap();
        let outcome = SolveOutcome { status: SolveStatus::Infeasible, objective: None, assignment: None };
        let err = model.routes(&outcome).unwrap_err();
        assert_eq!(err.downcast_ref::<ModelError>(), Some(&ModelError::NoSolution));
    }
}
