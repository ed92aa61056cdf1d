//! Solver boundary: an assembled [`Milp`] goes in, a status and (when one
//! exists) a complete variable assignment come out.  The backend is HiGHS;
//! anything else can slot in behind [`MilpSolver`].  The call blocks until
//! the solver returns; retry policy, if any, belongs to the caller.

use highs::{HighsModelStatus, RowProblem, Sense};
use tracing::*;

use crate::Result;
use crate::model::{Assignment, Cmp, Milp, VarDomain};

#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    Optimal,
    /// A feasible assignment without a proof of optimality.
    Feasible,
    Infeasible,
    /// A modeling defect (some bounding constraint is missing); distinct
    /// from infeasibility on purpose.
    Unbounded,
    /// The wall-clock budget ran out first.  Any assignment attached to the
    /// outcome is feasible but unverified-optimal; this is a reportable
    /// result, not a fault.
    TimeLimit,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    pub assignment: Option<Assignment>,
}

pub trait MilpSolver {
    fn name(&self) -> &str;

    /// Blocking solve of the full model.  Solver-level outcomes (infeasible,
    /// unbounded, time limit) are statuses, not `Err`s; `Err` is reserved
    /// for the backend itself failing.
    fn solve(&self, milp: &Milp) -> Result<SolveOutcome>;
}

/// The bundled HiGHS backend.
#[derive(Default, Debug, Clone)]
pub struct HighsSolver {
    /// Wall-clock budget in seconds; `None` runs to optimality.
    pub time_limit: Option<f64>,
    pub verbose: bool,
}

impl MilpSolver for HighsSolver {
    fn name(&self) -> &str {
        return "highs";
    }

    #[instrument(level = "info", name = "solve_highs", skip_all, fields(vars = milp.num_vars(), constrs = milp.num_constrs()))]
    fn solve(&self, milp: &Milp) -> Result<SolveOutcome> {
        let mut pb = RowProblem::default();
        let cols: Vec<_> = milp.domains.iter()
            .zip(milp.obj.iter())
            .map(|(dom, &c)| match *dom {
                VarDomain::Binary => pb.add_integer_column(c, 0..=1),
                VarDomain::Continuous { lb, ub } => pb.add_column(c, lb..=ub),
            })
            .collect();
        for ct in &milp.constrs {
            let row: Vec<_> = ct.terms.iter().map(|&(v, coef)| (cols[v], coef)).collect();
            match ct.cmp {
                Cmp::Le => pb.add_row(..=ct.rhs, row),
                Cmp::Ge => pb.add_row(ct.rhs.., row),
                Cmp::Eq => pb.add_row(ct.rhs..=ct.rhs, row),
            };
        }

        let mut model = pb.optimise(Sense::Minimise);
        model.set_option("output_flag", self.verbose);
        if let Some(limit) = self.time_limit {
            model.set_option("time_limit", limit);
        }

        let solved = model.solve();
        let (status, has_assignment) = map_status(solved.status());

        let assignment = if has_assignment {
            let solution = solved.get_solution();
            let columns = solution.columns();
            if columns.len() == milp.num_vars() {
                Some(Assignment(columns.to_vec()))
            } else {
                // a time limit can expire before any incumbent exists
                None
            }
        } else {
            None
        };
        let objective = assignment.as_ref().map(|a| milp.objective_value(a));

        info!(status = ?status, objective = ?objective, "solver finished");
        return Ok(SolveOutcome { status, objective, assignment });
    }
}

/// Maps a HiGHS termination onto the status taxonomy, with a flag for
/// whether an incumbent assignment should be kept.  A limit-terminated run
/// keeps its incumbent but is never reported `Optimal`.
fn map_status(raw: HighsModelStatus) -> (SolveStatus, bool) {
    return match raw {
        HighsModelStatus::Optimal => (SolveStatus::Optimal, true),
        HighsModelStatus::Infeasible => (SolveStatus::Infeasible, false),
        HighsModelStatus::Unbounded => (SolveStatus::Unbounded, false),
        HighsModelStatus::UnboundedOrInfeasible => {
            // presolve could not tell the two apart; with boxed variables
            // the model cannot actually be unbounded
            warn!("solver reported unbounded-or-infeasible");
            (SolveStatus::Infeasible, false)
        }
        HighsModelStatus::ReachedTimeLimit => (SolveStatus::TimeLimit, true),
        // terminations that stop short of an optimality proof but may still
        // carry an incumbent
        HighsModelStatus::ObjectiveBound
        | HighsModelStatus::ObjectiveTarget
        | HighsModelStatus::ReachedIterationLimit => (SolveStatus::Feasible, true),
        other => (SolveStatus::Error(format!("{:?}", other)), false),
    };
}
