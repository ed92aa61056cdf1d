//! Location-based (LB) MILP encoding, after Ropke et al. (2007): binary
//! arc-selection variables over the valid-arc set, continuous service-start
//! and load variables, and one precedence-elimination constraint per
//! enumerated node subset.

use rayon::prelude::*;
use tracing::*;

use crate::{Map, ModelError, Result};
use crate::data::{LbInstance, Loc};
use crate::utils::Biterator;
use super::{Cmp, Milp, VarId};

/// Refuse eager enumeration beyond this many customer nodes (2^24 candidate
/// masks).  Past that point the constraint family has to be generated
/// lazily, by separation inside the solver, which is outside this crate.
pub const MAX_ENUM_NODES: usize = 24;

pub struct LbModel {
    pub data: LbInstance,
    pub arcs: Vec<(Loc, Loc)>,
    pub subsets: Vec<Vec<Loc>>,
    pub milp: Milp,
    pub x: Map<(Loc, Loc), VarId>,
    pub b: Map<Loc, VarId>,
    pub q: Map<Loc, VarId>,
    /// Row indices of the Big-M time and load consistency constraints, in
    /// arc order.
    pub time_rows: Vec<usize>,
    pub load_rows: Vec<usize>,
}

/// Enumerates every customer-node subset `S` (augmented with the origin
/// depot) that contains some request's delivery without its pickup.  Each
/// such subset yields the elimination constraint
/// `Σ x[i,j] over arcs within S  ≤  |S| − 2`.
///
/// This is an exhaustive sweep over all 2^(2n) bitmasks and only tractable
/// for small n; it eagerly materializes what is really a cutting-plane
/// family a production solver would separate on demand.  Candidate masks are
/// independent, so the sweep is sharded across the rayon pool and merged by
/// concatenation (the family is a set, order is irrelevant but kept
/// deterministic by the indexed collect).
#[instrument(level = "debug", skip(data), fields(id = %data.id))]
pub fn precedence_subsets(data: &LbInstance) -> Result<Vec<Vec<Loc>>, ModelError> {
    let customers = data.customers();
    let m = customers.len();
    if m > MAX_ENUM_NODES {
        return Err(ModelError::SubsetOverflow { customer_nodes: m });
    }
    if data.n > 7 {
        warn!(n = data.n, "eager subset enumeration on a large instance");
    }

    let n = data.n as usize;
    let subsets: Vec<Vec<Loc>> = (1u64..(1u64 << m))
        .into_par_iter()
        .filter_map(|mask| {
            // customers[r] is pickup r+1, customers[n + r] its delivery
            let violates = (0..n).any(|r| mask >> (n + r) & 1 == 1 && mask >> r & 1 == 0);
            if !violates {
                return None;
            }
            let mut s = Vec::with_capacity(mask.count_ones() as usize + 1);
            s.push(data.o_depot);
            s.extend(Biterator::new(mask).map(|k| customers[k as usize]));
            return Some(s);
        })
        .collect();

    debug!(count = subsets.len(), "precedence-violating subsets enumerated");
    return Ok(subsets);
}

#[instrument(level = "info", name = "build_lb", skip(data), fields(id = %data.id))]
pub fn build(data: LbInstance) -> Result<LbModel> {
    data.validate()?;
    let arcs = data.arcs();
    let nodes = data.nodes();
    let subsets = precedence_subsets(&data)?;

    let mut milp = Milp::default();

    // x[i,j]: arc driven by some vehicle; objective (1a) is the total cost
    let mut x: Map<(Loc, Loc), VarId> = Map::default();
    for &(i, j) in &arcs {
        x.insert((i, j), milp.add_binary(data.travel_cost[&(i, j)]));
    }
    // B[j]: service start, boxed by the time window; Q[j]: load after
    // leaving j, boxed by max(0, q_j) .. min(Q, Q + q_j)
    let mut b: Map<Loc, VarId> = Map::default();
    let mut q: Map<Loc, VarId> = Map::default();
    for &j in &nodes {
        b.insert(j, milp.add_continuous(0.0, data.tw_start[&j], data.tw_end[&j]));
        let qj = data.load_change[&j] as f64;
        let cap = data.capacity as f64;
        q.insert(j, milp.add_continuous(0.0, qj.max(0.0), cap.min(cap + qj)));
    }

    // (1b)/(1c): each customer location entered and left exactly once
    for &j in &data.customers() {
        let inflow = arcs.iter().filter(|&&(_, w)| w == j).map(|a| (x[a], 1.0)).collect();
        milp.add_constr(inflow, Cmp::Eq, 1.0);
        let outflow = arcs.iter().filter(|&&(v, _)| v == j).map(|a| (x[a], 1.0)).collect();
        milp.add_constr(outflow, Cmp::Eq, 1.0);
    }

    // (1d): at most K vehicles leave the origin depot towards a pickup
    let fleet = data.P.iter().map(|&p| (x[&(data.o_depot, p)], 1.0)).collect();
    milp.add_constr(fleet, Cmp::Le, data.K as f64);

    // (1e): pairing and precedence via subset elimination
    for s in &subsets {
        let within: Vec<_> = s.iter()
            .flat_map(|&i| s.iter().map(move |&j| (i, j)))
            .filter_map(|a| x.get(&a).map(|&v| (v, 1.0)))
            .collect();
        milp.add_constr(within, Cmp::Le, s.len() as f64 - 2.0);
    }

    // (1f)/(1g): Big-M time and load continuity along selected arcs.  M is
    // sized to the exact worst-case slack so the row is vacuous at x = 0.
    let mut time_rows = Vec::with_capacity(arcs.len());
    let mut load_rows = Vec::with_capacity(arcs.len());
    for &(i, j) in &arcs {
        let s_i = data.service_time[&i];
        let t_ij = data.travel_time[&(i, j)];
        let m_ij = data.tw_end[&i] + s_i + t_ij - data.tw_start[&j];
        let row = milp.add_constr(
            vec![(b[&i], 1.0), (b[&j], -1.0), (x[&(i, j)], m_ij)],
            Cmp::Le,
            m_ij - s_i - t_ij,
        );
        time_rows.push(row);

        let cap = data.capacity as f64;
        let q_j = data.load_change[&j] as f64;
        let row = milp.add_constr(
            vec![(q[&i], 1.0), (q[&j], -1.0), (x[&(i, j)], cap)],
            Cmp::Le,
            cap - q_j,
        );
        load_rows.push(row);
    }

    // (1j): ride duration per request
    for r in 1..=data.n {
        let (p, d) = (r, data.dmap(r));
        milp.add_constr(
            vec![(b[&d], 1.0), (b[&p], -1.0)],
            Cmp::Le,
            data.max_ride_time[&r] + data.service_time[&p],
        );
    }

    info!(
        vars = milp.num_vars(),
        constrs = milp.num_constrs(),
        subsets = subsets.len(),
        "LB model assembled"
    );
    return Ok(LbModel { data, arcs, subsets, milp, x, b, q, time_rows, load_rows });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::examples;
    use crate::model::{Assignment, VarDomain};
    use proptest::prelude::*;

    fn skeleton(n: Loc) -> LbInstance {
        // enumeration only looks at the node numbering
        return LbInstance {
            id: format!("skeleton_{}", n),
            n,
            P: (1..=n).collect(),
            D: (n + 1..=2 * n).collect(),
            o_depot: 0,
            d_depot: 2 * n + 1,
            ..LbInstance::default()
        };
    }

    fn subset_count(n: Loc) -> usize {
        return precedence_subsets(&skeleton(n)).unwrap().len();
    }

    /// Per request a subset may contain {neither node, pickup only, both},
    /// so non-violating masks number 3^n and violating ones 4^n - 3^n.
    #[test]
    fn subset_counts() {
        assert_eq!(subset_count(1), 1);
        assert_eq!(subset_count(2), 7);
        assert_eq!(subset_count(3), 37);
    }

    #[test]
    fn subsets_contain_depot_and_violate_precedence() {
        let data = examples::three_request(1);
        for s in precedence_subsets(&data).unwrap() {
            assert_eq!(s[0], data.o_depot);
            let violated = (1..=data.n).any(|r| s.contains(&data.dmap(r)) && !s.contains(&r));
            assert!(violated, "subset {:?} does not violate precedence", s);
        }
    }

    #[test]
    fn subset_enumeration_is_deterministic() {
        let data = examples::three_request(1);
        let a = precedence_subsets(&data).unwrap();
        let b = precedence_subsets(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_instance_is_refused() {
        assert_eq!(
            precedence_subsets(&skeleton(14)),
            Err(ModelError::SubsetOverflow { customer_nodes: 28 })
        );
    }

    #[test]
    fn model_shape() {
        let model = build(examples::single_request(30.0)).unwrap();
        // 7 arcs, 4 B vars, 4 Q vars
        assert_eq!(model.milp.num_vars(), 15);
        assert_eq!(model.subsets.len(), 1);
        // visit/leave (4) + fleet (1) + subsets (1) + time/load (14) + ride (1)
        assert_eq!(model.milp.num_constrs(), 21);
        for &(i, j) in &model.arcs {
            assert!(model.data.valid_arc(i, j));
        }
    }

    proptest! {
        /// With every x fixed to 0, the Big-M rows must impose nothing on
        /// any B and Q inside their boxes.
        #[test]
        fn big_m_rows_are_vacuous_at_x_zero(frac in proptest::collection::vec(0.0f64..=1.0, 15)) {
            let model = build(examples::single_request(30.0)).unwrap();
            let values: Vec<f64> = model.milp.domains.iter()
                .zip(frac.iter())
                .map(|(dom, f)| match *dom {
                    VarDomain::Binary => 0.0,
                    VarDomain::Continuous { lb, ub } => lb + f * (ub - lb),
                })
                .collect();
            let a = Assignment(values);
            for &row in model.time_rows.iter().chain(model.load_rows.iter()) {
                prop_assert!(model.milp.constrs[row].satisfied(&a, 1e-9));
            }
        }
    }
}
