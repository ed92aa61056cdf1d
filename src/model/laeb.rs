//! Location-augmented event-based (LAEB) MILP encoding, after Gaul et al.:
//! binary selection over event-graph arcs and one continuous service-start
//! variable per physical location.  Pairing, precedence and capacity are
//! structural properties of the event graph, so the only constraint
//! families left are flow conservation, pickup cover, the fleet limit and
//! time consistency.

use itertools::Itertools;
use tracing::*;

use crate::{Map, Result};
use crate::data::{LaebInstance, Loc};
use super::{Cmp, Milp, VarId};

pub struct LaebModel {
    pub data: LaebInstance,
    pub milp: Milp,
    /// One selection variable per event arc, parallel to `data.graph.arcs`.
    pub x: Vec<VarId>,
    /// Service start B̄[j] per physical location.
    pub b: Map<Loc, VarId>,
    /// Row indices of the aggregated time-consistency constraints, keyed by
    /// the ordered location pair they cover.
    pub time_rows: Map<(Loc, Loc), usize>,
}

#[instrument(level = "info", name = "build_laeb", skip(data), fields(id = %data.id))]
pub fn build(data: LaebInstance) -> Result<LaebModel> {
    data.validate()?;
    let graph = &data.graph;

    let mut milp = Milp::default();
    let x: Vec<VarId> = graph.arcs.iter().map(|arc| milp.add_binary(arc.cost)).collect();
    let mut b: Map<Loc, VarId> = Map::default();
    for &j in &data.locations() {
        b.insert(j, milp.add_continuous(0.0, data.tw_start[&j], data.tw_end[&j]));
    }

    // (2b): event flow balance everywhere except the depot event
    for (v, ev) in graph.events.iter().enumerate() {
        if ev.is_depot() {
            continue;
        }
        let mut terms = Vec::new();
        for (k, arc) in graph.arcs.iter().enumerate() {
            if arc.to == v {
                terms.push((x[k], 1.0));
            } else if arc.from == v {
                terms.push((x[k], -1.0));
            }
        }
        milp.add_constr(terms, Cmp::Eq, 0.0);
    }

    // (2c): exactly one selected arc ends in a pickup event of each request
    for &p in &data.P {
        let cover = graph.arcs.iter().enumerate()
            .filter(|(_, arc)| graph.events[arc.to].loc == p)
            .map(|(k, _)| (x[k], 1.0))
            .collect();
        milp.add_constr(cover, Cmp::Eq, 1.0);
    }

    // (2d): fleet limit on departures from the depot event
    let fleet = graph.arcs.iter().enumerate()
        .filter(|(_, arc)| arc.from == graph.depot)
        .map(|(k, _)| (x[k], 1.0))
        .collect();
    milp.add_constr(fleet, Cmp::Le, data.K as f64);

    // (3b): time consistency, aggregated over every event arc connecting
    // the same ordered pair of physical locations.  Pairs with no arcs are
    // skipped.  Pairs ending at the depot are also skipped: B̄[0] is the
    // departure time, and bounding it by the return legs would make every
    // closed route contradict itself.
    let mut arcs_by_pair: Map<(Loc, Loc), Vec<VarId>> = Map::default();
    for (k, arc) in graph.arcs.iter().enumerate() {
        let pair = (graph.events[arc.from].loc, graph.events[arc.to].loc);
        if pair.1 == data.depot {
            continue;
        }
        arcs_by_pair.entry(pair).or_insert_with(Vec::new).push(x[k]);
    }
    let mut time_rows: Map<(Loc, Loc), usize> = Map::default();
    for (&(i, j), group) in arcs_by_pair.iter().sorted_by_key(|(pair, _)| **pair) {
        let s_i = data.service_time[&i];
        let t_ij = data.travel_time[&(i, j)];
        let m_ij = data.tw_end[&i] + s_i + t_ij - data.tw_start[&j];
        // B̄[j] ≥ B̄[i] + s_i + t_ij − M(1 − Σ x)  as a ≤ row
        let mut terms = vec![(b[&i], 1.0), (b[&j], -1.0)];
        terms.extend(group.iter().map(|&v| (v, m_ij)));
        let row = milp.add_constr(terms, Cmp::Le, m_ij - s_i - t_ij);
        time_rows.insert((i, j), row);
    }

    // (1j): ride duration per request, on the location service starts
    for r in 1..=data.n {
        let (p, d) = (r, data.dmap(r));
        milp.add_constr(
            vec![(b[&d], 1.0), (b[&p], -1.0)],
            Cmp::Le,
            data.max_ride_time[&r] + data.service_time[&p],
        );
    }

    info!(
        events = graph.events.len(),
        arcs = graph.arcs.len(),
        vars = milp.num_vars(),
        constrs = milp.num_constrs(),
        "LAEB model assembled"
    );
    return Ok(LaebModel { data, milp, x, b, time_rows });
}
