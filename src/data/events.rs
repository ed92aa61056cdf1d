//! Event graph for the location-augmented event-based (LAEB) encoding.
//!
//! An event is a reachable `(location, onboard requests)` configuration; the
//! depot is the degenerate event with nothing aboard.  Load and
//! pickup-before-delivery ordering are baked into the event identities, so
//! the MILP built over this graph needs no load variables and no
//! subset-elimination constraints.

use itertools::Itertools;
use tracing::*;

use crate::{Map, ModelError};
use super::{Cost, Demand, Loc, LbInstance, Req, Time, Vehicle};

pub type EventId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    pub loc: Loc,
    /// Requests aboard after service at `loc`, sorted ascending.
    pub onboard: Vec<Req>,
}

impl Event {
    pub fn depot() -> Self {
        return Event { loc: 0, onboard: Vec::new() };
    }

    #[inline]
    pub fn is_depot(&self) -> bool {
        return self.loc == 0;
    }

    #[inline]
    pub fn load(&self) -> Demand {
        return self.onboard.len() as Demand;
    }
}

/// A feasible direct transition between two events.  Cost and travel time
/// come from the physical travel matrix between the two locations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventArc {
    pub from: EventId,
    pub to: EventId,
    pub cost: Cost,
    pub time: Time,
}

#[derive(Default, Debug, Clone)]
pub struct EventGraph {
    pub events: Vec<Event>,
    pub arcs: Vec<EventArc>,
    pub depot: EventId,
}

impl EventGraph {
    /// Enumerates every load-feasible event and every load/ordering
    /// consistent transition for an LB instance.  Pickup events carry their
    /// own request aboard; delivery events have already dropped it.  The LB
    /// depot pair collapses onto the single physical depot `0`.
    #[instrument(level = "debug", skip(data), fields(id = %data.id))]
    pub fn build(data: &LbInstance) -> EventGraph {
        let n = data.n;
        let mut events = vec![Event::depot()];

        for &p in &data.P {
            for others in onboard_subsets(n, p, data.capacity - 1) {
                let mut onboard = others;
                onboard.push(p);
                onboard.sort_unstable();
                events.push(Event { loc: p, onboard });
            }
        }
        for &d in &data.D {
            for onboard in onboard_subsets(n, data.pmap(d), data.capacity - 1) {
                events.push(Event { loc: d, onboard });
            }
        }

        let index: Map<&Event, EventId> = events.iter().zip(0usize..).collect();
        let cost = |u: &Event, w: &Event| {
            let i = if u.is_depot() { data.o_depot } else { u.loc };
            let j = if w.is_depot() { data.d_depot } else { w.loc };
            return (data.travel_cost[&(i, j)], data.travel_time[&(i, j)]);
        };

        let mut arcs = Vec::new();
        for (uid, u) in events.iter().enumerate() {
            if u.is_depot() {
                // A vehicle leaves the depot empty, so its first event is a
                // pickup with exactly that request aboard.
                for &p in &data.P {
                    let w = Event { loc: p, onboard: vec![p] };
                    let (c, t) = cost(u, &w);
                    arcs.push(EventArc { from: uid, to: index[&w], cost: c, time: t });
                }
                continue;
            }

            for r in 1..=n {
                if !u.onboard.contains(&r) && u.load() < data.capacity {
                    let mut onboard = u.onboard.clone();
                    onboard.push(r);
                    onboard.sort_unstable();
                    let w = Event { loc: r, onboard };
                    if let Some(&wid) = index.get(&w) {
                        let (c, t) = cost(u, &events[wid]);
                        arcs.push(EventArc { from: uid, to: wid, cost: c, time: t });
                    }
                }
            }
            for &r in &u.onboard {
                let onboard = u.onboard.iter().copied().filter(|&o| o != r).collect_vec();
                let w = Event { loc: data.dmap(r), onboard };
                if let Some(&wid) = index.get(&w) {
                    let (c, t) = cost(u, &events[wid]);
                    arcs.push(EventArc { from: uid, to: wid, cost: c, time: t });
                }
            }
            if data.is_delivery(u.loc) && u.onboard.is_empty() {
                let (c, t) = cost(u, &events[0]);
                arcs.push(EventArc { from: uid, to: 0, cost: c, time: t });
            }
        }

        debug!(events = events.len(), arcs = arcs.len(), "event graph built");
        return EventGraph { events, arcs, depot: 0 };
    }
}

/// All sorted subsets of `{1..=n} \ {skip}` with at most `cap` elements.
fn onboard_subsets(n: Loc, skip: Req, cap: Demand) -> Vec<Vec<Req>> {
    let others = (1..=n).filter(|&r| r != skip).collect_vec();
    let cap = cap.max(0) as usize;
    let mut subsets = Vec::new();
    for k in 0..=cap.min(others.len()) {
        for s in others.iter().copied().combinations(k) {
            subsets.push(s);
        }
    }
    return subsets;
}


/// Event-based DARP instance: a precomputed event graph plus the physical
/// parameter tables the time constraints need.  Physical locations are
/// `{0} ∪ P ∪ D` with the depot at `0`.
#[allow(non_snake_case)]
#[derive(Default, Debug, Clone)]
pub struct LaebInstance {
    pub id: String,
    pub n: Loc,
    pub P: Vec<Loc>,
    pub D: Vec<Loc>,
    pub depot: Loc,
    pub K: Vehicle,
    pub capacity: Demand,
    pub graph: EventGraph,
    pub travel_time: Map<(Loc, Loc), Time>,
    pub service_time: Map<Loc, Time>,
    pub tw_start: Map<Loc, Time>,
    pub tw_end: Map<Loc, Time>,
    pub max_ride_time: Map<Req, Time>,
}

impl LaebInstance {
    /// Derives the event-based instance from a location-based one: builds
    /// the event graph and folds the depot pair onto location `0`.
    pub fn from_lb(data: &LbInstance) -> LaebInstance {
        let graph = EventGraph::build(data);

        let locations = Self::location_universe(&data.P, &data.D);
        let lb_row = |i: Loc| if i == 0 { data.o_depot } else { i };
        let lb_col = |j: Loc| if j == 0 { data.d_depot } else { j };

        let mut travel_time = Map::default();
        for (&i, &j) in locations.iter().cartesian_product(locations.iter()) {
            if i != j {
                travel_time.insert((i, j), data.travel_time[&(lb_row(i), lb_col(j))]);
            }
        }

        let table = |m: &Map<Loc, Time>| -> Map<Loc, Time> {
            locations.iter().map(|&j| (j, m[&lb_row(j)])).collect()
        };

        return LaebInstance {
            id: data.id.clone(),
            n: data.n,
            P: data.P.clone(),
            D: data.D.clone(),
            depot: 0,
            K: data.K,
            capacity: data.capacity,
            graph,
            travel_time,
            service_time: table(&data.service_time),
            tw_start: table(&data.tw_start),
            tw_end: table(&data.tw_end),
            max_ride_time: data.max_ride_time.clone(),
        };
    }

    fn location_universe(pickups: &[Loc], deliveries: &[Loc]) -> Vec<Loc> {
        let mut locations = Vec::with_capacity(pickups.len() + deliveries.len() + 1);
        locations.push(0);
        locations.extend_from_slice(pickups);
        locations.extend_from_slice(deliveries);
        return locations;
    }

    pub fn locations(&self) -> Vec<Loc> {
        return Self::location_universe(&self.P, &self.D);
    }

    #[inline]
    pub fn is_pickup(&self, i: Loc) -> bool {
        return 0 < i && i <= self.n;
    }

    #[inline]
    pub fn dmap(&self, r: Req) -> Loc {
        debug_assert!(self.is_pickup(r));
        return r + self.n;
    }

    /// Per-key completeness check mirroring [`LbInstance::validate`]: every
    /// physical location, request and arc-referenced location pair must be
    /// covered before a build starts.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.graph.events.get(self.graph.depot).map(Event::is_depot) != Some(true) {
            return Err(ModelError::MissingData { table: "events", key: "depot".to_string() });
        }
        for j in self.locations() {
            for &(table, m) in &[
                ("service_time", &self.service_time),
                ("tw_start", &self.tw_start),
                ("tw_end", &self.tw_end),
            ] {
                if !m.contains_key(&j) {
                    return Err(ModelError::MissingData { table, key: j.to_string() });
                }
            }
        }
        for arc in &self.graph.arcs {
            for &v in &[arc.from, arc.to] {
                if v >= self.graph.events.len() {
                    return Err(ModelError::MissingData { table: "events", key: v.to_string() });
                }
            }
            let (i, j) = (self.graph.events[arc.from].loc, self.graph.events[arc.to].loc);
            if i != j && !self.travel_time.contains_key(&(i, j)) {
                return Err(ModelError::MissingData { table: "travel_time", key: format!("({},{})", i, j) });
            }
        }
        for r in 1..=self.n {
            if !self.max_ride_time.contains_key(&r) {
                return Err(ModelError::MissingData { table: "max_ride_time", key: r.to_string() });
            }
            let p = r;
            if !self.graph.arcs.iter().any(|a| self.graph.events[a.to].loc == p) {
                return Err(ModelError::MissingData { table: "pickup_events", key: r.to_string() });
            }
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::examples;

    /// The single-request graph has the hand-built shape: depot,
    /// pickup-with-rider, delivery-empty, arcs 0 → 1+ → 1- → 0, plus the
    /// load-consistent (but never selectable) 1- → 1+ return transition.
    #[test]
    fn single_request_graph_matches_hand_built() {
        let data = examples::single_request(30.0);
        let g = EventGraph::build(&data);

        assert_eq!(
            g.events,
            vec![
                Event::depot(),
                Event { loc: 1, onboard: vec![1] },
                Event { loc: 2, onboard: vec![] },
            ]
        );
        let arcs: Vec<_> = g.arcs.iter().map(|a| (a.from, a.to, a.cost, a.time)).collect();
        assert_eq!(
            arcs,
            vec![(0, 1, 5.0, 5.0), (1, 2, 8.0, 8.0), (2, 1, 8.0, 8.0), (2, 0, 5.0, 5.0)]
        );
    }

    #[test]
    fn arcs_are_load_consistent() {
        let data = examples::three_request(1);
        let g = EventGraph::build(&data);

        for ev in &g.events {
            assert!(ev.load() <= data.capacity);
            assert!(ev.onboard.windows(2).all(|w| w[0] < w[1]), "onboard sets are sorted");
            if data.is_pickup(ev.loc) {
                assert!(ev.onboard.contains(&ev.loc));
            }
            if data.is_delivery(ev.loc) {
                assert!(!ev.onboard.contains(&data.pmap(ev.loc)));
            }
        }
        for arc in &g.arcs {
            let (u, w) = (&g.events[arc.from], &g.events[arc.to]);
            match (u.is_depot(), w.is_depot()) {
                (true, _) => assert_eq!(w.onboard, vec![w.loc]),
                (_, true) => assert!(data.is_delivery(u.loc) && u.onboard.is_empty()),
                _ => {
                    let delta = w.load() - u.load();
                    assert!(delta == 1 || delta == -1);
                }
            }
        }
    }

    #[test]
    fn from_lb_folds_depots() {
        let data = examples::single_request(30.0);
        let laeb = LaebInstance::from_lb(&data);
        assert_eq!(laeb.validate(), Ok(()));
        assert_eq!(laeb.locations(), vec![0, 1, 2]);
        assert_eq!(laeb.travel_time[&(0, 1)], 5.0);
        assert_eq!(laeb.travel_time[&(2, 0)], 5.0);
        assert_eq!(laeb.travel_time[&(0, 2)], 10.0);
        assert_eq!(laeb.tw_end[&0], 100.0);
    }
}
