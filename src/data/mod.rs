use crate::{Map, ModelError};

pub mod events;
pub mod examples;

pub use events::{Event, EventArc, EventGraph, EventId, LaebInstance};

pub type Time = f64;
pub type Cost = f64;
pub type Loc = u8;
pub type Req = u8;
pub type Demand = i32;
pub type Vehicle = u32;

/// Location-based DARP instance.  Locations are numbered with the origin
/// depot at `0`, pickups `1..=n`, deliveries `n+1..=2n` and the destination
/// depot at `2n+1`; request `r` owns pickup `r` and delivery `r + n`.
///
/// All tables are immutable for the life of one model build.
#[allow(non_snake_case)]
#[derive(Default, Debug, Clone)]
pub struct LbInstance {
    pub id: String,
    pub n: Loc,
    pub P: Vec<Loc>,
    pub D: Vec<Loc>,
    pub o_depot: Loc,
    pub d_depot: Loc,
    pub K: Vehicle,
    pub capacity: Demand,
    pub travel_cost: Map<(Loc, Loc), Cost>,
    pub travel_time: Map<(Loc, Loc), Time>,
    pub service_time: Map<Loc, Time>,
    pub load_change: Map<Loc, Demand>,
    pub tw_start: Map<Loc, Time>,
    pub tw_end: Map<Loc, Time>,
    pub max_ride_time: Map<Req, Time>,
}

impl LbInstance {
    #[inline]
    pub fn is_pickup(&self, i: Loc) -> bool {
        return 0 < i && i <= self.n;
    }

    #[inline]
    pub fn is_delivery(&self, i: Loc) -> bool {
        return self.n < i && i <= self.n * 2;
    }

    #[inline]
    pub fn dmap(&self, i: Loc) -> Loc {
        if i == self.o_depot {
            return self.d_depot;
        } else {
            debug_assert!(self.is_pickup(i));
            return i + self.n;
        }
    }

    #[inline]
    pub fn pmap(&self, i: Loc) -> Loc {
        if i == self.d_depot {
            return self.o_depot;
        } else {
            debug_assert!(self.is_delivery(i));
            return i - self.n;
        }
    }

    /// Customer locations (pickups then deliveries).
    pub fn customers(&self) -> Vec<Loc> {
        return self.P.iter().chain(self.D.iter()).copied().collect();
    }

    /// The full node universe `{0} ∪ P ∪ D ∪ {2n+1}`.
    pub fn nodes(&self) -> Vec<Loc> {
        let mut nodes = Vec::with_capacity(self.P.len() + self.D.len() + 2);
        nodes.push(self.o_depot);
        nodes.extend_from_slice(&self.P);
        nodes.extend_from_slice(&self.D);
        nodes.push(self.d_depot);
        return nodes;
    }

    /// A vehicle may never re-enter the origin depot or leave the
    /// destination one; this is what keeps the depot split into two logical
    /// nodes without extra constraints.
    #[inline]
    pub fn valid_arc(&self, i: Loc, j: Loc) -> bool {
        return i != j && i != self.d_depot && j != self.o_depot;
    }

    /// The structurally valid arc set `A`, in a fixed node order.
    pub fn arcs(&self) -> Vec<(Loc, Loc)> {
        let nodes = self.nodes();
        let mut arcs = Vec::with_capacity(nodes.len() * nodes.len());
        for &i in &nodes {
            for &j in &nodes {
                if self.valid_arc(i, j) {
                    arcs.push((i, j));
                }
            }
        }
        return arcs;
    }

    /// Checks that every parameter table covers its full key domain, so a
    /// model build never hits an absent entry.  Fails on the first missing
    /// key; runs before any set or constraint construction.
    pub fn validate(&self) -> Result<(), ModelError> {
        fn require<V>(table: &'static str, m: &Map<Loc, V>, j: Loc) -> Result<(), ModelError> {
            if m.contains_key(&j) {
                return Ok(());
            }
            return Err(ModelError::MissingData { table, key: j.to_string() });
        }

        for j in self.nodes() {
            require("service_time", &self.service_time, j)?;
            require("load_change", &self.load_change, j)?;
            require("tw_start", &self.tw_start, j)?;
            require("tw_end", &self.tw_end, j)?;
        }
        for (i, j) in self.arcs() {
            for &(table, m) in &[("travel_cost", &self.travel_cost), ("travel_time", &self.travel_time)] {
                if !m.contains_key(&(i, j)) {
                    return Err(ModelError::MissingData { table, key: format!("({},{})", i, j) });
                }
            }
        }
        for r in 1..=self.n {
            if !self.max_ride_time.contains_key(&r) {
                return Err(ModelError::MissingData { table: "max_ride_time", key: r.to_string() });
            }
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::examples;

    #[test]
    fn arc_set_excludes_depot_reentry() {
        let data = examples::three_request(1);
        for (i, j) in data.arcs() {
            assert_ne!(i, j);
            assert_ne!(i, data.d_depot);
            assert_ne!(j, data.o_depot);
        }
        // |A| = |J|^2 - |J| - (|J| - 1) - (|J| - 1) for the diagonal and the
        // two forbidden depot rows/columns, with (d_depot, o_depot) counted twice.
        let nj = data.nodes().len();
        assert_eq!(data.arcs().len(), nj * nj - nj - 2 * (nj - 1) + 1);
    }

    #[test]
    fn validator_reports_first_missing_key() {
        let mut data = examples::single_request(30.0);
        assert_eq!(data.validate(), Ok(()));

        data.service_time.remove(&1);
        assert_eq!(
            data.validate(),
            Err(ModelError::MissingData { table: "service_time", key: "1".to_string() })
        );

        let mut data = examples::single_request(30.0);
        data.max_ride_time.clear();
        assert_eq!(
            data.validate(),
            Err(ModelError::MissingData { table: "max_ride_time", key: "1".to_string() })
        );
    }

    #[test]
    fn pickup_delivery_maps() {
        let data = examples::three_request(1);
        assert!(data.is_pickup(1) && data.is_pickup(3));
        assert!(data.is_delivery(4) && data.is_delivery(6));
        assert_eq!(data.dmap(2), 5);
        assert_eq!(data.pmap(5), 2);
        assert_eq!(data.dmap(data.o_depot), data.d_depot);
    }
}
