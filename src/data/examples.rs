//! Small literature instances used by the binary and the test suite.
//! Instance generation proper is out of scope; these are fixed parameter
//! tables, not a generator.

use itertools::Itertools;

use super::{Cost, Demand, LbInstance, Loc, Time, Vehicle};

fn base_instance(id: &str, n: Loc, capacity: Demand, k: Vehicle) -> LbInstance {
    let mut data = LbInstance {
        id: id.to_string(),
        n,
        P: (1..=n).collect(),
        D: (n + 1..=2 * n).collect(),
        o_depot: 0,
        d_depot: 2 * n + 1,
        K: k,
        capacity,
        ..LbInstance::default()
    };
    for j in data.nodes() {
        let q = if data.is_pickup(j) { 1 } else if data.is_delivery(j) { -1 } else { 0 };
        data.load_change.insert(j, q);
    }
    return data;
}

fn symmetric_travel(data: &mut LbInstance, dist: impl Fn(Loc, Loc) -> Cost) {
    let nodes = data.nodes();
    for (&i, &j) in nodes.iter().cartesian_product(nodes.iter()) {
        if i == j {
            continue;
        }
        let d = dist(i, j);
        data.travel_cost.insert((i, j), d);
        data.travel_time.insert((i, j), d);
    }
}

/// One request, one vehicle: depot-pickup 5, pickup-delivery 8,
/// delivery-depot 5, service 2 at the customers, capacity 3.  The optimal
/// route is depot → 1+ → 1- → depot at cost 18 with a ride of 8, so any
/// `max_ride_time < 8` makes the instance infeasible.
pub fn single_request(max_ride_time: Time) -> LbInstance {
    let mut data = base_instance("single_request", 1, 3, 1);
    symmetric_travel(&mut data, |i, j| {
        let depot = |x: Loc| x == 0 || x == 3;
        return match (depot(i), depot(j)) {
            (true, true) => 0.0,
            (false, false) => 8.0,
            _ => 5.0,
        };
    });
    // depot-to-delivery legs are the 5 + 8 detour, not a straight line
    data.travel_cost.insert((0, 2), 10.0);
    data.travel_time.insert((0, 2), 10.0);

    for (j, s, e, l) in &[(0, 0.0, 0.0, 100.0), (1, 2.0, 0.0, 50.0), (2, 2.0, 0.0, 80.0), (3, 0.0, 0.0, 100.0)] {
        data.service_time.insert(*j, *s);
        data.tw_start.insert(*j, *e);
        data.tw_end.insert(*j, *l);
    }
    data.max_ride_time.insert(1, max_ride_time);
    return data;
}

/// Three requests on a star: every depot leg costs 5, every customer-to-
/// customer leg costs 1.  Customer windows are [5, 60], ride limits 100.
/// One vehicle suffices; the optimum serializes all six customers for a
/// total cost of 15.
pub fn three_request(k: Vehicle) -> LbInstance {
    let mut data = base_instance("three_request", 3, 3, k);
    let (o, d) = (data.o_depot, data.d_depot);
    symmetric_travel(&mut data, |i, j| {
        if i == o || i == d || j == o || j == d { 5.0 } else { 1.0 }
    });
    data.travel_cost.insert((o, d), 0.0);
    data.travel_time.insert((o, d), 0.0);

    for j in data.nodes() {
        data.service_time.insert(j, 0.0);
        if j == o || j == d {
            data.tw_start.insert(j, 0.0);
            data.tw_end.insert(j, 100.0);
        } else {
            data.tw_start.insert(j, 5.0);
            data.tw_end.insert(j, 60.0);
        }
    }
    for r in 1..=3 {
        data.max_ride_time.insert(r, 100.0);
    }
    return data;
}

/// Three requests with a uniform travel time of 10 and customer windows
/// [0, 45]: a single vehicle reaches its sixth customer at time 60 and
/// cannot finish, while two vehicles can split the work (cost 80).
pub fn fleet_exhaustion(k: Vehicle) -> LbInstance {
    let mut data = base_instance("fleet_exhaustion", 3, 3, k);
    let (o, d) = (data.o_depot, data.d_depot);
    symmetric_travel(&mut data, |_, _| 10.0);
    data.travel_cost.insert((o, d), 0.0);
    data.travel_time.insert((o, d), 0.0);

    for j in data.nodes() {
        data.service_time.insert(j, 0.0);
        if j == o || j == d {
            data.tw_start.insert(j, 0.0);
            data.tw_end.insert(j, 200.0);
        } else {
            data.tw_start.insert(j, 0.0);
            data.tw_end.insert(j, 45.0);
        }
    }
    for r in 1..=3 {
        data.max_ride_time.insert(r, 100.0);
    }
    return data;
}

/// Seven requests with Euclidean distances on a 100x100 grid and staggered
/// pickup windows.  Deliveries open 5 after and close 60 after their pickup.
pub fn demanding() -> LbInstance {
    let n: Loc = 7;
    let mut data = base_instance("demanding", n, 3, 2);

    let pickup_coords = [(10.0, 15.0), (85.0, 10.0), (15.0, 85.0), (90.0, 90.0), (10.0, 50.0), (60.0, 80.0), (45.0, 10.0)];
    let delivery_coords = [(25.0, 30.0), (70.0, 20.0), (40.0, 75.0), (75.0, 70.0), (30.0, 55.0), (50.0, 95.0), (55.0, 35.0)];
    let coords = move |i: Loc| -> (f64, f64) {
        if i == 0 || i == 2 * n + 1 {
            return (50.0, 50.0);
        } else if i <= n {
            return pickup_coords[(i - 1) as usize];
        } else {
            return delivery_coords[(i - n - 1) as usize];
        }
    };
    symmetric_travel(&mut data, |i, j| {
        let (xi, yi) = coords(i);
        let (xj, yj) = coords(j);
        // distances rounded to one decimal place
        return (((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt() * 10.0).round() / 10.0;
    });

    let pickup_windows = [(0.0, 30.0), (10.0, 40.0), (20.0, 50.0), (30.0, 60.0), (40.0, 70.0), (50.0, 80.0), (60.0, 90.0)];
    for j in data.nodes() {
        if j == data.o_depot || j == data.d_depot {
            data.service_time.insert(j, 0.0);
            data.tw_start.insert(j, 0.0);
            data.tw_end.insert(j, 240.0);
        } else {
            data.service_time.insert(j, 2.0);
            let (start, end) = if data.is_pickup(j) {
                pickup_windows[(j - 1) as usize]
            } else {
                let (ps, pe) = pickup_windows[(j - n - 1) as usize];
                (ps + 5.0, pe + 60.0)
            };
            data.tw_start.insert(j, start);
            data.tw_end.insert(j, end);
        }
    }
    for r in 1..=n {
        data.max_ride_time.insert(r, 40.0);
    }
    return data;
}
