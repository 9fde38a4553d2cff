use crate::models::{NodeId, Problem};

/// Pairwise exchange over the interior of a depot-to-depot route.
///
/// Every pair `(i, j)` of interior positions is swapped once; the swap is kept only when it
/// makes the route strictly shorter. The distance of the untouched prefix `0..i` is carried in
/// `prev`, so each candidate costs `len - i` lookups instead of a full evaluation.
///
/// # Arguments
/// * `route` - Route with the depot at both ends and no charging stations
/// * `problem` - The instance
///
/// # Returns
/// * `usize` - Number of distance lookups performed
pub fn local_search(route: &mut [NodeId], problem: &Problem) -> usize {
    let n = route.len();
    if n < 4 {
        return 0;
    }

    let mut current = problem.path_length(route);
    let mut lookups = n - 1;
    let mut prev = 0.0;

    for i in 1..n - 2 {
        for j in i + 1..n - 1 {
            route.swap(i, j);
            let candidate = prev + problem.path_length(&route[i - 1..]);
            lookups += n - i;
            if candidate < current {
                current = candidate;
            } else {
                route.swap(i, j);
            }
        }
        prev += problem.distance(route[i - 1], route[i]);
        lookups += 1;
    }
    lookups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;

    fn square() -> Problem {
        Problem::new(Instance {
            name: "square".to_string(),
            dimension: 4,
            stations: 1,
            capacity: 10,
            vehicles: 1,
            energy_capacity: 100.0,
            energy_consumption: 1.0,
            optimal_value: None,
            coords: vec![(0.0, 0.0), (3.0, 0.0), (3.0, 4.0), (0.0, 4.0), (1.0, 1.0)],
            demands: vec![0, 1, 1, 1, 0],
            depot: 0,
        })
        .unwrap()
    }

    #[test]
    fn untangles_crossed_route() {
        let problem = square();
        let mut route = vec![0, 2, 1, 3, 0];
        assert_eq!(problem.path_length(&route), 18.0);
        let lookups = local_search(&mut route, &problem);
        assert_eq!(route, vec![0, 1, 2, 3, 0]);
        assert_eq!(problem.path_length(&route), 14.0);
        assert!(lookups > 0);
    }

    #[test]
    fn short_routes_are_untouched() {
        let problem = square();
        let mut route = vec![0, 2, 0];
        assert_eq!(local_search(&mut route, &problem), 0);
        assert_eq!(route, vec![0, 2, 0]);
    }

    #[test]
    fn never_lengthens_a_route() {
        let problem = square();
        let orders = [
            vec![0, 1, 2, 3, 0],
            vec![0, 3, 2, 1, 0],
            vec![0, 2, 3, 1, 0],
            vec![0, 1, 3, 2, 0],
            vec![0, 3, 1, 2, 0],
        ];
        for order in orders {
            let before = problem.path_length(&order);
            let mut route = order.clone();
            local_search(&mut route, &problem);
            assert!(problem.path_length(&route) <= before + 1e-9);
            assert_eq!(route.first(), Some(&0));
            assert_eq!(route.last(), Some(&0));
        }
    }
}
