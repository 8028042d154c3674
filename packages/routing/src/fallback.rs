//! Local shortest path over zone centers, used when the routing provider
//! is unavailable.
//!
//! Nodes are the start, the end and every zone center. Any two nodes
//! within `max_hop_km` of each other are joined by an edge weighted by
//! distance scaled up by the riskier endpoint, so the search prefers
//! hopping through dry areas.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use floodguard_models::{GeoPoint, RiskZone};

/// Edge multiplier is `1 + risk / RISK_DIVISOR`.
const RISK_DIVISOR: f64 = 5.0;

const START: usize = 0;
const END: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Visit {
    cost: f64,
    node: usize,
}

impl Eq for Visit {}

impl Ord for Visit {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the cheapest visit.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Weight of the edge between two nodes.
#[must_use]
pub fn edge_weight(distance_km: f64, risk_a: f64, risk_b: f64) -> f64 {
    distance_km * (1.0 + risk_a.max(risk_b) / RISK_DIVISOR)
}

/// Finds the cheapest node path from `start` to `end`.
///
/// Returns `None` if `end` is unreachable with hops of at most
/// `max_hop_km`.
#[must_use]
pub fn shortest_safe_path(
    start: GeoPoint,
    end: GeoPoint,
    zones: &[RiskZone],
    max_hop_km: f64,
) -> Option<Vec<GeoPoint>> {
    let mut nodes = Vec::with_capacity(zones.len() + 2);
    nodes.push((start, 0.0));
    nodes.push((end, 0.0));
    nodes.extend(zones.iter().map(|z| (z.center, z.risk_score)));

    let mut cost = vec![f64::INFINITY; nodes.len()];
    let mut prev: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut heap = BinaryHeap::new();

    cost[START] = 0.0;
    heap.push(Visit {
        cost: 0.0,
        node: START,
    });

    while let Some(Visit { cost: c, node }) = heap.pop() {
        if node == END {
            break;
        }
        if c > cost[node] {
            continue;
        }

        let (here, here_risk) = nodes[node];
        for (next, &(there, there_risk)) in nodes.iter().enumerate() {
            if next == node {
                continue;
            }
            let hop = here.distance_km(&there);
            if hop > max_hop_km {
                continue;
            }

            let candidate = c + edge_weight(hop, here_risk, there_risk);
            if candidate < cost[next] {
                cost[next] = candidate;
                prev[next] = Some(node);
                heap.push(Visit {
                    cost: candidate,
                    node: next,
                });
            }
        }
    }

    if cost[END].is_infinite() {
        return None;
    }

    let mut path = vec![nodes[END].0];
    let mut cursor = END;
    while let Some(p) = prev[cursor] {
        path.push(nodes[p].0);
        cursor = p;
    }
    path.reverse();

    Some(path)
}
