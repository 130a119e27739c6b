// Best-first path search over the tile grid.
//
// A*-style search over the 26-neighbourhood of each tile, driven entirely by
// a `TraversalPolicy`. The open set is a `BinaryHeap` made a min-heap by
// reversed ordering, keyed by `cost so far + straight-line distance to the
// goal`. The step cost is the policy's cost plus the Euclidean step length
// plus the policy's altitude adjustment, so the heuristic never overestimates.
//
// Per-search state (scores, parents, closed flags) lives in an `FxHashMap`
// keyed by flat tile index: searches usually touch a small part of a large
// map. A tile, once expanded, is never expanded again.
//
// The search never fails outright. If the goal is not reached before the
// open set empties or `iteration_limit` expansions have happened, the result
// is the path to the expanded tile (other than the origin, when there is
// one) closest to the goal, with `reached = false`. Callers always get at least
// the origin.
//
// See also: `passability.rs` for `UnitTileHelper`, `mission.rs` for the goto
// mission that consumes paths one step at a time.
//
// **Critical constraint: determinism.** Heap ties break on tile index and
// neighbours are visited in a fixed order; the hash map is only used for
// lookups, never iterated.

use crate::passability::TraversalPolicy;
use crate::tilemap::TileMap;
use crate::types::{TileCoord, TileIndex};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Result of a path search.
#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
    /// Tiles from the origin (inclusive) to the goal or closest reached tile.
    pub tiles: Vec<TileCoord>,
    /// Accumulated step cost along `tiles`.
    pub total_cost: f32,
    /// Whether the last tile is the requested destination.
    pub reached: bool,
    /// Tiles expanded.
    pub iterations: u32,
}

impl PathResult {
    fn origin_only(origin: TileCoord, reached: bool) -> Self {
        Self {
            tiles: vec![origin],
            total_cost: 0.0,
            reached,
            iterations: 0,
        }
    }
}

/// Entry in the open set (min-heap via reversed ordering).
struct OpenEntry {
    node: u32,
    f_score: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal && self.node == other.node
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.node.cmp(&self.node))
    }
}

#[derive(Clone, Copy, Debug)]
struct NodeRecord {
    g_score: f32,
    came_from: Option<u32>,
    closed: bool,
}

/// The 26 neighbour offsets, in a fixed order.
const NEIGHBOURS: [(i32, i32, i32); 26] = {
    let mut out = [(0, 0, 0); 26];
    let mut i = 0;
    let mut dz = -1;
    while dz <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if dx != 0 || dy != 0 || dz != 0 {
                    out[i] = (dx, dy, dz);
                    i += 1;
                }
                dx += 1;
            }
            dy += 1;
        }
        dz += 1;
    }
    out
};

/// Search for a path from `origin` to `destination` for the mover described
/// by `policy`, expanding at most `iteration_limit` tiles.
pub fn find_path<P: TraversalPolicy + ?Sized>(
    map: &TileMap,
    origin: TileCoord,
    destination: TileCoord,
    policy: &P,
    iteration_limit: u32,
) -> PathResult {
    let Some(start) = map.tile_index(origin) else {
        log::warn!("path search from {origin}, which is outside the map");
        return PathResult::origin_only(origin, false);
    };
    let Some(goal) = map.tile_index(destination) else {
        log::warn!("path search to {destination}, which is outside the map");
        return PathResult::origin_only(origin, false);
    };
    if start == goal {
        return PathResult::origin_only(origin, true);
    }

    let mut nodes: FxHashMap<u32, NodeRecord> = FxHashMap::default();
    nodes.insert(
        start.0,
        NodeRecord {
            g_score: 0.0,
            came_from: None,
            closed: false,
        },
    );
    let mut open = BinaryHeap::new();
    open.push(OpenEntry {
        node: start.0,
        f_score: origin.euclidean_distance(destination),
    });

    // Closest expanded tile so far, other than the origin: (h, index).
    let mut best: Option<(f32, u32)> = None;
    let mut iterations = 0u32;

    while let Some(current) = open.pop() {
        let ci = current.node;
        let Some(record) = nodes.get(&ci).copied() else {
            continue;
        };
        if record.closed {
            continue;
        }
        if ci == goal.0 {
            let mut result = reconstruct_path(map, &nodes, goal.0, record.g_score);
            result.reached = true;
            result.iterations = iterations;
            return result;
        }
        if iterations >= iteration_limit {
            break;
        }
        iterations += 1;
        if let Some(r) = nodes.get_mut(&ci) {
            r.closed = true;
        }

        let Some(from) = map.coord_of(TileIndex(ci)) else {
            continue;
        };
        if ci != start.0 {
            let h = from.euclidean_distance(destination);
            let closer = match best {
                None => true,
                Some((best_h, best_i)) => {
                    h.total_cmp(&best_h).then(ci.cmp(&best_i)) == Ordering::Less
                }
            };
            if closer {
                best = Some((h, ci));
            }
        }
        for (dx, dy, dz) in NEIGHBOURS {
            let to = from.offset(dx, dy, dz);
            let Some(ni) = map.tile_index(to) else {
                continue;
            };
            if nodes.get(&ni.0).is_some_and(|r| r.closed) {
                continue;
            }
            let Some(step) = policy.can_enter(map, from, to) else {
                continue;
            };
            let tentative = record.g_score
                + step
                + from.euclidean_distance(to)
                + policy.altitude_adjustment(map, from, to);

            let improved = nodes.get(&ni.0).is_none_or(|r| tentative < r.g_score);
            if !improved {
                continue;
            }
            nodes.insert(
                ni.0,
                NodeRecord {
                    g_score: tentative,
                    came_from: Some(ci),
                    closed: false,
                },
            );
            open.push(OpenEntry {
                node: ni.0,
                f_score: tentative + to.euclidean_distance(destination),
            });
        }
    }

    log::debug!(
        "no path {origin} → {destination} within {iterations} expansions; returning partial path"
    );
    let mut result = match best {
        Some((_, index)) => {
            let g = nodes.get(&index).map_or(0.0, |r| r.g_score);
            reconstruct_path(map, &nodes, index, g)
        }
        None => PathResult::origin_only(origin, false),
    };
    result.reached = false;
    result.iterations = iterations;
    result
}

fn reconstruct_path(
    map: &TileMap,
    nodes: &FxHashMap<u32, NodeRecord>,
    end: u32,
    total_cost: f32,
) -> PathResult {
    let mut tiles = Vec::new();
    let mut current = Some(end);
    while let Some(index) = current {
        if let Some(coord) = map.coord_of(TileIndex(index)) {
            tiles.push(coord);
        }
        current = nodes.get(&index).and_then(|r| r.came_from);
    }
    tiles.reverse();
    PathResult {
        tiles,
        total_cost,
        reached: false,
        iterations: 0,
    }
}

impl TileMap {
    /// See [`find_path`].
    pub fn find_path<P: TraversalPolicy + ?Sized>(
        &self,
        origin: TileCoord,
        destination: TileCoord,
        policy: &P,
        iteration_limit: u32,
    ) -> PathResult {
        find_path(self, origin, destination, policy, iteration_limit)
    }
}
