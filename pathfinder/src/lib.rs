#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Static and dynamic shortest-path computation over the tile grid.
//!
//! On construction the pathfinder runs a Roy-Floyd-Warshall pass over the
//! map's permanent obstacles, producing flat distance and successor matrices.
//! Those matrices answer "ideal route" queries in O(path length) and seed the
//! admissible heuristic for the A* search that reroutes around moving
//! entities: entities only ever add cost on top of the static terrain, so the
//! precomputed distance never overestimates the true dynamic cost.
//!
//! All queries convert between pixel and tile space at the boundary; the
//! matrices and the search itself work exclusively on flat tile numbers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tilemarch_core::{
    tile_at, tile_origin, MapData, OccupancyView, PathResult, PixelPoint, PixelSize, TileCoord,
    TileOccupancy, TileRect, TileRectSize,
};

/// Cost of a single diagonal tile step.
const SQRT_2: f32 = std::f32::consts::SQRT_2;

/// Neighbor offsets in fixed enumeration order: orthogonals first, then
/// diagonals. The order is part of the determinism contract; ties in the
/// search are broken by discovery order.
const NEIGHBOR_STEPS: [(i32, i32); 8] = [
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

const ORTHOGONAL_STEP_COUNT: usize = 4;

/// Precomputed all-pairs routing data for one loaded map.
///
/// The matrices are immutable after construction and are rebuilt from
/// scratch whenever the owning grid loads a new map.
#[derive(Clone, Debug)]
pub struct Pathfinder {
    columns: u32,
    rows: u32,
    tile_size: u32,
    tile_count: usize,
    /// Flat `tile_count * tile_count` matrix; `None` marks unreachable pairs.
    distances: Vec<Option<f32>>,
    /// Next tile to step to from `from` en route to `to`; `None` when no
    /// route exists or the pair is identical.
    successors: Vec<Option<u32>>,
}

impl Pathfinder {
    /// Builds the routing matrices for the provided map.
    ///
    /// Runs in O(tile_count^3); executed once per map load, never per frame.
    #[must_use]
    pub fn new(map: &MapData) -> Self {
        let columns = map.columns();
        let rows = map.rows();
        let tile_count = map.tile_count();
        let matrix_len = tile_count.saturating_mul(tile_count);

        let mut blocked = vec![false; tile_count];
        for tile in map.blocked_tiles() {
            let index = flat_index(*tile, columns);
            blocked[index] = true;
        }

        let mut distances: Vec<Option<f32>> = vec![None; matrix_len];
        let mut successors: Vec<Option<u32>> = vec![None; matrix_len];

        for num in 0..tile_count {
            distances[num * tile_count + num] = Some(0.0);
        }

        for num in 0..tile_count {
            if blocked[num] {
                continue;
            }
            let here = tile_from_num(num, columns);
            for (order, (delta_column, delta_row)) in NEIGHBOR_STEPS.iter().enumerate() {
                let diagonal = order >= ORTHOGONAL_STEP_COUNT;
                let Some(neighbor) =
                    neighbor_in_bounds(here, *delta_column, *delta_row, columns, rows)
                else {
                    continue;
                };
                let neighbor_num = flat_index(neighbor, columns);
                if blocked[neighbor_num] {
                    continue;
                }
                if diagonal && !flanks_clear(here, *delta_column, *delta_row, columns, rows, &blocked)
                {
                    continue;
                }
                let cost = if diagonal { SQRT_2 } else { 1.0 };
                distances[num * tile_count + neighbor_num] = Some(cost);
                successors[num * tile_count + neighbor_num] = Some(neighbor_num as u32);
            }
        }

        for via in 0..tile_count {
            for from in 0..tile_count {
                let Some(to_via) = distances[from * tile_count + via] else {
                    continue;
                };
                for to in 0..tile_count {
                    let Some(from_via) = distances[via * tile_count + to] else {
                        continue;
                    };
                    let through = to_via + from_via;
                    let direct = distances[from * tile_count + to];
                    if direct.map_or(true, |cost| through < cost) {
                        distances[from * tile_count + to] = Some(through);
                        successors[from * tile_count + to] = successors[from * tile_count + via];
                    }
                }
            }
        }

        Self {
            columns,
            rows,
            tile_size: map.tile_size(),
            tile_count,
            distances,
            successors,
        }
    }

    /// Shortest static cost between two tiles, ignoring all entities.
    /// `None` when either tile is outside the grid or no route exists.
    #[must_use]
    pub fn static_distance(&self, from: TileCoord, to: TileCoord) -> Option<f32> {
        let from_num = self.checked_num(from)?;
        let to_num = self.checked_num(to)?;
        self.distances[from_num * self.tile_count + to_num]
    }

    /// Finds the ideal route between two pixel positions via the successor
    /// matrix, ignoring moving entities and dynamically placed obstacles.
    #[must_use]
    pub fn find_best_path(&self, src: PixelPoint, dst: PixelPoint) -> PathResult {
        let Some((src_num, dst_num)) = self.endpoint_nums(src, dst) else {
            return PathResult::Unreachable;
        };
        if src_num == dst_num {
            return PathResult::AlreadyThere;
        }
        match self.walk_successors(src_num, dst_num) {
            Some(route) => PathResult::Found(self.route_to_waypoints(&route)),
            None => PathResult::Unreachable,
        }
    }

    /// Finds the cheapest route between two pixel positions that avoids
    /// everything the live occupancy view reports, for a mover with the
    /// provided pixel footprint.
    ///
    /// Tiles held by `mover` itself count as free, so an actor never blocks
    /// its own route. When the ideal static route is unobstructed it is
    /// returned directly; otherwise an A* search seeded with the static
    /// distance matrix runs.
    ///
    /// # Panics
    ///
    /// Panics if the view's dimensions differ from the map the matrices
    /// were built for.
    #[must_use]
    pub fn find_rerouted_path(
        &self,
        view: &OccupancyView<'_>,
        mover: TileOccupancy,
        src: PixelPoint,
        dst: PixelPoint,
        size: PixelSize,
    ) -> PathResult {
        assert!(
            view.dimensions() == (self.columns, self.rows),
            "occupancy view dimensions do not match the routing matrices"
        );
        let Some((src_num, dst_num)) = self.endpoint_nums(src, dst) else {
            return PathResult::Unreachable;
        };
        if src_num == dst_num {
            return PathResult::AlreadyThere;
        }
        if size.is_empty() {
            return PathResult::Unreachable;
        }
        let footprint = self.footprint_in_tiles(size);

        if let Some(route) = self.walk_successors(src_num, dst_num) {
            if self.route_clear(view, mover, src_num, &route, footprint) {
                return PathResult::Found(self.route_to_waypoints(&route));
            }
        }

        match self.astar(view, mover, src_num, dst_num, footprint) {
            Some(route) => PathResult::Found(self.route_to_waypoints(&route)),
            None => PathResult::Unreachable,
        }
    }

    /// Whether a precomputed route is usable against the live occupancy:
    /// every footprint along it is enterable and no diagonal transition
    /// squeezes between two occupied flanks.
    fn route_clear(
        &self,
        view: &OccupancyView<'_>,
        mover: TileOccupancy,
        src_num: usize,
        route: &[usize],
        footprint: TileRectSize,
    ) -> bool {
        let mut previous = tile_from_num(src_num, self.columns);
        for num in route {
            if !self.footprint_free(view, mover, *num, footprint) {
                return false;
            }
            let next = tile_from_num(*num, self.columns);
            let delta_column = i64::from(next.column()) - i64::from(previous.column());
            let delta_row = i64::from(next.row()) - i64::from(previous.row());
            if delta_column != 0
                && delta_row != 0
                && !self.diagonal_flanks_free(
                    view,
                    mover,
                    previous,
                    delta_column as i32,
                    delta_row as i32,
                    footprint,
                )
            {
                return false;
            }
            previous = next;
        }
        true
    }

    fn astar(
        &self,
        view: &OccupancyView<'_>,
        mover: TileOccupancy,
        src_num: usize,
        dst_num: usize,
        footprint: TileRectSize,
    ) -> Option<Vec<usize>> {
        let mut open = BinaryHeap::new();
        let mut best_cost: Vec<Option<f32>> = vec![None; self.tile_count];
        let mut parent: Vec<Option<u32>> = vec![None; self.tile_count];
        let mut settled = vec![false; self.tile_count];
        let mut next_seq: u32 = 0;

        let start_heuristic = self.distances[src_num * self.tile_count + dst_num]?;
        best_cost[src_num] = Some(0.0);
        open.push(OpenNode {
            tile: src_num as u32,
            estimate: start_heuristic,
            seq: next_seq,
        });

        while let Some(node) = open.pop() {
            let num = node.tile as usize;
            if settled[num] {
                continue;
            }
            settled[num] = true;
            if num == dst_num {
                return Some(self.collect_route(&parent, src_num, dst_num));
            }
            let Some(cost_here) = best_cost[num] else {
                continue;
            };
            let here = tile_from_num(num, self.columns);

            for (order, (delta_column, delta_row)) in NEIGHBOR_STEPS.iter().enumerate() {
                let diagonal = order >= ORTHOGONAL_STEP_COUNT;
                let Some(neighbor) =
                    neighbor_in_bounds(here, *delta_column, *delta_row, self.columns, self.rows)
                else {
                    continue;
                };
                let neighbor_num = flat_index(neighbor, self.columns);
                if settled[neighbor_num] {
                    continue;
                }
                // A tile that cannot reach the goal statically cannot reach
                // it dynamically either; entities never remove cost.
                let Some(heuristic) =
                    self.distances[neighbor_num * self.tile_count + dst_num]
                else {
                    continue;
                };
                if !self.footprint_free(view, mover, neighbor_num, footprint) {
                    continue;
                }
                if diagonal
                    && !self.diagonal_flanks_free(
                        view,
                        mover,
                        here,
                        *delta_column,
                        *delta_row,
                        footprint,
                    )
                {
                    continue;
                }
                let step_cost = if diagonal { SQRT_2 } else { 1.0 };
                let tentative = cost_here + step_cost;
                if best_cost[neighbor_num].map_or(true, |cost| tentative < cost) {
                    best_cost[neighbor_num] = Some(tentative);
                    parent[neighbor_num] = Some(num as u32);
                    next_seq += 1;
                    open.push(OpenNode {
                        tile: neighbor_num as u32,
                        estimate: tentative + heuristic,
                        seq: next_seq,
                    });
                }
            }
        }

        None
    }

    /// Whether a footprint anchored at the numbered tile is enterable.
    fn footprint_free(
        &self,
        view: &OccupancyView<'_>,
        mover: TileOccupancy,
        anchor: usize,
        footprint: TileRectSize,
    ) -> bool {
        let rect = TileRect::from_origin_and_size(tile_from_num(anchor, self.columns), footprint);
        view.is_area_free_for(rect, mover)
    }

    /// A diagonal step must not squeeze between two blocked orthogonal
    /// neighbors; both flanking footprints have to be enterable.
    fn diagonal_flanks_free(
        &self,
        view: &OccupancyView<'_>,
        mover: TileOccupancy,
        here: TileCoord,
        delta_column: i32,
        delta_row: i32,
        footprint: TileRectSize,
    ) -> bool {
        let Some(horizontal) = here.offset_by(delta_column, 0) else {
            return false;
        };
        let Some(vertical) = here.offset_by(0, delta_row) else {
            return false;
        };
        let horizontal_rect = TileRect::from_origin_and_size(horizontal, footprint);
        let vertical_rect = TileRect::from_origin_and_size(vertical, footprint);
        view.is_area_free_for(horizontal_rect, mover)
            && view.is_area_free_for(vertical_rect, mover)
    }

    fn footprint_in_tiles(&self, size: PixelSize) -> TileRectSize {
        TileRectSize::new(
            size.width().div_ceil(self.tile_size),
            size.height().div_ceil(self.tile_size),
        )
    }

    /// Walks the successor matrix from `src` to `dst`. Returns the visited
    /// tile numbers excluding `src`, or `None` when the pair is disconnected.
    ///
    /// # Panics
    ///
    /// Panics if the successor matrix contains a cycle, which would indicate
    /// corrupted precomputation.
    fn walk_successors(&self, src_num: usize, dst_num: usize) -> Option<Vec<usize>> {
        let mut route = Vec::new();
        let mut current = src_num;
        while current != dst_num {
            let next = self.successors[current * self.tile_count + dst_num]?;
            let next = next as usize;
            route.push(next);
            current = next;
            assert!(
                route.len() <= self.tile_count,
                "successor matrix walk exceeded tile count; matrix is corrupt"
            );
        }
        Some(route)
    }

    fn collect_route(&self, parent: &[Option<u32>], src_num: usize, dst_num: usize) -> Vec<usize> {
        let mut route = Vec::new();
        let mut current = dst_num;
        while current != src_num {
            route.push(current);
            let Some(previous) = parent[current] else {
                panic!("search produced a node without a predecessor");
            };
            current = previous as usize;
        }
        route.reverse();
        route
    }

    fn route_to_waypoints(&self, route: &[usize]) -> Vec<PixelPoint> {
        route
            .iter()
            .map(|num| tile_origin(tile_from_num(*num, self.columns), self.tile_size))
            .collect()
    }

    fn endpoint_nums(&self, src: PixelPoint, dst: PixelPoint) -> Option<(usize, usize)> {
        let src_tile = tile_at(src, self.tile_size)?;
        let dst_tile = tile_at(dst, self.tile_size)?;
        Some((self.checked_num(src_tile)?, self.checked_num(dst_tile)?))
    }

    fn checked_num(&self, tile: TileCoord) -> Option<usize> {
        if tile.column() < self.columns && tile.row() < self.rows {
            Some(flat_index(tile, self.columns))
        } else {
            None
        }
    }
}

/// Open-set entry ordered so the binary heap pops the node with the lowest
/// estimated total cost; equal estimates yield to the earlier discovery.
#[derive(Clone, Copy, Debug)]
struct OpenNode {
    tile: u32,
    estimate: f32,
    seq: u32,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .total_cmp(&self.estimate)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

fn flat_index(tile: TileCoord, columns: u32) -> usize {
    let row = tile.row() as usize;
    let column = tile.column() as usize;
    row * columns as usize + column
}

fn tile_from_num(num: usize, columns: u32) -> TileCoord {
    let columns = columns as usize;
    TileCoord::new((num % columns) as u32, (num / columns) as u32)
}

fn neighbor_in_bounds(
    tile: TileCoord,
    delta_column: i32,
    delta_row: i32,
    columns: u32,
    rows: u32,
) -> Option<TileCoord> {
    let neighbor = tile.offset_by(delta_column, delta_row)?;
    if neighbor.column() < columns && neighbor.row() < rows {
        Some(neighbor)
    } else {
        None
    }
}

fn flanks_clear(
    tile: TileCoord,
    delta_column: i32,
    delta_row: i32,
    columns: u32,
    rows: u32,
    blocked: &[bool],
) -> bool {
    let Some(horizontal) = neighbor_in_bounds(tile, delta_column, 0, columns, rows) else {
        return false;
    };
    let Some(vertical) = neighbor_in_bounds(tile, 0, delta_row, columns, rows) else {
        return false;
    };
    !blocked[flat_index(horizontal, columns)] && !blocked[flat_index(vertical, columns)]
}
