use tilemarch_core::{
    ActorId, MapData, ObstacleId, OccupancyView, PathResult, PixelPoint, PixelSize, TileCoord,
    TileOccupancy,
};
use tilemarch_pathfinder::Pathfinder;

const TILE: u32 = 32;
const SQRT_2: f32 = std::f32::consts::SQRT_2;

fn map_with_blocks(columns: u32, rows: u32, blocked: Vec<TileCoord>) -> MapData {
    MapData::new(columns, rows, TILE, blocked).expect("valid map")
}

/// Mirrors what the entity grid does on map load: terrain tiles become
/// obstacle cells in the live occupancy.
fn terrain_cells(map: &MapData) -> Vec<TileOccupancy> {
    let mut cells = vec![TileOccupancy::Free; map.tile_count()];
    for tile in map.blocked_tiles() {
        let index = tile.row() as usize * map.columns() as usize + tile.column() as usize;
        cells[index] = TileOccupancy::Obstacle(ObstacleId::new(0));
    }
    cells
}

fn pixel_of(column: u32, row: u32) -> PixelPoint {
    PixelPoint::new((column * TILE) as i32, (row * TILE) as i32)
}

fn tile_of(point: PixelPoint) -> TileCoord {
    TileCoord::new(point.x() as u32 / TILE, point.y() as u32 / TILE)
}

/// Recomputes the traversal cost of a waypoint sequence starting at `src`.
fn path_cost(src: PixelPoint, waypoints: &[PixelPoint]) -> f32 {
    let mut cost = 0.0;
    let mut current = tile_of(src);
    for waypoint in waypoints {
        let next = tile_of(*waypoint);
        let column_delta = current.column().abs_diff(next.column());
        let row_delta = current.row().abs_diff(next.row());
        assert!(
            column_delta <= 1 && row_delta <= 1 && (column_delta, row_delta) != (0, 0),
            "waypoints must advance one tile at a time"
        );
        cost += if column_delta == 1 && row_delta == 1 {
            SQRT_2
        } else {
            1.0
        };
        current = next;
    }
    cost
}

#[test]
fn detour_around_blocked_center_costs_expected_amount() {
    // 5x5 grid, center tile (2, 2) blocked; the straight route along row 2
    // is severed, so the best path detours diagonally via row 1 or row 3.
    let map = map_with_blocks(5, 5, vec![TileCoord::new(2, 2)]);
    let pathfinder = Pathfinder::new(&map);

    let expected = 4.0 + 2.0 * (SQRT_2 - 1.0);
    let distance = pathfinder
        .static_distance(TileCoord::new(0, 2), TileCoord::new(4, 2))
        .expect("detour exists");
    assert!((distance - expected).abs() < 1e-4, "distance {distance}");

    let src = pixel_of(0, 2);
    let dst = pixel_of(4, 2);
    let result = pathfinder.find_best_path(src, dst);
    let waypoints = result.waypoints();
    assert_eq!(waypoints.len(), 4, "four steps from source to destination");
    assert_eq!(waypoints.last(), Some(&dst));
    assert!((path_cost(src, waypoints) - expected).abs() < 1e-4);
    assert!(waypoints.iter().all(|point| tile_of(*point) != TileCoord::new(2, 2)));
}

#[test]
fn same_tile_reports_already_there() {
    let map = map_with_blocks(3, 3, Vec::new());
    let pathfinder = Pathfinder::new(&map);
    let cells = terrain_cells(&map);
    let view = OccupancyView::new(&cells, map.columns(), map.rows());

    // Two distinct pixel positions inside the same tile.
    let src = PixelPoint::new(3, 5);
    let dst = PixelPoint::new(20, 28);
    assert_eq!(pathfinder.find_best_path(src, dst), PathResult::AlreadyThere);
    assert_eq!(
        pathfinder.find_rerouted_path(
            &view,
            TileOccupancy::Free,
            src,
            dst,
            PixelSize::new(TILE, TILE)
        ),
        PathResult::AlreadyThere
    );
}

#[test]
fn severed_map_is_unreachable_for_both_queries() {
    // A full wall down column 1 disconnects the left edge from the right.
    let wall: Vec<TileCoord> = (0..4).map(|row| TileCoord::new(1, row)).collect();
    let map = map_with_blocks(4, 4, wall);
    let pathfinder = Pathfinder::new(&map);
    let cells = terrain_cells(&map);
    let view = OccupancyView::new(&cells, map.columns(), map.rows());

    let src = pixel_of(0, 0);
    let dst = pixel_of(3, 3);
    assert_eq!(pathfinder.find_best_path(src, dst), PathResult::Unreachable);
    assert_eq!(
        pathfinder.find_rerouted_path(
            &view,
            TileOccupancy::Free,
            src,
            dst,
            PixelSize::new(TILE, TILE)
        ),
        PathResult::Unreachable
    );
}

#[test]
fn blocked_destination_is_unreachable() {
    let map = map_with_blocks(4, 4, vec![TileCoord::new(3, 3)]);
    let pathfinder = Pathfinder::new(&map);
    assert_eq!(
        pathfinder.find_best_path(pixel_of(0, 0), pixel_of(3, 3)),
        PathResult::Unreachable
    );
}

#[test]
fn off_map_endpoints_are_unreachable() {
    let map = map_with_blocks(3, 3, Vec::new());
    let pathfinder = Pathfinder::new(&map);
    assert_eq!(
        pathfinder.find_best_path(PixelPoint::new(-4, 0), pixel_of(2, 2)),
        PathResult::Unreachable
    );
    assert_eq!(
        pathfinder.find_best_path(pixel_of(0, 0), pixel_of(5, 0)),
        PathResult::Unreachable
    );
}

#[test]
fn rerouted_path_degrades_to_ideal_route_when_unobstructed() {
    let map = map_with_blocks(6, 4, vec![TileCoord::new(3, 1)]);
    let pathfinder = Pathfinder::new(&map);
    let cells = terrain_cells(&map);
    let view = OccupancyView::new(&cells, map.columns(), map.rows());

    let src = pixel_of(0, 2);
    let dst = pixel_of(5, 2);
    let ideal = pathfinder.find_best_path(src, dst);
    let rerouted = pathfinder.find_rerouted_path(
        &view,
        TileOccupancy::Free,
        src,
        dst,
        PixelSize::new(TILE, TILE),
    );
    assert_eq!(ideal, rerouted);
}

#[test]
fn rerouted_path_avoids_live_entities() {
    let map = map_with_blocks(5, 3, Vec::new());
    let pathfinder = Pathfinder::new(&map);
    let mut cells = terrain_cells(&map);
    // Another actor stands on the straight route at (2, 1).
    let blocker = TileCoord::new(2, 1);
    cells[blocker.row() as usize * 5 + blocker.column() as usize] =
        TileOccupancy::Actor(ActorId::new(7));
    let view = OccupancyView::new(&cells, map.columns(), map.rows());

    let src = pixel_of(0, 1);
    let dst = pixel_of(4, 1);
    let ideal = pathfinder.find_best_path(src, dst);
    assert!(ideal
        .waypoints()
        .iter()
        .any(|point| tile_of(*point) == blocker));

    let rerouted = pathfinder.find_rerouted_path(
        &view,
        TileOccupancy::Free,
        src,
        dst,
        PixelSize::new(TILE, TILE),
    );
    assert!(rerouted.is_found());
    assert!(rerouted
        .waypoints()
        .iter()
        .all(|point| tile_of(*point) != blocker));
    assert_eq!(rerouted.waypoints().last(), Some(&dst));
}

#[test]
fn mover_tiles_do_not_block_their_own_route() {
    let map = map_with_blocks(4, 1, Vec::new());
    let pathfinder = Pathfinder::new(&map);
    let mover = ActorId::new(3);
    let mut cells = terrain_cells(&map);
    cells[0] = TileOccupancy::Actor(mover);
    let view = OccupancyView::new(&cells, map.columns(), map.rows());

    let result = pathfinder.find_rerouted_path(
        &view,
        TileOccupancy::Actor(mover),
        pixel_of(0, 0),
        pixel_of(3, 0),
        PixelSize::new(TILE, TILE),
    );
    assert!(result.is_found());
}

#[test]
fn rerouted_queries_are_deterministic() {
    let map = map_with_blocks(6, 6, vec![TileCoord::new(2, 2), TileCoord::new(3, 2)]);
    let pathfinder = Pathfinder::new(&map);
    let mut cells = terrain_cells(&map);
    cells[3 * 6 + 2] = TileOccupancy::Actor(ActorId::new(1));
    let view = OccupancyView::new(&cells, map.columns(), map.rows());

    let src = pixel_of(0, 3);
    let dst = pixel_of(5, 1);
    let size = PixelSize::new(TILE, TILE);
    let first = pathfinder.find_rerouted_path(&view, TileOccupancy::Free, src, dst, size);
    let second = pathfinder.find_rerouted_path(&view, TileOccupancy::Free, src, dst, size);
    assert!(first.is_found());
    assert_eq!(first, second);
}

#[test]
fn dynamic_cost_matches_static_distance_without_entities() {
    let map = map_with_blocks(5, 5, vec![TileCoord::new(2, 1), TileCoord::new(2, 3)]);
    let pathfinder = Pathfinder::new(&map);
    let cells = terrain_cells(&map);
    let view = OccupancyView::new(&cells, map.columns(), map.rows());

    let src = pixel_of(0, 0);
    let dst = pixel_of(4, 4);
    let rerouted = pathfinder.find_rerouted_path(
        &view,
        TileOccupancy::Free,
        src,
        dst,
        PixelSize::new(TILE, TILE),
    );
    let static_cost = pathfinder
        .static_distance(tile_of(src), tile_of(dst))
        .expect("reachable");
    assert!(rerouted.is_found());
    assert!((path_cost(src, rerouted.waypoints()) - static_cost).abs() < 1e-4);
}

#[test]
fn diagonal_steps_never_squeeze_between_blocked_tiles() {
    // (1, 0) and (0, 1) are blocked; the diagonal from (0, 0) to (1, 1)
    // would cut between them and must be refused.
    let map = map_with_blocks(2, 2, vec![TileCoord::new(1, 0), TileCoord::new(0, 1)]);
    let pathfinder = Pathfinder::new(&map);
    assert_eq!(
        pathfinder.find_best_path(pixel_of(0, 0), pixel_of(1, 1)),
        PathResult::Unreachable
    );
}

#[test]
fn live_entities_on_both_flanks_block_the_shortcut_diagonal() {
    // Actors on (1, 0) and (0, 1) flank the only route, the diagonal from
    // (0, 0) to (1, 1); the search must refuse to cut that corner even
    // though both endpoint tiles are free.
    let map = map_with_blocks(2, 2, Vec::new());
    let pathfinder = Pathfinder::new(&map);
    let mut cells = terrain_cells(&map);
    cells[1] = TileOccupancy::Actor(ActorId::new(1));
    cells[2] = TileOccupancy::Actor(ActorId::new(2));
    let view = OccupancyView::new(&cells, map.columns(), map.rows());

    let result = pathfinder.find_rerouted_path(
        &view,
        TileOccupancy::Free,
        pixel_of(0, 0),
        pixel_of(1, 1),
        PixelSize::new(TILE, TILE),
    );
    assert_eq!(result, PathResult::Unreachable);
}

#[test]
fn flanked_ideal_diagonal_forces_a_costlier_detour() {
    // The ideal route (0,0) -> (1,1) -> (2,2) stays on free tiles, but its
    // second diagonal is flanked by actors on (2, 1) and (1, 2); the search
    // has to go the long way around instead of returning the ideal route.
    let map = map_with_blocks(4, 4, Vec::new());
    let pathfinder = Pathfinder::new(&map);
    let mut cells = terrain_cells(&map);
    cells[4 + 2] = TileOccupancy::Actor(ActorId::new(1));
    cells[2 * 4 + 1] = TileOccupancy::Actor(ActorId::new(2));
    let view = OccupancyView::new(&cells, map.columns(), map.rows());

    let src = pixel_of(0, 0);
    let dst = pixel_of(2, 2);
    let rerouted = pathfinder.find_rerouted_path(
        &view,
        TileOccupancy::Free,
        src,
        dst,
        PixelSize::new(TILE, TILE),
    );
    assert!(rerouted.is_found());
    assert!(rerouted.waypoints().iter().all(|point| {
        let tile = tile_of(*point);
        tile != TileCoord::new(2, 1) && tile != TileCoord::new(1, 2)
    }));
    let static_cost = pathfinder
        .static_distance(tile_of(src), tile_of(dst))
        .expect("reachable");
    assert!(path_cost(src, rerouted.waypoints()) > static_cost + 1e-4);
}

#[test]
#[should_panic(expected = "occupancy view dimensions")]
fn view_for_a_different_map_panics() {
    let map = map_with_blocks(3, 3, Vec::new());
    let pathfinder = Pathfinder::new(&map);
    let other = map_with_blocks(4, 4, Vec::new());
    let cells = terrain_cells(&other);
    let view = OccupancyView::new(&cells, other.columns(), other.rows());
    let _ = pathfinder.find_rerouted_path(
        &view,
        TileOccupancy::Free,
        pixel_of(0, 0),
        pixel_of(2, 2),
        PixelSize::new(TILE, TILE),
    );
}

#[test]
fn wide_footprints_need_wide_gaps() {
    // A one-tile gap at (2, 1) in a wall across column 2.
    let wall = vec![TileCoord::new(2, 0), TileCoord::new(2, 2), TileCoord::new(2, 3)];
    let map = map_with_blocks(6, 4, wall);
    let pathfinder = Pathfinder::new(&map);
    let cells = terrain_cells(&map);
    let view = OccupancyView::new(&cells, map.columns(), map.rows());

    let src = pixel_of(0, 1);
    let dst = pixel_of(4, 1);
    let narrow = pathfinder.find_rerouted_path(
        &view,
        TileOccupancy::Free,
        src,
        dst,
        PixelSize::new(TILE, TILE),
    );
    assert!(narrow.is_found());

    let wide = pathfinder.find_rerouted_path(
        &view,
        TileOccupancy::Free,
        src,
        dst,
        PixelSize::new(TILE, TILE * 2),
    );
    assert_eq!(wide, PathResult::Unreachable);
}
