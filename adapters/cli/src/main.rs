//! Diagnostic command-line adapter for the Tilemarch spatial core.
//!
//! Builds a demo map with a wall and a gap, places an obstacle and two
//! actors, then exercises the full query surface: occupancy dump, ideal
//! routing, and entity-aware rerouting.

use anyhow::{bail, Context, Result};
use clap::Parser;

use tilemarch_core::{
    ActorId, Direction, MapData, PathResult, PixelPoint, PixelSize, TileCoord,
};
use tilemarch_grid::EntityGrid;

#[derive(Debug, Parser)]
#[command(name = "tilemarch", about = "Occupancy and routing diagnostics")]
struct Args {
    /// Number of tile columns in the demo map.
    #[arg(long, default_value_t = 12)]
    columns: u32,

    /// Number of tile rows in the demo map.
    #[arg(long, default_value_t = 8)]
    rows: u32,

    /// Edge length of a tile in pixels.
    #[arg(long, default_value_t = 32)]
    tile_size: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.columns < 6 || args.rows < 4 {
        bail!("demo map needs at least 6 columns and 4 rows");
    }

    let map = demo_map(&args).context("building demo map")?;
    let tile = map.tile_size();
    let mut grid = EntityGrid::new(map);

    let traveler = ActorId::new(0);
    let blocker = ActorId::new(1);
    let actor_size = PixelSize::new(tile, tile);
    let src = pixel_of(0, args.rows / 2, tile);
    let dst = pixel_of(args.columns - 1, args.rows / 2, tile);
    if !grid.contains_point(src) || !grid.contains_point(dst) {
        bail!("demo endpoints fall outside the map");
    }

    grid.add_actor(traveler, src, actor_size, Direction::East)
        .map_err(|rejection| anyhow::anyhow!("placing traveler: {rejection:?}"))?;
    grid.add_actor(
        blocker,
        pixel_of(args.columns / 2 + 1, args.rows / 2, tile),
        actor_size,
        Direction::West,
    )
    .map_err(|rejection| anyhow::anyhow!("placing blocker: {rejection:?}"))?;
    let _ = grid
        .add_obstacle(pixel_of(1, 1, tile), PixelSize::new(tile * 2, tile))
        .map_err(|rejection| anyhow::anyhow!("placing obstacle: {rejection:?}"))?;

    println!("occupancy ({} x {} tiles):", args.columns, args.rows);
    print!("{}", grid.dump());

    println!();
    describe("ideal route", grid.find_best_path(src, dst), tile);
    describe(
        "rerouted around entities",
        grid.find_rerouted_path(traveler, dst),
        tile,
    );

    Ok(())
}

/// An open map with a vertical wall through the middle, pierced by a
/// one-tile gap so routes have something to thread.
fn demo_map(args: &Args) -> Result<MapData> {
    let wall_column = args.columns / 2;
    let gap_row = args.rows / 2 - 1;
    let blocked: Vec<TileCoord> = (0..args.rows)
        .filter(|row| *row != gap_row)
        .map(|row| TileCoord::new(wall_column, row))
        .collect();
    MapData::new(args.columns, args.rows, args.tile_size, blocked).map_err(Into::into)
}

fn pixel_of(column: u32, row: u32, tile_size: u32) -> PixelPoint {
    PixelPoint::new((column * tile_size) as i32, (row * tile_size) as i32)
}

fn describe(label: &str, result: PathResult, tile_size: u32) {
    match result {
        PathResult::AlreadyThere => println!("{label}: already at destination"),
        PathResult::Unreachable => println!("{label}: no route"),
        found => {
            let waypoints = found.into_waypoints();
            let tiles: Vec<String> = waypoints
                .iter()
                .map(|point| {
                    format!(
                        "({}, {})",
                        point.x() / tile_size as i32,
                        point.y() / tile_size as i32
                    )
                })
                .collect();
            println!("{label}: {} steps via {}", waypoints.len(), tiles.join(" "));
        }
    }
}
