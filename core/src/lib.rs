#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Tilemarch spatial engine.
//!
//! This crate defines the vocabulary that connects the entity grid, the
//! pathfinder, and external collaborators such as map loaders and actor
//! controllers. Two coordinate spaces run through every interface: continuous
//! *pixel* coordinates used by renderable entities, and discrete *tile*
//! coordinates used by the occupancy grid. A configurable tile size converts
//! between them; the conversion helpers at the bottom of this module are the
//! only place that arithmetic lives.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Continuous map-space position measured in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    x: i32,
    y: i32,
}

impl PixelPoint {
    /// Creates a new pixel-space point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal pixel coordinate.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical pixel coordinate.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the point translated by the provided pixel deltas.
    #[must_use]
    pub const fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        }
    }
}

/// Pixel extent of a rectangular entity footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelSize {
    width: u32,
    height: u32,
}

impl PixelSize {
    /// Creates a new footprint extent.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the footprint in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the footprint in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether the footprint covers no pixels at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Location of a single grid tile expressed as column and row indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    column: u32,
    row: u32,
}

impl TileCoord {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the tile.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the tile.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Returns the tile translated by the provided deltas, if the result
    /// stays within the non-negative coordinate space.
    #[must_use]
    pub fn offset_by(&self, delta_column: i32, delta_row: i32) -> Option<Self> {
        let column = checked_offset(self.column, delta_column)?;
        let row = checked_offset(self.row, delta_row)?;
        Some(Self { column, row })
    }
}

fn checked_offset(value: u32, delta: i32) -> Option<u32> {
    if delta.is_negative() {
        value.checked_sub(delta.unsigned_abs())
    } else {
        value.checked_add(delta.unsigned_abs())
    }
}

/// Size of a [`TileRect`] measured in whole tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRectSize {
    width: u32,
    height: u32,
}

impl TileRectSize {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the rectangle in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the rectangle in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

/// Axis-aligned rectangle expressed in tile coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    origin: TileCoord,
    size: TileRectSize,
}

impl TileRect {
    /// Constructs a rectangle from an origin tile and size.
    #[must_use]
    pub const fn from_origin_and_size(origin: TileCoord, size: TileRectSize) -> Self {
        Self { origin, size }
    }

    /// Upper-left tile that anchors the rectangle.
    #[must_use]
    pub const fn origin(&self) -> TileCoord {
        self.origin
    }

    /// Dimensions of the rectangle measured in whole tiles.
    #[must_use]
    pub const fn size(&self) -> TileRectSize {
        self.size
    }

    /// Reports whether every covered tile lies inside a grid of the provided
    /// dimensions.
    #[must_use]
    pub fn fits_within(&self, columns: u32, rows: u32) -> bool {
        if self.size.width() == 0 || self.size.height() == 0 {
            return false;
        }
        let right = u64::from(self.origin.column()) + u64::from(self.size.width());
        let bottom = u64::from(self.origin.row()) + u64::from(self.size.height());
        right <= u64::from(columns) && bottom <= u64::from(rows)
    }

    /// Reports whether the rectangle covers the provided tile.
    #[must_use]
    pub fn contains(&self, tile: TileCoord) -> bool {
        let column = u64::from(tile.column());
        let row = u64::from(tile.row());
        let left = u64::from(self.origin.column());
        let top = u64::from(self.origin.row());
        column >= left
            && column < left + u64::from(self.size.width())
            && row >= top
            && row < top + u64::from(self.size.height())
    }

    /// Iterates over every covered tile in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> {
        let origin = self.origin;
        let width = self.size.width();
        (0..self.size.height()).flat_map(move |delta_row| {
            (0..width).map(move |delta_column| {
                TileCoord::new(origin.column() + delta_column, origin.row() + delta_row)
            })
        })
    }
}

/// Unique identifier assigned to an actor registered with the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(u32);

impl ActorId {
    /// Creates a new actor identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a placed obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObstacleId(u32);

impl ObstacleId {
    /// Creates a new obstacle identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Movement and facing directions available to actors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column and decreasing row indices.
    NorthEast,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing column and row indices.
    SouthEast,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column and increasing row indices.
    SouthWest,
    /// Movement toward decreasing column indices.
    West,
    /// Movement toward decreasing column and row indices.
    NorthWest,
}

impl Direction {
    /// Column and row deltas for a single tile step in this direction.
    #[must_use]
    pub const fn offsets(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }

    /// Reports whether the direction moves along both axes at once.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthEast | Self::SouthEast | Self::SouthWest | Self::NorthWest
        )
    }
}

/// Occupancy state of a single grid tile.
///
/// At most one occupant governs a tile at a time; the enum makes the mutual
/// exclusion of obstacle and actor occupancy unrepresentable rather than an
/// invariant to police.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileOccupancy {
    /// Nothing claims the tile.
    Free,
    /// The tile is held by terrain or a placed obstacle.
    Obstacle(ObstacleId),
    /// The tile is claimed by a registered actor.
    Actor(ActorId),
}

impl TileOccupancy {
    /// Reports whether the tile carries no claim at all.
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }

    /// Returns the claiming actor, if the tile is actor-held.
    #[must_use]
    pub const fn actor(self) -> Option<ActorId> {
        match self {
            Self::Actor(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the claiming obstacle, if the tile is obstacle-held.
    #[must_use]
    pub const fn obstacle(self) -> Option<ObstacleId> {
        match self {
            Self::Obstacle(id) => Some(id),
            _ => None,
        }
    }
}

/// Reasons a map description may be rejected at load time.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MapError {
    /// The grid holds no tiles in at least one dimension.
    #[error("map grid must contain at least one tile in each dimension")]
    EmptyGrid,
    /// A tile size of zero pixels makes coordinate conversion meaningless.
    #[error("tile size must be at least one pixel")]
    ZeroTileSize,
    /// A statically blocked tile lies outside the declared grid.
    #[error("blocked tile ({column}, {row}) lies outside a {columns}x{rows} grid")]
    BlockedTileOutOfBounds {
        /// Column index of the offending tile.
        column: u32,
        /// Row index of the offending tile.
        row: u32,
        /// Declared number of grid columns.
        columns: u32,
        /// Declared number of grid rows.
        rows: u32,
    },
}

/// Static geometry of a loaded map: grid dimensions, tile size, and the
/// tiles that terrain blocks permanently.
///
/// Construction validates the geometry, so a held `MapData` is always
/// internally consistent; downstream components never re-check it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    columns: u32,
    rows: u32,
    tile_size: u32,
    blocked: Vec<TileCoord>,
}

impl MapData {
    /// Validates and assembles a map description.
    pub fn new(
        columns: u32,
        rows: u32,
        tile_size: u32,
        blocked: Vec<TileCoord>,
    ) -> Result<Self, MapError> {
        if columns == 0 || rows == 0 {
            return Err(MapError::EmptyGrid);
        }
        if tile_size == 0 {
            return Err(MapError::ZeroTileSize);
        }
        for tile in &blocked {
            if tile.column() >= columns || tile.row() >= rows {
                return Err(MapError::BlockedTileOutOfBounds {
                    column: tile.column(),
                    row: tile.row(),
                    columns,
                    rows,
                });
            }
        }
        Ok(Self {
            columns,
            rows,
            tile_size,
            blocked,
        })
    }

    /// Number of tile columns in the map.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of tile rows in the map.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Edge length of a single square tile in pixels.
    #[must_use]
    pub const fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Tiles blocked permanently by terrain.
    #[must_use]
    pub fn blocked_tiles(&self) -> &[TileCoord] {
        &self.blocked
    }

    /// Reports whether the provided tile is blocked by terrain.
    #[must_use]
    pub fn is_blocked(&self, tile: TileCoord) -> bool {
        self.blocked.iter().any(|blocked| *blocked == tile)
    }

    /// Total number of tiles in the grid.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        let count = u64::from(self.columns) * u64::from(self.rows);
        usize::try_from(count).unwrap_or(usize::MAX)
    }
}

/// Outcome of a path query.
///
/// An empty waypoint list is ambiguous between "no route exists" and
/// "already standing on the destination tile", so the two are distinct
/// variants rather than a convention callers must remember.
#[derive(Clone, Debug, PartialEq)]
pub enum PathResult {
    /// Source and destination resolve to the same tile.
    AlreadyThere,
    /// No route connects the source to the destination.
    Unreachable,
    /// An ordered sequence of pixel waypoints from source to destination.
    Found(Vec<PixelPoint>),
}

impl PathResult {
    /// Reports whether the query produced a usable route.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Waypoints of the route; empty for the other two outcomes.
    #[must_use]
    pub fn waypoints(&self) -> &[PixelPoint] {
        match self {
            Self::Found(waypoints) => waypoints,
            _ => &[],
        }
    }

    /// Consumes the result, yielding the waypoints of a found route.
    #[must_use]
    pub fn into_waypoints(self) -> Vec<PixelPoint> {
        match self {
            Self::Found(waypoints) => waypoints,
            _ => Vec::new(),
        }
    }
}

/// Read-only view into the dense occupancy grid.
///
/// The entity grid hands this capability to the pathfinder (and to
/// diagnostics) instead of exposing its cells for mutation; all dynamic
/// obstacle checks during a search go through it.
#[derive(Clone, Copy, Debug)]
pub struct OccupancyView<'a> {
    cells: &'a [TileOccupancy],
    columns: u32,
    rows: u32,
}

impl<'a> OccupancyView<'a> {
    /// Captures a new view backed by the provided cell slice.
    #[must_use]
    pub fn new(cells: &'a [TileOccupancy], columns: u32, rows: u32) -> Self {
        Self {
            cells,
            columns,
            rows,
        }
    }

    /// Returns the occupancy of the provided tile, or `None` when the tile
    /// lies outside the grid.
    #[must_use]
    pub fn occupant(&self, tile: TileCoord) -> Option<TileOccupancy> {
        self.index(tile).and_then(|index| self.cells.get(index)).copied()
    }

    /// Reports whether the tile carries no claim. Out-of-bounds tiles are
    /// never free.
    #[must_use]
    pub fn is_free(&self, tile: TileCoord) -> bool {
        self.occupant(tile).is_some_and(TileOccupancy::is_free)
    }

    /// Reports whether the tile is enterable by `mover`: free tiles qualify,
    /// and so do tiles the mover already holds itself.
    #[must_use]
    pub fn is_free_for(&self, tile: TileCoord, mover: TileOccupancy) -> bool {
        match self.occupant(tile) {
            Some(TileOccupancy::Free) => true,
            Some(occupant) => !mover.is_free() && occupant == mover,
            None => false,
        }
    }

    /// Reports whether every tile of the rectangle is enterable by `mover`.
    /// Rectangles extending past the grid edge are never free.
    #[must_use]
    pub fn is_area_free_for(&self, area: TileRect, mover: TileOccupancy) -> bool {
        if !area.fits_within(self.columns, self.rows) {
            return false;
        }
        area.tiles().all(|tile| self.is_free_for(tile, mover))
    }

    /// Provides the dimensions of the underlying occupancy grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    fn index(&self, tile: TileCoord) -> Option<usize> {
        if tile.column() < self.columns && tile.row() < self.rows {
            let row = usize::try_from(tile.row()).ok()?;
            let column = usize::try_from(tile.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

/// Returns the tile containing the provided pixel point, or `None` for
/// points left of or above the map origin.
#[must_use]
pub fn tile_at(point: PixelPoint, tile_size: u32) -> Option<TileCoord> {
    if point.x() < 0 || point.y() < 0 || tile_size == 0 {
        return None;
    }
    let column = u32::try_from(point.x()).ok()? / tile_size;
    let row = u32::try_from(point.y()).ok()? / tile_size;
    Some(TileCoord::new(column, row))
}

/// Pixel position of the upper-left corner of the provided tile.
#[must_use]
pub fn tile_origin(tile: TileCoord, tile_size: u32) -> PixelPoint {
    let x = i64::from(tile.column()) * i64::from(tile_size);
    let y = i64::from(tile.row()) * i64::from(tile_size);
    PixelPoint::new(x as i32, y as i32)
}

/// Computes the tile rectangle covered by a pixel footprint, or `None` when
/// the footprint is empty or extends into negative coordinate space.
#[must_use]
pub fn tile_span(origin: PixelPoint, size: PixelSize, tile_size: u32) -> Option<TileRect> {
    if size.is_empty() {
        return None;
    }
    let first = tile_at(origin, tile_size)?;
    let last = tile_at(
        origin.offset(size.width() as i32 - 1, size.height() as i32 - 1),
        tile_size,
    )?;
    let width = last.column().checked_sub(first.column())? + 1;
    let height = last.row().checked_sub(first.row())? + 1;
    Some(TileRect::from_origin_and_size(
        first,
        TileRectSize::new(width, height),
    ))
}
