#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative occupancy state for the active map.
//!
//! The entity grid binds a validated [`MapData`] to a dense collision grid
//! and is the single gatekeeper for every change to "what is where": all
//! reservations are all-or-nothing, and multi-frame moves go through the
//! two-phase begin/resolve protocol so that a reservation granted earlier in
//! a tick is visible to every later occupancy check in the same tick. The
//! grid owns the [`Pathfinder`] built for the current map and forwards path
//! queries to it together with a read-only view of the live occupancy.
//!
//! Expected conflicts (a requested area is taken) are reported through
//! [`GridRejection`] values. Misuse of the protocol itself, such as resolving
//! a movement that was never begun or naming an unregistered actor, corrupts
//! the occupancy invariant if allowed to continue and therefore panics.

use std::collections::BTreeMap;

use tilemarch_core::{
    tile_span, ActorId, Direction, MapData, ObstacleId, OccupancyView, PathResult, PixelPoint,
    PixelSize, TileCoord, TileOccupancy, TileRect,
};
use tilemarch_pathfinder::Pathfinder;

/// Obstacle identifier reserved for tiles blocked by map terrain.
const TERRAIN_OBSTACLE: ObstacleId = ObstacleId::new(0);

/// First identifier handed out for dynamically placed obstacles.
const FIRST_DYNAMIC_OBSTACLE: u32 = 1;

/// Reasons the grid refuses an occupancy request.
///
/// These are expected, frequent outcomes; callers decide whether to retry,
/// reroute, or give up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridRejection {
    /// The requested footprint extends beyond the map.
    OutOfBounds,
    /// At least one covered tile is already claimed by someone else.
    Occupied,
}

/// Footprint and facing the grid records for a registered actor.
#[derive(Clone, Copy, Debug)]
struct ActorPlacement {
    origin: PixelPoint,
    size: PixelSize,
    facing: Direction,
    /// Destination reserved by a `begin_movement` that has not been
    /// resolved yet.
    pending: Option<PixelPoint>,
}

/// Single source of truth for tile occupancy on the current map.
#[derive(Debug)]
pub struct EntityGrid {
    map: MapData,
    cells: Vec<TileOccupancy>,
    actors: BTreeMap<ActorId, ActorPlacement>,
    pathfinder: Pathfinder,
    next_obstacle: u32,
}

impl EntityGrid {
    /// Binds the grid to a validated map, marking terrain-blocked tiles and
    /// running the pathfinder precomputation.
    #[must_use]
    pub fn new(map: MapData) -> Self {
        let pathfinder = Pathfinder::new(&map);
        let cells = terrain_cells(&map);
        Self {
            map,
            cells,
            actors: BTreeMap::new(),
            pathfinder,
            next_obstacle: FIRST_DYNAMIC_OBSTACLE,
        }
    }

    /// Replaces the active map, rebuilding the collision grid and routing
    /// matrices from scratch and dropping every registration.
    pub fn set_map(&mut self, map: MapData) {
        self.pathfinder = Pathfinder::new(&map);
        self.cells = terrain_cells(&map);
        self.actors.clear();
        self.next_obstacle = FIRST_DYNAMIC_OBSTACLE;
        self.map = map;
    }

    /// The map the grid currently operates on.
    #[must_use]
    pub fn map(&self) -> &MapData {
        &self.map
    }

    /// Reports whether the pixel point lies within the map.
    #[must_use]
    pub fn contains_point(&self, point: PixelPoint) -> bool {
        if point.x() < 0 || point.y() < 0 {
            return false;
        }
        let width = i64::from(self.map.columns()) * i64::from(self.map.tile_size());
        let height = i64::from(self.map.rows()) * i64::from(self.map.tile_size());
        i64::from(point.x()) < width && i64::from(point.y()) < height
    }

    /// Captures the read-only occupancy capability handed to the pathfinder
    /// and to diagnostics.
    #[must_use]
    pub fn occupancy_view(&self) -> OccupancyView<'_> {
        OccupancyView::new(&self.cells, self.map.columns(), self.map.rows())
    }

    /// Reports whether every tile covered by the pixel footprint is entirely
    /// unoccupied. Footprints reaching outside the map are never free.
    #[must_use]
    pub fn is_area_free(&self, origin: PixelPoint, size: PixelSize) -> bool {
        match self.span(origin, size) {
            Some(area) => area.tiles().all(|tile| self.cells[self.index(tile)].is_free()),
            None => false,
        }
    }

    /// Places an obstacle over the footprint, all-or-nothing. On success the
    /// newly allocated obstacle identifier is returned; on rejection the grid
    /// is left completely unmodified.
    pub fn add_obstacle(
        &mut self,
        origin: PixelPoint,
        size: PixelSize,
    ) -> Result<ObstacleId, GridRejection> {
        let area = self.span(origin, size).ok_or(GridRejection::OutOfBounds)?;
        if !self.can_occupy(area, TileOccupancy::Free) {
            return Err(GridRejection::Occupied);
        }
        let id = ObstacleId::new(self.next_obstacle);
        self.next_obstacle += 1;
        self.set_area(area, TileOccupancy::Obstacle(id));
        Ok(id)
    }

    /// Registers an actor and occupies its footprint, all-or-nothing.
    ///
    /// # Panics
    ///
    /// Panics if the identifier is already registered; re-registering an
    /// actor would detach the grid's records from its real footprint.
    pub fn add_actor(
        &mut self,
        id: ActorId,
        origin: PixelPoint,
        size: PixelSize,
        facing: Direction,
    ) -> Result<(), GridRejection> {
        assert!(
            !self.actors.contains_key(&id),
            "actor {} is already registered with the grid",
            id.get()
        );
        let area = self.span(origin, size).ok_or(GridRejection::OutOfBounds)?;
        if !self.can_occupy(area, TileOccupancy::Free) {
            return Err(GridRejection::Occupied);
        }
        self.set_area(area, TileOccupancy::Actor(id));
        let _ = self.actors.insert(
            id,
            ActorPlacement {
                origin,
                size,
                facing,
                pending: None,
            },
        );
        Ok(())
    }

    /// Releases every tile currently attributed to the actor and forgets its
    /// registration. A no-op for unknown or already removed actors.
    pub fn remove_actor(&mut self, id: ActorId) {
        let _ = self.actors.remove(&id);
        let claim = TileOccupancy::Actor(id);
        for cell in &mut self.cells {
            if *cell == claim {
                *cell = TileOccupancy::Free;
            }
        }
    }

    /// Updates the facing recorded for the actor.
    ///
    /// # Panics
    ///
    /// Panics if the actor is not registered.
    pub fn set_facing(&mut self, id: ActorId, facing: Direction) {
        match self.actors.get_mut(&id) {
            Some(placement) => placement.facing = facing,
            None => panic!("actor {} is not registered with the grid", id.get()),
        }
    }

    /// Pixel origin last committed for the actor, if it is registered.
    #[must_use]
    pub fn actor_origin(&self, id: ActorId) -> Option<PixelPoint> {
        self.actors.get(&id).map(|placement| placement.origin)
    }

    /// Returns the actor occupying the single tile immediately beyond the
    /// actor's footprint in its facing direction, if one is there.
    ///
    /// # Panics
    ///
    /// Panics if the actor is not registered.
    #[must_use]
    pub fn adjacent_actor(&self, id: ActorId) -> Option<ActorId> {
        let placement = self.placement(id);
        let area = self.span(placement.origin, placement.size)?;
        let (delta_column, delta_row) = placement.facing.offsets();
        let probe = probe_tile(area, delta_column, delta_row)?;
        self.occupancy_view().occupant(probe)?.actor()
    }

    /// Moves the actor to a new origin in one step, all-or-nothing: the
    /// destination footprint must be free apart from the actor's own tiles.
    ///
    /// # Panics
    ///
    /// Panics if the actor is not registered.
    pub fn change_actor_location(
        &mut self,
        id: ActorId,
        dst: PixelPoint,
    ) -> Result<(), GridRejection> {
        let placement = self.placement(id);
        let claim = TileOccupancy::Actor(id);
        let destination = self
            .span(dst, placement.size)
            .ok_or(GridRejection::OutOfBounds)?;
        if !self.can_occupy(destination, claim) {
            return Err(GridRejection::Occupied);
        }
        if let Some(source) = self.span(placement.origin, placement.size) {
            self.free_owned(source, claim);
        }
        self.set_area(destination, claim);
        self.update_origin(id, dst);
        Ok(())
    }

    /// First phase of a multi-frame move: reserves the destination footprint
    /// in addition to the tiles the actor already holds. The reservation is
    /// visible to every subsequent occupancy check, so two actors stepped in
    /// the same tick can never be granted the same tile.
    ///
    /// On success the caller must finish with [`EntityGrid::end_movement`] or
    /// [`EntityGrid::abort_movement`]; on rejection nothing changed.
    ///
    /// # Panics
    ///
    /// Panics if the actor is not registered, or if an earlier movement for
    /// it was begun and never resolved; abandoning a reservation would
    /// strand its tiles as claimed forever.
    pub fn begin_movement(&mut self, id: ActorId, dst: PixelPoint) -> Result<(), GridRejection> {
        let placement = self.placement(id);
        assert!(
            placement.pending.is_none(),
            "begin_movement for actor {} while an earlier movement is still in flight",
            id.get()
        );
        let claim = TileOccupancy::Actor(id);
        let destination = self
            .span(dst, placement.size)
            .ok_or(GridRejection::OutOfBounds)?;
        if !self.can_occupy(destination, claim) {
            return Err(GridRejection::Occupied);
        }
        self.set_area(destination, claim);
        self.set_pending(id, Some(dst));
        Ok(())
    }

    /// Second phase of a successful move: releases the source tiles that the
    /// destination footprint does not cover and records the new origin.
    ///
    /// # Panics
    ///
    /// Panics if the actor is not registered, if either footprint lies
    /// outside the map, or if `dst` is not the destination reserved by a
    /// matching [`EntityGrid::begin_movement`].
    pub fn end_movement(&mut self, id: ActorId, src: PixelPoint, dst: PixelPoint) {
        let placement = self.placement(id);
        assert!(
            placement.pending == Some(dst),
            "end_movement for actor {} without a matching begin_movement",
            id.get()
        );
        let claim = TileOccupancy::Actor(id);
        let source = self
            .span(src, placement.size)
            .unwrap_or_else(|| panic!("movement source for actor {} is off-map", id.get()));
        let destination = self
            .span(dst, placement.size)
            .unwrap_or_else(|| panic!("movement destination for actor {} is off-map", id.get()));
        assert!(
            destination
                .tiles()
                .all(|tile| self.cells[self.index(tile)] == claim),
            "end_movement for actor {} without a matching begin_movement",
            id.get()
        );
        for tile in source.tiles() {
            if destination.contains(tile) {
                continue;
            }
            let index = self.index(tile);
            if self.cells[index] == claim {
                self.cells[index] = TileOccupancy::Free;
            }
        }
        self.update_origin(id, dst);
        self.set_pending(id, None);
    }

    /// Second phase of a failed or interrupted move: releases both
    /// provisional areas and re-occupies exactly the footprint anchored at
    /// `resting`, the origin where the actor actually stopped.
    ///
    /// # Panics
    ///
    /// Panics if the actor is not registered, if `dst` is not the
    /// destination reserved by a matching [`EntityGrid::begin_movement`],
    /// if any of the three footprints lies outside the map, or if the
    /// resting footprint collides with tiles held by someone else; the
    /// caller guaranteed the actor stopped inside the area it had reserved.
    pub fn abort_movement(
        &mut self,
        id: ActorId,
        src: PixelPoint,
        dst: PixelPoint,
        resting: PixelPoint,
    ) {
        let placement = self.placement(id);
        assert!(
            placement.pending == Some(dst),
            "abort_movement for actor {} without a matching begin_movement",
            id.get()
        );
        let claim = TileOccupancy::Actor(id);
        let source = self
            .span(src, placement.size)
            .unwrap_or_else(|| panic!("movement source for actor {} is off-map", id.get()));
        let destination = self
            .span(dst, placement.size)
            .unwrap_or_else(|| panic!("movement destination for actor {} is off-map", id.get()));
        let rest = self
            .span(resting, placement.size)
            .unwrap_or_else(|| panic!("resting footprint for actor {} is off-map", id.get()));
        self.free_owned(source, claim);
        self.free_owned(destination, claim);
        assert!(
            self.can_occupy(rest, claim),
            "actor {} aborted movement onto tiles held by someone else",
            id.get()
        );
        self.set_area(rest, claim);
        self.update_origin(id, resting);
        self.set_pending(id, None);
    }

    /// Greedily advances the actor one tile-step at a time along the given
    /// direction until `max_distance` pixels are spent or the next step is
    /// rejected. Returns the final committed origin.
    ///
    /// Used for push and knockback effects; this is not pathfinding.
    ///
    /// # Panics
    ///
    /// Panics if the actor is not registered.
    pub fn move_to_closest_point(
        &mut self,
        id: ActorId,
        x_direction: i32,
        y_direction: i32,
        max_distance: u32,
    ) -> PixelPoint {
        let placement = self.placement(id);
        let step_x = x_direction.signum();
        let step_y = y_direction.signum();
        let mut origin = placement.origin;
        if step_x == 0 && step_y == 0 {
            return origin;
        }

        let claim = TileOccupancy::Actor(id);
        let tile_size = self.map.tile_size();
        let mut remaining = max_distance;
        while remaining > 0 {
            let step = remaining.min(tile_size);
            let candidate = origin.offset(step_x * step as i32, step_y * step as i32);
            let Some(destination) = self.span(candidate, placement.size) else {
                break;
            };
            if !self.can_occupy(destination, claim) {
                break;
            }
            if let Some(current) = self.span(origin, placement.size) {
                self.free_owned(current, claim);
            }
            self.set_area(destination, claim);
            origin = candidate;
            remaining -= step;
        }

        self.update_origin(id, origin);
        origin
    }

    /// Ideal route between two pixel positions, ignoring all entities and
    /// dynamically placed obstacles.
    #[must_use]
    pub fn find_best_path(&self, src: PixelPoint, dst: PixelPoint) -> PathResult {
        self.pathfinder.find_best_path(src, dst)
    }

    /// Route for the registered actor from its current origin to `dst`,
    /// avoiding live occupancy; the actor's own tiles never block it.
    ///
    /// # Panics
    ///
    /// Panics if the actor is not registered.
    #[must_use]
    pub fn find_rerouted_path(&self, id: ActorId, dst: PixelPoint) -> PathResult {
        let placement = self.placement(id);
        self.pathfinder.find_rerouted_path(
            &self.occupancy_view(),
            TileOccupancy::Actor(id),
            placement.origin,
            dst,
            placement.size,
        )
    }

    /// Route between two arbitrary pixel positions for an unregistered mover
    /// of the provided footprint, avoiding live occupancy.
    #[must_use]
    pub fn find_rerouted_path_between(
        &self,
        src: PixelPoint,
        dst: PixelPoint,
        size: PixelSize,
    ) -> PathResult {
        self.pathfinder
            .find_rerouted_path(&self.occupancy_view(), TileOccupancy::Free, src, dst, size)
    }

    /// Renders the occupancy grid as text for diagnostics: `#` for
    /// obstacles, a letter per actor, `.` for free tiles.
    #[must_use]
    pub fn dump(&self) -> String {
        let columns = self.map.columns();
        let rows = self.map.rows();
        let mut rendered = String::with_capacity((columns as usize + 1) * rows as usize);
        for row in 0..rows {
            for column in 0..columns {
                let glyph = match self.cells[self.index(TileCoord::new(column, row))] {
                    TileOccupancy::Free => '.',
                    TileOccupancy::Obstacle(_) => '#',
                    TileOccupancy::Actor(id) => actor_glyph(id),
                };
                rendered.push(glyph);
            }
            rendered.push('\n');
        }
        rendered
    }

    fn placement(&self, id: ActorId) -> ActorPlacement {
        match self.actors.get(&id) {
            Some(placement) => *placement,
            None => panic!("actor {} is not registered with the grid", id.get()),
        }
    }

    fn update_origin(&mut self, id: ActorId, origin: PixelPoint) {
        if let Some(placement) = self.actors.get_mut(&id) {
            placement.origin = origin;
        }
    }

    fn set_pending(&mut self, id: ActorId, pending: Option<PixelPoint>) {
        if let Some(placement) = self.actors.get_mut(&id) {
            placement.pending = pending;
        }
    }

    fn span(&self, origin: PixelPoint, size: PixelSize) -> Option<TileRect> {
        let area = tile_span(origin, size, self.map.tile_size())?;
        if area.fits_within(self.map.columns(), self.map.rows()) {
            Some(area)
        } else {
            None
        }
    }

    /// Whether every tile of the area is free or already held by `claim`.
    fn can_occupy(&self, area: TileRect, claim: TileOccupancy) -> bool {
        area.tiles().all(|tile| {
            let occupant = self.cells[self.index(tile)];
            occupant.is_free() || (!claim.is_free() && occupant == claim)
        })
    }

    fn set_area(&mut self, area: TileRect, claim: TileOccupancy) {
        for tile in area.tiles() {
            let index = self.index(tile);
            self.cells[index] = claim;
        }
    }

    /// Frees only the tiles of the area that `claim` itself holds.
    fn free_owned(&mut self, area: TileRect, claim: TileOccupancy) {
        for tile in area.tiles() {
            let index = self.index(tile);
            if self.cells[index] == claim {
                self.cells[index] = TileOccupancy::Free;
            }
        }
    }

    fn index(&self, tile: TileCoord) -> usize {
        let row = tile.row() as usize;
        let column = tile.column() as usize;
        row * self.map.columns() as usize + column
    }
}

fn terrain_cells(map: &MapData) -> Vec<TileOccupancy> {
    let mut cells = vec![TileOccupancy::Free; map.tile_count()];
    let columns = map.columns() as usize;
    for tile in map.blocked_tiles() {
        let index = tile.row() as usize * columns + tile.column() as usize;
        cells[index] = TileOccupancy::Obstacle(TERRAIN_OBSTACLE);
    }
    cells
}

/// Tile one step beyond the edge of `area` in the given direction, aligned
/// with the area's origin on the unmoved axis.
fn probe_tile(area: TileRect, delta_column: i32, delta_row: i32) -> Option<TileCoord> {
    let column = match delta_column.signum() {
        1 => area.origin().column().checked_add(area.size().width())?,
        -1 => area.origin().column().checked_sub(1)?,
        _ => area.origin().column(),
    };
    let row = match delta_row.signum() {
        1 => area.origin().row().checked_add(area.size().height())?,
        -1 => area.origin().row().checked_sub(1)?,
        _ => area.origin().row(),
    };
    Some(TileCoord::new(column, row))
}

fn actor_glyph(id: ActorId) -> char {
    (b'a' + (id.get() % 26) as u8) as char
}
