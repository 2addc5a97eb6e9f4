//! Live building/connection collections and every command that mutates them.
//!
//! Each command validates first and mutates after, so an `Err` never leaves a
//! partial change behind.

use irke_town_protocol::{
    Building, BuildingDraft, BuildingStatus, Connection, ConnectionKind, ConnectionMetadata,
    ConnectionStatus, GridConfig, GridPoint, RoutePreview, Rotation, TownState, TownView,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::catalog::template;
use crate::error::{ConnectError, PlacementError};
use crate::hit;
use crate::iso::ScreenPoint;
use crate::new_id;
use crate::occupancy::{footprint, occupant, Rect};
use crate::ports::{resolve_endpoint, PortKind};
use crate::routing::{self, expand_path, IntoCell, WalkGrid};

/// Cost units charged per path entry in connection metadata.
const COST_PER_STEP: u32 = 10;

#[derive(Debug, Clone, Default)]
pub struct Town {
    config: GridConfig,
    buildings: Vec<Building>,
    connections: Vec<Connection>,
}

impl Town {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            buildings: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn building(&self, id: &str) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn connections_for_building(&self, building_id: &str) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| c.touches(building_id))
            .collect()
    }

    pub fn view(&self) -> TownView {
        TownView {
            grid: self.config,
            buildings: self.buildings.clone(),
            connections: self.connections.clone(),
            session_id: None,
        }
    }

    /// Replaces both collections verbatim. Stored paths are trusted as-is.
    pub fn load(&mut self, state: TownState) {
        info!(
            town = %state.id,
            buildings = state.buildings.len(),
            connections = state.connections.len(),
            "town loaded"
        );
        self.buildings = state.buildings;
        self.connections = state.connections;
    }

    pub fn is_position_occupied(&self, rect: Rect, exclude_id: Option<&str>) -> bool {
        occupant(&self.buildings, rect, exclude_id).is_some()
    }

    pub fn walk_grid(&self) -> WalkGrid {
        WalkGrid::from_buildings(&self.config, &self.buildings)
    }

    /// Routes against the current occupancy; the grid is rebuilt on every call.
    pub fn find_path(&self, start: impl IntoCell, end: impl IntoCell) -> Option<Vec<GridPoint>> {
        routing::find_path(&self.config, &self.buildings, start, end)
    }

    pub fn building_at(&self, cell: GridPoint) -> Option<&Building> {
        hit::building_at(&self.buildings, cell)
    }

    pub fn connection_at(&self, point: ScreenPoint) -> Option<&Connection> {
        hit::connection_at(&self.config, &self.connections, point)
    }

    fn validate_footprint(&self, rect: Rect, exclude_id: Option<&str>) -> Result<(), PlacementError> {
        if rect.width <= 0 || rect.height <= 0 {
            return Err(PlacementError::InvalidSize {
                width: rect.width,
                height: rect.height,
            });
        }
        if !rect.fits_within(&self.config) {
            return Err(PlacementError::OutOfBounds {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
            });
        }
        if let Some(other) = occupant(&self.buildings, rect, exclude_id) {
            return Err(PlacementError::Occupied(other.id.clone()));
        }
        Ok(())
    }

    fn index_of(&self, id: &str) -> Result<usize, PlacementError> {
        self.buildings
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| PlacementError::UnknownBuilding(id.to_string()))
    }

    pub fn place_building(&mut self, draft: BuildingDraft) -> Result<String, PlacementError> {
        let t = template(draft.kind);
        let width = draft.width.unwrap_or(t.width);
        let height = draft.height.unwrap_or(t.height);
        let (w, h) = irke_town_protocol::effective_size(width, height, draft.rotation);
        self.validate_footprint(Rect::new(draft.grid_x, draft.grid_y, w, h), None)?;

        let id = new_id("building");
        self.buildings.push(Building {
            id: id.clone(),
            kind: draft.kind,
            name: draft.name.unwrap_or_else(|| t.name.to_string()),
            grid_x: draft.grid_x,
            grid_y: draft.grid_y,
            width,
            height,
            rotation: draft.rotation,
            status: BuildingStatus::default(),
            metadata: None,
        });
        info!(building = %id, kind = draft.kind.as_str(), x = draft.grid_x, y = draft.grid_y, "building placed");
        self.reroute_around(&id);
        Ok(id)
    }

    pub fn move_building(&mut self, id: &str, grid_x: i32, grid_y: i32) -> Result<(), PlacementError> {
        let idx = self.index_of(id)?;
        let b = &self.buildings[idx];
        let (w, h) = b.effective_size();
        self.validate_footprint(Rect::new(grid_x, grid_y, w, h), Some(id))?;

        let b = &mut self.buildings[idx];
        b.grid_x = grid_x;
        b.grid_y = grid_y;
        debug!(building = %id, x = grid_x, y = grid_y, "building moved");
        self.reroute_around(id);
        Ok(())
    }

    /// Quarter turn clockwise. Returns the new rotation.
    pub fn rotate_building(&mut self, id: &str) -> Result<Rotation, PlacementError> {
        let idx = self.index_of(id)?;
        let next = self.buildings[idx].rotation.rotate_cw();
        self.set_rotation(id, next)?;
        Ok(next)
    }

    pub fn set_rotation(&mut self, id: &str, rotation: Rotation) -> Result<(), PlacementError> {
        let idx = self.index_of(id)?;
        let b = &self.buildings[idx];
        if b.rotation == rotation {
            return Ok(());
        }
        let (w, h) = irke_town_protocol::effective_size(b.width, b.height, rotation);
        self.validate_footprint(Rect::new(b.grid_x, b.grid_y, w, h), Some(id))?;

        self.buildings[idx].rotation = rotation;
        debug!(building = %id, degrees = rotation.degrees(), "building rotated");
        self.reroute_around(id);
        Ok(())
    }

    pub fn rename_building(&mut self, id: &str, name: impl Into<String>) -> bool {
        match self.buildings.iter_mut().find(|b| b.id == id) {
            Some(b) => {
                b.name = name.into();
                true
            }
            None => false,
        }
    }

    pub fn set_building_status(&mut self, id: &str, status: BuildingStatus) -> bool {
        match self.buildings.iter_mut().find(|b| b.id == id) {
            Some(b) => {
                b.status = status;
                true
            }
            None => false,
        }
    }

    /// Removes the building together with every connection touching it.
    pub fn remove_building(&mut self, id: &str) -> bool {
        let before = self.buildings.len();
        self.buildings.retain(|b| b.id != id);
        if self.buildings.len() == before {
            return false;
        }
        let conns = self.connections.len();
        self.connections.retain(|c| !c.touches(id));
        info!(
            building = %id,
            dropped_connections = conns - self.connections.len(),
            "building removed"
        );
        true
    }

    /// Resolves both endpoints and routes between them without storing
    /// anything.
    pub fn preview_route(&self, from_id: &str, to_id: &str) -> Result<RoutePreview, ConnectError> {
        if from_id == to_id {
            return Err(ConnectError::SameBuilding);
        }
        let from = self
            .building(from_id)
            .ok_or_else(|| ConnectError::UnknownBuilding(from_id.to_string()))?;
        let to = self
            .building(to_id)
            .ok_or_else(|| ConnectError::UnknownBuilding(to_id.to_string()))?;
        if self.connections.iter().any(|c| c.links(from_id, to_id)) {
            return Err(ConnectError::AlreadyConnected(
                from_id.to_string(),
                to_id.to_string(),
            ));
        }

        let walk = self.walk_grid();
        let start = resolve_endpoint(&walk, from, PortKind::Output, to.center())
            .ok_or_else(|| ConnectError::NoPort(from_id.to_string()))?;
        let end = resolve_endpoint(&walk, to, PortKind::Input, from.center())
            .ok_or_else(|| ConnectError::NoPort(to_id.to_string()))?;
        let path = walk.find_path(start, end).ok_or(ConnectError::NoRoute)?;
        debug!(from = %from_id, to = %to_id, waypoints = path.len(), "route found");

        Ok(RoutePreview {
            from: start,
            to: end,
            path,
        })
    }

    pub fn add_connection(&mut self, from_id: &str, to_id: &str) -> Result<String, ConnectError> {
        let route = self.preview_route(from_id, to_id)?;
        let distance = u32::try_from(route.path.len()).unwrap_or(u32::MAX);

        let id = new_id("connection");
        self.connections.push(Connection {
            id: id.clone(),
            kind: ConnectionKind::Road,
            from_building_id: from_id.to_string(),
            to_building_id: to_id.to_string(),
            path: route.path,
            status: ConnectionStatus::Active,
            created_at: OffsetDateTime::now_utc(),
            metadata: Some(ConnectionMetadata {
                distance,
                cost: distance.saturating_mul(COST_PER_STEP),
            }),
        });
        Ok(id)
    }

    /// Idempotent: removing an unknown id is a no-op returning `false`.
    pub fn remove_connection(&mut self, id: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != id);
        self.connections.len() != before
    }

    /// Re-creates every connection touching `building_id` or running across
    /// its footprint. Connections left without a route are dropped.
    fn reroute_around(&mut self, building_id: &str) {
        let Some(rect) = self.building(building_id).map(footprint) else {
            return;
        };
        let affected: Vec<(String, String, String)> = self
            .connections
            .iter()
            .filter(|c| {
                c.touches(building_id) || expand_path(&c.path).into_iter().any(|p| rect.contains(p))
            })
            .map(|c| {
                (
                    c.id.clone(),
                    c.from_building_id.clone(),
                    c.to_building_id.clone(),
                )
            })
            .collect();

        for (old_id, from, to) in affected {
            self.remove_connection(&old_id);
            match self.add_connection(&from, &to) {
                Ok(new_id) => debug!(old = %old_id, new = %new_id, "connection re-routed"),
                Err(err) => warn!(
                    connection = %old_id,
                    from = %from,
                    to = %to,
                    error = %err,
                    "connection dropped after layout change"
                ),
            }
        }
    }
}
