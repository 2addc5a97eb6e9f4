//! Road routing over the walkability grid.
//!
//! The grid is rebuilt from the building list for every routing request, so a
//! route always reflects the latest occupancy.

use irke_town_protocol::{Building, GridConfig, GridPoint};

use crate::occupancy::footprint;

/// N, E, S, W. Neighbor order feeds the search, so it is fixed.
const DIRECTIONS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Anything that names a grid cell. Fractional coordinates are floored.
pub trait IntoCell {
    fn into_cell(self) -> GridPoint;
}

impl IntoCell for GridPoint {
    fn into_cell(self) -> GridPoint {
        self
    }
}

impl IntoCell for (i32, i32) {
    fn into_cell(self) -> GridPoint {
        GridPoint::new(self.0, self.1)
    }
}

impl IntoCell for (f64, f64) {
    fn into_cell(self) -> GridPoint {
        GridPoint::new(self.0.floor() as i32, self.1.floor() as i32)
    }
}

/// `true` = free cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkGrid {
    width: i32,
    height: i32,
    cells: Vec<bool>,
}

impl WalkGrid {
    pub fn new(width: i32, height: i32) -> Self {
        let len = usize::try_from(width.max(0) * height.max(0)).unwrap_or(0);
        Self {
            width: width.max(0),
            height: height.max(0),
            cells: vec![true; len],
        }
    }

    /// Every cell of every effective footprint is blocked.
    pub fn from_buildings(config: &GridConfig, buildings: &[Building]) -> Self {
        let mut grid = Self::new(config.width, config.height);
        for b in buildings {
            for cell in footprint(b).cells() {
                grid.block(cell);
            }
        }
        grid
    }

    fn index(&self, p: GridPoint) -> Option<usize> {
        if !self.in_bounds(p) {
            return None;
        }
        usize::try_from(p.y * self.width + p.x).ok()
    }

    pub fn in_bounds(&self, p: GridPoint) -> bool {
        p.x >= 0 && p.x < self.width && p.y >= 0 && p.y < self.height
    }

    /// Out-of-bounds cells are never walkable.
    pub fn is_walkable(&self, p: GridPoint) -> bool {
        self.index(p).map(|i| self.cells[i]).unwrap_or(false)
    }

    pub fn block(&mut self, p: GridPoint) {
        if let Some(i) = self.index(p) {
            self.cells[i] = false;
        }
    }

    fn successors(&self, p: GridPoint) -> impl Iterator<Item = (GridPoint, u32)> + '_ {
        DIRECTIONS
            .iter()
            .map(move |&(dx, dy)| GridPoint::new(p.x + dx, p.y + dy))
            .filter(|n| self.is_walkable(*n))
            .map(|n| (n, 1))
    }

    /// Shortest 4-directional route, simplified to its endpoints and turns.
    /// Always at least two points: a route onto its own start is `[p, p]`.
    ///
    /// `None` when either endpoint is off the grid or when no route exists. The
    /// endpoints themselves are not checked for walkability: an occupied start
    /// can still be left through a free neighbor, but an occupied goal is never
    /// generated as a neighbor and so is unreachable.
    pub fn find_path(&self, start: impl IntoCell, end: impl IntoCell) -> Option<Vec<GridPoint>> {
        let start = start.into_cell();
        let end = end.into_cell();
        if !self.in_bounds(start) || !self.in_bounds(end) {
            return None;
        }

        let (cells, _cost) = ::pathfinding::prelude::astar(
            &start,
            |&p| self.successors(p),
            |&p| p.manhattan(end),
            |&p| p == end,
        )?;
        let mut path = simplify_path(cells);
        if path.len() == 1 {
            path.push(start);
        }
        Some(path)
    }
}

/// Route between two cells against a fresh walkability grid.
pub fn find_path(
    config: &GridConfig,
    buildings: &[Building],
    start: impl IntoCell,
    end: impl IntoCell,
) -> Option<Vec<GridPoint>> {
    WalkGrid::from_buildings(config, buildings).find_path(start, end)
}

/// Keeps the start, the end and every cell where the direction changes.
pub fn simplify_path(path: Vec<GridPoint>) -> Vec<GridPoint> {
    if path.len() <= 2 {
        return path;
    }

    let mut out = Vec::with_capacity(path.len());
    out.push(path[0]);
    for w in path.windows(3) {
        let (prev, curr, next) = (w[0], w[1], w[2]);
        let turned = (prev.x - curr.x) != (curr.x - next.x) || (prev.y - curr.y) != (curr.y - next.y);
        if turned {
            out.push(curr);
        }
    }
    out.push(path[path.len() - 1]);
    out
}

/// Inverse of [`simplify_path`]: every cell covered by the waypoint polyline.
///
/// Consecutive waypoints are expected to share a row or a column; a diagonal
/// pair is walked x-first.
pub fn expand_path(waypoints: &[GridPoint]) -> Vec<GridPoint> {
    let Some(&first) = waypoints.first() else {
        return Vec::new();
    };

    let mut out = vec![first];
    let mut cur = first;
    for &target in &waypoints[1..] {
        while cur.x != target.x {
            cur.x += (target.x - cur.x).signum();
            out.push(cur);
        }
        while cur.y != target.y {
            cur.y += (target.y - cur.y).signum();
            out.push(cur);
        }
    }
    out
}
