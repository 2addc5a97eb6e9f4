use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Version tag written into every persisted [`TownState`].
pub const TOWN_FORMAT_VERSION: &str = "1.0.0";

/// Integer grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: GridPoint) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<(i32, i32)> for GridPoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Grid dimensions and the pixel size of one diamond tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    pub width: i32,
    pub height: i32,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            cell_width: 64.0,
            cell_height: 32.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingType {
    Api,
    Database,
    Frontend,
}

impl BuildingType {
    pub const ALL: [BuildingType; 3] = [Self::Api, Self::Database, Self::Frontend];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Database => "database",
            Self::Frontend => "frontend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingStatus {
    #[default]
    Planning,
    Building,
    Ready,
    Error,
}

/// Quarter-turn orientation. Serialized as degrees (`0`, `90`, `180`, `270`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Self::Deg0, Self::Deg90, Self::Deg180, Self::Deg270];

    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Next orientation, turning clockwise by 90°.
    pub fn rotate_cw(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }

    /// True for 90° and 270°, where width and height trade places.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(deg: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|r| r.degrees() == deg)
            .ok_or_else(|| format!("rotation must be 0, 90, 180 or 270 (got {deg})"))
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> Self {
        r.degrees()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tech_stack: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BuildingType,
    pub name: String,
    pub grid_x: i32,
    pub grid_y: i32,
    /// Footprint width before rotation.
    pub width: i32,
    /// Footprint height before rotation.
    pub height: i32,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub status: BuildingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BuildingMetadata>,
}

impl Building {
    /// Width and height after rotation.
    pub fn effective_size(&self) -> (i32, i32) {
        effective_size(self.width, self.height, self.rotation)
    }

    /// Cell at `floor(dim / 2)` from the anchor along both effective axes.
    pub fn center(&self) -> GridPoint {
        let (w, h) = self.effective_size();
        GridPoint::new(self.grid_x + w / 2, self.grid_y + h / 2)
    }
}

pub fn effective_size(width: i32, height: i32, rotation: Rotation) -> (i32, i32) {
    if rotation.swaps_axes() {
        (height, width)
    } else {
        (width, height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    #[default]
    Road,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Active,
    Inactive,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    pub distance: u32,
    pub cost: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ConnectionKind,
    pub from_building_id: String,
    pub to_building_id: String,
    /// Output port → input port, keeping only the endpoints and turn cells.
    pub path: Vec<GridPoint>,
    #[serde(default)]
    pub status: ConnectionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConnectionMetadata>,
}

impl Connection {
    pub fn touches(&self, building_id: &str) -> bool {
        self.from_building_id == building_id || self.to_building_id == building_id
    }

    /// Unordered pair check.
    pub fn links(&self, a: &str, b: &str) -> bool {
        (self.from_building_id == a && self.to_building_id == b)
            || (self.from_building_id == b && self.to_building_id == a)
    }
}

/// Named snapshot of a town as persisted by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownState {
    pub id: String,
    pub name: String,
    pub buildings: Vec<Building>,
    pub connections: Vec<Connection>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub version: String,
}

/// Listing entry for a save slot; the snapshot body is fetched separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSummary {
    pub id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingDraft {
    #[serde(rename = "type")]
    pub kind: BuildingType,
    pub grid_x: i32,
    pub grid_y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(default)]
    pub rotation: Rotation,
}

impl BuildingDraft {
    pub fn new(kind: BuildingType, grid_x: i32, grid_y: i32) -> Self {
        Self {
            kind,
            grid_x,
            grid_y,
            name: None,
            width: None,
            height: None,
            rotation: Rotation::Deg0,
        }
    }

    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveBuilding {
    pub grid_x: i32,
    pub grid_y: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BuildingStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub from_building_id: String,
    pub to_building_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePreview {
    pub from: GridPoint,
    pub to: GridPoint,
    pub path: Vec<GridPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownView {
    pub grid: GridConfig,
    pub buildings: Vec<Building>,
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellInfo {
    pub cell: GridPoint,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub error: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            error: error.into(),
        }
    }
}
