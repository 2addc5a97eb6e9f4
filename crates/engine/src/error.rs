use thiserror::Error;

/// Why a place/move/rotate was rejected. The town is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("building not found: {0}")]
    UnknownBuilding(String),
    #[error("footprint must be at least 1x1 (got {width}x{height})")]
    InvalidSize { width: i32, height: i32 },
    #[error("footprint at ({x}, {y}) size {width}x{height} leaves the grid")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    #[error("footprint overlaps building {0}")]
    Occupied(String),
}

/// Why a connection could not be created. No connection was stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("a building cannot connect to itself")]
    SameBuilding,
    #[error("building not found: {0}")]
    UnknownBuilding(String),
    #[error("buildings {0} and {1} are already connected")]
    AlreadyConnected(String, String),
    #[error("no free port around building {0}")]
    NoPort(String),
    #[error("no road route between the two ports")]
    NoRoute,
}
