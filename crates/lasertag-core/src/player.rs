use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::weapons::{PowerupKind, WeaponKind};

/// Unique identifier for a player connection. Allocated monotonically by the
/// session registry, so ascending id order is join order.
pub type PlayerId = u64;

/// Team color token produced by the client-side color scanner. The
/// coordinator never sees pixel data, only one of these tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamColor {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
}

impl TeamColor {
    pub const PALETTE: &[TeamColor] = &[
        TeamColor::Red,
        TeamColor::Blue,
        TeamColor::Green,
        TeamColor::Yellow,
        TeamColor::Purple,
        TeamColor::Orange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamColor::Red => "red",
            TeamColor::Blue => "blue",
            TeamColor::Green => "green",
            TeamColor::Yellow => "yellow",
            TeamColor::Purple => "purple",
            TeamColor::Orange => "orange",
        }
    }
}

impl std::fmt::Display for TeamColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TeamColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(TeamColor::Red),
            "blue" => Ok(TeamColor::Blue),
            "green" => Ok(TeamColor::Green),
            "yellow" => Ok(TeamColor::Yellow),
            "purple" => Ok(TeamColor::Purple),
            "orange" => Ok(TeamColor::Orange),
            _ => Err(UnknownColor),
        }
    }
}

/// A color string outside the fixed scanner palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownColor;

impl std::fmt::Display for UnknownColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown team color")
    }
}

impl std::error::Error for UnknownColor {}

/// Which roster view a player currently occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Room {
    Lobby,
    Battle,
}

/// Raw GPS fix as reported by a client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    /// Unix milliseconds at which the fix was recorded server-side.
    pub timestamp: u64,
}

/// Normalized 0-100 minimap position, north-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPosition {
    pub x: f64,
    pub y: f64,
}

/// Running min/max latitude/longitude observed for one session. Starts at
/// the inverted sentinel so the first fix collapses the bounds onto itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Default for GpsBounds {
    fn default() -> Self {
        Self {
            min_lat: 90.0,
            max_lat: -90.0,
            min_lng: 180.0,
            max_lng: -180.0,
        }
    }
}

/// A player attached to one session. Identity is connection-scoped: a
/// reconnect under the same display name produces a fresh id.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: Option<TeamColor>,
    pub room: Room,
    pub stats: CombatStats,
}

/// Mutable combat state for one player. Not serialized directly; broadcasts
/// project it through [`crate::net::messages::Combatant`].
#[derive(Debug, Clone)]
pub struct CombatStats {
    pub points: u32,
    pub lives: u32,
    pub health: u32,
    pub ammo: u32,
    /// Owned weapons; always contains the starter weapon.
    pub weapons: Vec<WeaponKind>,
    pub position: Option<MapPosition>,
    pub gps_position: Option<GpsFix>,
    pub gps_available: bool,
    pub last_shot: Option<Instant>,
    pub hits: u32,
    pub misses: u32,
    pub eliminations: u32,
    pub deaths: u32,
    pub is_eliminated: bool,
    /// Active timed powerups, keyed by kind, value = remaining whole seconds.
    /// Decremented once per game clock tick and removed at zero.
    pub active_powerups: BTreeMap<PowerupKind, u32>,
}
