use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::player::{GpsBounds, GpsFix, MapPosition, Player, TeamColor};
use crate::weapons::{PowerupKind, WeaponKind};

/// Inbound realtime message, one per client action. A closed union: frames
/// that fail to parse into one of these variants are dropped at the router
/// boundary and never reach the rule handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientAction {
    StartBattle,
    #[serde(rename_all = "camelCase")]
    Fire {
        weapon: WeaponKind,
        target_color: TeamColor,
    },
    Purchase {
        item: String,
    },
    Reload {
        weapon: WeaponKind,
    },
    Leave,
    GpsUpdate {
        latitude: Option<f64>,
        longitude: Option<f64>,
        #[serde(default)]
        accuracy: Option<f64>,
    },
}

/// Outbound realtime message, pushed by the coordinator to players and
/// spectators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    LobbyUpdate {
        players: Vec<LobbyPlayer>,
        commander: Option<String>,
        battle_started: bool,
    },
    BattleStart {
        players: Vec<Combatant>,
        commander: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ArenaUpdate {
        game_state: ArenaSnapshot,
        player_stats: Vec<Combatant>,
    },
    #[serde(rename_all = "camelCase")]
    SpectatorUpdate {
        game_state: SpectatorSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    JoinAsSpectator {
        game_state: SpectatorSnapshot,
    },
    /// Shooter-only feedback for a shot that resolved as a miss.
    HitResult {
        hit: bool,
        message: String,
    },
    HitConfirmed {
        hit: bool,
        damage: u32,
        points: u32,
        target: String,
    },
    #[serde(rename_all = "camelCase")]
    PlayerHit {
        damage: u32,
        shooter: String,
        health_remaining: u32,
        lives_remaining: u32,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLifeLost {
        player: String,
        by: String,
        lives_remaining: u32,
    },
    PlayerEliminated {
        player: String,
        by: String,
    },
    PurchaseSuccess {
        item: String,
        points: u32,
    },
    PurchaseFailed {
        reason: String,
    },
    ReloadComplete {
        weapon: WeaponKind,
        ammo: u32,
    },
    #[serde(rename_all = "camelCase")]
    GameEnd {
        results: Vec<Combatant>,
        winner: Option<String>,
        win_condition: WinCondition,
    },
    PlayerLeft {
        player: String,
    },
}

/// Lobby roster entry: the light payload for `lobbyUpdate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub tag: String,
    pub color: Option<TeamColor>,
}

/// A player as rendered in combat broadcasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub tag: String,
    pub color: Option<TeamColor>,
    pub points: u32,
    pub lives: u32,
    pub health: u32,
    pub ammo: u32,
    pub weapons: Vec<WeaponKind>,
    pub position: Option<MapPosition>,
    pub gps_available: bool,
    pub gps_position: Option<GpsFix>,
    pub hits: u32,
    pub misses: u32,
    pub eliminations: u32,
    pub deaths: u32,
    pub is_eliminated: bool,
    pub active_powerups: BTreeMap<PowerupKind, u32>,
}

impl From<&Player> for Combatant {
    fn from(player: &Player) -> Self {
        Self {
            tag: player.name.clone(),
            color: player.color,
            points: player.stats.points,
            lives: player.stats.lives,
            health: player.stats.health,
            ammo: player.stats.ammo,
            weapons: player.stats.weapons.clone(),
            position: player.stats.position,
            gps_available: player.stats.gps_available,
            gps_position: player.stats.gps_position,
            hits: player.stats.hits,
            misses: player.stats.misses,
            eliminations: player.stats.eliminations,
            deaths: player.stats.deaths,
            is_eliminated: player.stats.is_eliminated,
            active_powerups: player.stats.active_powerups.clone(),
        }
    }
}

/// Full player-facing state pushed on every mutation and once per clock tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaSnapshot {
    pub time_remaining: u32,
    pub combatants: Vec<Combatant>,
    pub gps_bounds: GpsBounds,
}

/// Read-only aggregate for spectators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectatorSnapshot {
    pub time_remaining: u32,
    pub combatants: Vec<Combatant>,
    pub battle_started: bool,
    pub gps_bounds: GpsBounds,
}

/// How a finished game was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinCondition {
    LastOneStanding,
    Draw,
    TimeExpired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_action_wire_shape() {
        let action: ClientAction =
            serde_json::from_str(r#"{"action":"fire","weapon":"pistol","targetColor":"red"}"#)
                .unwrap();
        assert_eq!(
            action,
            ClientAction::Fire {
                weapon: WeaponKind::Pistol,
                target_color: TeamColor::Red,
            }
        );
    }

    #[test]
    fn bare_action_parses() {
        let action: ClientAction = serde_json::from_str(r#"{"action":"startBattle"}"#).unwrap();
        assert_eq!(action, ClientAction::StartBattle);
    }

    #[test]
    fn gps_clear_signal_parses_without_coordinates() {
        let action: ClientAction = serde_json::from_str(
            r#"{"action":"gpsUpdate","latitude":null,"longitude":null}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            ClientAction::GpsUpdate {
                latitude: None,
                longitude: None,
                accuracy: None,
            }
        );
    }

    #[test]
    fn unknown_action_fails_to_parse() {
        assert!(serde_json::from_str::<ClientAction>(r#"{"action":"teleport"}"#).is_err());
        assert!(serde_json::from_str::<ClientAction>(r#"{"weapon":"pistol"}"#).is_err());
    }

    #[test]
    fn lobby_update_wire_shape() {
        let event = ServerEvent::LobbyUpdate {
            players: vec![LobbyPlayer {
                tag: "Nova".into(),
                color: Some(TeamColor::Red),
            }],
            commander: Some("Nova".into()),
            battle_started: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"lobbyUpdate""#));
        assert!(json.contains(r#""battleStarted":false"#));
        assert!(json.contains(r#""tag":"Nova""#));
    }

    #[test]
    fn win_condition_wire_names() {
        assert_eq!(
            serde_json::to_string(&WinCondition::LastOneStanding).unwrap(),
            "\"last_one_standing\""
        );
        assert_eq!(
            serde_json::to_string(&WinCondition::TimeExpired).unwrap(),
            "\"time_expired\""
        );
    }
}
