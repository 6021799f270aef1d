use std::time::Duration;

use serde::Deserialize;

use lasertag_core::weapons::WeaponKind;

/// Gameplay tuning for one session. Every rule constant lives here so the
/// chosen values are visible in one place and overridable from the server's
/// config file (`[combat]` section).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub battle_duration_secs: u32,
    pub fire_cooldown_ms: u64,
    pub starting_lives: u32,
    pub max_health: u32,
    pub starting_ammo: u32,
    pub points_per_hit: u32,
    pub life_loss_bonus: u32,
    pub elimination_bonus: u32,
    pub max_players: usize,
    pub weapons: WeaponTable,
    pub shop: ShopConfig,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            battle_duration_secs: 300,
            fire_cooldown_ms: 500,
            starting_lives: 3,
            max_health: 100,
            starting_ammo: 5,
            points_per_hit: 25,
            life_loss_bonus: 50,
            elimination_bonus: 100,
            max_players: 8,
            weapons: WeaponTable::default(),
            shop: ShopConfig::default(),
        }
    }
}

impl CombatConfig {
    pub fn fire_cooldown(&self) -> Duration {
        Duration::from_millis(self.fire_cooldown_ms)
    }

    pub fn battle_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.battle_duration_secs))
    }
}

/// Per-weapon base damage and magazine capacity.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WeaponSpec {
    pub damage: u32,
    pub capacity: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeaponTable {
    pub pistol: WeaponSpec,
    pub rifle: WeaponSpec,
    pub shotgun: WeaponSpec,
}

impl Default for WeaponTable {
    fn default() -> Self {
        Self {
            pistol: WeaponSpec {
                damage: 25,
                capacity: 5,
            },
            rifle: WeaponSpec {
                damage: 35,
                capacity: 10,
            },
            shotgun: WeaponSpec {
                damage: 50,
                capacity: 6,
            },
        }
    }
}

impl WeaponTable {
    pub fn spec(&self, kind: WeaponKind) -> WeaponSpec {
        match kind {
            WeaponKind::Pistol => self.pistol,
            WeaponKind::Rifle => self.rifle,
            WeaponKind::Shotgun => self.shotgun,
        }
    }
}

/// Shop catalog pricing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    pub rifle_cost: u32,
    pub shotgun_cost: u32,
    pub health_pack_cost: u32,
    pub health_pack_amount: u32,
    pub double_damage_cost: u32,
    pub double_damage_secs: u32,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            rifle_cost: 100,
            shotgun_cost: 200,
            health_pack_cost: 80,
            health_pack_amount: 100,
            double_damage_cost: 150,
            double_damage_secs: 30,
        }
    }
}
