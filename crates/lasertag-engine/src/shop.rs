use lasertag_core::weapons::{PowerupKind, WeaponKind};

use crate::config::CombatConfig;

/// What a successful purchase does to the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopEffect {
    /// Add the weapon to the owned set (if new) and refill ammo to its
    /// capacity.
    Weapon(WeaponKind),
    /// Raise health by the amount, capped at max health.
    Health(u32),
    /// Set or refresh a timed powerup. Repurchase while active refreshes the
    /// remaining duration.
    Powerup { kind: PowerupKind, duration_secs: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopEntry {
    pub cost: u32,
    pub effect: ShopEffect,
}

/// Resolve a client-supplied item key against the fixed catalog.
pub fn lookup(item: &str, config: &CombatConfig) -> Option<ShopEntry> {
    match item {
        "rifle" => Some(ShopEntry {
            cost: config.shop.rifle_cost,
            effect: ShopEffect::Weapon(WeaponKind::Rifle),
        }),
        "shotgun" => Some(ShopEntry {
            cost: config.shop.shotgun_cost,
            effect: ShopEffect::Weapon(WeaponKind::Shotgun),
        }),
        "healthPack" => Some(ShopEntry {
            cost: config.shop.health_pack_cost,
            effect: ShopEffect::Health(config.shop.health_pack_amount),
        }),
        "doubleDamage" => Some(ShopEntry {
            cost: config.shop.double_damage_cost,
            effect: ShopEffect::Powerup {
                kind: PowerupKind::DoubleDamage,
                duration_secs: config.shop.double_damage_secs,
            },
        }),
        _ => None,
    }
}
