use serde::{Deserialize, Serialize};

/// The fixed weapon roster. Damage and magazine capacity live in the
/// engine's `CombatConfig`; this is just the shared vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponKind {
    Pistol,
    Rifle,
    Shotgun,
}

impl WeaponKind {
    pub const ALL: &[WeaponKind] = &[WeaponKind::Pistol, WeaponKind::Rifle, WeaponKind::Shotgun];

    pub fn as_str(&self) -> &'static str {
        match self {
            WeaponKind::Pistol => "pistol",
            WeaponKind::Rifle => "rifle",
            WeaponKind::Shotgun => "shotgun",
        }
    }
}

impl std::fmt::Display for WeaponKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timed combat modifiers purchasable from the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerupKind {
    DoubleDamage,
}
