use lasertag_core::player::{Player, PlayerId, Room};

/// Pick the next commander from the remaining roster.
///
/// Deterministic: lobby-room players win over battle-room players, and
/// within a group the lowest id (earliest connection) wins. Returns `None`
/// for an empty roster.
pub fn elect_commander<'a>(players: impl IntoIterator<Item = &'a Player>) -> Option<PlayerId> {
    players
        .into_iter()
        .min_by_key(|p| (p.room != Room::Lobby, p.id))
        .map(|p| p.id)
}
