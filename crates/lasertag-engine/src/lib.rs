pub mod config;
pub mod election;
pub mod geo;
pub mod shop;

use std::collections::{BTreeMap, HashSet};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use lasertag_core::net::messages::{
    ArenaSnapshot, Combatant, LobbyPlayer, ServerEvent, SpectatorSnapshot, WinCondition,
};
use lasertag_core::player::{
    CombatStats, GpsBounds, GpsFix, MapPosition, Player, PlayerId, Room, TeamColor,
};
use lasertag_core::weapons::{PowerupKind, WeaponKind};

use config::CombatConfig;
use shop::ShopEffect;

/// Lifecycle of one game instance. `Lobby -> Battle` is one-way; a finished
/// session is destroyed by the registry after the cleanup delay, and a
/// rematch under the same code gets a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Lobby,
    Battle,
    Finished,
}

/// An outbound message with its audience. Session operations return these;
/// the host owns the sockets and fans them out.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    ToPlayer(PlayerId, ServerEvent),
    ToAllPlayers(ServerEvent),
    ToSpectators(ServerEvent),
}

/// Result of admitting a player. `evicted` names the previous connection
/// holding the same display name, if any; the host must drop its channel.
#[derive(Debug)]
pub struct Admission {
    pub evicted: Option<PlayerId>,
    pub deliveries: Vec<Delivery>,
}

/// The roster is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFull;

impl std::fmt::Display for SessionFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session is full")
    }
}

impl std::error::Error for SessionFull {}

/// The aggregate state machine for one game code: roster, commander,
/// scanned colors, GPS bounds, and the battle countdown. All mutation goes
/// through the operation methods, each of which returns the broadcasts it
/// produced.
#[derive(Debug)]
pub struct Session {
    code: String,
    state: SessionState,
    commander: Option<PlayerId>,
    players: BTreeMap<PlayerId, Player>,
    scanned_colors: HashSet<TeamColor>,
    gps_bounds: GpsBounds,
    time_remaining: u32,
    battle_deadline: Option<Instant>,
    /// Most combatants simultaneously alive in the battle room. A battle
    /// that ever had more than one combatant ends when it drops to one,
    /// whether by elimination or by disconnect; a solo battle runs out the
    /// clock.
    battle_peak: usize,
    config: CombatConfig,
}

impl Session {
    pub fn new(code: impl Into<String>, config: CombatConfig) -> Self {
        Self {
            code: code.into(),
            state: SessionState::Lobby,
            commander: None,
            players: BTreeMap::new(),
            scanned_colors: HashSet::new(),
            gps_bounds: GpsBounds::default(),
            time_remaining: config.battle_duration_secs,
            battle_deadline: None,
            battle_peak: 0,
            config,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }

    pub fn battle_started(&self) -> bool {
        self.state == SessionState::Battle
    }

    pub fn commander(&self) -> Option<PlayerId> {
        self.commander
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Register a new player connection. Any previous connection under the
    /// same display name is evicted first (last-connection-wins); if the
    /// evicted player held commander, the reconnecting player inherits it.
    pub fn admit_player(
        &mut self,
        id: PlayerId,
        name: &str,
        color: Option<TeamColor>,
        room: Room,
    ) -> Result<Admission, SessionFull> {
        let evicted = self
            .players
            .iter()
            .find(|(_, p)| p.name == name)
            .map(|(&old, _)| old);
        if let Some(old) = evicted {
            self.players.remove(&old);
            tracing::debug!(code = %self.code, name, "evicted previous connection for name");
        }
        if self.players.len() >= self.config.max_players {
            return Err(SessionFull);
        }

        let mut player = Player {
            id,
            name: name.to_string(),
            color,
            room,
            stats: starter_stats(&self.config),
        };

        if let Some(c) = color {
            self.scanned_colors.insert(c);
        }

        // Lobby connections arriving mid-battle watch from the sidelines.
        let mut redirected = false;
        if self.state == SessionState::Battle && room == Room::Lobby {
            player.room = Room::Battle;
            player.stats.is_eliminated = true;
            redirected = true;
        }

        self.players.insert(id, player);

        if evicted.is_some() && evicted == self.commander {
            self.commander = Some(id);
        } else if self.commander.is_none() && room == Room::Lobby {
            self.commander = Some(id);
            tracing::info!(code = %self.code, name, "assigned commander");
        }

        if self.state == SessionState::Battle {
            self.battle_peak = self.battle_peak.max(self.active_combatants());
        }

        tracing::info!(code = %self.code, player_id = id, name, ?room, "player joined");

        let mut deliveries = Vec::new();
        if redirected {
            deliveries.push(Delivery::ToPlayer(
                id,
                ServerEvent::JoinAsSpectator {
                    game_state: self.spectator_snapshot(),
                },
            ));
        }
        deliveries.push(self.lobby_update());

        Ok(Admission { evicted, deliveries })
    }

    /// Drop a player from the roster. Safe to call for an id that has
    /// already been removed (disconnect cleanup is best-effort).
    pub fn remove_player(&mut self, id: PlayerId) -> Vec<Delivery> {
        let Some(player) = self.players.remove(&id) else {
            return Vec::new();
        };

        let mut out = vec![Delivery::ToAllPlayers(ServerEvent::PlayerLeft {
            player: player.name.clone(),
        })];

        if self.commander == Some(id) {
            self.commander = election::elect_commander(self.players.values());
            if let Some(new_id) = self.commander
                && let Some(next) = self.players.get(&new_id)
            {
                tracing::info!(code = %self.code, commander = %next.name, "commander re-elected");
            }
        }

        out.push(self.lobby_update());

        // A disconnect can leave exactly one combatant standing.
        if self.state == SessionState::Battle {
            out.extend(self.check_win());
        }

        out.push(Delivery::ToSpectators(ServerEvent::SpectatorUpdate {
            game_state: self.spectator_snapshot(),
        }));
        out
    }

    /// Commander-only, lobby-only. Resets every player to the starting
    /// loadout and moves the roster into the battle room.
    pub fn start_battle(&mut self, actor: PlayerId, now: Instant) -> Vec<Delivery> {
        let Some(player) = self.players.get(&actor) else {
            return Vec::new();
        };
        if self.commander != Some(actor) || self.state != SessionState::Lobby {
            tracing::debug!(
                code = %self.code,
                player = %player.name,
                "start rejected: not commander or battle already started"
            );
            return Vec::new();
        }

        self.state = SessionState::Battle;
        self.time_remaining = self.config.battle_duration_secs;
        self.battle_deadline = Some(now + self.config.battle_duration());
        for p in self.players.values_mut() {
            p.room = Room::Battle;
            p.stats = starter_stats(&self.config);
        }
        self.battle_peak = self.players.len();

        tracing::info!(code = %self.code, players = self.players.len(), "battle started");

        let players = self.combatants();
        let commander = self.commander_name();
        vec![
            Delivery::ToAllPlayers(ServerEvent::BattleStart {
                players: players.clone(),
                commander: commander.clone(),
            }),
            Delivery::ToSpectators(ServerEvent::BattleStart { players, commander }),
        ]
    }

    /// Resolve one shot. Precondition checks run in order and each rejects
    /// without mutation; once they pass, the shot costs ammo whether or not
    /// it finds a target.
    pub fn fire(
        &mut self,
        actor: PlayerId,
        weapon: WeaponKind,
        target_color: TeamColor,
        now: Instant,
    ) -> Vec<Delivery> {
        let mut out = Vec::new();
        let Some(shooter) = self.players.get_mut(&actor) else {
            return out;
        };
        if shooter.stats.is_eliminated {
            tracing::debug!(code = %self.code, shooter = %shooter.name, "fire rejected: eliminated");
            return out;
        }
        if self.state != SessionState::Battle {
            tracing::debug!(code = %self.code, shooter = %shooter.name, "fire rejected: no active battle");
            return out;
        }
        if let Some(last) = shooter.stats.last_shot
            && now.duration_since(last) < self.config.fire_cooldown()
        {
            return out;
        }
        if shooter.stats.ammo == 0 {
            return out;
        }

        shooter.stats.ammo -= 1;
        shooter.stats.last_shot = Some(now);
        let shooter_name = shooter.name.clone();
        let double_damage = shooter
            .stats
            .active_powerups
            .contains_key(&PowerupKind::DoubleDamage);

        // A claimed color nobody actually scanned this session is a spoof.
        if !self.scanned_colors.contains(&target_color) {
            shooter.stats.misses += 1;
            out.push(Delivery::ToPlayer(
                actor,
                ServerEvent::HitResult {
                    hit: false,
                    message: "Invalid target color".to_string(),
                },
            ));
            return out;
        }

        let target_id = self
            .players
            .values()
            .find(|p| {
                p.id != actor
                    && p.color == Some(target_color)
                    && !p.stats.is_eliminated
                    && p.room == Room::Battle
            })
            .map(|p| p.id);

        let Some(target_id) = target_id else {
            if let Some(shooter) = self.players.get_mut(&actor) {
                shooter.stats.misses += 1;
            }
            out.push(Delivery::ToPlayer(
                actor,
                ServerEvent::HitResult {
                    hit: false,
                    message: "Miss! No valid target found".to_string(),
                },
            ));
            out.extend(self.arena_update());
            return out;
        };

        let base = self.config.weapons.spec(weapon).damage;
        let damage = if double_damage { base * 2 } else { base };

        let mut shooter_points = 0;
        if let Some(shooter) = self.players.get_mut(&actor) {
            shooter.stats.points += self.config.points_per_hit;
            shooter.stats.hits += 1;
            shooter_points = shooter.stats.points;
        }

        let mut target_down = false;
        if let Some(target) = self.players.get_mut(&target_id) {
            target.stats.health = target.stats.health.saturating_sub(damage);
            target_down = target.stats.health == 0;
            tracing::debug!(
                code = %self.code,
                shooter = %shooter_name,
                target = %target.name,
                damage,
                "hit"
            );
            out.push(Delivery::ToPlayer(
                actor,
                ServerEvent::HitConfirmed {
                    hit: true,
                    damage,
                    points: shooter_points,
                    target: target.name.clone(),
                },
            ));
            out.push(Delivery::ToPlayer(
                target_id,
                ServerEvent::PlayerHit {
                    damage,
                    shooter: shooter_name.clone(),
                    health_remaining: target.stats.health,
                    lives_remaining: target.stats.lives,
                },
            ));
        }

        if target_down {
            out.extend(self.life_lost(target_id, actor, &shooter_name));
        }
        out.extend(self.check_win());
        out.extend(self.arena_update());
        out
    }

    /// Shop purchase. A failed check leaves the buyer completely unchanged.
    pub fn purchase(&mut self, actor: PlayerId, item: &str) -> Vec<Delivery> {
        let mut out = Vec::new();
        let Some(entry) = shop::lookup(item, &self.config) else {
            out.push(Delivery::ToPlayer(
                actor,
                ServerEvent::PurchaseFailed {
                    reason: format!("Unknown item: {item}"),
                },
            ));
            return out;
        };
        let Some(player) = self.players.get_mut(&actor) else {
            return out;
        };
        if player.stats.points < entry.cost {
            out.push(Delivery::ToPlayer(
                actor,
                ServerEvent::PurchaseFailed {
                    reason: "Insufficient points".to_string(),
                },
            ));
            return out;
        }

        player.stats.points -= entry.cost;
        match entry.effect {
            ShopEffect::Weapon(kind) => {
                if !player.stats.weapons.contains(&kind) {
                    player.stats.weapons.push(kind);
                }
                player.stats.ammo = self.config.weapons.spec(kind).capacity;
            },
            ShopEffect::Health(amount) => {
                player.stats.health = (player.stats.health + amount).min(self.config.max_health);
            },
            ShopEffect::Powerup {
                kind,
                duration_secs,
            } => {
                player.stats.active_powerups.insert(kind, duration_secs);
            },
        }

        out.push(Delivery::ToPlayer(
            actor,
            ServerEvent::PurchaseSuccess {
                item: item.to_string(),
                points: player.stats.points,
            },
        ));
        out.extend(self.arena_update());
        out
    }

    /// Refill ammo to the requested weapon's magazine capacity.
    pub fn reload(&mut self, actor: PlayerId, weapon: WeaponKind) -> Vec<Delivery> {
        let mut out = Vec::new();
        let capacity = self.config.weapons.spec(weapon).capacity;
        let Some(player) = self.players.get_mut(&actor) else {
            return out;
        };
        player.stats.ammo = capacity;
        out.push(Delivery::ToPlayer(
            actor,
            ServerEvent::ReloadComplete {
                weapon,
                ammo: capacity,
            },
        ));
        out.extend(self.arena_update());
        out
    }

    /// Store a GPS fix, widen the session bounds, and reproject the player
    /// onto the minimap. A fix without both coordinates is the explicit
    /// "no GPS" signal and clears everything.
    pub fn gps_update(
        &mut self,
        actor: PlayerId,
        latitude: Option<f64>,
        longitude: Option<f64>,
        accuracy: Option<f64>,
    ) -> Vec<Delivery> {
        let Some(player) = self.players.get_mut(&actor) else {
            return Vec::new();
        };
        match (latitude, longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                player.stats.gps_position = Some(GpsFix {
                    latitude: lat,
                    longitude: lng,
                    accuracy: accuracy.unwrap_or(0.0),
                    timestamp: unix_millis(),
                });
                player.stats.gps_available = true;
                geo::widen(&mut self.gps_bounds, lat, lng);
                player.stats.position = Some(geo::to_minimap(&self.gps_bounds, lat, lng));
                tracing::debug!(code = %self.code, player = %player.name, lat, lng, "gps fix");
            },
            _ => {
                player.stats.gps_position = None;
                player.stats.gps_available = false;
                player.stats.position = None;
            },
        }
        self.arena_update()
    }

    /// One game-clock second. Sessions outside battle are a cheap no-op.
    pub fn tick(&mut self, now: Instant) -> Vec<Delivery> {
        if self.state != SessionState::Battle {
            return Vec::new();
        }
        if let Some(deadline) = self.battle_deadline {
            self.time_remaining = deadline.saturating_duration_since(now).as_secs() as u32;
        }

        for player in self.players.values_mut() {
            let powerups = &mut player.stats.active_powerups;
            for remaining in powerups.values_mut() {
                *remaining = remaining.saturating_sub(1);
            }
            powerups.retain(|_, remaining| *remaining > 0);
        }

        let mut out = self.arena_update();
        if self.time_remaining == 0 {
            tracing::info!(code = %self.code, "battle timer expired");
            out.extend(self.end_game(None, WinCondition::TimeExpired));
        }
        out
    }

    /// Read-only snapshot for a newly attached spectator.
    pub fn spectator_snapshot(&self) -> SpectatorSnapshot {
        self.spectator_snapshot_with(self.combatants())
    }

    fn life_lost(
        &mut self,
        target_id: PlayerId,
        shooter_id: PlayerId,
        shooter_name: &str,
    ) -> Vec<Delivery> {
        let mut out = Vec::new();
        let max_health = self.config.max_health;
        let Some(target) = self.players.get_mut(&target_id) else {
            return out;
        };
        target.stats.lives = target.stats.lives.saturating_sub(1);
        target.stats.deaths += 1;
        let eliminated = target.stats.lives == 0;
        if !eliminated {
            target.stats.health = max_health;
        } else {
            target.stats.is_eliminated = true;
        }
        let target_name = target.name.clone();
        let lives_remaining = target.stats.lives;

        if let Some(shooter) = self.players.get_mut(&shooter_id) {
            if eliminated {
                shooter.stats.points += self.config.elimination_bonus;
                shooter.stats.eliminations += 1;
            } else {
                shooter.stats.points += self.config.life_loss_bonus;
            }
        }

        if eliminated {
            tracing::info!(
                code = %self.code,
                player = %target_name,
                by = %shooter_name,
                "player eliminated"
            );
            out.push(Delivery::ToAllPlayers(ServerEvent::PlayerEliminated {
                player: target_name,
                by: shooter_name.to_string(),
            }));
            out.extend(self.check_win());
        } else {
            out.push(Delivery::ToAllPlayers(ServerEvent::PlayerLifeLost {
                player: target_name,
                by: shooter_name.to_string(),
                lives_remaining,
            }));
        }
        out
    }

    fn check_win(&mut self) -> Vec<Delivery> {
        if self.state != SessionState::Battle {
            return Vec::new();
        }
        if self.players.is_empty() {
            return Vec::new();
        }
        let active: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| !p.stats.is_eliminated && p.room == Room::Battle)
            .map(|p| p.id)
            .collect();

        if active.len() == 1 && self.battle_peak > 1 {
            return self.end_game(Some(active[0]), WinCondition::LastOneStanding);
        }
        if active.is_empty() {
            return self.end_game(None, WinCondition::Draw);
        }
        Vec::new()
    }

    /// Finish the game once. Repeat calls are no-ops; the session stays
    /// `Finished` until the registry destroys it.
    fn end_game(&mut self, winner: Option<PlayerId>, condition: WinCondition) -> Vec<Delivery> {
        if self.state == SessionState::Finished {
            return Vec::new();
        }
        self.state = SessionState::Finished;
        self.battle_deadline = None;

        let winner_name = match condition {
            WinCondition::Draw => None,
            _ => winner
                .or_else(|| self.top_scorer())
                .and_then(|id| self.players.get(&id))
                .map(|p| p.name.clone()),
        };

        // Ranked before everyone is flagged eliminated, so the results keep
        // the real end-of-game flags.
        let mut results = self.combatants();
        results.sort_by(|a, b| b.points.cmp(&a.points));

        for player in self.players.values_mut() {
            player.stats.is_eliminated = true;
        }

        tracing::info!(
            code = %self.code,
            winner = winner_name.as_deref().unwrap_or("none"),
            ?condition,
            "game ended"
        );

        let event = ServerEvent::GameEnd {
            results,
            winner: winner_name,
            win_condition: condition,
        };
        vec![
            Delivery::ToAllPlayers(event.clone()),
            Delivery::ToSpectators(event),
        ]
    }

    /// Highest points, preferring still-active players. Ties resolve to the
    /// earliest connection: iteration is id-ordered and only a strictly
    /// higher score displaces the current leader.
    fn top_scorer(&self) -> Option<PlayerId> {
        let pick = |only_active: bool| -> Option<PlayerId> {
            let mut best: Option<(PlayerId, u32)> = None;
            for p in self.players.values() {
                if only_active && p.stats.is_eliminated {
                    continue;
                }
                match best {
                    Some((_, points)) if p.stats.points <= points => {},
                    _ => best = Some((p.id, p.stats.points)),
                }
            }
            best.map(|(id, _)| id)
        };
        pick(true).or_else(|| pick(false))
    }

    fn active_combatants(&self) -> usize {
        self.players
            .values()
            .filter(|p| !p.stats.is_eliminated && p.room == Room::Battle)
            .count()
    }

    fn combatants(&self) -> Vec<Combatant> {
        self.players.values().map(Combatant::from).collect()
    }

    fn commander_name(&self) -> Option<String> {
        self.commander
            .and_then(|id| self.players.get(&id))
            .map(|p| p.name.clone())
    }

    fn lobby_update(&self) -> Delivery {
        let players = self
            .players
            .values()
            .filter(|p| p.room == Room::Lobby)
            .map(|p| LobbyPlayer {
                tag: p.name.clone(),
                color: p.color,
            })
            .collect();
        Delivery::ToAllPlayers(ServerEvent::LobbyUpdate {
            players,
            commander: self.commander_name(),
            battle_started: self.battle_started(),
        })
    }

    fn arena_update(&self) -> Vec<Delivery> {
        let combatants = self.combatants();
        vec![
            Delivery::ToAllPlayers(ServerEvent::ArenaUpdate {
                game_state: ArenaSnapshot {
                    time_remaining: self.time_remaining,
                    combatants: combatants.clone(),
                    gps_bounds: self.gps_bounds,
                },
                player_stats: combatants.clone(),
            }),
            Delivery::ToSpectators(ServerEvent::SpectatorUpdate {
                game_state: self.spectator_snapshot_with(combatants),
            }),
        ]
    }

    fn spectator_snapshot_with(&self, combatants: Vec<Combatant>) -> SpectatorSnapshot {
        SpectatorSnapshot {
            time_remaining: self.time_remaining,
            combatants,
            battle_started: self.battle_started(),
            gps_bounds: self.gps_bounds,
        }
    }
}

fn starter_stats(config: &CombatConfig) -> CombatStats {
    CombatStats {
        points: 0,
        lives: config.starting_lives,
        health: config.max_health,
        ammo: config.starting_ammo,
        weapons: vec![WeaponKind::Pistol],
        position: Some(random_position()),
        gps_position: None,
        gps_available: false,
        last_shot: None,
        hits: 0,
        misses: 0,
        eliminations: 0,
        deaths: 0,
        is_eliminated: false,
        active_powerups: BTreeMap::new(),
    }
}

/// Fallback minimap position for players that never report GPS.
fn random_position() -> MapPosition {
    MapPosition {
        x: rand::random_range(0.0..100.0_f64).floor(),
        y: rand::random_range(0.0..100.0_f64).floor(),
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
