use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use lasertag_core::net::messages::{ClientAction, ServerEvent};
use lasertag_core::net::protocol::encode_event;
use lasertag_core::player::{PlayerId, Room, TeamColor};
use lasertag_engine::config::CombatConfig;
use lasertag_engine::{Delivery, Session, SessionFull};

/// Per-connection sender for outbound JSON frames. Bounded so a stalled
/// client cannot grow server memory; full or closed channels are skipped.
pub type PlayerSender = mpsc::Sender<Utf8Bytes>;

/// Why a player connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRefusal {
    SessionFull,
}

impl std::fmt::Display for JoinRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionFull => write!(f, "session is full"),
        }
    }
}

impl std::error::Error for JoinRefusal {}

/// One session plus its attached delivery channels.
pub struct SessionEntry {
    session: Session,
    connections: HashMap<PlayerId, PlayerSender>,
    spectators: HashMap<String, PlayerSender>,
    /// Deadline after which the game clock sweep destroys this session.
    /// Set once when the session finishes or empties, cleared on reattach.
    cleanup_after: Option<Instant>,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        Self {
            session,
            connections: HashMap::new(),
            spectators: HashMap::new(),
            cleanup_after: None,
        }
    }

    /// Fan a batch of deliveries out to the attached channels. Each event
    /// is serialized once; closed or backed-up receivers are skipped.
    fn dispatch(&self, deliveries: &[Delivery]) {
        let code = self.session.code();
        for delivery in deliveries {
            match delivery {
                Delivery::ToPlayer(id, event) => {
                    if let Some(sender) = self.connections.get(id)
                        && let Some(text) = encode_or_log(event, code)
                        && sender.try_send(text).is_err()
                    {
                        tracing::debug!(code, player_id = id, "skipping slow or closed connection");
                    }
                },
                Delivery::ToAllPlayers(event) => {
                    if let Some(text) = encode_or_log(event, code) {
                        for (id, sender) in &self.connections {
                            if sender.try_send(text.clone()).is_err() {
                                tracing::debug!(
                                    code,
                                    player_id = id,
                                    "skipping slow or closed connection"
                                );
                            }
                        }
                    }
                },
                Delivery::ToSpectators(event) => {
                    if let Some(text) = encode_or_log(event, code) {
                        for (spectator_id, sender) in &self.spectators {
                            if sender.try_send(text.clone()).is_err() {
                                tracing::debug!(
                                    code,
                                    %spectator_id,
                                    "skipping slow or closed spectator"
                                );
                            }
                        }
                    }
                },
            }
        }
    }

    fn is_vacant(&self) -> bool {
        self.session.is_empty() && self.spectators.is_empty()
    }
}

fn encode_or_log(event: &ServerEvent, code: &str) -> Option<Utf8Bytes> {
    match encode_event(event) {
        Ok(text) => Some(Utf8Bytes::from(text)),
        Err(e) => {
            tracing::error!(code, error = %e, "failed to encode server event");
            None
        },
    }
}

/// Process-wide mapping from game code to session. Sessions are created
/// lazily on first connection and destroyed by the game clock sweep after a
/// grace period once finished or empty.
pub struct SessionRegistry {
    sessions: HashMap<String, SessionEntry>,
    next_player_id: PlayerId,
    combat: CombatConfig,
    cleanup_delay: Duration,
}

impl SessionRegistry {
    pub fn new(combat: CombatConfig, cleanup_delay: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            next_player_id: 1,
            combat,
            cleanup_delay,
        }
    }

    fn alloc_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    /// Fetch or lazily create the entry for a code. Reattaching cancels any
    /// pending destruction.
    fn entry(&mut self, code: &str) -> &mut SessionEntry {
        let combat = self.combat.clone();
        let entry = self.sessions.entry(code.to_string()).or_insert_with(|| {
            tracing::info!(code, "session created");
            SessionEntry::new(Session::new(code, combat))
        });
        entry.cleanup_after = None;
        entry
    }

    /// Register a player connection. The previous connection under the same
    /// display name, if any, loses its delivery channel.
    pub fn connect_player(
        &mut self,
        code: &str,
        name: &str,
        color: Option<TeamColor>,
        room: Room,
        sender: PlayerSender,
    ) -> Result<PlayerId, JoinRefusal> {
        let id = self.alloc_player_id();
        let entry = self.entry(code);
        match entry.session.admit_player(id, name, color, room) {
            Err(SessionFull) => Err(JoinRefusal::SessionFull),
            Ok(admission) => {
                if let Some(old) = admission.evicted {
                    entry.connections.remove(&old);
                }
                entry.connections.insert(id, sender);
                entry.dispatch(&admission.deliveries);
                Ok(id)
            },
        }
    }

    /// Register a spectator and immediately push one current-state snapshot
    /// so it is not blank until the next broadcast tick.
    pub fn connect_spectator(&mut self, code: &str, sender: PlayerSender) -> String {
        let entry = self.entry(code);
        let spectator_id = Uuid::new_v4().to_string();
        let snapshot = ServerEvent::SpectatorUpdate {
            game_state: entry.session.spectator_snapshot(),
        };
        if let Some(text) = encode_or_log(&snapshot, code)
            && sender.try_send(text).is_err()
        {
            tracing::debug!(code, "failed to push initial spectator snapshot");
        }
        entry.spectators.insert(spectator_id.clone(), sender);
        spectator_id
    }

    /// Best-effort disconnect cleanup; safe to call for an id that was
    /// already evicted.
    pub fn disconnect_player(&mut self, code: &str, id: PlayerId, now: Instant) {
        let Some(entry) = self.sessions.get_mut(code) else {
            return;
        };
        entry.connections.remove(&id);
        let deliveries = entry.session.remove_player(id);
        entry.dispatch(&deliveries);
        Self::schedule_cleanup(entry, now, self.cleanup_delay);
    }

    pub fn disconnect_spectator(&mut self, code: &str, spectator_id: &str, now: Instant) {
        let Some(entry) = self.sessions.get_mut(code) else {
            return;
        };
        entry.spectators.remove(spectator_id);
        Self::schedule_cleanup(entry, now, self.cleanup_delay);
    }

    /// Route one parsed action to its session handler and fan out the
    /// resulting broadcasts.
    pub fn handle_action(
        &mut self,
        code: &str,
        player_id: PlayerId,
        action: ClientAction,
        now: Instant,
    ) {
        let Some(entry) = self.sessions.get_mut(code) else {
            return;
        };
        let deliveries = match action {
            ClientAction::StartBattle => entry.session.start_battle(player_id, now),
            ClientAction::Fire {
                weapon,
                target_color,
            } => entry.session.fire(player_id, weapon, target_color, now),
            ClientAction::Purchase { item } => entry.session.purchase(player_id, &item),
            ClientAction::Reload { weapon } => entry.session.reload(player_id, weapon),
            ClientAction::GpsUpdate {
                latitude,
                longitude,
                accuracy,
            } => entry.session.gps_update(player_id, latitude, longitude, accuracy),
            // Removal happens in the socket teardown path.
            ClientAction::Leave => Vec::new(),
        };
        entry.dispatch(&deliveries);
        Self::schedule_cleanup(entry, now, self.cleanup_delay);
    }

    /// One game-clock second: age every battle, then sweep expired
    /// sessions. Sessions outside battle are a cheap no-op in `tick`.
    pub fn tick_all(&mut self, now: Instant) {
        for entry in self.sessions.values_mut() {
            let deliveries = entry.session.tick(now);
            if !deliveries.is_empty() {
                entry.dispatch(&deliveries);
            }
            Self::schedule_cleanup(entry, now, self.cleanup_delay);
        }
        self.sessions.retain(|code, entry| match entry.cleanup_after {
            Some(deadline) if now >= deadline => {
                tracing::info!(%code, "session destroyed");
                false
            },
            _ => true,
        });
    }

    /// Remove a session immediately, regardless of pending deadlines.
    pub fn delete(&mut self, code: &str) -> bool {
        self.sessions.remove(code).is_some()
    }

    pub fn session(&self, code: &str) -> Option<&Session> {
        self.sessions.get(code).map(|e| &e.session)
    }

    /// (active sessions, total players) for the health endpoint.
    pub fn stats(&self) -> (usize, usize) {
        let players = self
            .sessions
            .values()
            .map(|e| e.session.player_count())
            .sum();
        (self.sessions.len(), players)
    }

    fn schedule_cleanup(entry: &mut SessionEntry, now: Instant, delay: Duration) {
        if entry.cleanup_after.is_some() {
            return;
        }
        if entry.session.is_finished() || entry.is_vacant() {
            entry.cleanup_after = Some(now + delay);
            tracing::info!(code = entry.session.code(), "session cleanup scheduled");
        }
    }
}
