//! Session Lifecycle Management
//!
//! `ZoneSession` is the single mutator of session state: joins, leaves,
//! location updates and both periodic tasks all funnel through it, behind
//! one `RwLock` held by the server. The periodic bodies (`zone_tick`,
//! `damage_tick`) are plain synchronous methods so tests drive them without
//! wall-clock waits; `run_session_loop` is the thin timer shell around them.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::core::geo::Coordinate;
use crate::core::rng::DeterministicRng;
use crate::game::damage::{damage_tick, DamageConfig};
use crate::game::events::GameEvent;
use crate::game::state::{GameError, PlayerId, SessionState};
use crate::game::zone::{bootstrap_anchor, next_zone, ZoneConfig};
use crate::network::protocol::{ServerMessage, StateSnapshot};

// =============================================================================
// SESSION PHASE
// =============================================================================

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No participant has ever joined.
    #[default]
    Uninitialized,
    /// First join accepted, first zone not yet stood up.
    AwaitingFirstZone,
    /// Zones exist and the periodic schedules are (or may be) armed.
    Active,
    /// Torn down; both schedules cancelled.
    Disposed,
}

// =============================================================================
// SESSION CONFIG
// =============================================================================

/// Configuration for one session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Zone generation parameters.
    pub zone: ZoneConfig,
    /// Damage evaluation parameters.
    pub damage: DamageConfig,
    /// Dispose the session when the last player leaves. Off by default;
    /// dispose is normally an explicit external call.
    pub dispose_when_empty: bool,
}

// =============================================================================
// ZONE SESSION
// =============================================================================

/// One match: the authoritative state plus the lifecycle around it.
pub struct ZoneSession {
    /// Lifecycle phase.
    phase: SessionPhase,
    /// Authoritative state. Never handed out mutably.
    state: SessionState,
    /// Session configuration.
    config: SessionConfig,
    /// Randomness for zone placement, owned here so a seed replays the
    /// same zone sequence.
    rng: DeterministicRng,
    /// Cancellation signal for the periodic loop.
    shutdown_tx: broadcast::Sender<()>,
}

impl ZoneSession {
    /// Create a session awaiting its first participant.
    pub fn new(config: SessionConfig, rng_seed: u64) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            phase: SessionPhase::Uninitialized,
            state: SessionState::new(),
            config,
            rng: DeterministicRng::new(rng_seed),
            shutdown_tx,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Read access to the authoritative state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to the dispose signal.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Handle a player joining at `location`.
    ///
    /// The first join (and any join while no zones exist yet) stands up the
    /// first zone, anchored on the centroid of everyone in session so it
    /// starts roughly equidistant from all players.
    pub fn on_join(&mut self, id: PlayerId, location: Coordinate) -> Result<(), GameError> {
        if self.phase == SessionPhase::Disposed {
            return Err(GameError::Precondition("join on a disposed session"));
        }

        self.state.create_player(id, location)?;
        self.state.push_event(GameEvent::PlayerJoined { id, location });
        info!(player = %id, %location, "player joined");

        if self.state.zones().is_empty() {
            self.phase = SessionPhase::AwaitingFirstZone;
            let anchor = bootstrap_anchor(self.state.players())?;
            self.spawn_zone(Some(anchor))?;
            self.phase = SessionPhase::Active;
            info!("session active");
        }

        Ok(())
    }

    /// Handle a player leaving. Absent ids are a warning, not an error:
    /// a leave can race a disconnect cleanup.
    pub fn on_leave(&mut self, id: PlayerId) -> bool {
        if !self.state.remove_player(id) {
            warn!(player = %id, "leave for a player not in session");
            return false;
        }

        self.state.push_event(GameEvent::PlayerLeft { id });
        info!(player = %id, "player left");

        if self.config.dispose_when_empty && self.state.is_empty() {
            self.dispose();
        }
        true
    }

    /// Handle a position report. Unknown ids are dropped quietly: updates
    /// arriving after a leave are expected under network delay.
    pub fn on_location_update(&mut self, id: PlayerId, location: Coordinate) {
        if let Err(err) = self.state.move_player(id, location) {
            debug!(player = %id, "dropping location update: {err}");
        }
    }

    /// One firing of the zone-generation schedule: nest a new zone inside
    /// the last one. No-op outside the `Active` phase.
    pub fn zone_tick(&mut self) -> Result<(), GameError> {
        if self.phase != SessionPhase::Active {
            return Ok(());
        }
        self.spawn_zone(None)
    }

    /// One firing of the damage schedule. No-op outside the `Active` phase
    /// and while fewer than two zones exist.
    pub fn damage_tick(&mut self) {
        if self.phase != SessionPhase::Active {
            return;
        }
        damage_tick(&mut self.state, &self.config.damage);
    }

    /// Tear the session down and cancel both periodic schedules.
    /// Idempotent: disposing twice is a no-op.
    pub fn dispose(&mut self) {
        if self.phase == SessionPhase::Disposed {
            return;
        }
        self.phase = SessionPhase::Disposed;
        let _ = self.shutdown_tx.send(());
        info!("session disposed");
    }

    /// Capture a consistent snapshot and drain the events that accumulated
    /// since the last batch. Called under the same write guard as the
    /// mutations it reports, so observers never see a torn update.
    pub fn drain_batch(&mut self) -> (StateSnapshot, Vec<GameEvent>) {
        (StateSnapshot::of(&self.state), self.state.take_events())
    }

    /// Generate and append the next zone, announcing it as an event.
    fn spawn_zone(&mut self, anchor: Option<Coordinate>) -> Result<(), GameError> {
        let zone = next_zone(
            self.state.zones(),
            anchor,
            Utc::now(),
            &mut self.rng,
            &self.config.zone,
        )?;

        let index = self.state.zones().len();
        self.state.append_zone(zone);
        self.state.push_event(GameEvent::ZoneSpawned {
            index,
            center: zone.center,
            radius_m: zone.radius_m,
            active_time: zone.active_time,
        });
        info!(index, radius_m = zone.radius_m, center = %zone.center, "zone spawned");
        Ok(())
    }
}

// =============================================================================
// PERIODIC LOOP
// =============================================================================

/// Drive both periodic schedules for a session until it is disposed.
///
/// A single task owns both timers, so the two periodic bodies can never
/// interleave with each other; the `biased` select ranks zone generation
/// above a simultaneously-due damage tick, so the damage pass always sees
/// the freshly-updated boundary. Each firing is caught-and-logged: a failed
/// tick never stops the schedule.
pub async fn run_session_loop(
    session: Arc<RwLock<ZoneSession>>,
    fanout: broadcast::Sender<ServerMessage>,
) {
    let (zone_period, damage_period, mut shutdown_rx) = {
        let s = session.read().await;
        (
            s.config.zone.shrink_interval,
            s.config.damage.tick_interval,
            s.subscribe_shutdown(),
        )
    };

    // First firing of each schedule lands one full period out
    let mut zone_timer = interval_at(Instant::now() + zone_period, zone_period);
    let mut damage_timer = interval_at(Instant::now() + damage_period, damage_period);
    zone_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    damage_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = zone_timer.tick() => {
                let batch = {
                    let mut s = session.write().await;
                    if s.phase() == SessionPhase::Disposed {
                        break;
                    }
                    if let Err(err) = s.zone_tick() {
                        error!("zone tick failed: {err}");
                    }
                    s.drain_batch()
                };
                broadcast_batch(&fanout, batch);
            }
            _ = damage_timer.tick() => {
                let batch = {
                    let mut s = session.write().await;
                    if s.phase() == SessionPhase::Disposed {
                        break;
                    }
                    s.damage_tick();
                    s.drain_batch()
                };
                broadcast_batch(&fanout, batch);
            }
        }
    }

    info!("session loop stopped");
}

/// Push one mutation batch to every connected client: events first, then
/// the snapshot that reflects them.
pub(crate) fn broadcast_batch(
    fanout: &broadcast::Sender<ServerMessage>,
    (snapshot, events): (StateSnapshot, Vec<GameEvent>),
) {
    for event in events {
        let _ = fanout.send(ServerMessage::Event(event));
    }
    let _ = fanout.send(ServerMessage::State { snapshot });
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::distance_meters;
    use std::time::Duration;
    use uuid::Uuid;

    fn id(n: u128) -> PlayerId {
        PlayerId::from_uuid(Uuid::from_u128(n))
    }

    fn session() -> ZoneSession {
        ZoneSession::new(SessionConfig::default(), 12345)
    }

    #[test]
    fn test_first_join_bootstraps_first_zone() {
        let mut s = session();
        assert_eq!(s.phase(), SessionPhase::Uninitialized);

        let here = Coordinate::new(0.0, 0.0);
        s.on_join(id(1), here).unwrap();

        assert_eq!(s.phase(), SessionPhase::Active);
        assert_eq!(s.state().zones().len(), 1);

        let first = &s.state().zones()[0];
        assert_eq!(first.radius_m, 400.0);
        assert!(distance_meters(first.center, here) < 800.0);

        let events = s.drain_batch().1;
        assert!(matches!(events[0], GameEvent::PlayerJoined { .. }));
        assert!(matches!(events[1], GameEvent::ZoneSpawned { index: 0, .. }));
    }

    #[test]
    fn test_later_joins_do_not_bootstrap_again() {
        let mut s = session();
        s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap();
        s.on_join(id(2), Coordinate::new(0.001, 0.001)).unwrap();

        assert_eq!(s.state().players().len(), 2);
        assert_eq!(s.state().zones().len(), 1);
    }

    #[test]
    fn test_duplicate_join_is_rejected() {
        let mut s = session();
        s.on_join(id(1), Coordinate::new(1.0, 1.0)).unwrap();

        let err = s.on_join(id(1), Coordinate::new(2.0, 2.0)).unwrap_err();
        assert_eq!(err, GameError::DuplicateId(id(1)));

        // Original position survives
        assert_eq!(
            s.state().player(id(1)).unwrap().location,
            Coordinate::new(1.0, 1.0)
        );
    }

    #[test]
    fn test_join_after_dispose_fails() {
        let mut s = session();
        s.dispose();

        let err = s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
    }

    #[test]
    fn test_leave_keeps_session_active_by_default() {
        let mut s = session();
        s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap();

        assert!(s.on_leave(id(1)));
        assert!(s.state().is_empty());
        assert_eq!(s.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_dispose_when_empty_policy() {
        let config = SessionConfig {
            dispose_when_empty: true,
            ..Default::default()
        };
        let mut s = ZoneSession::new(config, 1);
        s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap();

        s.on_leave(id(1));
        assert_eq!(s.phase(), SessionPhase::Disposed);
    }

    #[test]
    fn test_leave_twice_is_noop() {
        let mut s = session();
        s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap();

        assert!(s.on_leave(id(1)));
        assert!(!s.on_leave(id(1)));
    }

    #[test]
    fn test_late_location_update_is_dropped() {
        let mut s = session();
        s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap();
        s.on_leave(id(1));

        // Arrives after the leave; must not fail the session
        s.on_location_update(id(1), Coordinate::new(9.0, 9.0));
        assert!(s.state().is_empty());
    }

    #[test]
    fn test_location_update_moves_player() {
        let mut s = session();
        s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap();

        s.on_location_update(id(1), Coordinate::new(0.002, 0.003));
        assert_eq!(
            s.state().player(id(1)).unwrap().location,
            Coordinate::new(0.002, 0.003)
        );
    }

    #[test]
    fn test_zone_tick_nests() {
        let mut s = session();
        s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap();

        s.zone_tick().unwrap();
        s.zone_tick().unwrap();

        let radii: Vec<f64> = s.state().zones().iter().map(|z| z.radius_m).collect();
        assert_eq!(radii, vec![400.0, 200.0, 100.0]);
    }

    #[test]
    fn test_zone_tick_is_noop_before_activation_and_after_dispose() {
        let mut s = session();
        s.zone_tick().unwrap();
        assert!(s.state().zones().is_empty());

        s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap();
        s.dispose();
        s.zone_tick().unwrap();
        assert_eq!(s.state().zones().len(), 1);
    }

    #[test]
    fn test_damage_tick_respects_boundary() {
        let mut s = session();
        let here = Coordinate::new(0.0, 0.0);
        s.on_join(id(1), here).unwrap();

        // No boundary with a single zone
        s.damage_tick();
        assert_eq!(s.state().player(id(1)).unwrap().health, 100);

        s.zone_tick().unwrap();
        s.damage_tick();

        let inside = s.state().safe_zone().unwrap().contains(here);
        let expected = if inside { 100 } else { 97 };
        assert_eq!(s.state().player(id(1)).unwrap().health, expected);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut s = session();
        s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap();

        s.dispose();
        s.dispose();
        assert_eq!(s.phase(), SessionPhase::Disposed);
        s.damage_tick();
        assert_eq!(s.state().player(id(1)).unwrap().health, 100);
    }

    #[test]
    fn test_drain_batch_is_consistent_and_draining() {
        let mut s = session();
        s.on_join(id(1), Coordinate::new(0.0, 0.0)).unwrap();

        let (snapshot, events) = s.drain_batch();
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.zones.len(), 1);
        assert_eq!(events.len(), 2);

        let (_, events) = s.drain_batch();
        assert!(events.is_empty());
    }

    fn fast_session() -> ZoneSession {
        let config = SessionConfig {
            zone: ZoneConfig {
                shrink_interval: Duration::from_millis(20),
                ..Default::default()
            },
            damage: DamageConfig {
                tick_interval: Duration::from_millis(10),
                ..Default::default()
            },
            ..Default::default()
        };
        ZoneSession::new(config, 42)
    }

    #[tokio::test]
    async fn test_loop_fires_both_schedules() {
        let session = Arc::new(RwLock::new(fast_session()));
        session
            .write()
            .await
            .on_join(id(1), Coordinate::new(0.0, 0.0))
            .unwrap();

        let (fanout, mut rx) = broadcast::channel(256);
        let handle = tokio::spawn(run_session_loop(session.clone(), fanout));

        tokio::time::sleep(Duration::from_millis(70)).await;
        session.write().await.dispose();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should stop after dispose")
            .unwrap();

        // Zones nested while the loop ran
        assert!(session.read().await.state().zones().len() >= 2);

        // And state broadcasts went out
        let mut saw_state = false;
        while let Ok(msg) = rx.try_recv() {
            if matches!(msg, ServerMessage::State { .. }) {
                saw_state = true;
            }
        }
        assert!(saw_state);
    }

    #[tokio::test]
    async fn test_dispose_cancels_loop_idempotently() {
        let session = Arc::new(RwLock::new(fast_session()));
        session
            .write()
            .await
            .on_join(id(1), Coordinate::new(0.0, 0.0))
            .unwrap();

        let (fanout, _rx) = broadcast::channel(256);
        let handle = tokio::spawn(run_session_loop(session.clone(), fanout));

        session.write().await.dispose();
        // Cancel-after-dispose is a no-op, not an error
        session.write().await.dispose();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should stop after dispose")
            .unwrap();
    }
}
