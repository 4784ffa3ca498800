//! Out-of-Zone Damage
//!
//! One evaluation pass per scheduled tick: every player outside the current
//! safe zone loses a fixed amount of health. Players already at 0 stay at 0
//! and are not removed; elimination policy beyond the event is the
//! collaborator layer's call.

use std::time::Duration;

use tracing::warn;

use crate::game::events::GameEvent;
use crate::game::state::{PlayerId, SessionState};
use crate::DAMAGE_INTERVAL_SECS;

/// Damage evaluation parameters.
#[derive(Debug, Clone)]
pub struct DamageConfig {
    /// How often the evaluation runs.
    pub tick_interval: Duration,
    /// Health subtracted from each player caught outside, per tick.
    pub damage_per_tick: u32,
}

impl Default for DamageConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(DAMAGE_INTERVAL_SECS),
            damage_per_tick: 3,
        }
    }
}

/// Run one damage evaluation over the session.
///
/// No-op until two zones exist: the last zone is still upcoming, and with
/// fewer there is no damage boundary at all. Pushes `PlayerDamaged` (and
/// `PlayerEliminated` on the 0-crossing) events into the state.
pub fn damage_tick(state: &mut SessionState, config: &DamageConfig) {
    let Some(safe_zone) = state.safe_zone().copied() else {
        return;
    };

    // Snapshot targets first; mutation goes through the state primitives.
    let outside: Vec<(PlayerId, u32)> = state
        .players()
        .values()
        .filter(|p| p.health > 0 && !safe_zone.contains(p.location))
        .map(|p| (p.id, p.health))
        .collect();

    for (id, before) in outside {
        match state.apply_damage(id, config.damage_per_tick) {
            Ok(health) => {
                state.push_event(GameEvent::PlayerDamaged {
                    id,
                    damage: before - health,
                    health,
                });
                if health == 0 {
                    state.push_event(GameEvent::PlayerEliminated { id });
                }
            }
            Err(err) => warn!(player = %id, "dropping damage application: {err}"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::{destination_point, Coordinate};
    use crate::game::state::{PlayerId, Zone, MAX_HEALTH};
    use chrono::Utc;
    use uuid::Uuid;

    fn id(n: u128) -> PlayerId {
        PlayerId::from_uuid(Uuid::from_u128(n))
    }

    fn zone_at(center: Coordinate, radius_m: f64) -> Zone {
        Zone::new(center, radius_m, Utc::now()).unwrap()
    }

    /// State with an enforced 400 m safe zone at the origin.
    fn state_with_boundary() -> SessionState {
        let mut state = SessionState::new();
        let origin = Coordinate::new(0.0, 0.0);
        state.append_zone(zone_at(origin, 400.0));
        state.append_zone(zone_at(origin, 200.0));
        state
    }

    #[test]
    fn test_noop_without_two_zones() {
        let mut state = SessionState::new();
        state
            .create_player(id(1), Coordinate::new(5.0, 5.0))
            .unwrap();

        for _ in 0..10 {
            damage_tick(&mut state, &DamageConfig::default());
        }
        assert_eq!(state.player(id(1)).unwrap().health, MAX_HEALTH);

        // A single zone is still only "upcoming"
        state.append_zone(zone_at(Coordinate::new(0.0, 0.0), 400.0));
        for _ in 0..10 {
            damage_tick(&mut state, &DamageConfig::default());
        }
        assert_eq!(state.player(id(1)).unwrap().health, MAX_HEALTH);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_player_inside_is_untouched() {
        let mut state = state_with_boundary();
        state
            .create_player(id(1), Coordinate::new(0.0, 0.0))
            .unwrap();

        damage_tick(&mut state, &DamageConfig::default());

        assert_eq!(state.player(id(1)).unwrap().health, MAX_HEALTH);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_player_outside_loses_fixed_amount() {
        let mut state = state_with_boundary();
        let far = destination_point(Coordinate::new(0.0, 0.0), 1000.0, 90.0);
        state.create_player(id(1), far).unwrap();

        damage_tick(&mut state, &DamageConfig::default());

        assert_eq!(state.player(id(1)).unwrap().health, 97);
        let events = state.take_events();
        assert_eq!(
            events,
            vec![GameEvent::PlayerDamaged {
                id: id(1),
                damage: 3,
                health: 97
            }]
        );
    }

    #[test]
    fn test_depletion_clamps_and_eliminates_once() {
        let mut state = state_with_boundary();
        let far = destination_point(Coordinate::new(0.0, 0.0), 1000.0, 90.0);
        state.create_player(id(1), far).unwrap();
        let config = DamageConfig::default();

        // 33 ticks: 100 -> 1
        for _ in 0..33 {
            damage_tick(&mut state, &config);
        }
        assert_eq!(state.player(id(1)).unwrap().health, 1);

        // 34th tick crosses to 0 and eliminates
        damage_tick(&mut state, &config);
        assert_eq!(state.player(id(1)).unwrap().health, 0);
        let events = state.take_events();
        assert!(events.contains(&GameEvent::PlayerEliminated { id: id(1) }));
        assert!(events.contains(&GameEvent::PlayerDamaged {
            id: id(1),
            damage: 1,
            health: 0
        }));

        // 35th tick: stays at 0, no further events, record still present
        damage_tick(&mut state, &config);
        assert_eq!(state.player(id(1)).unwrap().health, 0);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_only_outsiders_are_damaged() {
        let mut state = state_with_boundary();
        let origin = Coordinate::new(0.0, 0.0);
        state.create_player(id(1), origin).unwrap();
        state
            .create_player(id(2), destination_point(origin, 1000.0, 45.0))
            .unwrap();

        damage_tick(&mut state, &DamageConfig::default());

        assert_eq!(state.player(id(1)).unwrap().health, MAX_HEALTH);
        assert_eq!(state.player(id(2)).unwrap().health, 97);
    }

    #[test]
    fn test_damage_uses_enforced_zone_not_upcoming() {
        let mut state = SessionState::new();
        let origin = Coordinate::new(0.0, 0.0);
        // Enforced zone covers the player; tiny upcoming zone far away does not
        state.append_zone(zone_at(origin, 400.0));
        state.append_zone(zone_at(destination_point(origin, 10_000.0, 0.0), 200.0));
        state.create_player(id(1), origin).unwrap();

        damage_tick(&mut state, &DamageConfig::default());

        assert_eq!(state.player(id(1)).unwrap().health, MAX_HEALTH);
    }
}
