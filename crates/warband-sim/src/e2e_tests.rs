//! End-to-end tests for the Warband sim.
//!
//! These drive the full field (movement core, executor, combat resolver and
//! player) and check outcomes rather than individual commands.

#![cfg(test)]

use crate::config::SimConfig;
use crate::scenario::Scenario;
use warband_ai::{AgentRegistry, MoveState};

fn quiet_field() -> SimConfig {
    SimConfig {
        player_enabled: false,
        followers_per_band: 2,
        ticks: 600,
        ..SimConfig::default()
    }
}

/// Warbands meeting in the middle
mod battle_tests {
    use super::*;

    #[test]
    fn e2e_leaders_meet_and_fight() {
        let mut scenario = Scenario::new(quiet_field()).expect("scenario");
        let report = scenario.run();

        assert!(report.events.get("engage").copied().unwrap_or(0) > 0, "leaders should engage");
        assert!(
            report.events.get("engage_ordered").copied().unwrap_or(0) > 0,
            "leaders should order their followers in"
        );
        assert!(report.kills > 0, "contact should kill someone within 30s");
    }

    #[test]
    fn e2e_no_battle_without_permission() {
        let mut scenario = Scenario::new(SimConfig {
            allow_confrontation: false,
            ..quiet_field()
        })
        .expect("scenario");
        let report = scenario.run();

        assert_eq!(report.kills, 0);
        assert_eq!(report.events.get("engage"), None);
        assert_eq!(report.states.get("MoveToLocation"), Some(&2));
    }

    #[test]
    fn e2e_fleeing_never_confronts() {
        let mut scenario = Scenario::new(quiet_field()).expect("scenario");
        let dt = SimConfig::default().fixed_dt();

        for _ in 0..600 {
            scenario.step(dt);
            let manager = scenario.manager();
            for id in manager.ids() {
                let Some(npc) = manager.get(id) else {
                    continue;
                };
                if npc.current_state() == MoveState::Flee {
                    assert!(!npc.context().confrontation_allowed);
                }
            }
        }
    }

    #[test]
    fn e2e_dead_npcs_stop_moving() {
        let mut scenario = Scenario::new(quiet_field()).expect("scenario");
        let dt = SimConfig::default().fixed_dt();
        for _ in 0..600 {
            scenario.step(dt);
        }

        let dead: Vec<_> = scenario
            .bands()
            .iter()
            .flat_map(|b| b.members().collect::<Vec<_>>())
            .filter(|&id| !scenario.world().is_alive(id))
            .map(|id| (id, scenario.world().position(id)))
            .collect();
        for _ in 0..20 {
            scenario.step(dt);
        }
        for (id, position) in dead {
            assert_eq!(scenario.world().position(id), position, "dead NPC {id} moved");
        }
    }
}

/// The passing player
mod player_tests {
    use super::*;

    #[test]
    fn e2e_player_pulls_npcs_into_a_fight() {
        let mut scenario = Scenario::new(SimConfig {
            followers_per_band: 0,
            allow_confrontation: false,
            ticks: 800,
            ..SimConfig::default()
        })
        .expect("scenario");
        assert!(scenario.player().is_some());
        let report = scenario.run();

        assert!(report.player_hits > 0, "leaders at the meeting point should engage the player");
        assert_eq!(report.kills, 0);
    }
}

/// Report output
mod report_tests {
    use super::*;

    #[test]
    fn e2e_report_accounts_for_every_npc() {
        let config = SimConfig {
            ticks: 100,
            ..SimConfig::default()
        };
        let npcs = 2 * (1 + config.followers_per_band as usize);
        let mut scenario = Scenario::new(config).expect("scenario");
        let report = scenario.run();

        assert_eq!(report.ticks, 100);
        assert_eq!(scenario.tick(), 100);
        let bands = scenario.bands();
        assert!(bands[0].faction.opposes(bands[1].faction));
        assert_eq!(report.states.values().sum::<usize>(), npcs);
        assert_eq!(report.survivors.len(), 2);

        let json = serde_json::to_string(&report).expect("serialize report");
        assert!(json.contains("\"states\""));
        assert!(json.contains("\"survivors\""));
    }
}
