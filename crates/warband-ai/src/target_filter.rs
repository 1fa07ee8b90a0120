//! Turns raw overlap results into an NPC's enemy list.

use crate::config::MovementConfig;
use crate::context::NPCMovementContext;
use crate::formation::FormationCoordinator;
use crate::registry::{ObjectKind, WorldObject};
use crate::state::MoveState;
use warband_common::{planar_distance, EntityId, Vec3};

/// Classifies `candidates` relative to `me` and refreshes the context.
///
/// Keeps live NPCs of an opposing faction, in candidate order. A leader that
/// sees an opposing leader within the engagement radius pairs with the
/// nearest one and records their midpoint. The held enemy target is replaced
/// by the nearest enemy when it drops off the list, or cleared when the list
/// is empty. The one exception is `MoveToEnemy` with a target, where only the
/// fight itself may retarget. Candidates are never modified.
pub fn filter_enemies(
    ctx: &mut NPCMovementContext,
    candidates: &[WorldObject],
    me: &WorldObject,
    config: &MovementConfig,
) {
    ctx.enemies_nearby.clear();
    let mut nearest_leader: Option<(EntityId, Vec3, f32)> = None;

    for candidate in candidates {
        if candidate.id == me.id || candidate.kind != ObjectKind::Npc || !candidate.alive {
            continue;
        }
        if !me.faction.opposes(candidate.faction) {
            continue;
        }
        ctx.enemies_nearby.push(candidate.id);

        if ctx.is_leader && candidate.is_leader {
            let d = planar_distance(me.position, candidate.position);
            if d <= config.engagement_radius && nearest_leader.map_or(true, |(_, _, best)| d < best) {
                nearest_leader = Some((candidate.id, candidate.position, d));
            }
        }
    }

    if let Some((leader, position, _)) = nearest_leader {
        ctx.enemy_leader = Some(leader);
        ctx.rendezvous_point = FormationCoordinator::compute_rendezvous(me.position, position);
    }

    let in_fight = ctx.current_state == MoveState::MoveToEnemy && ctx.enemy_target.is_some();
    let still_listed = ctx
        .enemy_target
        .is_some_and(|t| ctx.enemies_nearby.contains(&t));
    if !in_fight && !still_listed {
        ctx.enemy_target = nearest_enemy(candidates, &ctx.enemies_nearby, me.position);
    }
}

/// Nearest candidate whose id is in `enemies`; ties go to the earlier candidate.
#[must_use]
pub fn nearest_enemy(candidates: &[WorldObject], enemies: &[EntityId], from: Vec3) -> Option<EntityId> {
    let mut best: Option<(EntityId, f32)> = None;
    for candidate in candidates.iter().filter(|c| enemies.contains(&c.id)) {
        let d = planar_distance(from, candidate.position);
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((candidate.id, d));
        }
    }
    best.map(|(id, _)| id)
}
