//! Leader formations: follower slots, slot markers, and leader rendezvous.

use crate::context::NPCMovementContext;
use crate::error::{MovementError, MovementResult};
use crate::registry::AgentRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use warband_common::{midpoint, EntityId, Vec3};

/// Grid of slots behind a leader, in the leader's local frame (+Z forward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationLayout {
    /// Slots per row
    pub columns: u32,
    /// Distance between neighbouring slots
    pub spacing: f32,
}

impl Default for FormationLayout {
    fn default() -> Self {
        Self {
            columns: 3,
            spacing: 2.0,
        }
    }
}

impl FormationLayout {
    /// Local offset of a slot. Row 1 is one spacing behind the leader.
    #[must_use]
    pub fn offset(&self, slot: usize) -> Vec3 {
        let columns = self.columns.max(1) as usize;
        let row = (slot / columns + 1) as f32;
        let column = (slot % columns) as f32;
        let center = (columns - 1) as f32 / 2.0;
        Vec3::new((column - center) * self.spacing, 0.0, -row * self.spacing)
    }

    /// Clamp to usable values.
    pub fn validate(&mut self) {
        self.columns = self.columns.clamp(1, 16);
        self.spacing = self.spacing.clamp(0.5, 20.0);
    }
}

/// Factory that places formation slot markers in the world.
pub trait FormationSpawner {
    /// Places a marker for `slot` that moves with `leader`. `None` if the
    /// leader cannot be found.
    fn spawn_slot_marker(
        &mut self,
        leader: EntityId,
        slot: usize,
        layout: &FormationLayout,
    ) -> Option<EntityId>;

    /// Removes a marker placed earlier.
    fn remove_marker(&mut self, marker: EntityId);
}

/// Tracks which follower holds which slot of which leader.
#[derive(Debug, Default, Clone)]
pub struct FormationCoordinator {
    /// Slot table per leader; `None` entries are free slots
    slots: HashMap<EntityId, Vec<Option<EntityId>>>,
    layout: FormationLayout,
}

impl FormationCoordinator {
    /// Creates a coordinator with the given layout.
    #[must_use]
    pub fn new(layout: FormationLayout) -> Self {
        Self {
            slots: HashMap::new(),
            layout,
        }
    }

    /// Slot layout in use.
    #[must_use]
    pub fn layout(&self) -> &FormationLayout {
        &self.layout
    }

    /// Registers `follower` under `leader`: takes the lowest free slot, has
    /// the spawner place its marker, and binds both to the follower. Slot 0
    /// also pairs the two for battle.
    pub fn assign_slot(
        &mut self,
        leader: &mut NPCMovementContext,
        follower: &mut NPCMovementContext,
        spawner: &mut dyn FormationSpawner,
    ) -> MovementResult<usize> {
        if !leader.is_leader {
            return Err(MovementError::NotALeader(leader.id));
        }
        if follower.formation_slot_index.is_some() {
            return Err(MovementError::SlotAlreadyAssigned(follower.id));
        }

        let table = self.slots.entry(leader.id).or_default();
        let index = table.iter().position(Option::is_none).unwrap_or(table.len());

        let marker = spawner
            .spawn_slot_marker(leader.id, index, &self.layout)
            .ok_or(MovementError::SpawnFailed(leader.id))?;

        if index == table.len() {
            table.push(Some(follower.id));
        } else {
            table[index] = Some(follower.id);
        }

        follower.formation_slot_index = Some(index);
        follower.formation_slot_ref = Some(marker);
        follower.leader = Some(leader.id);
        follower.follow_target = Some(leader.id);
        if index == 0 {
            leader.battle_follower = Some(follower.id);
        }

        debug!("Follower {} took slot {index} of leader {}", follower.id, leader.id);
        Ok(index)
    }

    /// Current world position of the follower's slot marker.
    ///
    /// # Panics
    /// In debug builds, if the follower was never assigned a slot. Release
    /// builds fall back to the leader's position.
    pub fn slot_world_position(
        &self,
        follower: &NPCMovementContext,
        registry: &dyn AgentRegistry,
    ) -> Vec3 {
        if let Some(position) = follower.formation_slot_ref.and_then(|m| registry.position(m)) {
            return position;
        }

        if cfg!(debug_assertions) {
            panic!("follower {} queried a formation slot it was never assigned", follower.id);
        }
        warn!("Follower {} has no formation slot, trailing leader instead", follower.id);
        follower
            .leader
            .and_then(|l| registry.position(l))
            .unwrap_or(follower.origin)
    }

    /// Midpoint two opposing leaders converge on.
    #[must_use]
    pub fn compute_rendezvous(a: Vec3, b: Vec3) -> Vec3 {
        midpoint(a, b)
    }

    /// Followers of a leader, in slot order.
    #[must_use]
    pub fn followers_of(&self, leader: EntityId) -> Vec<EntityId> {
        self.slots
            .get(&leader)
            .map(|table| table.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Frees a follower's slot and removes its marker. The follower keeps
    /// its recorded index.
    pub fn release_follower(
        &mut self,
        follower: &NPCMovementContext,
        spawner: &mut dyn FormationSpawner,
    ) {
        let (Some(leader), Some(index)) = (follower.leader, follower.formation_slot_index) else {
            return;
        };
        if let Some(slot) = self.slots.get_mut(&leader).and_then(|t| t.get_mut(index)) {
            if *slot == Some(follower.id) {
                *slot = None;
            }
        }
        if let Some(marker) = follower.formation_slot_ref {
            spawner.remove_marker(marker);
        }
    }

    /// Drops a leader's slot table and returns the followers it held.
    pub fn release_leader(&mut self, leader: EntityId) -> Vec<EntityId> {
        self.slots
            .remove(&leader)
            .map(|table| table.into_iter().flatten().collect())
            .unwrap_or_default()
    }
}
