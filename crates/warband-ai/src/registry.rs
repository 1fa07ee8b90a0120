//! World/agent registry the movement core resolves handles through.
//!
//! The core never holds references to other agents. It keeps `EntityId`s and
//! asks an [`AgentRegistry`] for a fresh snapshot each time it needs one.
//! [`World`] is the in-memory registry used by the simulation host and tests.

use crate::formation::{FormationLayout, FormationSpawner};
use crate::state::MoveState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use warband_common::{planar_distance, rotate_yaw, EntityId, FactionId, Vec3};

/// What kind of thing a world object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A computer-controlled agent
    Npc,
    /// The player character
    Player,
    /// A formation slot marker
    Marker,
    /// Anything else an overlap query can return
    Scenery,
}

/// Attachment of an object to a parent (formation markers ride on leaders).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Object this one moves with
    pub parent: EntityId,
    /// Offset in the parent's local frame
    pub offset: Vec3,
}

/// What an NPC makes visible to other agents at the end of its tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Published {
    /// Movement state the NPC ended its tick in
    pub state: MoveState,
    /// Enemy the NPC is currently fighting or closing on
    pub enemy_target: Option<EntityId>,
    /// Target a leader has ordered its followers onto
    pub engage_order: Option<EntityId>,
}

/// Snapshot of a world object and the attributes the core classifies by.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    /// Handle
    pub id: EntityId,
    /// Object kind
    pub kind: ObjectKind,
    /// Allegiance
    pub faction: FactionId,
    /// Whether this agent leads a group
    pub is_leader: bool,
    /// Whether the object is alive (always true for non-agents)
    pub alive: bool,
    /// World position (resolved through the anchor for attached objects)
    pub position: Vec3,
    /// Facing around +Y
    pub yaw: f32,
    /// Parent attachment, if any
    pub anchor: Option<Anchor>,
    /// Last summary the agent published
    pub published: Published,
}

impl WorldObject {
    fn new(kind: ObjectKind, faction: FactionId, position: Vec3) -> Self {
        Self {
            id: EntityId::NULL,
            kind,
            faction,
            is_leader: false,
            alive: true,
            position,
            yaw: 0.0,
            anchor: None,
            published: Published::default(),
        }
    }

    /// An NPC of the given faction.
    #[must_use]
    pub fn npc(faction: FactionId, position: Vec3) -> Self {
        Self::new(ObjectKind::Npc, faction, position)
    }

    /// The player character.
    #[must_use]
    pub fn player(position: Vec3) -> Self {
        Self::new(ObjectKind::Player, FactionId::PLAYER, position)
    }

    /// Inert scenery.
    #[must_use]
    pub fn scenery(position: Vec3) -> Self {
        Self::new(ObjectKind::Scenery, FactionId::NEUTRAL, position)
    }

    /// Marks this object as a group leader.
    #[must_use]
    pub const fn as_leader(mut self) -> Self {
        self.is_leader = true;
        self
    }

}

/// Read-only view of the world used by the movement core.
pub trait AgentRegistry {
    /// Snapshot of an object, with its position resolved.
    fn object(&self, id: EntityId) -> Option<WorldObject>;

    /// Objects within `radius` of `center` on the ground plane, in insertion order.
    fn overlapping(&self, center: Vec3, radius: f32) -> Vec<WorldObject>;

    /// Current position of an object.
    fn position(&self, id: EntityId) -> Option<Vec3> {
        self.object(id).map(|o| o.position)
    }

    /// Whether the handle still points at something alive.
    fn is_alive(&self, id: EntityId) -> bool {
        self.object(id).is_some_and(|o| o.alive)
    }

    /// Last summary an agent published.
    fn published(&self, id: EntityId) -> Option<Published> {
        self.object(id).map(|o| o.published)
    }
}

/// In-memory world registry.
#[derive(Debug, Default, Clone)]
pub struct World {
    objects: HashMap<EntityId, WorldObject>,
    /// Insertion order, so overlap queries are deterministic
    order: Vec<EntityId>,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places an object and returns its handle.
    pub fn insert(&mut self, mut object: WorldObject) -> EntityId {
        let id = EntityId::new();
        object.id = id;
        self.objects.insert(id, object);
        self.order.push(id);
        id
    }

    /// Removes an object. Handles to it resolve to nothing afterwards.
    pub fn remove(&mut self, id: EntityId) -> Option<WorldObject> {
        let removed = self.objects.remove(&id)?;
        self.order.retain(|&o| o != id);
        Some(removed)
    }

    /// Returns the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns whether the world is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Raw stored record (unresolved position for anchored objects).
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&WorldObject> {
        self.objects.get(&id)
    }

    /// Moves an object.
    pub fn set_position(&mut self, id: EntityId, position: Vec3) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.position = position;
        }
    }

    /// Turns an object.
    pub fn set_yaw(&mut self, id: EntityId, yaw: f32) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.yaw = yaw;
        }
    }

    /// Marks an agent dead. It stays queryable so stale handles can tell.
    pub fn kill(&mut self, id: EntityId) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.alive = false;
        }
    }

    /// Stores an agent's own end-of-tick summary.
    pub fn publish(&mut self, id: EntityId, published: Published) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.published = published;
        }
    }

    /// Iterates objects in insertion order, positions resolved.
    pub fn iter(&self) -> impl Iterator<Item = WorldObject> + '_ {
        self.order.iter().filter_map(|&id| self.object(id))
    }

    fn resolve(&self, object: &WorldObject, depth: u8) -> Vec3 {
        match object.anchor {
            Some(anchor) if depth < 4 => match self.objects.get(&anchor.parent) {
                Some(parent) => {
                    self.resolve(parent, depth + 1) + rotate_yaw(anchor.offset, parent.yaw)
                },
                None => object.position,
            },
            _ => object.position,
        }
    }
}

impl AgentRegistry for World {
    fn object(&self, id: EntityId) -> Option<WorldObject> {
        self.objects.get(&id).map(|object| WorldObject {
            position: self.resolve(object, 0),
            ..*object
        })
    }

    fn overlapping(&self, center: Vec3, radius: f32) -> Vec<WorldObject> {
        self.iter()
            .filter(|o| planar_distance(center, o.position) <= radius)
            .collect()
    }
}

impl FormationSpawner for World {
    fn spawn_slot_marker(
        &mut self,
        leader: EntityId,
        slot: usize,
        layout: &FormationLayout,
    ) -> Option<EntityId> {
        let leader_obj = self.objects.get(&leader)?;
        let mut marker = WorldObject::new(ObjectKind::Marker, leader_obj.faction, leader_obj.position);
        marker.anchor = Some(Anchor {
            parent: leader,
            offset: layout.offset(slot),
        });
        Some(self.insert(marker))
    }

    fn remove_marker(&mut self, marker: EntityId) {
        self.remove(marker);
    }
}
