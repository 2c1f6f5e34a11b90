//! Base-id registry with two-phase collision handling.
//!
//! Fresh entities draw the next free id. Entities that arrive with an id
//! (loaded from file, merged from another model) are inserted tentatively:
//! a non-result-bearing occupant is moved out of the way, while a
//! result-bearing occupant keeps its id and the newcomer is deferred until
//! [`IdentityRegistry::resolve_deferred`] runs at the end of the load.

use std::collections::BTreeMap;

use tracing::debug;

use crate::id::BaseId;

// ---------------------------------------------------------------------------
// Slot and outcome types
// ---------------------------------------------------------------------------

/// One registered id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot<K> {
    pub key: K,
    /// Whether the entity persists this id in external result files.
    pub result_bearing: bool,
}

/// Result of a tentative insertion at a requested id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome<K> {
    /// The slot was free (or already held by the same key).
    Inserted(BaseId),
    /// A non-result-bearing occupant was relocated to `relocated_to`.
    Evicted {
        id: BaseId,
        evicted: K,
        relocated_to: BaseId,
    },
    /// A result-bearing occupant holds the id; the newcomer waits for
    /// the resolution pass.
    Deferred { requested: BaseId },
}

/// An entity that ended up with a different id than the one it asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdReassignment<K> {
    pub key: K,
    pub requested: BaseId,
    pub assigned: BaseId,
    pub result_bearing: bool,
}

// ---------------------------------------------------------------------------
// IdentityRegistry
// ---------------------------------------------------------------------------

/// Map from base id to entity key. `K` is the arena key type.
#[derive(Debug, Clone)]
pub struct IdentityRegistry<K> {
    slots: BTreeMap<BaseId, Slot<K>>,
    deferred: Vec<(K, BaseId, bool)>,
}

impl<K> Default for IdentityRegistry<K> {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
            deferred: Vec::new(),
        }
    }
}

impl<K: Copy + Eq + std::fmt::Debug> IdentityRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next free id: one past the largest registered id, or 1. Once
    /// `i32::MAX` is taken, the lowest unused positive id.
    pub fn free_id(&self) -> BaseId {
        match self.slots.keys().next_back() {
            Some(last) if last.0 >= 1 => match last.0.checked_add(1) {
                Some(next) => BaseId(next),
                None => self.lowest_unused(),
            },
            _ => BaseId(1),
        }
    }

    fn lowest_unused(&self) -> BaseId {
        let mut candidate = 1i32;
        for id in self.slots.keys().filter(|id| id.is_assigned()) {
            if id.0 > candidate {
                break;
            }
            candidate = candidate.saturating_add(1);
        }
        BaseId(candidate)
    }

    /// Register `key` under a fresh id.
    pub fn assign(&mut self, key: K, result_bearing: bool) -> BaseId {
        let id = self.free_id();
        self.slots.insert(id, Slot { key, result_bearing });
        id
    }

    /// Tentatively insert `key` at `requested`.
    pub fn insert_requested(
        &mut self,
        key: K,
        requested: BaseId,
        result_bearing: bool,
    ) -> InsertOutcome<K> {
        if !requested.is_assigned() {
            return InsertOutcome::Inserted(self.assign(key, result_bearing));
        }

        match self.slots.get(&requested).copied() {
            None => {
                self.slots.insert(requested, Slot { key, result_bearing });
                InsertOutcome::Inserted(requested)
            }
            Some(slot) if slot.key == key => InsertOutcome::Inserted(requested),
            Some(slot) if !slot.result_bearing => {
                self.slots.insert(requested, Slot { key, result_bearing });
                let relocated_to = self.assign(slot.key, false);
                debug!(
                    id = requested.0,
                    relocated_to = relocated_to.0,
                    "relocated non-result-bearing occupant"
                );
                InsertOutcome::Evicted {
                    id: requested,
                    evicted: slot.key,
                    relocated_to,
                }
            }
            Some(_) => {
                debug!(id = requested.0, "deferred id conflict with result-bearing occupant");
                self.deferred.push((key, requested, result_bearing));
                InsertOutcome::Deferred { requested }
            }
        }
    }

    /// Second phase: give every deferred entity an id.
    ///
    /// An entity whose requested id has meanwhile become free takes it;
    /// every other one gets a fresh id and is reported. Processing order
    /// is the order of deferral.
    pub fn resolve_deferred(&mut self) -> Vec<IdReassignment<K>> {
        let mut reassigned = Vec::new();
        for (key, requested, result_bearing) in std::mem::take(&mut self.deferred) {
            if !self.slots.contains_key(&requested) {
                self.slots.insert(requested, Slot { key, result_bearing });
                continue;
            }
            let assigned = self.assign(key, result_bearing);
            reassigned.push(IdReassignment {
                key,
                requested,
                assigned,
                result_bearing,
            });
        }
        reassigned
    }

    /// Drop a deferred entry without resolving it (entity left the model
    /// before the resolution pass).
    pub fn cancel_deferred(&mut self, key: K) -> bool {
        let before = self.deferred.len();
        self.deferred.retain(|(k, _, _)| *k != key);
        before != self.deferred.len()
    }

    pub fn find(&self, id: BaseId) -> Option<K> {
        self.slots.get(&id).map(|slot| slot.key)
    }

    pub fn slot(&self, id: BaseId) -> Option<&Slot<K>> {
        self.slots.get(&id)
    }

    /// Remove `id` if (and only if) it is held by `key`.
    pub fn remove(&mut self, id: BaseId, key: K) -> bool {
        match self.slots.get(&id) {
            Some(slot) if slot.key == key => {
                self.slots.remove(&id);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, id: BaseId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Registered ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (BaseId, &Slot<K>)> {
        self.slots.iter().map(|(id, slot)| (*id, slot))
    }
}

// ---------------------------------------------------------------------------
// Pure planning entry point
// ---------------------------------------------------------------------------

/// An entity about to join a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incoming<K> {
    pub key: K,
    /// `None` for a fresh entity.
    pub requested: Option<BaseId>,
    pub result_bearing: bool,
}

/// Outcome of [`plan_insertions`].
#[derive(Debug, Clone)]
pub struct InsertionPlan<K> {
    /// The registry after both phases.
    pub registry: IdentityRegistry<K>,
    /// Final id of every incoming entity, in input order.
    pub final_ids: Vec<(K, BaseId)>,
    /// Occupants that were moved out of the way.
    pub relocated: Vec<IdReassignment<K>>,
    /// Incoming entities that could not keep their requested id.
    pub reassigned: Vec<IdReassignment<K>>,
}

impl<K> InsertionPlan<K> {
    /// Result-bearing entities whose stored result curves no longer match.
    pub fn result_warnings(&self) -> impl Iterator<Item = &IdReassignment<K>> {
        self.reassigned.iter().filter(|r| r.result_bearing)
    }
}

/// Run the tentative-insert pass followed by the resolve pass on a copy
/// of `existing`. Deterministic in the order of `incoming`.
pub fn plan_insertions<K: Copy + Eq + std::fmt::Debug>(
    existing: &IdentityRegistry<K>,
    incoming: &[Incoming<K>],
) -> InsertionPlan<K> {
    let mut registry = existing.clone();
    let mut relocated = Vec::new();

    for entry in incoming {
        let outcome = match entry.requested {
            Some(id) => registry.insert_requested(entry.key, id, entry.result_bearing),
            None => InsertOutcome::Inserted(registry.assign(entry.key, entry.result_bearing)),
        };
        if let InsertOutcome::Evicted {
            id,
            evicted,
            relocated_to,
        } = outcome
        {
            relocated.push(IdReassignment {
                key: evicted,
                requested: id,
                assigned: relocated_to,
                result_bearing: false,
            });
        }
    }

    let reassigned = registry.resolve_deferred();

    let mut final_ids: Vec<(K, BaseId)> = Vec::with_capacity(incoming.len());
    for entry in incoming {
        let id = registry
            .iter()
            .find(|(_, slot)| slot.key == entry.key)
            .map(|(id, _)| id)
            .unwrap_or(BaseId::UNASSIGNED);
        final_ids.push((entry.key, id));
    }

    InsertionPlan {
        registry,
        final_ids,
        relocated,
        reassigned,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(key: u32, id: i32) -> Incoming<u32> {
        Incoming {
            key,
            requested: Some(BaseId(id)),
            result_bearing: false,
        }
    }

    fn plotted(key: u32, id: i32) -> Incoming<u32> {
        Incoming {
            key,
            requested: Some(BaseId(id)),
            result_bearing: true,
        }
    }

    #[test]
    fn free_id_starts_at_one() {
        let reg: IdentityRegistry<u32> = IdentityRegistry::new();
        assert_eq!(reg.free_id(), BaseId(1));
    }

    #[test]
    fn free_id_is_one_past_largest() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(1u32, BaseId(5), false);
        reg.insert_requested(2u32, BaseId(2), false);
        assert_eq!(reg.free_id(), BaseId(6));
        assert_eq!(reg.assign(3, false), BaseId(6));
    }

    #[test]
    fn free_id_fills_gap_after_largest_possible() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(1u32, BaseId(i32::MAX), true);
        reg.insert_requested(2u32, BaseId(1), false);
        reg.insert_requested(3u32, BaseId(3), false);

        let a = reg.assign(4, false);
        let b = reg.assign(5, false);
        assert_eq!(a, BaseId(2));
        assert_eq!(b, BaseId(4));
        assert_eq!(reg.find(BaseId(i32::MAX)), Some(1));
        assert_eq!(reg.len(), 5);
    }

    #[test]
    fn unassigned_request_gets_fresh_id() {
        let mut reg = IdentityRegistry::new();
        let out = reg.insert_requested(1u32, BaseId::UNASSIGNED, true);
        assert_eq!(out, InsertOutcome::Inserted(BaseId(1)));
    }

    #[test]
    fn reinserting_same_key_is_noop() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(1u32, BaseId(3), true);
        assert_eq!(
            reg.insert_requested(1u32, BaseId(3), true),
            InsertOutcome::Inserted(BaseId(3))
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn collision_with_plain_occupant_relocates_it() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(10u32, BaseId(4), false);
        let out = reg.insert_requested(20u32, BaseId(4), true);
        assert_eq!(
            out,
            InsertOutcome::Evicted {
                id: BaseId(4),
                evicted: 10,
                relocated_to: BaseId(5),
            }
        );
        assert_eq!(reg.find(BaseId(4)), Some(20));
        assert_eq!(reg.find(BaseId(5)), Some(10));
    }

    #[test]
    fn collision_with_plotted_occupant_defers() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(10u32, BaseId(4), true);
        let out = reg.insert_requested(20u32, BaseId(4), false);
        assert_eq!(out, InsertOutcome::Deferred { requested: BaseId(4) });
        assert_eq!(reg.find(BaseId(4)), Some(10));
        assert_eq!(reg.deferred_len(), 1);

        let reassigned = reg.resolve_deferred();
        assert_eq!(reassigned.len(), 1);
        assert_eq!(reassigned[0].key, 20);
        assert_eq!(reassigned[0].assigned, BaseId(5));
        assert_eq!(reg.deferred_len(), 0);
    }

    #[test]
    fn deferred_entity_keeps_id_freed_before_resolution() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(10u32, BaseId(4), true);
        reg.insert_requested(20u32, BaseId(4), true);
        assert!(reg.remove(BaseId(4), 10));
        assert!(reg.resolve_deferred().is_empty());
        assert_eq!(reg.find(BaseId(4)), Some(20));
    }

    #[test]
    fn remove_requires_matching_key() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(10u32, BaseId(4), true);
        assert!(!reg.remove(BaseId(4), 11));
        assert!(reg.remove(BaseId(4), 10));
        assert!(reg.is_empty());
    }

    #[test]
    fn cancel_deferred_forgets_entity() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(10u32, BaseId(1), true);
        reg.insert_requested(20u32, BaseId(1), true);
        assert!(reg.cancel_deferred(20));
        assert!(reg.resolve_deferred().is_empty());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn plan_leaves_input_registry_untouched() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(1u32, BaseId(1), true);
        let plan = plan_insertions(&reg, &[plotted(2, 1)]);
        assert_eq!(reg.len(), 1);
        assert_eq!(plan.registry.len(), 2);
        assert_eq!(plan.final_ids, vec![(2, BaseId(2))]);
        assert_eq!(plan.result_warnings().count(), 1);
    }

    #[test]
    fn plan_is_deterministic_in_input_order() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(1u32, BaseId(3), true);
        let incoming = [plotted(7, 3), plain(8, 3), plain(9, 1)];
        let a = plan_insertions(&reg, &incoming);
        let b = plan_insertions(&reg, &incoming);
        assert_eq!(a.final_ids, b.final_ids);
        assert_eq!(a.final_ids, vec![(7, BaseId(4)), (8, BaseId(5)), (9, BaseId(1))]);
        assert_eq!(a.result_warnings().count(), 1);
    }

    #[test]
    fn plan_relocation_is_reported_separately() {
        let mut reg = IdentityRegistry::new();
        reg.insert_requested(1u32, BaseId(2), false);
        let plan = plan_insertions(&reg, &[plotted(5, 2)]);
        assert_eq!(plan.relocated.len(), 1);
        assert_eq!(plan.relocated[0].key, 1);
        assert_eq!(plan.relocated[0].assigned, BaseId(3));
        assert!(plan.reassigned.is_empty());
        assert_eq!(plan.final_ids, vec![(5, BaseId(2))]);
    }
}
