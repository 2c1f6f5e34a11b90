use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies an entity slot in the model arena.
    ///
    /// Keys are non-owning: a key whose entity has been erased simply fails
    /// to resolve on lookup.
    pub struct EntityKey;
}

/// A process-unique, persistent entity identifier written to the solver
/// file and to the model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BaseId(pub i32);

impl BaseId {
    /// Sentinel for an entity that has not been given an id yet.
    pub const UNASSIGNED: BaseId = BaseId(-1);

    pub fn is_assigned(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for BaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A model-scoped, user-renumberable identifier. Zero means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct UserId(pub i32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_base_id_is_not_assigned() {
        assert!(!BaseId::UNASSIGNED.is_assigned());
        assert!(!BaseId(0).is_assigned());
        assert!(BaseId(1).is_assigned());
    }

    #[test]
    fn base_ids_order_numerically() {
        let mut ids = vec![BaseId(7), BaseId(2), BaseId(11)];
        ids.sort();
        assert_eq!(ids, vec![BaseId(2), BaseId(7), BaseId(11)]);
    }

    #[test]
    fn base_id_displays_raw_number() {
        assert_eq!(BaseId(42).to_string(), "42");
    }
}
