use crate::id::EntityKey;
use crate::model::Model;
use slotmap::SecondaryMap;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from ordering the engine dependency graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("cycle detected among {} engines", .0.len())]
    CycleDetected(Vec<EntityKey>),
}

// ---------------------------------------------------------------------------
// Engine graph
// ---------------------------------------------------------------------------

/// Directed graph over engines. An edge `a -> b` means engine `b` has a
/// sensor argument measuring engine `a`, so `a` must be evaluated first.
#[derive(Debug, Clone, Default)]
pub struct EngineGraph {
    /// Engines in user-id order.
    nodes: Vec<EntityKey>,
    outputs: SecondaryMap<EntityKey, Vec<EntityKey>>,
    inputs: SecondaryMap<EntityKey, Vec<EntityKey>>,
}

impl EngineGraph {
    /// Snapshot the engine dependencies of `model`.
    pub fn from_model(model: &Model) -> Self {
        let nodes = model.keys_of_type(crate::entity::EntityType::Engine);
        let mut graph = Self {
            nodes: nodes.clone(),
            outputs: SecondaryMap::new(),
            inputs: SecondaryMap::new(),
        };
        for &n in &nodes {
            graph.outputs.insert(n, Vec::new());
            graph.inputs.insert(n, Vec::new());
        }
        for &from in &nodes {
            for to in model.engine_dependents(from) {
                graph.add_edge(from, to);
            }
        }
        graph
    }

    fn add_edge(&mut self, from: EntityKey, to: EntityKey) {
        if !self.inputs.contains_key(to) || !self.outputs.contains_key(from) {
            return;
        }
        if let Some(out) = self.outputs.get_mut(from) {
            if !out.contains(&to) {
                out.push(to);
            }
        }
        if let Some(inp) = self.inputs.get_mut(to) {
            if !inp.contains(&from) {
                inp.push(from);
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outputs.values().map(Vec::len).sum()
    }

    /// Engines `engine` reads from.
    pub fn get_inputs(&self, engine: EntityKey) -> &[EntityKey] {
        self.inputs.get(engine).map_or(&[], Vec::as_slice)
    }

    /// Engines reading from `engine`.
    pub fn get_outputs(&self, engine: EntityKey) -> &[EntityKey] {
        self.outputs.get(engine).map_or(&[], Vec::as_slice)
    }

    // -----------------------------------------------------------------------
    // Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------

    /// Evaluation order. Ties keep user-id order. Fails with the engines
    /// left on cycles.
    pub fn topological_order(&self) -> Result<Vec<EntityKey>, GraphError> {
        let (order, remaining) = self.kahn();
        if remaining.is_empty() {
            Ok(order)
        } else {
            Err(GraphError::CycleDetected(remaining))
        }
    }

    /// Engines that lie on a dependency cycle, or depend on one.
    pub fn cyclic_engines(&self) -> Vec<EntityKey> {
        self.kahn().1
    }

    fn kahn(&self) -> (Vec<EntityKey>, Vec<EntityKey>) {
        let mut in_degree: SecondaryMap<EntityKey, usize> = SecondaryMap::new();
        for &n in &self.nodes {
            in_degree.insert(n, self.get_inputs(n).len());
        }

        let mut queue: VecDeque<EntityKey> = self
            .nodes
            .iter()
            .copied()
            .filter(|n| in_degree.get(*n).copied() == Some(0))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &dest in self.get_outputs(node) {
                if let Some(deg) = in_degree.get_mut(dest) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(dest);
                    }
                }
            }
        }

        let remaining = self
            .nodes
            .iter()
            .copied()
            .filter(|n| !order.contains(n))
            .collect();
        (order, remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{Engine, EngineArg};
    use crate::sensor::SensorEntity;

    fn reads(m: &mut Model, reader: EntityKey, source: EntityKey) {
        let s = m.sensor_for(source);
        m.engine_mut(reader)
            .unwrap()
            .args
            .push(EngineArg::new(s, 0, SensorEntity::Pos));
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn chain_orders_sources_first() {
        let mut m = Model::default();
        let c = m.insert(Engine::default());
        let b = m.insert(Engine::default());
        let a = m.insert(Engine::default());
        reads(&mut m, c, b);
        reads(&mut m, b, a);

        let g = EngineGraph::from_model(&m);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.topological_order().unwrap(), vec![a, b, c]);
    }

    #[test]
    fn independent_engines_keep_user_order() {
        let mut m = Model::default();
        let a = m.insert(Engine::default());
        let b = m.insert(Engine::default());
        let g = EngineGraph::from_model(&m);
        assert_eq!(g.topological_order().unwrap(), vec![a, b]);
        assert!(g.get_inputs(a).is_empty());
    }

    // -----------------------------------------------------------------------
    // Cycles
    // -----------------------------------------------------------------------

    #[test]
    fn cycle_is_reported_with_members() {
        let mut m = Model::default();
        let a = m.insert(Engine::default());
        let b = m.insert(Engine::default());
        let free = m.insert(Engine::default());
        reads(&mut m, a, b);
        reads(&mut m, b, a);

        let g = EngineGraph::from_model(&m);
        match g.topological_order() {
            Err(GraphError::CycleDetected(keys)) => assert_eq!(keys, vec![a, b]),
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(!g.cyclic_engines().contains(&free));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut m = Model::default();
        let a = m.insert(Engine::default());
        reads(&mut m, a, a);
        let g = EngineGraph::from_model(&m);
        assert_eq!(g.cyclic_engines(), vec![a]);
    }
}
