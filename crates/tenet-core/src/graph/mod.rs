//! Belief knowledge graph
//!
//! Typed-edge queries over one agent's beliefs: deprecation chains, related
//! neighborhoods, strongly connected clusters, and structural validation.
//! All traversals skip inactive edges and edges outside their validity
//! window at query time, and carry a visited set so cycles terminate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};
use crate::model::{Belief, BeliefRelationship, RelationshipType};
use crate::storage::{BeliefRepo, RelationshipRepo};

// ============================================================================
// VALIDATION REPORT
// ============================================================================

/// Structural defects found in an agent's graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphValidation {
    /// Edges referencing a belief that does not exist
    pub orphan_edge_ids: Vec<String>,
    /// Edges whose source equals their target
    pub self_loop_edge_ids: Vec<String>,
    /// Edges with `effective_from` after `effective_until`
    pub temporal_inversion_edge_ids: Vec<String>,
    /// Edges whose endpoints belong to different agents
    pub cross_agent_edge_ids: Vec<String>,
}

impl GraphValidation {
    /// True when no defects were found
    pub fn is_valid(&self) -> bool {
        self.orphan_edge_ids.is_empty()
            && self.self_loop_edge_ids.is_empty()
            && self.temporal_inversion_edge_ids.is_empty()
            && self.cross_agent_edge_ids.is_empty()
    }
}

// ============================================================================
// GRAPH SERVICE
// ============================================================================

/// Query service over beliefs and their typed edges
pub struct KnowledgeGraph {
    beliefs: Arc<dyn BeliefRepo>,
    relationships: Arc<dyn RelationshipRepo>,
}

impl KnowledgeGraph {
    /// Wire up the service
    pub fn new(beliefs: Arc<dyn BeliefRepo>, relationships: Arc<dyn RelationshipRepo>) -> Self {
        Self {
            beliefs,
            relationships,
        }
    }

    /// Persist a validated edge: endpoints must exist, belong to the edge's
    /// agent, and differ (self-loops are rejected at construction too).
    pub fn connect(&self, edge: &BeliefRelationship) -> Result<()> {
        if edge.source_belief_id == edge.target_belief_id {
            return Err(MemoryError::InvalidInput(format!(
                "self-loop relationship on belief {}",
                edge.source_belief_id
            )));
        }

        let source = self
            .beliefs
            .get(&edge.source_belief_id)?
            .ok_or_else(|| MemoryError::NotFound(format!("belief {}", edge.source_belief_id)))?;
        let target = self
            .beliefs
            .get(&edge.target_belief_id)?
            .ok_or_else(|| MemoryError::NotFound(format!("belief {}", edge.target_belief_id)))?;

        if source.agent_id != target.agent_id || source.agent_id != edge.agent_id {
            return Err(MemoryError::InvalidInput(format!(
                "relationship endpoints must share agent {}",
                edge.agent_id
            )));
        }

        self.relationships.insert(edge)?;
        tracing::debug!(
            relationship_type = %edge.relationship_type,
            source = %edge.source_belief_id,
            target = %edge.target_belief_id,
            "edge connected"
        );
        Ok(())
    }

    /// Stamp `effective_until` on a belief's open outgoing edges
    pub fn close_outgoing_edges(&self, belief_id: &str, until: DateTime<Utc>) -> Result<usize> {
        self.relationships.close_outgoing(belief_id, until)
    }

    /// Edges out of a belief
    pub fn outgoing(&self, belief_id: &str, active_only: bool) -> Result<Vec<BeliefRelationship>> {
        self.relationships.find_by_source(belief_id, active_only)
    }

    /// Edges into a belief
    pub fn incoming(&self, belief_id: &str, active_only: bool) -> Result<Vec<BeliefRelationship>> {
        self.relationships.find_by_target(belief_id, active_only)
    }

    /// The chain of beliefs that superseded `belief_id`, immediate
    /// successor first. Follows incoming SUPERSEDES / REPLACES / DEPRECATES /
    /// UPDATES edges until none remain; cycles terminate via the visited set.
    pub fn deprecation_chain(&self, belief_id: &str) -> Result<Vec<Belief>> {
        self.deprecation_chain_at(belief_id, Utc::now())
    }

    /// [`deprecation_chain`](Self::deprecation_chain) evaluated at a given
    /// instant
    pub fn deprecation_chain_at(
        &self,
        belief_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<Belief>> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(belief_id.to_string());
        let mut current = belief_id.to_string();

        loop {
            let incoming = self.relationships.find_by_target(&current, true)?;
            let successor = incoming
                .into_iter()
                .filter(|edge| edge.relationship_type.is_deprecating())
                .filter(|edge| edge.is_effective_at(at))
                .max_by(|a, b| {
                    a.priority
                        .cmp(&b.priority)
                        .then(a.created_at.cmp(&b.created_at))
                });

            let Some(edge) = successor else { break };
            if !visited.insert(edge.source_belief_id.clone()) {
                break;
            }
            let Some(belief) = self.beliefs.get(&edge.source_belief_id)? else {
                break;
            };
            current = belief.id.clone();
            chain.push(belief);
        }

        Ok(chain)
    }

    /// Beliefs reachable from `belief_id` within `depth` hops over active,
    /// currently effective edges (either direction). The start belief is
    /// not included.
    pub fn related(&self, belief_id: &str, depth: usize) -> Result<Vec<Belief>> {
        self.related_at(belief_id, depth, Utc::now())
    }

    /// [`related`](Self::related) evaluated at a given instant
    pub fn related_at(
        &self,
        belief_id: &str,
        depth: usize,
        at: DateTime<Utc>,
    ) -> Result<Vec<Belief>> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(belief_id.to_string());
        let mut frontier = VecDeque::new();
        frontier.push_back((belief_id.to_string(), 0usize));
        let mut found = Vec::new();

        while let Some((current, hops)) = frontier.pop_front() {
            if hops >= depth {
                continue;
            }
            let mut neighbors = Vec::new();
            for edge in self.relationships.find_by_source(&current, true)? {
                if edge.is_effective_at(at) {
                    neighbors.push(edge.target_belief_id);
                }
            }
            for edge in self.relationships.find_by_target(&current, true)? {
                if edge.is_effective_at(at) {
                    neighbors.push(edge.source_belief_id);
                }
            }

            for neighbor in neighbors {
                if visited.insert(neighbor.clone()) {
                    if let Some(belief) = self.beliefs.get(&neighbor)? {
                        found.push(belief);
                    }
                    frontier.push_back((neighbor, hops + 1));
                }
            }
        }

        Ok(found)
    }

    /// Connected components over edges with `strength >= threshold`,
    /// union-find based, minimum component size 2. Returns belief id
    /// clusters, each sorted, largest first.
    pub fn strongly_connected_clusters(
        &self,
        agent_id: &str,
        strength_threshold: f64,
    ) -> Result<Vec<Vec<String>>> {
        let now = Utc::now();
        let edges: Vec<BeliefRelationship> = self
            .relationships
            .find_by_agent(agent_id, true)?
            .into_iter()
            .filter(|edge| edge.strength >= strength_threshold && edge.is_effective_at(now))
            .collect();

        let mut find = UnionFind::default();
        for edge in &edges {
            find.union(&edge.source_belief_id, &edge.target_belief_id);
        }

        let mut clusters: HashMap<String, Vec<String>> = HashMap::new();
        for node in find.nodes() {
            let root = find.root(&node);
            clusters.entry(root).or_default().push(node);
        }

        let mut result: Vec<Vec<String>> = clusters
            .into_values()
            .filter(|cluster| cluster.len() >= 2)
            .map(|mut cluster| {
                cluster.sort();
                cluster
            })
            .collect();
        result.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        Ok(result)
    }

    /// Scan one agent's edges for structural defects
    pub fn validate_structure(&self, agent_id: &str) -> Result<GraphValidation> {
        let mut report = GraphValidation::default();

        for edge in self.relationships.find_by_agent(agent_id, false)? {
            if edge.source_belief_id == edge.target_belief_id {
                report.self_loop_edge_ids.push(edge.id.clone());
            }
            if let (Some(from), Some(until)) = (edge.effective_from, edge.effective_until) {
                if from > until {
                    report.temporal_inversion_edge_ids.push(edge.id.clone());
                }
            }

            let source = self.beliefs.get(&edge.source_belief_id)?;
            let target = self.beliefs.get(&edge.target_belief_id)?;
            match (source, target) {
                (Some(source), Some(target)) => {
                    if source.agent_id != target.agent_id || source.agent_id != edge.agent_id {
                        report.cross_agent_edge_ids.push(edge.id);
                    }
                }
                _ => report.orphan_edge_ids.push(edge.id),
            }
        }

        Ok(report)
    }

    /// Beliefs currently deprecated by an active deprecating edge
    pub fn deprecated_belief_ids(&self, agent_id: &str) -> Result<Vec<String>> {
        self.beliefs.find_deprecated_belief_ids(agent_id)
    }

    /// Beliefs that directly supersede `belief_id`
    pub fn superseding_belief_ids(&self, agent_id: &str, belief_id: &str) -> Result<Vec<String>> {
        self.beliefs.find_superseding_belief_ids(agent_id, belief_id)
    }

    /// Whether any deprecating edge type targets the belief right now;
    /// cheaper than materializing the chain
    pub fn is_deprecated(&self, agent_id: &str, belief_id: &str) -> Result<bool> {
        Ok(!self
            .beliefs
            .find_superseding_belief_ids(agent_id, belief_id)?
            .is_empty())
    }
}

// ============================================================================
// UNION-FIND
// ============================================================================

/// Path-compressing union-find over string keys
#[derive(Default)]
struct UnionFind {
    parent: HashMap<String, String>,
}

impl UnionFind {
    fn ensure(&mut self, node: &str) {
        if !self.parent.contains_key(node) {
            self.parent.insert(node.to_string(), node.to_string());
        }
    }

    fn root(&self, node: &str) -> String {
        let mut current = node.to_string();
        while let Some(parent) = self.parent.get(&current) {
            if *parent == current {
                break;
            }
            current = parent.clone();
        }
        current
    }

    fn union(&mut self, a: &str, b: &str) {
        self.ensure(a);
        self.ensure(b);
        let root_a = self.root(a);
        let root_b = self.root(b);
        if root_a != root_b {
            self.parent.insert(root_a, root_b);
        }
    }

    fn nodes(&self) -> Vec<String> {
        self.parent.keys().cloned().collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
