// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::errors::PlanError;
use crate::plan::Plan;
use crate::types::StepName;

/// Internal node structure: stores immediate deps and dependents by step index.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Explicit `after` dependencies.
    explicit: Vec<usize>,
    /// Explicit dependencies plus tier-barrier dependencies.
    deps: Vec<usize>,
    /// Steps whose `deps` contain this one.
    dependents: Vec<usize>,
}

/// Validated dependency graph of a [`Plan`].
///
/// Nodes are indexed by the step's declaration index. Edges are the
/// "depends-on" relation, including the implicit barrier edges that tier
/// ordering adds (unless the plan declares its tiers independent).
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    names: Vec<StepName>,
    by_name: HashMap<StepName, usize>,
    nodes: Vec<DagNode>,
    topo_order: Vec<usize>,
}

/// Validate `plan` and build its dependency graph.
///
/// Fails with `UnknownDependency` for a dangling `after` reference and with
/// `CyclicDependency` (naming the steps of the offending strongly connected
/// component) if the graph has a cycle. No partial graph is returned.
pub fn build_graph(plan: &Plan) -> Result<DependencyGraph, PlanError> {
    let steps = plan.steps();
    let names: Vec<StepName> = steps.iter().map(|s| s.name.clone()).collect();
    let by_name: HashMap<StepName, usize> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.clone(), i))
        .collect();

    let mut nodes = vec![DagNode::default(); steps.len()];

    // Explicit edges.
    for step in steps {
        for dep in &step.after {
            let dep_idx = *by_name.get(dep).ok_or_else(|| PlanError::UnknownDependency {
                step: step.name.clone(),
                missing: dep.clone(),
            })?;
            nodes[step.index].explicit.push(dep_idx);
        }
    }

    // Tier barrier edges: every step waits for all steps of the nearest
    // preceding non-empty tier, which transitively covers all earlier tiers.
    let barrier = if plan.settings().independent_tiers {
        vec![Vec::new(); steps.len()]
    } else {
        barrier_dependencies(plan)
    };

    for (i, node) in nodes.iter_mut().enumerate() {
        let mut seen = HashSet::new();
        node.deps = node
            .explicit
            .iter()
            .chain(barrier[i].iter())
            .copied()
            .filter(|d| seen.insert(*d))
            .collect();
    }

    for i in 0..nodes.len() {
        let deps = nodes[i].deps.clone();
        for dep in deps {
            nodes[dep].dependents.push(i);
        }
    }

    let topo_order = topological_order(&names, &nodes)?;

    debug!(
        plan = %plan.name(),
        steps = names.len(),
        "dependency graph built"
    );

    Ok(DependencyGraph {
        names,
        by_name,
        nodes,
        topo_order,
    })
}

fn barrier_dependencies(plan: &Plan) -> Vec<Vec<usize>> {
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); plan.tiers().len()];
    for step in plan.steps() {
        if let Some(rank) = plan.tier_rank(&step.tier) {
            members[rank].push(step.index);
        }
    }

    plan.steps()
        .iter()
        .map(|step| {
            let rank = plan.tier_rank(&step.tier).unwrap_or(0);
            members[..rank]
                .iter()
                .rev()
                .find(|m| !m.is_empty())
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

fn topological_order(names: &[StepName], nodes: &[DagNode]) -> Result<Vec<usize>, PlanError> {
    // Edge direction: dep -> step.
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(nodes.len(), 0);
    let idx: Vec<NodeIndex> = (0..nodes.len()).map(|i| graph.add_node(i)).collect();

    for (i, node) in nodes.iter().enumerate() {
        for &dep in &node.deps {
            graph.add_edge(idx[dep], idx[i], ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|n| graph[n]).collect()),
        Err(cycle) => {
            let start = cycle.node_id();
            let mut members: Vec<usize> = tarjan_scc(&graph)
                .into_iter()
                .find(|scc| scc.contains(&start))
                .unwrap_or_else(|| vec![start])
                .into_iter()
                .map(|n| graph[n])
                .collect();
            members.sort_unstable();
            Err(PlanError::CyclicDependency {
                steps: members.into_iter().map(|i| names[i].clone()).collect(),
            })
        }
    }
}

impl DependencyGraph {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Step names in declaration order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|s| s.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> &str {
        &self.names[index]
    }

    /// Effective dependencies (explicit + tier barrier) of a step.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .map(|i| self.nodes[i].deps.iter().map(|&d| self.name_of(d)).collect())
            .unwrap_or_default()
    }

    /// Only the dependencies listed in the step's `after`.
    pub fn explicit_dependencies_of(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .map(|i| {
                self.nodes[i]
                    .explicit
                    .iter()
                    .map(|&d| self.name_of(d))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Immediate dependents of a step.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .map(|i| {
                self.nodes[i]
                    .dependents
                    .iter()
                    .map(|&d| self.name_of(d))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Steps with no effective dependencies.
    pub fn roots(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.deps.is_empty())
            .map(|(i, _)| self.name_of(i))
            .collect()
    }

    /// A valid linearization: every step comes after all its dependencies.
    pub fn topological_order(&self) -> Vec<&str> {
        self.topo_order.iter().map(|&i| self.name_of(i)).collect()
    }

    pub(crate) fn deps_idx(&self, index: usize) -> &[usize] {
        &self.nodes[index].deps
    }

    pub(crate) fn topo_idx(&self) -> &[usize] {
        &self.topo_order
    }

    /// Every step that transitively depends on `index`.
    pub(crate) fn transitive_dependents(&self, index: usize) -> Vec<usize> {
        let mut stack: Vec<usize> = self.nodes[index].dependents.clone();
        let mut visited = HashSet::new();
        let mut out = Vec::new();

        while let Some(i) = stack.pop() {
            if !visited.insert(i) {
                continue;
            }
            out.push(i);
            stack.extend(self.nodes[i].dependents.iter().copied());
        }

        out.sort_unstable();
        out
    }
}
