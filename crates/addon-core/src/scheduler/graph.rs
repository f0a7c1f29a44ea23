//! Prerequisite graph and topological ordering.
//!
//! Edges point from dependent to prerequisite: if `backstage` depends on
//! `ebs-csi-driver`, the edge is `backstage -> ebs-csi-driver`. Ordering is
//! prerequisite-first, and among add-ons that become ready at the same time
//! the one declared first comes first.
//!
//! # Example
//!
//! ```
//! use addon_core::{AddOnDescriptor, ChartSpec};
//! use addon_core::scheduler::DependencyGraph;
//!
//! let addons = vec![
//!     AddOnDescriptor::new("backstage", ChartSpec::new("backstage"))
//!         .with_prerequisites(["ebs-csi-driver"]),
//!     AddOnDescriptor::new("ebs-csi-driver", ChartSpec::new("aws-ebs-csi-driver")),
//! ];
//!
//! let graph = DependencyGraph::build(&addons).unwrap();
//! let plan = graph.plan().unwrap();
//! assert_eq!(plan.names(), vec!["ebs-csi-driver", "backstage"]);
//! ```

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use serde::Serialize;

use crate::descriptor::AddOnDescriptor;
use crate::error::{Error, Result};

/// Directed acyclic graph of add-on prerequisites, indexed by declaration
/// position.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    /// `prerequisites[i]`: declaration indices `i` waits for
    prerequisites: Vec<Vec<usize>>,
    /// `dependents[i]`: declaration indices waiting for `i`
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph, resolving every prerequisite name against the
    /// declared add-ons.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateAddOn`] if a name is declared twice
    /// - [`Error::UnresolvedDependency`] for the first prerequisite that
    ///   names no declared add-on
    pub fn build(addons: &[AddOnDescriptor]) -> Result<Self> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(addons.len());
        for (i, addon) in addons.iter().enumerate() {
            if index.insert(addon.name.as_str(), i).is_some() {
                return Err(Error::DuplicateAddOn {
                    name: addon.name.clone(),
                });
            }
        }

        let mut prerequisites = vec![Vec::new(); addons.len()];
        let mut dependents = vec![Vec::new(); addons.len()];

        for (i, addon) in addons.iter().enumerate() {
            for prerequisite in &addon.prerequisites {
                let Some(&j) = index.get(prerequisite.as_str()) else {
                    return Err(Error::UnresolvedDependency {
                        addon: addon.name.clone(),
                        prerequisite: prerequisite.clone(),
                    });
                };
                if !prerequisites[i].contains(&j) {
                    prerequisites[i].push(j);
                    dependents[j].push(i);
                }
            }
        }

        Ok(Self {
            names: addons.iter().map(|a| a.name.clone()).collect(),
            prerequisites,
            dependents,
        })
    }

    /// Return the number of nodes.
    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// Return the number of edges.
    pub fn edge_count(&self) -> usize {
        self.prerequisites.iter().map(Vec::len).sum()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    /// Declaration indices `index` directly depends on.
    pub fn prerequisites_of(&self, index: usize) -> &[usize] {
        &self.prerequisites[index]
    }

    /// Declaration indices that directly depend on `index`.
    pub fn dependents_of(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// Every add-on that depends on `index` directly or indirectly, in
    /// declaration order.
    pub fn transitive_dependents(&self, index: usize) -> Vec<usize> {
        let mut seen = vec![false; self.names.len()];
        let mut stack = self.dependents[index].clone();
        while let Some(current) = stack.pop() {
            if !seen[current] {
                seen[current] = true;
                stack.extend_from_slice(&self.dependents[current]);
            }
        }
        (0..self.names.len()).filter(|&i| seen[i]).collect()
    }

    /// Topological sort using Kahn's algorithm.
    ///
    /// Returns declaration indices, prerequisites first. Ties go to the
    /// lower declaration index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyCycle`] naming the add-ons on one cycle.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let mut in_degree: Vec<usize> = self.prerequisites.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(Reverse(current)) = ready.pop() {
            order.push(current);
            for &dependent in &self.dependents[current] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() != self.names.len() {
            let mut sorted = vec![false; self.names.len()];
            for &i in &order {
                sorted[i] = true;
            }
            return Err(Error::DependencyCycle {
                participants: self.find_cycle(&sorted),
            });
        }

        Ok(order)
    }

    /// Walk unsorted prerequisites from the first unsorted node until a node
    /// repeats. Every node Kahn could not sort has an unsorted prerequisite,
    /// so the walk always closes a cycle.
    fn find_cycle(&self, sorted: &[bool]) -> Vec<String> {
        let Some(start) = sorted.iter().position(|s| !s) else {
            return Vec::new();
        };

        let mut path: Vec<usize> = vec![start];
        let mut current = start;
        loop {
            let Some(&next) = self.prerequisites[current].iter().find(|&&p| !sorted[p]) else {
                break;
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|&i| self.names[i].clone()).collect();
                cycle.push(self.names[next].clone());
                return cycle;
            }
            path.push(next);
            current = next;
        }

        path.iter().map(|&i| self.names[i].clone()).collect()
    }

    /// Validated deployment plan.
    pub fn plan(&self) -> Result<DeploymentPlan> {
        let order = self.topological_order()?;
        let entries = order
            .into_iter()
            .map(|i| PlanEntry {
                name: self.names[i].clone(),
                prerequisites: self.prerequisites[i]
                    .iter()
                    .map(|&p| self.names[p].clone())
                    .collect(),
            })
            .collect();
        Ok(DeploymentPlan { entries })
    }
}

/// One add-on in a [`DeploymentPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub name: String,
    pub prerequisites: Vec<String>,
}

/// Add-ons in an order that respects every prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeploymentPlan {
    pub entries: Vec<PlanEntry>,
}

impl DeploymentPlan {
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Group entries into waves: everything in a wave only depends on
    /// earlier waves, so a wave's members could deploy concurrently.
    pub fn waves(&self) -> Vec<Vec<&str>> {
        let mut wave_of: HashMap<&str, usize> = HashMap::with_capacity(self.entries.len());
        let mut waves: Vec<Vec<&str>> = Vec::new();

        for entry in &self.entries {
            let wave = entry
                .prerequisites
                .iter()
                .filter_map(|p| wave_of.get(p.as_str()))
                .map(|w| w + 1)
                .max()
                .unwrap_or(0);
            wave_of.insert(entry.name.as_str(), wave);
            if waves.len() <= wave {
                waves.resize_with(wave + 1, Vec::new);
            }
            waves[wave].push(entry.name.as_str());
        }
        waves
    }
}
