//! Index-based view of a manifest.
//!
//! Targets and products refer to each other by name in the manifest. Here the
//! names are interned once into dense ids so closure walks never touch
//! strings.

use std::collections::HashMap;

use crate::error::{ManifestError, Result};
use crate::manifest::{Manifest, Product, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

#[derive(Debug)]
pub struct ManifestGraph<'m> {
    manifest: &'m Manifest,
    ids: HashMap<&'m str, TargetId>,
    edges: Vec<Vec<TargetId>>,
    roots: Vec<Vec<TargetId>>,
}

impl<'m> ManifestGraph<'m> {
    /// Interns every target and product reference and rejects unknown names
    /// and cycles. Target names are assumed unique.
    pub fn build(manifest: &'m Manifest) -> Result<Self> {
        let ids: HashMap<&str, TargetId> = manifest
            .targets
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), TargetId(i)))
            .collect();

        let lookup = |from: &str, name: &str| {
            ids.get(name)
                .copied()
                .ok_or_else(|| ManifestError::UnresolvedDependency {
                    from: from.to_string(),
                    missing: name.to_string(),
                })
        };

        let edges = manifest
            .targets
            .iter()
            .map(|t| {
                t.dependencies
                    .iter()
                    .map(|dep| lookup(&t.name, dep))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let roots = manifest
            .products
            .iter()
            .map(|p| {
                p.targets
                    .iter()
                    .map(|name| lookup(&p.name, name))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let graph = Self {
            manifest,
            ids,
            edges,
            roots,
        };

        // Walking from every target visits the whole graph, so any cycle shows up here.
        graph.post_order((0..graph.len()).map(TargetId))?;

        Ok(graph)
    }

    pub fn manifest(&self) -> &'m Manifest {
        self.manifest
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<TargetId> {
        self.ids.get(name).copied()
    }

    pub fn target(&self, id: TargetId) -> &'m Target {
        &self.manifest.targets[id.0]
    }

    pub fn dependencies(&self, id: TargetId) -> &[TargetId] {
        &self.edges[id.0]
    }

    /// Products paired with their interned root targets, in declaration order.
    pub fn products(&self) -> impl Iterator<Item = (&'m Product, &[TargetId])> + '_ {
        self.manifest
            .products
            .iter()
            .zip(self.roots.iter().map(Vec::as_slice))
    }

    /// Transitive closure of `roots`, flattened so that every dependency
    /// precedes its dependents.
    pub fn closure(&self, roots: &[TargetId]) -> Result<Vec<TargetId>> {
        self.post_order(roots.iter().copied())
    }

    /// Depth-first post-order, visiting dependencies in declaration order.
    /// Targets reachable from several roots are emitted once.
    fn post_order(&self, roots: impl IntoIterator<Item = TargetId>) -> Result<Vec<TargetId>> {
        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut order = Vec::new();

        for root in roots {
            if marks[root.0] != Mark::Unvisited {
                continue;
            }

            marks[root.0] = Mark::InProgress;
            let mut stack = vec![(root, 0usize)];

            while let Some(frame) = stack.last_mut() {
                let (node, cursor) = *frame;
                frame.1 += 1;

                match self.edges[node.0].get(cursor).copied() {
                    Some(dep) => match marks[dep.0] {
                        Mark::Unvisited => {
                            marks[dep.0] = Mark::InProgress;
                            stack.push((dep, 0));
                        }
                        Mark::InProgress => return Err(self.cycle_error(&stack, dep)),
                        Mark::Done => {}
                    },
                    None => {
                        marks[node.0] = Mark::Done;
                        order.push(node);
                        stack.pop();
                    }
                }
            }
        }

        Ok(order)
    }

    fn cycle_error(&self, stack: &[(TargetId, usize)], back_edge: TargetId) -> ManifestError {
        let start = stack
            .iter()
            .position(|(id, _)| *id == back_edge)
            .unwrap_or(0);

        let cycle = stack[start..]
            .iter()
            .map(|(id, _)| *id)
            .chain(std::iter::once(back_edge))
            .map(|id| self.target(id).name.clone())
            .collect();

        ManifestError::CyclicDependency { cycle }
    }
}
