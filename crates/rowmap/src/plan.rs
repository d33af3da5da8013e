//! Join plan: the tree of tables a joined SELECT reads and a row is rebuilt
//! from.

use std::sync::Arc;

use crate::descriptor::{Attribute, Role};
use crate::dialect::Name;
use crate::error::{Error, Result};
use crate::metadata::ClassMetadata;

/// Deepest relation hop followed from the root entity.
pub const MAX_JOIN_DEPTH: usize = 4;

pub(crate) struct Node {
    pub(crate) meta: Arc<ClassMetadata>,
    /// Table alias qualifying this node's columns.
    pub(crate) alias: Name,
    pub(crate) edge: Option<Edge>,
    depth: usize,
}

pub(crate) struct Edge {
    pub(crate) parent: usize,
    pub(crate) attribute: Arc<Attribute>,
}

/// Nodes in pre-order: every parent precedes its children.
pub(crate) struct Plan {
    pub(crate) nodes: Vec<Node>,
}

impl Plan {
    /// The root entity alone.
    pub(crate) fn root(meta: &Arc<ClassMetadata>) -> Self {
        Self {
            nodes: vec![Node {
                meta: Arc::clone(meta),
                alias: meta.table().clone(),
                edge: None,
                depth: 0,
            }],
        }
    }

    /// The root entity and every relation reachable within
    /// [`MAX_JOIN_DEPTH`] hops. The self-join is followed from the root only
    /// and its node is not expanded further.
    pub(crate) fn joined(meta: &Arc<ClassMetadata>) -> Result<Self> {
        let mut plan = Self::root(meta);
        plan.expand(0)?;
        Ok(plan)
    }

    fn expand(&mut self, index: usize) -> Result<()> {
        let meta = Arc::clone(&self.nodes[index].meta);
        let depth = self.nodes[index].depth;
        if depth >= MAX_JOIN_DEPTH {
            return Ok(());
        }

        for attribute in meta.attributes().iter().filter(|attribute| attribute.is_relation()) {
            let self_join = attribute.role() == Role::SelfJoin;
            if self_join && index != 0 {
                continue;
            }
            let Some(relation) = attribute.relation() else {
                continue;
            };
            let target = relation.target()?;
            let alias = relation.alias().cloned().unwrap_or_else(|| {
                if self_join { Name::parse(attribute.member()) } else { target.table().clone() }
            });

            if let Some(existing) = self.position(&alias) {
                let cycle = self.nodes[existing].meta.type_id() == target.type_id()
                    && self.is_ancestor(existing, index);
                if cycle {
                    tracing::trace!(
                        entity = meta.type_name(),
                        member = attribute.member(),
                        "relation leads back to an enclosing table; not joined"
                    );
                    continue;
                }
                return Err(Error::config(format!(
                    "ambiguous table '{alias}' for {}.{}; give the relation its own table alias",
                    meta.type_name(),
                    attribute.member()
                )));
            }

            self.nodes.push(Node {
                meta: target,
                alias,
                edge: Some(Edge {
                    parent: index,
                    attribute: Arc::clone(attribute),
                }),
                depth: depth + 1,
            });
            if !self_join {
                self.expand(self.nodes.len() - 1)?;
            }
        }
        Ok(())
    }

    fn position(&self, alias: &Name) -> Option<usize> {
        self.nodes.iter().position(|node| node.alias.matches(alias.as_str()))
    }

    fn is_ancestor(&self, candidate: usize, mut index: usize) -> bool {
        loop {
            if index == candidate {
                return true;
            }
            match &self.nodes[index].edge {
                Some(edge) => index = edge.parent,
                None => return false,
            }
        }
    }

    /// Alias qualifying `attribute` of node `index`. Root attributes owned by
    /// a sub-table are qualified by that table.
    pub(crate) fn qualifier<'a>(&'a self, index: usize, attribute: &'a Attribute) -> &'a Name {
        match attribute.table() {
            Some(table) if index == 0 => table,
            _ => &self.nodes[index].alias,
        }
    }

    /// Attributes of node `index` that carry a column in the result.
    pub(crate) fn columns(&self, index: usize) -> impl Iterator<Item = &Arc<Attribute>> {
        self.nodes[index]
            .meta
            .selectable()
            .filter(move |attribute| index == 0 || attribute.table().is_none())
    }
}
