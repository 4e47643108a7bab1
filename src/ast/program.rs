//! A parsed program: document metadata plus the top-level block chains.

use crate::ast::{NodeRef, Phrase};
use crate::diagnostics::Severity;
use crate::errors::Result;

/// One top-level chain placed on the editor canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub x: i64,
    pub y: i64,
    /// Always a `StmtList` node.
    pub body: NodeRef,
}

impl Instance {
    pub fn statements(&self) -> &[NodeRef] {
        match self.body.phrase() {
            Phrase::StmtList(list) => &list.statements,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub format_version: String,
    pub description: String,
    pub tags: Vec<String>,
    pub instances: Vec<Instance>,
}

impl Program {
    /// Visits every node in pre-order, ignoring `disabled` and `in_task`.
    pub fn walk<F>(&self, mut f: F)
    where
        F: FnMut(&NodeRef),
    {
        fn go<F: FnMut(&NodeRef)>(node: &NodeRef, f: &mut F) {
            f(node);
            for child in node.children() {
                go(child, f);
            }
        }
        for instance in &self.instances {
            go(&instance.body, &mut f);
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(|_| count += 1);
        count
    }

    pub fn find_block(&self, block_id: &str) -> Option<NodeRef> {
        let mut found = None;
        self.walk(|node| {
            if found.is_none() && node.block_id() == Some(block_id) {
                found = Some(node.clone());
            }
        });
        found
    }

    /// Highest severity attached to any node of the tree.
    pub fn max_severity(&self) -> Option<Severity> {
        let mut max = None;
        self.walk(|node| {
            for diagnostic in node.diagnostics() {
                max = max.max(Some(diagnostic.severity));
            }
        });
        max
    }

    /// Dedicated copy whose nodes own fresh diagnostic lists.
    pub fn deep_copy(&self) -> Result<Program> {
        let instances = self
            .instances
            .iter()
            .map(|instance| {
                Ok(Instance {
                    x: instance.x,
                    y: instance.y,
                    body: instance.body.deep_copy()?,
                })
            })
            .collect::<Result<_>>()?;
        Ok(Program {
            format_version: self.format_version.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            instances,
        })
    }
}
