use super::advisor::classify_strategy;
use crate::models::{NodeRole, PartitionNode, RelationFact, StructuralIssue};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// The reconstructed partition hierarchies plus every structural anomaly
/// encountered while rebuilding them.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    pub roots: Vec<PartitionNode>,
    pub issues: Vec<StructuralIssue>,
}

/// Rebuilds the partition forest from the flat parent/child facts.
///
/// Roots come out in input order, children in input order under each parent,
/// so two runs over the same snapshot produce identical trees. Malformed
/// catalogs never abort the build: a child pointing at a missing parent is
/// attached as its own synthetic root, and any branch deeper than
/// `max_depth` is cut off with a truncation flag instead of recursing.
pub fn build_forest(facts: &[RelationFact], max_depth: usize) -> Forest {
    let by_name: HashMap<String, &RelationFact> = facts
        .iter()
        .map(|fact| (fact.qualified_name(), fact))
        .collect();

    let mut children_of: HashMap<&str, Vec<&RelationFact>> = HashMap::new();
    for fact in facts {
        if let Some(parent) = fact.parent.as_deref() {
            children_of.entry(parent).or_default().push(fact);
        }
    }

    let mut forest = Forest::default();
    let mut visited: HashSet<String> = HashSet::new();

    // True roots: parentless partitioned tables.
    for fact in facts {
        if fact.parent.is_none() && fact.is_partitioned_parent {
            let node = expand(fact, 0, &[], &children_of, max_depth, &mut forest.issues, &mut visited);
            forest.roots.push(node);
        }
    }

    // Orphans: children whose declared parent is absent from the snapshot.
    // They become synthetic roots so no fact silently disappears.
    for fact in facts {
        let Some(parent) = fact.parent.as_deref() else {
            continue;
        };
        if by_name.contains_key(parent) {
            continue;
        }
        let child = fact.qualified_name();
        warn!("Partition {child} references missing parent {parent}");
        forest.issues.push(StructuralIssue::Orphan {
            child: child.clone(),
            missing_parent: parent.to_string(),
        });
        let mut node = expand(fact, 0, &[], &children_of, max_depth, &mut forest.issues, &mut visited);
        node.synthetic_root = true;
        forest.roots.push(node);
    }

    // Anything still unvisited sits on a parent/child cycle with no entry
    // point. Surface it as a synthetic root; the depth guard stops the loop.
    for fact in facts {
        let name = fact.qualified_name();
        if visited.contains(&name) || fact.parent.is_none() {
            continue;
        }
        warn!("Partition {name} is unreachable from any root, likely a catalog cycle");
        let mut node = expand(fact, 0, &[], &children_of, max_depth, &mut forest.issues, &mut visited);
        node.synthetic_root = true;
        forest.roots.push(node);
    }

    forest
}

fn expand(
    fact: &RelationFact,
    depth: usize,
    ancestors: &[String],
    children_of: &HashMap<&str, Vec<&RelationFact>>,
    max_depth: usize,
    issues: &mut Vec<StructuralIssue>,
    visited: &mut HashSet<String>,
) -> PartitionNode {
    let name = fact.qualified_name();
    visited.insert(name.clone());

    let mut path = ancestors.to_vec();
    path.push(name.clone());

    let child_facts = children_of.get(name.as_str());
    let has_children = child_facts.map_or(false, |c| !c.is_empty());

    // Depth guard: flag and stop instead of expanding further.
    let truncated = has_children && depth >= max_depth;
    if truncated {
        issues.push(StructuralIssue::Truncated {
            node: name.clone(),
            depth,
        });
    }

    let children: Vec<PartitionNode> = if has_children && !truncated {
        child_facts
            .map(|kids| {
                kids.iter()
                    .map(|kid| {
                        expand(kid, depth + 1, &path, children_of, max_depth, issues, visited)
                    })
                    .collect()
            })
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let role = if depth == 0 {
        NodeRole::Root
    } else if has_children {
        NodeRole::Intermediate
    } else {
        NodeRole::Leaf
    };

    PartitionNode {
        strategy: classify_strategy(fact.partition_bound.as_deref()),
        fact: fact.clone(),
        depth,
        path,
        role,
        truncated,
        synthetic_root: false,
        children,
        assessments: Vec::new(),
    }
}
