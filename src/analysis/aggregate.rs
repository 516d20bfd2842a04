use super::topology::Forest;
use crate::config::Thresholds;
use crate::models::{ParentAggregate, PartitionNode, RelationFact};

/// Computes one [`ParentAggregate`] per root, in root order.
///
/// Size statistics cover the root's immediate children only, which is the
/// level operators reason about when judging a single table's partitioning.
/// The maintenance counters walk every leaf descendant, since leaves are
/// where rows actually live. An empty parent yields undefined averages
/// rather than a division failure.
pub fn aggregate_forest(forest: &Forest, thresholds: &Thresholds) -> Vec<ParentAggregate> {
    forest
        .roots
        .iter()
        // Synthetic roots for orphaned leaves are surfaced in the tree and
        // the issue list; they are not partitioned tables to aggregate.
        .filter(|root| root.fact.is_partitioned_parent || !root.children.is_empty())
        .map(|root| aggregate_root(root, thresholds))
        .collect()
}

fn aggregate_root(root: &PartitionNode, thresholds: &Thresholds) -> ParentAggregate {
    let sizes: Vec<i64> = root
        .children
        .iter()
        .map(|child| child.fact.total_size_bytes)
        .collect();
    let partition_count = sizes.len();

    let total_size_bytes: i64 = sizes.iter().sum();
    let total_rows: i64 = root
        .children
        .iter()
        .map(|child| child.fact.live_tuples)
        .sum();

    let (avg_size_bytes, size_stddev, avg_rows_per_partition) = if partition_count == 0 {
        (None, None, None)
    } else {
        let avg = total_size_bytes as f64 / partition_count as f64;
        (
            Some(avg),
            Some(population_stddev(&sizes, avg)),
            Some(total_rows as f64 / partition_count as f64),
        )
    };

    let mut leaves = Vec::new();
    collect_leaves(root, &mut leaves);

    let empty_partitions = leaves.iter().filter(|f| f.live_tuples == 0).count();
    let small_partitions = leaves
        .iter()
        .filter(|f| is_small(f, thresholds))
        .count();
    let partitions_needing_vacuum = leaves
        .iter()
        .filter(|f| needs_vacuum(f, thresholds))
        .count();
    let partitions_needing_analyze = leaves
        .iter()
        .filter(|f| needs_analyze(f, thresholds))
        .count();

    ParentAggregate {
        parent: root.fact.qualified_name(),
        partition_count,
        total_size_bytes,
        avg_size_bytes,
        min_size_bytes: sizes.iter().copied().min(),
        max_size_bytes: sizes.iter().copied().max(),
        size_stddev,
        total_rows,
        avg_rows_per_partition,
        empty_partitions,
        small_partitions,
        partitions_needing_vacuum,
        partitions_needing_analyze,
        assessments: Vec::new(),
    }
}

fn collect_leaves<'a>(node: &'a PartitionNode, out: &mut Vec<&'a RelationFact>) {
    if node.children.is_empty() && node.depth > 0 {
        out.push(&node.fact);
        return;
    }
    for child in &node.children {
        collect_leaves(child, out);
    }
}

fn population_stddev(values: &[i64], mean: f64) -> f64 {
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

pub(super) fn is_small(fact: &RelationFact, thresholds: &Thresholds) -> bool {
    fact.total_size_bytes < thresholds.small_size_bytes
        && fact.live_tuples < thresholds.small_row_floor
}

pub(super) fn needs_vacuum(fact: &RelationFact, thresholds: &Thresholds) -> bool {
    fact.live_tuples > thresholds.maintenance_row_floor
        && fact
            .seconds_since_last_vacuum
            .map(|secs| secs > thresholds.stale_maintenance_secs)
            .unwrap_or(true)
}

pub(super) fn needs_analyze(fact: &RelationFact, thresholds: &Thresholds) -> bool {
    fact.live_tuples > thresholds.maintenance_row_floor
        && fact
            .seconds_since_last_analyze
            .map(|secs| secs > thresholds.stale_maintenance_secs)
            .unwrap_or(true)
}

/// Share of table scans that went sequential; `None` when the partition has
/// never been scanned at all.
pub(super) fn seq_scan_share(fact: &RelationFact) -> Option<f64> {
    let total = fact.seq_scan + fact.idx_scan;
    if total == 0 {
        None
    } else {
        Some(fact.seq_scan as f64 / total as f64)
    }
}
