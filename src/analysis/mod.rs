pub mod advisor;
pub mod aggregate;
pub mod topology;

use crate::config::Thresholds;
use crate::models::{AnalysisReport, RelationFact};

/// Runs the full in-process pipeline over one catalog snapshot: rebuild the
/// forest, roll up per-parent statistics, then attach assessments to both.
/// Pure and deterministic — the same facts always yield the same report.
pub fn analyze_snapshot(facts: &[RelationFact], thresholds: &Thresholds) -> AnalysisReport {
    let mut forest = topology::build_forest(facts, thresholds.max_depth);
    let mut aggregates = aggregate::aggregate_forest(&forest, thresholds);

    advisor::assess_forest(&mut forest, thresholds);
    advisor::assess_aggregates(&mut aggregates, thresholds);

    AnalysisReport {
        database: String::new(),
        relation_count: facts.len(),
        roots: forest.roots,
        parent_aggregates: aggregates,
        structural_issues: forest.issues,
    }
}
