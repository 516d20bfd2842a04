use super::aggregate::{is_small, needs_analyze, needs_vacuum, seq_scan_share};
use super::topology::Forest;
use crate::config::Thresholds;
use crate::models::{
    Assessment, AssessmentCategory, ParentAggregate, PartitionNode, PartitionStrategy,
    RelationFact, Severity,
};

/// One row of the per-partition rule table.
struct PartitionRule {
    category: AssessmentCategory,
    severity: Severity,
    applies: fn(&RelationFact, &Thresholds) -> bool,
    message: fn(&RelationFact) -> String,
    remediation: Option<&'static str>,
}

/// The per-partition rule table, in priority order. Every matching rule
/// emits; the first match is the partition's primary finding. The
/// seq-vs-idx rule is a structural heuristic only — it does not consult
/// real query plans, so treat it as a pointer, not a verdict.
const PARTITION_RULES: &[PartitionRule] = &[
    PartitionRule {
        category: AssessmentCategory::MissingIndexSuspect,
        severity: Severity::Warning,
        applies: |f, t| f.seq_scan > f.idx_scan && f.live_tuples > t.seq_scan_row_floor,
        message: |f| {
            let share = seq_scan_share(f)
                .map(|s| format!("{:.0}%", s * 100.0))
                .unwrap_or_else(|| "all".into());
            format!(
                "{} sequential scans vs {} index scans ({} of scans sequential) on ~{} rows",
                f.seq_scan,
                f.idx_scan,
                share,
                f.live_tuples
            )
        },
        remediation: Some(
            "Check pg_stat_statements for the queries hitting this partition and consider \
             an index covering their predicates; confirm with EXPLAIN before acting",
        ),
    },
    PartitionRule {
        category: AssessmentCategory::EmptyCandidate,
        severity: Severity::Info,
        applies: |f, _| f.live_tuples == 0,
        message: |_| "Partition holds no live rows".into(),
        remediation: Some("Detach or drop the partition if its data window has passed"),
    },
    PartitionRule {
        category: AssessmentCategory::ConsolidationCandidate,
        severity: Severity::Info,
        applies: |f, t| is_small(f, t),
        message: |f| {
            format!(
                "Partition is tiny ({} bytes, ~{} rows); per-partition overhead may outweigh it",
                f.total_size_bytes, f.live_tuples
            )
        },
        remediation: Some("Consider merging adjacent small partitions or widening the bounds"),
    },
    PartitionRule {
        category: AssessmentCategory::VacuumOverdue,
        severity: Severity::Warning,
        applies: needs_vacuum,
        message: |f| {
            format!(
                "Last vacuum {} on a partition with ~{} rows",
                f.last_vacuum.as_deref().unwrap_or("never recorded"),
                f.live_tuples
            )
        },
        remediation: Some("Schedule a VACUUM or tighten autovacuum thresholds for this partition"),
    },
    PartitionRule {
        category: AssessmentCategory::AnalyzeOverdue,
        severity: Severity::Warning,
        applies: needs_analyze,
        message: |f| {
            format!(
                "Last analyze {} on a partition with ~{} rows",
                f.last_analyze.as_deref().unwrap_or("never recorded"),
                f.live_tuples
            )
        },
        remediation: Some("Run ANALYZE so the planner sees current row distribution"),
    },
];

/// Evaluates the per-partition rule table against one partition's facts.
///
/// Partitioned parents hold no rows themselves; their health is judged at
/// the aggregate level, so they always come back NORMAL here.
pub fn assess_partition(fact: &RelationFact, thresholds: &Thresholds) -> Vec<Assessment> {
    let mut findings = Vec::new();

    if !fact.is_partitioned_parent {
        for rule in PARTITION_RULES {
            if (rule.applies)(fact, thresholds) {
                findings.push(Assessment {
                    category: rule.category,
                    severity: rule.severity,
                    message: (rule.message)(fact),
                    remediation: rule.remediation.map(str::to_owned),
                });
            }
        }
    }

    if findings.is_empty() {
        findings.push(Assessment {
            category: AssessmentCategory::Normal,
            severity: Severity::Ok,
            message: "No issues detected".into(),
            remediation: None,
        });
    }

    findings
}

/// Per-parent rules, evaluated in order; unlike the partition table, every
/// applicable rule emits its own assessment.
const PARENT_RULES: &[fn(&ParentAggregate, &Thresholds) -> Option<Assessment>] = &[
    variance_rule,
    planning_overhead_rule,
    single_partition_rule,
    cleanup_rule,
    strategy_review_rule,
    maintenance_schedule_rule,
];

pub fn assess_parent(agg: &ParentAggregate, thresholds: &Thresholds) -> Vec<Assessment> {
    PARENT_RULES
        .iter()
        .filter_map(|rule| rule(agg, thresholds))
        .collect()
}

fn variance_rule(agg: &ParentAggregate, thresholds: &Thresholds) -> Option<Assessment> {
    let avg = agg.avg_size_bytes?;
    let stddev = agg.size_stddev?;
    if avg <= 0.0 {
        return None;
    }

    let ratio = stddev / avg;
    let (category, severity, verdict) = if ratio > thresholds.high_variance_ratio {
        (
            AssessmentCategory::HighVariance,
            Severity::Warning,
            "highly uneven",
        )
    } else if ratio > thresholds.moderate_variance_ratio {
        (
            AssessmentCategory::ModerateVariance,
            Severity::Info,
            "moderately uneven",
        )
    } else {
        (AssessmentCategory::LowVariance, Severity::Ok, "even")
    };

    Some(Assessment {
        category,
        severity,
        message: format!(
            "Partition sizes under {} are {} (stddev {:.0} bytes, {:.0}% of the {:.0}-byte average)",
            agg.parent,
            verdict,
            stddev,
            ratio * 100.0,
            avg
        ),
        remediation: match category {
            AssessmentCategory::HighVariance => Some(
                "Revisit the partition key or bounds; skewed partitions defeat pruning \
                 and concentrate maintenance cost"
                    .into(),
            ),
            _ => None,
        },
    })
}

fn planning_overhead_rule(agg: &ParentAggregate, thresholds: &Thresholds) -> Option<Assessment> {
    if agg.partition_count <= thresholds.max_partition_count {
        return None;
    }
    Some(Assessment {
        category: AssessmentCategory::PlanningOverheadRisk,
        severity: Severity::Warning,
        message: format!(
            "{} has {} direct partitions; planning and locking overhead grows with each one",
            agg.parent, agg.partition_count
        ),
        remediation: Some(
            "Consider coarser bounds or archiving old partitions to keep the set small".into(),
        ),
    })
}

fn single_partition_rule(agg: &ParentAggregate, thresholds: &Thresholds) -> Option<Assessment> {
    let _ = thresholds;
    if agg.partition_count >= 2 {
        return None;
    }
    Some(Assessment {
        category: AssessmentCategory::SinglePartition,
        severity: Severity::Info,
        message: format!(
            "{} has {} partition(s); partitioning adds overhead without pruning benefit here",
            agg.parent, agg.partition_count
        ),
        remediation: None,
    })
}

fn cleanup_rule(agg: &ParentAggregate, thresholds: &Thresholds) -> Option<Assessment> {
    if agg.empty_partitions <= thresholds.empty_partition_limit {
        return None;
    }
    Some(Assessment {
        category: AssessmentCategory::CleanupRecommended,
        severity: Severity::Warning,
        message: format!(
            "{} of {} partitions under {} are empty",
            agg.empty_partitions, agg.partition_count, agg.parent
        ),
        remediation: Some("Drop or detach the empty partitions to trim catalog overhead".into()),
    })
}

fn strategy_review_rule(agg: &ParentAggregate, thresholds: &Thresholds) -> Option<Assessment> {
    if agg.partition_count == 0 {
        return None;
    }
    let share = agg.small_partitions as f64 / agg.partition_count as f64;
    if share <= thresholds.small_partition_share {
        return None;
    }
    Some(Assessment {
        category: AssessmentCategory::StrategyReview,
        severity: Severity::Warning,
        message: format!(
            "{:.0}% of partitions under {} are tiny; the partition granularity looks too fine",
            share * 100.0,
            agg.parent
        ),
        remediation: Some("Review the partition strategy and bounds against actual data volume".into()),
    })
}

fn maintenance_schedule_rule(agg: &ParentAggregate, thresholds: &Thresholds) -> Option<Assessment> {
    if agg.partition_count == 0 {
        return None;
    }
    let worst = agg
        .partitions_needing_vacuum
        .max(agg.partitions_needing_analyze);
    let share = worst as f64 / agg.partition_count as f64;
    if share <= thresholds.maintenance_share {
        return None;
    }
    Some(Assessment {
        category: AssessmentCategory::MaintenanceScheduleRecommended,
        severity: Severity::Warning,
        message: format!(
            "{} partitions under {} need vacuum and {} need analyze, out of {}",
            agg.partitions_needing_vacuum,
            agg.parent,
            agg.partitions_needing_analyze,
            agg.partition_count
        ),
        remediation: Some(
            "Set up a rolling VACUUM/ANALYZE schedule; autovacuum is not keeping up with \
             the partition set"
                .into(),
        ),
    })
}

/// Best-effort strategy classification from the raw bound expression.
/// Unclassifiable text (including DEFAULT partitions) maps to OTHER.
pub fn classify_strategy(bound: Option<&str>) -> PartitionStrategy {
    let Some(bound) = bound else {
        return PartitionStrategy::Other;
    };
    let upper = bound.to_uppercase();
    if upper.contains("FOR VALUES FROM") {
        PartitionStrategy::Range
    } else if upper.contains("FOR VALUES IN") {
        PartitionStrategy::List
    } else if upper.contains("FOR VALUES WITH") {
        PartitionStrategy::Hash
    } else {
        PartitionStrategy::Other
    }
}

/// Attaches per-partition assessments to every node of the forest.
pub fn assess_forest(forest: &mut Forest, thresholds: &Thresholds) {
    for root in &mut forest.roots {
        assess_node(root, thresholds);
    }
}

fn assess_node(node: &mut PartitionNode, thresholds: &Thresholds) {
    node.assessments = assess_partition(&node.fact, thresholds);
    for child in &mut node.children {
        assess_node(child, thresholds);
    }
}

/// Attaches per-parent assessments to every aggregate, in place.
pub fn assess_aggregates(aggregates: &mut [ParentAggregate], thresholds: &Thresholds) {
    for agg in aggregates {
        agg.assessments = assess_parent(agg, thresholds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::sized_fact;
    use rstest::rstest;

    const MIB: i64 = 1024 * 1024;

    fn categories(findings: &[Assessment]) -> Vec<AssessmentCategory> {
        findings.iter().map(|a| a.category).collect()
    }

    fn bare_aggregate(partition_count: usize) -> ParentAggregate {
        ParentAggregate {
            parent: "public.events".into(),
            partition_count,
            total_size_bytes: 0,
            avg_size_bytes: None,
            min_size_bytes: None,
            max_size_bytes: None,
            size_stddev: None,
            total_rows: 0,
            avg_rows_per_partition: None,
            empty_partitions: 0,
            small_partitions: 0,
            partitions_needing_vacuum: 0,
            partitions_needing_analyze: 0,
            assessments: Vec::new(),
        }
    }

    #[test]
    fn healthy_partition_is_normal() {
        let mut f = sized_fact("p1", Some("public.events"), 10 * MIB, 5_000);
        f.seconds_since_last_vacuum = Some(86_400.0);
        f.seconds_since_last_analyze = Some(86_400.0);

        let findings = assess_partition(&f, &Thresholds::default());
        assert_eq!(categories(&findings), vec![AssessmentCategory::Normal]);
        assert_eq!(findings[0].severity, Severity::Ok);
    }

    #[test]
    fn empty_tiny_partition_gets_both_empty_and_consolidation() {
        let mut f = sized_fact("p_empty", Some("public.events"), 2 * 1024, 0);
        f.seconds_since_last_vacuum = Some(3_600.0);
        f.seconds_since_last_analyze = Some(3_600.0);

        let findings = assess_partition(&f, &Thresholds::default());
        let cats = categories(&findings);
        assert!(cats.contains(&AssessmentCategory::EmptyCandidate));
        assert!(cats.contains(&AssessmentCategory::ConsolidationCandidate));
        assert!(!cats.contains(&AssessmentCategory::Normal));
    }

    #[test]
    fn seq_scan_dominance_is_primary_over_stale_vacuum() {
        let mut f = sized_fact("p_hot", Some("public.events"), 100 * MIB, 50_000);
        f.seq_scan = 900;
        f.idx_scan = 10;
        f.seconds_since_last_vacuum = Some(30.0 * 86_400.0);
        f.seconds_since_last_analyze = Some(3_600.0);

        let findings = assess_partition(&f, &Thresholds::default());
        // Rule table order: the index suspicion outranks the vacuum finding.
        assert_eq!(findings[0].category, AssessmentCategory::MissingIndexSuspect);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert!(categories(&findings).contains(&AssessmentCategory::VacuumOverdue));
    }

    #[test]
    fn seq_scan_dominance_needs_the_row_floor() {
        let mut f = sized_fact("p_small", Some("public.events"), 10 * MIB, 9_000);
        f.seq_scan = 900;
        f.idx_scan = 10;
        f.seconds_since_last_vacuum = Some(3_600.0);
        f.seconds_since_last_analyze = Some(3_600.0);

        let findings = assess_partition(&f, &Thresholds::default());
        assert!(!categories(&findings).contains(&AssessmentCategory::MissingIndexSuspect));
    }

    #[test]
    fn never_vacuumed_busy_partition_is_overdue() {
        let f = sized_fact("p_never", Some("public.events"), 10 * MIB, 5_000);
        let findings = assess_partition(&f, &Thresholds::default());
        let cats = categories(&findings);
        assert!(cats.contains(&AssessmentCategory::VacuumOverdue));
        assert!(cats.contains(&AssessmentCategory::AnalyzeOverdue));
    }

    #[test]
    fn partitioned_parent_is_judged_only_at_aggregate_level() {
        let mut f = sized_fact("events", None, 0, 0);
        f.is_partitioned_parent = true;
        let findings = assess_partition(&f, &Thresholds::default());
        assert_eq!(categories(&findings), vec![AssessmentCategory::Normal]);
    }

    #[rstest]
    #[case(100.0, 10.0, AssessmentCategory::LowVariance, Severity::Ok)]
    #[case(100.0, 30.0, AssessmentCategory::ModerateVariance, Severity::Info)]
    #[case(100.0, 80.0, AssessmentCategory::HighVariance, Severity::Warning)]
    fn variance_verdict_follows_stddev_over_avg(
        #[case] avg: f64,
        #[case] stddev: f64,
        #[case] expected: AssessmentCategory,
        #[case] severity: Severity,
    ) {
        let mut agg = bare_aggregate(3);
        agg.avg_size_bytes = Some(avg);
        agg.size_stddev = Some(stddev);

        let findings = assess_parent(&agg, &Thresholds::default());
        let verdict = findings
            .iter()
            .find(|a| {
                matches!(
                    a.category,
                    AssessmentCategory::LowVariance
                        | AssessmentCategory::ModerateVariance
                        | AssessmentCategory::HighVariance
                )
            })
            .expect("variance verdict present");
        assert_eq!(verdict.category, expected);
        assert_eq!(verdict.severity, severity);
    }

    #[test]
    fn oversized_partition_set_flags_planning_overhead() {
        let mut agg = bare_aggregate(150);
        agg.avg_size_bytes = Some(MIB as f64);
        agg.size_stddev = Some(0.0);

        let cats = categories(&assess_parent(&agg, &Thresholds::default()));
        assert!(cats.contains(&AssessmentCategory::PlanningOverheadRisk));
        assert!(!cats.contains(&AssessmentCategory::SinglePartition));
    }

    #[test]
    fn lone_partition_is_informational() {
        let cats = categories(&assess_parent(&bare_aggregate(1), &Thresholds::default()));
        assert!(cats.contains(&AssessmentCategory::SinglePartition));
    }

    #[test]
    fn childless_parent_emits_no_variance_verdict() {
        let findings = assess_parent(&bare_aggregate(0), &Thresholds::default());
        let cats = categories(&findings);
        assert!(!cats.contains(&AssessmentCategory::LowVariance));
        assert!(cats.contains(&AssessmentCategory::SinglePartition));
    }

    #[test]
    fn many_empty_partitions_recommend_cleanup() {
        let mut agg = bare_aggregate(20);
        agg.empty_partitions = 6;
        let findings = assess_parent(&agg, &Thresholds::default());
        let cleanup = findings
            .iter()
            .find(|a| a.category == AssessmentCategory::CleanupRecommended)
            .expect("cleanup recommended");
        assert_eq!(cleanup.severity, Severity::Warning);
        assert!(cleanup.remediation.is_some());
    }

    #[rstest]
    #[case(10, 3, false)]
    #[case(10, 4, true)]
    fn small_partition_share_triggers_strategy_review(
        #[case] count: usize,
        #[case] small: usize,
        #[case] expected: bool,
    ) {
        let mut agg = bare_aggregate(count);
        agg.small_partitions = small;
        let cats = categories(&assess_parent(&agg, &Thresholds::default()));
        assert_eq!(cats.contains(&AssessmentCategory::StrategyReview), expected);
    }

    #[rstest]
    #[case(10, 5, 0, false)]
    #[case(10, 6, 0, true)]
    #[case(10, 0, 7, true)]
    fn stale_majority_recommends_maintenance_schedule(
        #[case] count: usize,
        #[case] vacuum: usize,
        #[case] analyze: usize,
        #[case] expected: bool,
    ) {
        let mut agg = bare_aggregate(count);
        agg.partitions_needing_vacuum = vacuum;
        agg.partitions_needing_analyze = analyze;
        let cats = categories(&assess_parent(&agg, &Thresholds::default()));
        assert_eq!(
            cats.contains(&AssessmentCategory::MaintenanceScheduleRecommended),
            expected
        );
    }

    #[rstest]
    #[case(Some("FOR VALUES FROM ('2026-01-01') TO ('2026-02-01')"), PartitionStrategy::Range)]
    #[case(Some("FOR VALUES IN ('eu', 'us')"), PartitionStrategy::List)]
    #[case(Some("FOR VALUES WITH (modulus 4, remainder 1)"), PartitionStrategy::Hash)]
    #[case(Some("for values from (1) to (10)"), PartitionStrategy::Range)]
    #[case(Some("DEFAULT"), PartitionStrategy::Other)]
    #[case(None, PartitionStrategy::Other)]
    fn strategy_classification_is_best_effort(
        #[case] bound: Option<&str>,
        #[case] expected: PartitionStrategy,
    ) {
        assert_eq!(classify_strategy(bound), expected);
    }
}
