use serde::{Deserialize, Serialize};

/// Raw catalog facts for one table or partition, as returned by the
/// snapshot query. Children may appear before or after their parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationFact {
    pub schema: String,
    pub name: String,
    /// Schema-qualified parent name; `None` means the relation has no parent.
    pub parent: Option<String>,
    pub is_partitioned_parent: bool,
    pub total_size_bytes: i64,
    pub table_size_bytes: i64,
    pub live_tuples: i64,
    pub seq_scan: i64,
    pub seq_tup_read: i64,
    pub idx_scan: i64,
    pub idx_tup_fetch: i64,
    pub last_vacuum: Option<String>,
    pub last_analyze: Option<String>,
    pub seconds_since_last_vacuum: Option<f64>,
    pub seconds_since_last_analyze: Option<f64>,
    /// Raw partition bound expression (`pg_get_expr(relpartbound, oid)`).
    pub partition_bound: Option<String>,
}

impl RelationFact {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Position of a node within its partition hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Root,
    Intermediate,
    Leaf,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Root => "ROOT",
            NodeRole::Intermediate => "INTERMEDIATE",
            NodeRole::Leaf => "LEAF",
        }
    }
}

/// Partitioning strategy inferred from the bound expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    Range,
    List,
    Hash,
    Other,
}

impl PartitionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionStrategy::Range => "RANGE",
            PartitionStrategy::List => "LIST",
            PartitionStrategy::Hash => "HASH",
            PartitionStrategy::Other => "OTHER",
        }
    }
}

/// One node of the reconstructed partition forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionNode {
    pub fact: RelationFact,
    /// 0 for roots; always `path.len() - 1`.
    pub depth: usize,
    /// Root-first chain of qualified names, ending with this node.
    pub path: Vec<String>,
    pub role: NodeRole,
    pub strategy: PartitionStrategy,
    /// Expansion stopped at the depth guard below this node.
    pub truncated: bool,
    /// Attached as a root because its declared parent was missing.
    pub synthetic_root: bool,
    pub children: Vec<PartitionNode>,
    pub assessments: Vec<Assessment>,
}

/// Severity scale for assessments, ordered least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Ok,
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Qualitative category attached to a partition or parent assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentCategory {
    MissingIndexSuspect,
    EmptyCandidate,
    ConsolidationCandidate,
    VacuumOverdue,
    AnalyzeOverdue,
    Normal,
    HighVariance,
    ModerateVariance,
    LowVariance,
    PlanningOverheadRisk,
    SinglePartition,
    CleanupRecommended,
    StrategyReview,
    MaintenanceScheduleRecommended,
}

impl AssessmentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentCategory::MissingIndexSuspect => "MISSING_INDEX_SUSPECT",
            AssessmentCategory::EmptyCandidate => "EMPTY_CANDIDATE",
            AssessmentCategory::ConsolidationCandidate => "CONSOLIDATION_CANDIDATE",
            AssessmentCategory::VacuumOverdue => "VACUUM_OVERDUE",
            AssessmentCategory::AnalyzeOverdue => "ANALYZE_OVERDUE",
            AssessmentCategory::Normal => "NORMAL",
            AssessmentCategory::HighVariance => "HIGH_VARIANCE",
            AssessmentCategory::ModerateVariance => "MODERATE_VARIANCE",
            AssessmentCategory::LowVariance => "LOW_VARIANCE",
            AssessmentCategory::PlanningOverheadRisk => "PLANNING_OVERHEAD_RISK",
            AssessmentCategory::SinglePartition => "SINGLE_PARTITION",
            AssessmentCategory::CleanupRecommended => "CLEANUP_RECOMMENDED",
            AssessmentCategory::StrategyReview => "STRATEGY_REVIEW",
            AssessmentCategory::MaintenanceScheduleRecommended => {
                "MAINTENANCE_SCHEDULE_RECOMMENDED"
            }
        }
    }
}

/// A single finding about a partition or a parent group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub category: AssessmentCategory,
    pub severity: Severity,
    pub message: String,
    /// Suggested action, when the finding has an obvious remediation.
    pub remediation: Option<String>,
}

/// Rollup statistics over one root's direct partitions.
///
/// Averages and the standard deviation are `None` when the parent has no
/// children; the maintenance counters cover every transitive descendant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentAggregate {
    pub parent: String,
    pub partition_count: usize,
    pub total_size_bytes: i64,
    pub avg_size_bytes: Option<f64>,
    pub min_size_bytes: Option<i64>,
    pub max_size_bytes: Option<i64>,
    pub size_stddev: Option<f64>,
    pub total_rows: i64,
    pub avg_rows_per_partition: Option<f64>,
    pub empty_partitions: usize,
    pub small_partitions: usize,
    pub partitions_needing_vacuum: usize,
    pub partitions_needing_analyze: usize,
    pub assessments: Vec<Assessment>,
}

/// Non-fatal anomalies found while rebuilding the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralIssue {
    /// A child referenced a parent absent from the fact set; the child was
    /// attached as its own synthetic root.
    Orphan {
        child: String,
        missing_parent: String,
    },
    /// Expansion stopped at the depth guard, likely cyclic catalog data.
    Truncated { node: String, depth: usize },
}

/// Complete result of one analysis pass, ready for rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub database: String,
    /// Number of relations seen in the snapshot, hierarchy members or not.
    pub relation_count: usize,
    pub roots: Vec<PartitionNode>,
    pub parent_aggregates: Vec<ParentAggregate>,
    pub structural_issues: Vec<StructuralIssue>,
}

impl AnalysisReport {
    /// Highest severity present anywhere in the report.
    pub fn max_severity(&self) -> Severity {
        fn node_max(node: &PartitionNode) -> Severity {
            let own = node
                .assessments
                .iter()
                .map(|a| a.severity)
                .max()
                .unwrap_or(Severity::Ok);
            node.children
                .iter()
                .map(node_max)
                .max()
                .unwrap_or(Severity::Ok)
                .max(own)
        }

        let from_nodes = self
            .roots
            .iter()
            .map(node_max)
            .max()
            .unwrap_or(Severity::Ok);
        let from_parents = self
            .parent_aggregates
            .iter()
            .flat_map(|agg| agg.assessments.iter().map(|a| a.severity))
            .max()
            .unwrap_or(Severity::Ok);

        from_nodes.max(from_parents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_fact() -> RelationFact {
        RelationFact {
            schema: "public".into(),
            name: "events_2026_01".into(),
            parent: Some("public.events".into()),
            is_partitioned_parent: false,
            total_size_bytes: 1024,
            table_size_bytes: 1024,
            live_tuples: 10,
            seq_scan: 0,
            seq_tup_read: 0,
            idx_scan: 5,
            idx_tup_fetch: 50,
            last_vacuum: None,
            last_analyze: None,
            seconds_since_last_vacuum: None,
            seconds_since_last_analyze: None,
            partition_bound: Some("FOR VALUES FROM ('2026-01-01') TO ('2026-02-01')".into()),
        }
    }

    #[test]
    fn report_is_serializable() {
        let report = AnalysisReport {
            database: "orders".into(),
            relation_count: 1,
            roots: vec![PartitionNode {
                fact: leaf_fact(),
                depth: 0,
                path: vec!["public.events_2026_01".into()],
                role: NodeRole::Root,
                strategy: PartitionStrategy::Range,
                truncated: false,
                synthetic_root: true,
                children: vec![],
                assessments: vec![Assessment {
                    category: AssessmentCategory::Normal,
                    severity: Severity::Ok,
                    message: "healthy".into(),
                    remediation: None,
                }],
            }],
            parent_aggregates: vec![],
            structural_issues: vec![StructuralIssue::Orphan {
                child: "public.events_2026_01".into(),
                missing_parent: "public.events".into(),
            }],
        };

        serde_json::to_string(&report).expect("AnalysisReport should serialize");
    }

    #[test]
    fn severity_orders_least_to_most_urgent() {
        assert!(Severity::Ok < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }
}
