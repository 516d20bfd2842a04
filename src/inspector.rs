use crate::analysis;
use crate::config::DbConfig;
use crate::models::{AnalysisReport, RelationFact};
use snafu::{ResultExt, Snafu};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row};
use tracing::{debug, info};

#[derive(Debug, Snafu)]
pub enum InspectorError {
    #[snafu(display("Failed to connect to database: {}", source))]
    ConnectionError { source: sqlx::Error },

    #[snafu(display("Failed to execute query: {}", query))]
    QueryError { query: String, source: sqlx::Error },
}

type Result<T, E = InspectorError> = std::result::Result<T, E>;

/// Connects to one database and drives a full partition health pass.
///
/// The snapshot query is the only external call; everything after it runs
/// in-process over the fetched facts. A fetch failure aborts the whole
/// analysis — no partial report is ever produced.
pub struct PartitionInspector {
    config: DbConfig,
    pool: Pool<Postgres>,
}

impl PartitionInspector {
    pub async fn new(config: DbConfig) -> Result<Self> {
        info!(
            "Connecting to PostgreSQL at {}:{}",
            config.host, config.port
        );

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.connection_string())
            .await
            .context(ConnectionSnafu)?;

        info!("Successfully connected to database: {}", config.database);

        Ok(Self { config, pool })
    }

    pub async fn analyze(&self) -> Result<AnalysisReport> {
        info!("Fetching partition catalog snapshot...");
        let facts = self.fetch_relation_facts().await?;
        debug!("Fetched {} partition-related relations", facts.len());

        info!("Analyzing partition topology and health...");
        let mut report = analysis::analyze_snapshot(&facts, &self.config.thresholds);
        report.database = self.config.database.clone();

        Ok(report)
    }

    /// One row per partitioned parent or partition. A database with no
    /// partitioned tables yields an empty Vec, which is a valid snapshot.
    pub async fn fetch_relation_facts(&self) -> Result<Vec<RelationFact>> {
        const QUERY: &str = r#"
            SELECT
                n.nspname AS schema_name,
                c.relname AS rel_name,
                pn.nspname || '.' || pc.relname AS parent_name,
                (c.relkind = 'p') AS is_partitioned_parent,
                pg_total_relation_size(c.oid) AS total_size_bytes,
                pg_relation_size(c.oid) AS table_size_bytes,
                COALESCE(s.n_live_tup, 0) AS n_live_tup,
                COALESCE(s.seq_scan, 0) AS seq_scan,
                COALESCE(s.seq_tup_read, 0) AS seq_tup_read,
                COALESCE(s.idx_scan, 0) AS idx_scan,
                COALESCE(s.idx_tup_fetch, 0) AS idx_tup_fetch,
                to_char(GREATEST(s.last_vacuum, s.last_autovacuum),
                        'YYYY-MM-DD HH24:MI:SS') AS last_vacuum_text,
                to_char(GREATEST(s.last_analyze, s.last_autoanalyze),
                        'YYYY-MM-DD HH24:MI:SS') AS last_analyze_text,
                EXTRACT(EPOCH FROM (CURRENT_TIMESTAMP
                    - GREATEST(s.last_vacuum, s.last_autovacuum)))::float8
                    AS seconds_since_last_vacuum,
                EXTRACT(EPOCH FROM (CURRENT_TIMESTAMP
                    - GREATEST(s.last_analyze, s.last_autoanalyze)))::float8
                    AS seconds_since_last_analyze,
                pg_get_expr(c.relpartbound, c.oid) AS partition_bound
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_inherits i ON i.inhrelid = c.oid
            LEFT JOIN pg_class pc ON pc.oid = i.inhparent
            LEFT JOIN pg_namespace pn ON pn.oid = pc.relnamespace
            LEFT JOIN pg_stat_user_tables s ON s.relid = c.oid
            WHERE c.relkind IN ('r', 'p')
              AND (c.relispartition OR c.relkind = 'p')
              AND n.nspname NOT IN ('pg_catalog', 'information_schema')
            ORDER BY n.nspname, c.relname
        "#;

        let rows = sqlx::query(QUERY)
            .fetch_all(&self.pool)
            .await
            .context(QuerySnafu { query: QUERY })?;

        let mut facts = Vec::with_capacity(rows.len());
        for row in rows {
            facts.push(RelationFact {
                schema: row.get("schema_name"),
                name: row.get("rel_name"),
                parent: row.get("parent_name"),
                is_partitioned_parent: row.get("is_partitioned_parent"),
                total_size_bytes: row.get("total_size_bytes"),
                table_size_bytes: row.get("table_size_bytes"),
                live_tuples: row.get("n_live_tup"),
                seq_scan: row.get("seq_scan"),
                seq_tup_read: row.get("seq_tup_read"),
                idx_scan: row.get("idx_scan"),
                idx_tup_fetch: row.get("idx_tup_fetch"),
                last_vacuum: row.get("last_vacuum_text"),
                last_analyze: row.get("last_analyze_text"),
                seconds_since_last_vacuum: row.get("seconds_since_last_vacuum"),
                seconds_since_last_analyze: row.get("seconds_since_last_analyze"),
                partition_bound: row.get("partition_bound"),
            });
        }

        Ok(facts)
    }
}
