use crate::models::{AnalysisReport, Assessment, ParentAggregate, PartitionNode, Severity, StructuralIssue};
use clap::ValueEnum;
use itertools::Itertools;
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum ReporterError {
    #[snafu(display("Failed to write output: {}", source))]
    OutputError { source: std::io::Error },
}

type Result<T, E = ReporterError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    /// Markdown formatted report
    Markdown,
    /// JSON formatted report
    Json,
    /// Plain text summary
    Text,
}

pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn report(&self, report: &AnalysisReport) -> Result<()> {
        match self.format {
            ReportFormat::Markdown => self.report_markdown(report)?,
            ReportFormat::Json => self.report_json(report)?,
            ReportFormat::Text => self.report_text(report)?,
        }
        Ok(())
    }

    fn report_markdown(&self, report: &AnalysisReport) -> Result<()> {
        use std::io::Write;

        let stdout = std::io::stdout();
        let mut handle = stdout.lock();

        writeln!(handle, "# Partition Health Report: {}\n", report.database).context(OutputSnafu)?;

        writeln!(handle, "## Overview\n").context(OutputSnafu)?;
        writeln!(handle, "- **Relations inspected**: {}", report.relation_count)
            .context(OutputSnafu)?;
        writeln!(handle, "- **Partition hierarchies**: {}", report.roots.len())
            .context(OutputSnafu)?;
        writeln!(
            handle,
            "- **Overall severity**: {}",
            report.max_severity().as_str()
        )
        .context(OutputSnafu)?;
        writeln!(handle).context(OutputSnafu)?;

        if !report.structural_issues.is_empty() {
            writeln!(handle, "## Structural Issues\n").context(OutputSnafu)?;
            for issue in &report.structural_issues {
                match issue {
                    StructuralIssue::Orphan {
                        child,
                        missing_parent,
                    } => writeln!(
                        handle,
                        "- **Orphan**: `{child}` references missing parent `{missing_parent}`; \
                         shown as its own root"
                    )
                    .context(OutputSnafu)?,
                    StructuralIssue::Truncated { node, depth } => writeln!(
                        handle,
                        "- **Truncated**: expansion below `{node}` stopped at depth {depth}; \
                         the catalog data may be cyclic"
                    )
                    .context(OutputSnafu)?,
                }
            }
            writeln!(handle).context(OutputSnafu)?;
        }

        for root in &report.roots {
            writeln!(handle, "## {}\n", root.fact.qualified_name()).context(OutputSnafu)?;

            if let Some(agg) = report
                .parent_aggregates
                .iter()
                .find(|agg| agg.parent == root.fact.qualified_name())
            {
                self.write_aggregate_markdown(&mut handle, agg)?;
            }

            writeln!(handle, "```").context(OutputSnafu)?;
            self.write_tree(&mut handle, root)?;
            writeln!(handle, "```\n").context(OutputSnafu)?;

            let mut findings: Vec<(&str, &Assessment)> = Vec::new();
            collect_findings(root, &mut findings);
            findings.sort_by(|a, b| b.1.severity.cmp(&a.1.severity));

            for (name, assessment) in findings
                .iter()
                .filter(|(_, a)| a.severity > Severity::Ok)
            {
                writeln!(
                    handle,
                    "- **[{}] {}** `{}`: {}",
                    assessment.severity.as_str(),
                    assessment.category.as_str(),
                    name,
                    assessment.message
                )
                .context(OutputSnafu)?;
                if let Some(remediation) = &assessment.remediation {
                    writeln!(handle, "  - _Suggested_: {remediation}").context(OutputSnafu)?;
                }
            }
            writeln!(handle).context(OutputSnafu)?;
        }

        Ok(())
    }

    fn write_aggregate_markdown(
        &self,
        handle: &mut std::io::StdoutLock,
        agg: &ParentAggregate,
    ) -> Result<()> {
        use std::io::Write;

        writeln!(handle, "| Metric | Value |").context(OutputSnafu)?;
        writeln!(handle, "|--------|-------|").context(OutputSnafu)?;
        writeln!(handle, "| Partitions | {} |", agg.partition_count).context(OutputSnafu)?;
        writeln!(handle, "| Total size | {} |", format_bytes(agg.total_size_bytes))
            .context(OutputSnafu)?;
        writeln!(
            handle,
            "| Avg / min / max size | {} / {} / {} |",
            agg.avg_size_bytes
                .map(|b| format_bytes(b as i64))
                .unwrap_or_else(|| "n/a".into()),
            agg.min_size_bytes
                .map(format_bytes)
                .unwrap_or_else(|| "n/a".into()),
            agg.max_size_bytes
                .map(format_bytes)
                .unwrap_or_else(|| "n/a".into()),
        )
        .context(OutputSnafu)?;
        writeln!(
            handle,
            "| Size stddev | {} |",
            agg.size_stddev
                .map(|b| format_bytes(b as i64))
                .unwrap_or_else(|| "n/a".into())
        )
        .context(OutputSnafu)?;
        writeln!(handle, "| Total rows | {} |", agg.total_rows).context(OutputSnafu)?;
        writeln!(
            handle,
            "| Empty / small partitions | {} / {} |",
            agg.empty_partitions, agg.small_partitions
        )
        .context(OutputSnafu)?;
        writeln!(
            handle,
            "| Needing vacuum / analyze | {} / {} |",
            agg.partitions_needing_vacuum, agg.partitions_needing_analyze
        )
        .context(OutputSnafu)?;
        writeln!(handle).context(OutputSnafu)?;

        for assessment in &agg.assessments {
            writeln!(
                handle,
                "- **[{}] {}**: {}",
                assessment.severity.as_str(),
                assessment.category.as_str(),
                assessment.message
            )
            .context(OutputSnafu)?;
            if let Some(remediation) = &assessment.remediation {
                writeln!(handle, "  - _Suggested_: {remediation}").context(OutputSnafu)?;
            }
        }
        writeln!(handle).context(OutputSnafu)?;

        Ok(())
    }

    fn write_tree(&self, handle: &mut std::io::StdoutLock, node: &PartitionNode) -> Result<()> {
        use std::io::Write;

        let mut flags = Vec::new();
        if node.truncated {
            flags.push("TRUNCATED");
        }
        if node.synthetic_root {
            flags.push("ORPHAN");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.iter().join(", "))
        };

        writeln!(
            handle,
            "{}{} ({}, {}, {}, ~{} rows){}",
            "  ".repeat(node.depth),
            node.fact.qualified_name(),
            node.role.as_str(),
            node.strategy.as_str(),
            format_bytes(node.fact.total_size_bytes),
            node.fact.live_tuples,
            flags
        )
        .context(OutputSnafu)?;

        for child in &node.children {
            self.write_tree(handle, child)?;
        }
        Ok(())
    }

    fn report_json(&self, report: &AnalysisReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .context(OutputSnafu)?;

        println!("{}", json);
        Ok(())
    }

    fn report_text(&self, report: &AnalysisReport) -> Result<()> {
        use std::io::Write;

        let stdout = std::io::stdout();
        let mut handle = stdout.lock();

        writeln!(handle, "Partition Health Report: {}", report.database).context(OutputSnafu)?;
        writeln!(handle, "{}", "=".repeat(40)).context(OutputSnafu)?;
        writeln!(
            handle,
            "{} relations, {} hierarchies, overall {}",
            report.relation_count,
            report.roots.len(),
            report.max_severity().as_str()
        )
        .context(OutputSnafu)?;
        writeln!(handle).context(OutputSnafu)?;

        for issue in &report.structural_issues {
            match issue {
                StructuralIssue::Orphan {
                    child,
                    missing_parent,
                } => writeln!(handle, "  ORPHAN    {child} (missing parent {missing_parent})")
                    .context(OutputSnafu)?,
                StructuralIssue::Truncated { node, depth } => {
                    writeln!(handle, "  TRUNCATED {node} at depth {depth}").context(OutputSnafu)?
                }
            }
        }
        if !report.structural_issues.is_empty() {
            writeln!(handle).context(OutputSnafu)?;
        }

        for agg in &report.parent_aggregates {
            writeln!(
                handle,
                "{}: {} partitions, {}, {} rows",
                agg.parent,
                agg.partition_count,
                format_bytes(agg.total_size_bytes),
                agg.total_rows
            )
            .context(OutputSnafu)?;
            for assessment in &agg.assessments {
                writeln!(
                    handle,
                    "  [{}] {}: {}",
                    assessment.severity.as_str(),
                    assessment.category.as_str(),
                    assessment.message
                )
                .context(OutputSnafu)?;
            }
        }

        let mut findings: Vec<(&str, &Assessment)> = Vec::new();
        for root in &report.roots {
            collect_findings(root, &mut findings);
        }
        findings.sort_by(|a, b| b.1.severity.cmp(&a.1.severity));

        let flagged = findings
            .iter()
            .filter(|(_, a)| a.severity > Severity::Ok)
            .collect::<Vec<_>>();
        if !flagged.is_empty() {
            writeln!(handle).context(OutputSnafu)?;
            writeln!(handle, "Partition findings:").context(OutputSnafu)?;
            for (name, assessment) in flagged {
                writeln!(
                    handle,
                    "  [{}] {} {}: {}",
                    assessment.severity.as_str(),
                    assessment.category.as_str(),
                    name,
                    assessment.message
                )
                .context(OutputSnafu)?;
            }
        }

        Ok(())
    }
}

fn collect_findings<'a>(node: &'a PartitionNode, out: &mut Vec<(&'a str, &'a Assessment)>) {
    for assessment in &node.assessments {
        out.push((node.fact.name.as_str(), assessment));
    }
    for child in &node.children {
        collect_findings(child, out);
    }
}

fn format_bytes(bytes: i64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_byte_sizes_with_binary_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.0 MiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }
}
