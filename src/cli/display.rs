//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use crate::teardown::{objects, TeardownReport, VolumeMode};

// ============================================================================
// Teardown report
// ============================================================================

/// One line of the report: a resource kind, how many, and what was done
struct ReportRow {
    resource: &'static str,
    count: usize,
    action: &'static str,
}

impl ReportRow {
    fn new(resource: &'static str, count: usize, action: &'static str) -> Self {
        Self {
            resource,
            count,
            action,
        }
    }

    fn count_label(&self) -> String {
        format!("{} {}", self.count, objects(self.count))
    }
}

/// Render report rows in aligned RESOURCE / COUNT / ACTION columns
fn format_rows(rows: &[ReportRow]) -> String {
    if rows.is_empty() {
        return "No resources removed.\n".to_string();
    }

    let resource_width = rows
        .iter()
        .map(|r| r.resource.len())
        .chain(["RESOURCE".len()])
        .max()
        .unwrap_or_default();
    let count_width = rows
        .iter()
        .map(|r| r.count_label().len())
        .chain(["COUNT".len()])
        .max()
        .unwrap_or_default();

    let mut output = format!(
        "{:rw$}   {:cw$}   ACTION\n",
        "RESOURCE",
        "COUNT",
        rw = resource_width,
        cw = count_width
    );
    for row in rows {
        output.push_str(&format!(
            "{:rw$}   {:cw$}   {}\n",
            row.resource,
            row.count_label(),
            row.action,
            rw = resource_width,
            cw = count_width
        ));
    }
    output
}

/// Format the outcome of a teardown for display
pub fn format_report(report: &TeardownReport) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Cluster {}[{}]: {}\n\n",
        report.cluster_name, report.cluster_id, report.state
    ));

    let volume_action = match report.volumes.mode {
        VolumeMode::Delete => "deleted",
        VolumeMode::Unbind => "unbound",
    };

    let released = report
        .storage
        .requests
        .saturating_sub(report.storage.leftover);

    let rows: Vec<ReportRow> = [
        ReportRow::new(
            "storage-requests",
            report.requests.failed_storage_requests,
            "failed",
        ),
        ReportRow::new(
            "volume-series-requests",
            report.requests.canceled_volume_series_requests,
            "canceled",
        ),
        ReportRow::new("volume-series", report.volumes.volumes, volume_action),
        ReportRow::new("snapshots", report.volumes.snapshots, "deleted"),
        ReportRow::new(
            "consistency-groups",
            report.volumes.consistency_groups,
            "deleted",
        ),
        ReportRow::new(
            "application-groups",
            report.volumes.application_groups,
            "deleted",
        ),
        ReportRow::new("storage", released, "released"),
        ReportRow::new("storage", report.storage.leftover, "deleted, release failed"),
        ReportRow::new("pools", report.topology.pools_cleared, "cleared"),
        ReportRow::new(
            "service-plan-allocations",
            report.topology.service_plan_allocations,
            "deleted",
        ),
        ReportRow::new("pools", report.topology.pools, "deleted"),
        ReportRow::new("nodes", report.topology.nodes, "deleted"),
    ]
    .into_iter()
    .filter(|row| row.count > 0)
    .collect();

    output.push_str(&format_rows(&rows));
    output.push_str(&format_manual_cleanup(&report.storage.manual_cleanup));
    output
}

/// Format the CSP volumes left for an operator to detach and delete
pub fn format_manual_cleanup(volumes: &[String]) -> String {
    if volumes.is_empty() {
        return String::new();
    }
    let mut output = format!(
        "\nWARNING! Manual detach and delete required for {} CSP volume {}:\n",
        volumes.len(),
        objects(volumes.len())
    );
    for id in volumes {
        output.push_str(&format!("  - {}\n", id));
    }
    output
}

/// Hint shown when the control plane refuses the connection
pub fn format_forbidden_hint(has_identity: bool) -> Option<&'static str> {
    if has_identity {
        None
    } else {
        Some("Hint: the control plane requires a client certificate; specify --cert and --key")
    }
}
