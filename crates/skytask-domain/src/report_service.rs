use std::fmt::Write as _;
use std::sync::Arc;

use tracing::warn;

use crate::error::DomainResult;
use crate::repository::ReportRepository;

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Read-only operational report over current schedule request state.
///
/// The numbers are a best-effort snapshot: transitions may land while the
/// queries run, so sub-counts can drift from totals by a few rows. Good
/// enough for dashboards; not a source for billing or compliance.
pub struct ReportService {
    report_repository: Arc<dyn ReportRepository>,
}

impl ReportService {
    pub fn new(report_repository: Arc<dyn ReportRepository>) -> Self {
        Self { report_repository }
    }

    /// Render the plain-text breakdown: overall counts, per-type status
    /// breakdowns with reasons, and scheduled event counts per satellite
    /// and per ground station.
    pub async fn render_report(&self) -> DomainResult<String> {
        let mut out = String::new();

        let order_count = self.report_repository.count_orders().await?;
        let request_count = self.report_repository.count_requests().await?;

        writeln!(out, "===========Overall stats===========").ok();
        writeln!(out, "Total order count: {order_count}").ok();
        writeln!(out, "Total request count: {request_count}").ok();
        self.write_request_breakdown(&mut out, None, "   ").await?;

        writeln!(out, "\n\n======Breakdown by order type======").ok();
        for (order_type, count) in self.report_repository.request_counts_by_type().await? {
            writeln!(
                out,
                "Total {} request count: {count}",
                capitalize(&order_type)
            )
            .ok();
            self.write_request_breakdown(&mut out, Some(order_type), "   ")
                .await?;
        }

        writeln!(out, "\n\n==========Scheduled Events=========\n").ok();
        writeln!(out, "------------Per satellite-----------").ok();
        for (asset, count) in self.report_repository.event_counts_by_asset().await? {
            writeln!(out, "{asset}: {count} events scheduled").ok();
            for (event_type, count) in self
                .report_repository
                .event_counts_by_asset_and_type(asset)
                .await?
            {
                writeln!(out, "   {event_type} events: {count}").ok();
            }
        }

        writeln!(out, "\n\n----------Per groundstation---------").ok();
        for (station, count) in self
            .report_repository
            .contact_counts_by_ground_station()
            .await?
        {
            writeln!(out, "{station}: {count} scheduled contacts").ok();
        }

        Ok(out)
    }

    async fn write_request_breakdown(
        &self,
        out: &mut String,
        order_type: Option<String>,
        indent: &str,
    ) -> DomainResult<()> {
        let by_status = self
            .report_repository
            .request_counts_by_status(order_type.clone())
            .await?;

        for (status, count) in by_status {
            writeln!(out, "{indent}{} requests: {count}", capitalize(&status)).ok();

            let by_reason = self
                .report_repository
                .request_counts_by_reason(order_type.clone(), status.clone())
                .await?;
            // A single reason group adds nothing over the status line.
            if by_reason.len() > 1 {
                for (reason, count) in by_reason {
                    writeln!(
                        out,
                        "{indent}  {count}: {}",
                        reason.unwrap_or_else(|| "Unspecified".to_string())
                    )
                    .ok();
                }
            }
        }
        Ok(())
    }

    /// Render, but never fail: reporting is read-only and best-effort, so
    /// a broken store yields a warning line instead of an error.
    pub async fn render_report_lossy(&self) -> String {
        match self.render_report().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "report generation failed");
                format!("report unavailable: {e}\n")
            }
        }
    }
}
