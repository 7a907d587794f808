use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::{Datelike, NaiveDate, Utc};
use tracing::info;

use foodshare_db::filter::parse_date;
use foodshare_db::reports::{self, MAX_REPORT_DAYS, ReportRange};
use foodshare_types::api::{ReportQuery, ReportsPage};
use foodshare_types::enums::{ExportFormat, ReportType, parse_filter};

use crate::error::{ApiError, ApiResult};
use crate::export::download;
use crate::middleware::CurrentActor;
use crate::{AppState, run_db};

/// Explicit bounds win; otherwise the month to date.
fn report_range(query: &ReportQuery, today: NaiveDate) -> ReportRange {
    let month_start = today.with_day(1).unwrap_or(today);
    ReportRange {
        start: query.start_date.as_deref().and_then(parse_date).unwrap_or(month_start),
        end: query.end_date.as_deref().and_then(parse_date).unwrap_or(today),
    }
}

fn wants_export(query: &ReportQuery) -> bool {
    matches!(query.export.as_deref().map(str::trim), Some("1" | "true"))
}

/// GET /admin/reports
///
/// Report stats, or with `export=1` the chosen report as a file download.
pub async fn reports_page(
    State(state): State<AppState>,
    actor: CurrentActor,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    if !wants_export(&query) {
        let stats = run_db(&state, reports::report_stats).await?;
        return Ok(Json(ReportsPage {
            stats,
            report_types: ReportType::ALL.to_vec(),
        })
        .into_response());
    }

    let report_type: ReportType = query
        .report_type
        .as_deref()
        .ok_or_else(|| ApiError::validation("Report type is required"))?
        .parse::<ReportType>()
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let format: ExportFormat = parse_filter(query.format.as_deref()).unwrap_or_default();
    let today = Utc::now().date_naive();
    let range = report_range(&query, today);
    if report_type == ReportType::Engagement && range.days() > MAX_REPORT_DAYS {
        return Err(ApiError::validation(format!(
            "Report range cannot exceed {MAX_REPORT_DAYS} days"
        )));
    }

    info!(
        "{} exporting {} report {}..{} as {}",
        actor.username, report_type, range.start, range.end, format
    );

    let response = run_db(&state, move |conn| match report_type {
        ReportType::Users => {
            download(report_type, format, range, today, &reports::users_report(conn, range)?)
        }
        ReportType::Donations => {
            download(report_type, format, range, today, &reports::donations_report(conn, range)?)
        }
        ReportType::Newsfeeds => {
            download(report_type, format, range, today, &reports::newsfeeds_report(conn, range)?)
        }
        ReportType::Challenges => {
            download(report_type, format, range, today, &reports::challenges_report(conn, range)?)
        }
        ReportType::Engagement => {
            download(report_type, format, range, today, &reports::engagement_report(conn, range)?)
        }
    })
    .await?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(start: Option<&str>, end: Option<&str>) -> ReportQuery {
        ReportQuery {
            start_date: start.map(str::to_string),
            end_date: end.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn range_defaults_to_month_to_date() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 17).unwrap();
        let range = report_range(&query(None, None), today);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(range.end, today);
    }

    #[test]
    fn explicit_and_malformed_bounds() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 17).unwrap();
        let range = report_range(&query(Some("2025-01-05"), Some("soon")), today);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        assert_eq!(range.end, today);
    }

    #[test]
    fn far_future_bounds_parse() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 17).unwrap();
        let range = report_range(&query(Some("+262142-12-31"), Some("+262142-12-31")), today);
        assert_eq!(range.start, NaiveDate::MAX);
        assert_eq!(range.days(), 1);
    }

    #[test]
    fn export_flag() {
        let mut q = ReportQuery::default();
        assert!(!wants_export(&q));
        q.export = Some("1".into());
        assert!(wants_export(&q));
        q.export = Some("0".into());
        assert!(!wants_export(&q));
    }
}
