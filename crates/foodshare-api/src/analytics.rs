use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;

use foodshare_db::analytics;
use foodshare_types::api::{AnalyticsPage, AnalyticsQuery};
use foodshare_types::enums::{AnalyticsPeriod, parse_filter};

use crate::error::ApiResult;
use crate::middleware::CurrentActor;
use crate::{AppState, run_db};

/// GET /admin/analytics
pub async fn analytics_page(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<AnalyticsPage>> {
    let period: AnalyticsPeriod = parse_filter(query.period.as_deref()).unwrap_or_default();
    let today = Utc::now().date_naive();
    let window = analytics::period_window(period, today);

    let (stats, charts) = run_db(&state, move |conn| {
        Ok((
            analytics::analytics_stats(conn, period, today)?,
            analytics::analytics_charts(conn, period, today)?,
        ))
    })
    .await?;

    Ok(Json(AnalyticsPage {
        period,
        period_label: period.label().to_string(),
        start_date: window.start.unwrap_or(today),
        end_date: window.end.unwrap_or(today),
        stats,
        charts,
    }))
}
