use axum::{
    Json,
    extract::{Query, State},
};
use tracing::info;

use foodshare_db::donations::{self, DonationFilter};
use foodshare_db::{DateRange, Page};
use foodshare_types::api::{
    ActionResponse, ApprovalsPage, DonationListQuery, DonationsPage, ExpiredPage, PageQuery,
};
use foodshare_types::enums::{ApprovalStatus, DonationStatus, parse_filter};

use crate::error::{ApiError, ApiResult};
use crate::form::ActionForm;
use crate::middleware::CurrentActor;
use crate::{AppState, run_db};

const EXPIRED_LIST_CAP: u32 = 100;
const EXPIRING_LIST_CAP: u32 = 50;
const DEFAULT_BULK_DELETE_DAYS: i64 = 30;

/// GET /admin/donations
pub async fn donations_page(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<DonationListQuery>,
) -> ApiResult<Json<DonationsPage>> {
    let filter = DonationFilter {
        status: parse_filter(query.status.as_deref()),
        approval: parse_filter(query.approval.as_deref()),
        search: query.search,
        created: DateRange::parse(query.start_date.as_deref(), query.end_date.as_deref()),
    };
    let page = Page::parse(query.page.as_deref());

    let payload = run_db(&state, move |conn| {
        Ok(DonationsPage {
            stats: donations::donation_stats(conn)?,
            donations: donations::list_donations(conn, &filter, page)?,
        })
    })
    .await?;
    Ok(Json(payload))
}

/// GET /admin/donations/approvals
pub async fn approvals_page(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ApprovalsPage>> {
    let page = Page::parse(query.page.as_deref());
    let pending = run_db(&state, move |conn| donations::pending_approvals(conn, page)).await?;
    Ok(Json(ApprovalsPage { pending }))
}

/// GET /admin/donations/expired
pub async fn expired_page(
    State(state): State<AppState>,
    _actor: CurrentActor,
) -> ApiResult<Json<ExpiredPage>> {
    let payload = run_db(&state, |conn| {
        Ok(ExpiredPage {
            stats: donations::expired_stats(conn)?,
            expired: donations::expired_donations(conn, EXPIRED_LIST_CAP)?,
            expiring_soon: donations::expiring_soon(conn, EXPIRING_LIST_CAP)?,
        })
    })
    .await?;
    Ok(Json(payload))
}

/// POST /admin/donations
pub async fn donation_action(
    State(state): State<AppState>,
    actor: CurrentActor,
    form: ActionForm,
) -> Json<ActionResponse> {
    let result = match form.action() {
        "approve_donation" => {
            set_approval(&state, &actor, &form, ApprovalStatus::Approved, "Donation approved successfully!").await
        }
        "reject_donation" => {
            if let Some(reason) = form.text("reason") {
                info!("Donation rejection reason from {}: {}", actor.username, reason);
            }
            set_approval(&state, &actor, &form, ApprovalStatus::Rejected, "Donation rejected successfully!").await
        }
        "delete_donation" => delete_donation(&state, &actor, &form).await,
        "update_status" => update_status(&state, &form).await,
        "restore_donation" => {
            change_status(&state, &form, DonationStatus::Available, "Donation restored successfully!").await
        }
        "bulk_delete" => bulk_delete(&state, &actor, &form).await,
        "auto_expire" => auto_expire(&state).await,
        other => Ok(ActionResponse::fail(format!("Unknown action: {other}"))),
    };
    Json(result.unwrap_or_else(ApiError::into_envelope))
}

async fn set_approval(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
    approval: ApprovalStatus,
    message: &'static str,
) -> ApiResult<ActionResponse> {
    let donation_id = form.id("donation_id")?;
    if run_db(state, move |conn| donations::set_approval(conn, donation_id, approval)).await? {
        info!("Donation {} {} by {}", donation_id, approval, actor.username);
        Ok(ActionResponse::ok(message))
    } else {
        Ok(ActionResponse::fail("Donation not found"))
    }
}

async fn change_status(
    state: &AppState,
    form: &ActionForm,
    status: DonationStatus,
    message: &'static str,
) -> ApiResult<ActionResponse> {
    let donation_id = form.id("donation_id")?;
    if run_db(state, move |conn| donations::set_status(conn, donation_id, status)).await? {
        info!("Donation {} status -> {}", donation_id, status);
        Ok(ActionResponse::ok(message))
    } else {
        Ok(ActionResponse::fail("Donation not found"))
    }
}

async fn update_status(state: &AppState, form: &ActionForm) -> ApiResult<ActionResponse> {
    let status: DonationStatus = form.required_choice("status", "Status")?;
    change_status(state, form, status, "Donation status updated successfully!").await
}

async fn delete_donation(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let donation_id = form.id("donation_id")?;
    let Some(removed) =
        run_db(state, move |conn| donations::delete_donation(conn, donation_id)).await?
    else {
        return Ok(ActionResponse::fail("Donation not found"));
    };
    info!("Donation {} deleted by {}", donation_id, actor.username);
    state.storage.delete_all(&removed.images).await;
    Ok(ActionResponse::ok("Donation deleted successfully!"))
}

async fn bulk_delete(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let days = form.number("days")?.unwrap_or(DEFAULT_BULK_DELETE_DAYS);
    let days = u32::try_from(days)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| ApiError::validation("Days must be a positive number"))?;

    let (deleted, images) =
        run_db(state, move |conn| donations::bulk_delete_expired(conn, days)).await?;
    info!(
        "Bulk delete by {} removed {} expired donations older than {} days",
        actor.username, deleted, days
    );
    state.storage.delete_all(&images).await;
    Ok(ActionResponse::ok(format!("Deleted {deleted} expired donations")).with("deleted", deleted))
}

async fn auto_expire(state: &AppState) -> ApiResult<ActionResponse> {
    let expired = run_db(state, donations::auto_expire).await?;
    info!("Auto-expire marked {} donations expired", expired);
    Ok(ActionResponse::ok(format!("{expired} donations marked as expired")).with("expired", expired))
}
