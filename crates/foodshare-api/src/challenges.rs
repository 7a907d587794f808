use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::info;

use foodshare_db::Page;
use foodshare_db::challenges::{self, ProgressQuery};
use foodshare_db::models::ChallengeInput;
use foodshare_types::api::{
    ActionResponse, ChallengeListQuery, ChallengesPage, ParticipantsPage, ProgressPage,
    ProgressQuery as ProgressParams,
};
use foodshare_types::enums::{ChallengeCategory, ChallengeStatus, ChallengeType, parse_filter};

use crate::error::{ApiError, ApiResult};
use crate::form::ActionForm;
use crate::middleware::CurrentActor;
use crate::storage::{StoredFile, UploadCategory};
use crate::{AppState, run_db};

/// GET /admin/challenges
pub async fn challenges_page(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<ChallengeListQuery>,
) -> ApiResult<Json<ChallengesPage>> {
    let status = parse_filter::<ChallengeStatus>(query.status.as_deref());
    let page = Page::parse(query.page.as_deref());

    let payload = run_db(&state, move |conn| {
        Ok(ChallengesPage {
            stats: challenges::challenge_stats(conn)?,
            challenges: challenges::list_challenges(conn, status, page)?,
        })
    })
    .await?;
    Ok(Json(payload))
}

/// GET /admin/challenges/{id}/participants
pub async fn participants_page(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(challenge_id): Path<i64>,
) -> ApiResult<Json<ParticipantsPage>> {
    let payload = run_db(&state, move |conn| {
        let Some(challenge) = challenges::get_challenge(conn, challenge_id)? else {
            return Ok(None);
        };
        Ok(Some(ParticipantsPage {
            challenge,
            participants: challenges::participants(conn, challenge_id)?,
        }))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("Challenge not found"))?;
    Ok(Json(payload))
}

/// GET /admin/challenges/progress
pub async fn progress_page(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(params): Query<ProgressParams>,
) -> ApiResult<Json<ProgressPage>> {
    let query = ProgressQuery {
        challenge_id: params
            .challenge
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0),
        status: parse_filter(params.status.as_deref()),
    };
    let entries = run_db(&state, move |conn| challenges::progress_entries(conn, query)).await?;
    Ok(Json(ProgressPage { entries }))
}

/// POST /admin/challenges
pub async fn challenge_action(
    State(state): State<AppState>,
    actor: CurrentActor,
    form: ActionForm,
) -> Json<ActionResponse> {
    let result = match form.action() {
        "create_challenge" => create_challenge(&state, &actor, &form).await,
        "update_challenge" => update_challenge(&state, &actor, &form).await,
        "delete_challenge" => delete_challenge(&state, &actor, &form).await,
        "update_status" => update_status(&state, &form).await,
        "record_progress" => record_progress(&state, &form).await,
        other => Ok(ActionResponse::fail(format!("Unknown action: {other}"))),
    };
    Json(result.unwrap_or_else(ApiError::into_envelope))
}

fn challenge_input(form: &ActionForm) -> ApiResult<ChallengeInput> {
    let title = form.required("title", "Title")?.to_string();
    let start_date = form.date("start_date", "Start date")?;
    let end_date = form.date("end_date", "End date")?;
    if end_date <= start_date {
        return Err(ApiError::validation("End date must be after start date"));
    }

    let points = form.number("points")?.unwrap_or(0);
    let target_value = form.number("target_value")?.unwrap_or(1);
    if points < 0 {
        return Err(ApiError::validation("Points cannot be negative"));
    }
    if target_value < 1 {
        return Err(ApiError::validation("Target value must be at least 1"));
    }

    Ok(ChallengeInput {
        title,
        description: form.owned("description"),
        challenge_type: form.choice("challenge_type")?.unwrap_or(ChallengeType::Weekly),
        category: form.choice("category")?.unwrap_or(ChallengeCategory::Community),
        points,
        target_value,
        start_date,
        end_date,
        status: form.choice("status")?.unwrap_or(ChallengeStatus::Draft),
        prize_description: form.owned("prize_description"),
    })
}

async fn store_banner(state: &AppState, form: &ActionForm) -> ApiResult<Option<StoredFile>> {
    match form.file("banner_image") {
        Some(file) => Ok(Some(
            state.storage.save(UploadCategory::ChallengeBanner, file).await?,
        )),
        None => Ok(None),
    }
}

async fn discard(state: &AppState, banner: &Option<StoredFile>) {
    if let Some(banner) = banner {
        state.storage.delete_file(&banner.path).await;
    }
}

async fn create_challenge(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let input = challenge_input(form)?;
    let banner = store_banner(state, form).await?;
    let banner_path = banner.as_ref().map(|b| b.path.clone());
    let created_by = actor.user_id;

    let inserted = run_db(state, move |conn| {
        challenges::insert_challenge(conn, &input, banner_path.as_deref(), created_by)
    })
    .await;
    match inserted {
        Ok(id) => {
            info!("Challenge {} created by {}", id, actor.username);
            Ok(ActionResponse::ok("Challenge created successfully!").with("challenge_id", id))
        }
        Err(e) => {
            discard(state, &banner).await;
            Err(e)
        }
    }
}

async fn update_challenge(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let challenge_id = form.id("challenge_id")?;
    let input = challenge_input(form)?;

    let Some(existing) =
        run_db(state, move |conn| challenges::get_challenge(conn, challenge_id)).await?
    else {
        return Ok(ActionResponse::fail("Challenge not found"));
    };

    let banner = store_banner(state, form).await?;
    let banner_path = banner.as_ref().map(|b| b.path.clone());
    let updated = run_db(state, move |conn| {
        challenges::update_challenge(conn, challenge_id, &input, banner_path.as_deref())
    })
    .await;
    match updated {
        Ok(true) => {}
        Ok(false) => {
            discard(state, &banner).await;
            return Ok(ActionResponse::fail("Challenge not found"));
        }
        Err(e) => {
            discard(state, &banner).await;
            return Err(e);
        }
    }

    if banner.is_some() {
        if let Some(old) = existing.banner_image {
            state.storage.delete_file(&old).await;
        }
    }
    info!("Challenge {} updated by {}", challenge_id, actor.username);
    Ok(ActionResponse::ok("Challenge updated successfully!"))
}

async fn delete_challenge(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let challenge_id = form.id("challenge_id")?;
    let Some(removed) =
        run_db(state, move |conn| challenges::delete_challenge(conn, challenge_id)).await?
    else {
        return Ok(ActionResponse::fail("Challenge not found"));
    };

    info!("Challenge {} deleted by {}", challenge_id, actor.username);
    if let Some(banner) = removed.banner_image {
        state.storage.delete_file(&banner).await;
    }
    Ok(ActionResponse::ok("Challenge deleted successfully!"))
}

async fn update_status(state: &AppState, form: &ActionForm) -> ApiResult<ActionResponse> {
    let challenge_id = form.id("challenge_id")?;
    let status: ChallengeStatus = form.required_choice("status", "Status")?;
    if run_db(state, move |conn| challenges::set_status(conn, challenge_id, status)).await? {
        Ok(ActionResponse::ok("Challenge status updated successfully!"))
    } else {
        Ok(ActionResponse::fail("Challenge not found"))
    }
}

async fn record_progress(state: &AppState, form: &ActionForm) -> ApiResult<ActionResponse> {
    let participant_id = form.id("participant_id")?;
    let progress = form
        .number("progress")?
        .ok_or_else(|| ApiError::validation("Progress is required"))?;
    if progress < 0 {
        return Err(ApiError::validation("Progress cannot be negative"));
    }

    match run_db(state, move |conn| {
        challenges::record_progress(conn, participant_id, progress)
    })
    .await?
    {
        Some(participant) => {
            let message = if participant.completed {
                "Progress recorded. Challenge completed!"
            } else {
                "Progress recorded successfully!"
            };
            Ok(ActionResponse::ok(message).with("participant", participant))
        }
        None => Ok(ActionResponse::fail("Participant not found")),
    }
}
