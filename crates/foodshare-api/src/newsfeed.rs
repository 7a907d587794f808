use axum::{
    Json,
    extract::{Query, State},
};
use tracing::info;

use foodshare_db::feed;
use foodshare_types::api::{ActionResponse, FeedPage, FeedQuery};
use foodshare_types::enums::{FeedSource, PostType, parse_filter};

use crate::error::{ApiError, ApiResult};
use crate::form::ActionForm;
use crate::middleware::CurrentActor;
use crate::{AppState, run_db};

const TOP_CONTRIBUTORS: u32 = 5;

/// GET /admin/newsfeed
pub async fn newsfeed_page(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<FeedPage>> {
    let post_type = parse_filter::<PostType>(query.kind.as_deref());
    let payload = run_db(&state, move |conn| {
        Ok(FeedPage {
            stats: feed::feed_stats(conn)?,
            posts: feed::feed_items(conn, post_type)?,
            top_contributors: feed::top_contributors(conn, TOP_CONTRIBUTORS)?,
        })
    })
    .await?;
    Ok(Json(payload))
}

/// POST /admin/newsfeed
pub async fn newsfeed_action(
    State(state): State<AppState>,
    actor: CurrentActor,
    form: ActionForm,
) -> Json<ActionResponse> {
    let result = match form.action() {
        "delete_post" => delete_post(&state, &actor, &form).await,
        "toggle_visibility" => toggle_visibility(&state, &form).await,
        "feature_post" => feature_post(&state, &form).await,
        other => Ok(ActionResponse::fail(format!("Unknown action: {other}"))),
    };
    Json(result.unwrap_or_else(ApiError::into_envelope))
}

/// `post_type` names either a source table or a post type within it.
fn post_source(form: &ActionForm) -> ApiResult<FeedSource> {
    let raw = form.required("post_type", "Post type")?;
    if let Ok(source) = raw.parse::<FeedSource>() {
        return Ok(source);
    }
    raw.parse::<PostType>()
        .map(PostType::source)
        .map_err(|e| ApiError::validation(e.to_string()))
}

async fn delete_post(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let post_id = form.id("post_id")?;
    let source = post_source(form)?;
    if run_db(state, move |conn| feed::delete_post(conn, source, post_id)).await? {
        info!("Feed post {} ({}) deleted by {}", post_id, source, actor.username);
        Ok(ActionResponse::ok("Post deleted successfully!"))
    } else {
        Ok(ActionResponse::fail("Post not found"))
    }
}

async fn toggle_visibility(state: &AppState, form: &ActionForm) -> ApiResult<ActionResponse> {
    let post_id = form.id("post_id")?;
    let source = post_source(form)?;
    match run_db(state, move |conn| feed::toggle_visibility(conn, source, post_id)).await? {
        Some(visible) => {
            let message = if visible { "Post is now visible" } else { "Post is now hidden" };
            Ok(ActionResponse::ok(message).with("is_public", visible))
        }
        None => Ok(ActionResponse::fail("Post not found")),
    }
}

async fn feature_post(state: &AppState, form: &ActionForm) -> ApiResult<ActionResponse> {
    let post_id = form.id("post_id")?;
    if post_source(form)? != FeedSource::RecipeTip {
        return Ok(ActionResponse::fail("Only recipes and tips can be featured"));
    }
    match run_db(state, move |conn| feed::toggle_featured(conn, post_id)).await? {
        Some(featured) => {
            let message = if featured { "Post featured successfully!" } else { "Post unfeatured" };
            Ok(ActionResponse::ok(message).with("featured", featured))
        }
        None => Ok(ActionResponse::fail("Post not found")),
    }
}
