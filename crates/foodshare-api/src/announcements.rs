use axum::{
    Json,
    extract::{Query, State},
};
use tracing::info;

use foodshare_db::Page;
use foodshare_db::announcements::{self, AnnouncementFilter};
use foodshare_db::models::{AnnouncementUpdate, NewAnnouncement};
use foodshare_types::api::{ActionResponse, AnnouncementListQuery, AnnouncementsPage};
use foodshare_types::enums::{AnnouncementStatus, AnnouncementType, Priority, parse_filter};
use foodshare_types::models::Attachment;

use crate::error::{ApiError, ApiResult};
use crate::form::ActionForm;
use crate::middleware::CurrentActor;
use crate::storage::{StoredFile, UploadCategory};
use crate::{AppState, run_db};

/// GET /admin/announcements
pub async fn announcements_page(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Query(query): Query<AnnouncementListQuery>,
) -> ApiResult<Json<AnnouncementsPage>> {
    let filter = AnnouncementFilter {
        status: parse_filter(query.status.as_deref()),
        kind: parse_filter(query.kind.as_deref()),
        priority: parse_filter(query.priority.as_deref()),
        search: query.search,
    };
    let page = Page::parse(query.page.as_deref());

    let payload = run_db(&state, move |conn| {
        Ok(AnnouncementsPage {
            stats: announcements::announcement_stats(conn)?,
            announcements: announcements::list_announcements(conn, &filter, page)?,
        })
    })
    .await?;
    Ok(Json(payload))
}

/// POST /admin/announcements
pub async fn announcement_action(
    State(state): State<AppState>,
    actor: CurrentActor,
    form: ActionForm,
) -> Json<ActionResponse> {
    let result = match form.action() {
        "create_announcement" => create_announcement(&state, &actor, &form).await,
        "update_announcement" => update_announcement(&state, &actor, &form).await,
        "delete_announcement" => delete_announcement(&state, &actor, &form).await,
        "toggle_pin" => toggle_pin(&state, &form).await,
        "update_status" => update_status(&state, &form).await,
        "get_announcement" => get_announcement(&state, &form).await,
        other => Ok(ActionResponse::fail(format!("Unknown action: {other}"))),
    };
    Json(result.unwrap_or_else(ApiError::into_envelope))
}

/// Text fields shared by create and update.
struct AnnouncementFields {
    title: String,
    content: String,
    kind: AnnouncementType,
    priority: Priority,
    status: AnnouncementStatus,
    is_pinned: bool,
}

impl AnnouncementFields {
    fn from_form(form: &ActionForm) -> ApiResult<Self> {
        Ok(Self {
            title: form.required("title", "Title")?.to_string(),
            content: form.required("content", "Content")?.to_string(),
            kind: form.choice("type")?.unwrap_or(AnnouncementType::Announcement),
            priority: form.choice("priority")?.unwrap_or(Priority::Medium),
            status: form.choice("status")?.unwrap_or(AnnouncementStatus::Draft),
            is_pinned: form.flag("is_pinned"),
        })
    }
}

fn as_attachment(file: &StoredFile) -> Attachment {
    Attachment {
        path: file.path.clone(),
        original_name: file.original_name.clone(),
        size: file.size,
        kind: file.extension.clone(),
    }
}

/// Store the uploaded images and attachments. Nothing is kept if either batch fails.
async fn store_uploads(
    state: &AppState,
    form: &ActionForm,
) -> ApiResult<(Vec<StoredFile>, Vec<StoredFile>)> {
    let images = state
        .storage
        .save_all(UploadCategory::AnnouncementImage, form.files("images"))
        .await?;
    match state
        .storage
        .save_all(UploadCategory::AnnouncementAttachment, form.files("attachments"))
        .await
    {
        Ok(attachments) => Ok((images, attachments)),
        Err(e) => {
            state.storage.delete_stored(&images).await;
            Err(e.into())
        }
    }
}

async fn create_announcement(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let fields = AnnouncementFields::from_form(form)?;
    let (images, attachments) = store_uploads(state, form).await?;

    let new = NewAnnouncement {
        user_id: actor.user_id,
        title: fields.title,
        content: fields.content,
        kind: fields.kind,
        priority: fields.priority,
        status: fields.status,
        is_pinned: fields.is_pinned,
        images: images.iter().map(|f| f.path.clone()).collect(),
        attachments: attachments.iter().map(as_attachment).collect(),
    };

    match run_db(state, move |conn| announcements::insert_announcement(conn, &new)).await {
        Ok(id) => {
            info!("Announcement {} created by {}", id, actor.username);
            Ok(ActionResponse::ok("Announcement created successfully!").with("announcement_id", id))
        }
        Err(e) => {
            state.storage.delete_stored(&images).await;
            state.storage.delete_stored(&attachments).await;
            Err(e)
        }
    }
}

async fn update_announcement(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let announcement_id = form.id("announcement_id")?;
    let fields = AnnouncementFields::from_form(form)?;
    let remove_images = form.json_list("remove_images")?;
    let remove_attachments = form.json_list("remove_attachments")?;

    let Some(existing) = run_db(state, move |conn| {
        announcements::get_announcement(conn, announcement_id)
    })
    .await?
    else {
        return Ok(ActionResponse::fail("Announcement not found"));
    };

    let (new_images, new_attachments) = store_uploads(state, form).await?;

    let (kept_images, dropped_images): (Vec<String>, Vec<String>) = existing
        .images
        .into_iter()
        .partition(|path| !remove_images.contains(path));
    let (kept_attachments, dropped_attachments): (Vec<Attachment>, Vec<Attachment>) = existing
        .attachments
        .into_iter()
        .partition(|a| !remove_attachments.contains(&a.path));

    let mut images = kept_images;
    images.extend(new_images.iter().map(|f| f.path.clone()));
    let mut attachments = kept_attachments;
    attachments.extend(new_attachments.iter().map(as_attachment));

    let update = AnnouncementUpdate {
        title: fields.title,
        content: fields.content,
        kind: fields.kind,
        priority: fields.priority,
        status: fields.status,
        is_pinned: fields.is_pinned,
        images,
        attachments,
    };

    let saved = run_db(state, move |conn| {
        announcements::update_announcement(conn, announcement_id, &update)
    })
    .await;
    match saved {
        Ok(true) => {}
        Ok(false) => {
            state.storage.delete_stored(&new_images).await;
            state.storage.delete_stored(&new_attachments).await;
            return Ok(ActionResponse::fail("Announcement not found"));
        }
        Err(e) => {
            state.storage.delete_stored(&new_images).await;
            state.storage.delete_stored(&new_attachments).await;
            return Err(e);
        }
    }

    state.storage.delete_all(&dropped_images).await;
    for attachment in &dropped_attachments {
        state.storage.delete_file(&attachment.path).await;
    }
    info!("Announcement {} updated by {}", announcement_id, actor.username);
    Ok(ActionResponse::ok("Announcement updated successfully!"))
}

async fn delete_announcement(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let announcement_id = form.id("announcement_id")?;
    let Some(removed) = run_db(state, move |conn| {
        announcements::delete_announcement(conn, announcement_id)
    })
    .await?
    else {
        return Ok(ActionResponse::fail("Announcement not found"));
    };

    info!("Announcement {} deleted by {}", announcement_id, actor.username);
    state.storage.delete_all(&removed.images).await;
    for attachment in &removed.attachments {
        state.storage.delete_file(&attachment.path).await;
    }
    Ok(ActionResponse::ok("Announcement deleted successfully!"))
}

async fn toggle_pin(state: &AppState, form: &ActionForm) -> ApiResult<ActionResponse> {
    let announcement_id = form.id("announcement_id")?;
    match run_db(state, move |conn| announcements::toggle_pin(conn, announcement_id)).await? {
        Some(pinned) => {
            let message = if pinned {
                "Announcement pinned successfully!"
            } else {
                "Announcement unpinned successfully!"
            };
            Ok(ActionResponse::ok(message).with("is_pinned", pinned))
        }
        None => Ok(ActionResponse::fail("Announcement not found")),
    }
}

async fn update_status(state: &AppState, form: &ActionForm) -> ApiResult<ActionResponse> {
    let announcement_id = form.id("announcement_id")?;
    let status: AnnouncementStatus = form.required_choice("status", "Status")?;
    if run_db(state, move |conn| announcements::set_status(conn, announcement_id, status)).await? {
        Ok(ActionResponse::ok("Announcement status updated successfully!"))
    } else {
        Ok(ActionResponse::fail("Announcement not found"))
    }
}

async fn get_announcement(state: &AppState, form: &ActionForm) -> ApiResult<ActionResponse> {
    let announcement_id = form.id("announcement_id")?;
    match run_db(state, move |conn| announcements::get_announcement(conn, announcement_id)).await? {
        Some(announcement) => {
            Ok(ActionResponse::ok("Announcement loaded").with("announcement", announcement))
        }
        None => Ok(ActionResponse::fail("Announcement not found")),
    }
}
