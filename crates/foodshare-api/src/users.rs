use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::{info, warn};

use foodshare_db::Page;
use foodshare_db::models::{NewUser, UserUpdate};
use foodshare_db::users::{self, UserFilter, UserScope};
use foodshare_db::{announcements, challenges, donations};
use foodshare_types::api::{ActionResponse, UserListQuery, UserProfile, UsersPage};
use foodshare_types::enums::{Role, UserStatus, parse_filter};

use crate::auth::hash_password;
use crate::error::{ApiError, ApiResult};
use crate::form::ActionForm;
use crate::middleware::CurrentActor;
use crate::storage::UploadCategory;
use crate::{AppState, blocking, run_db};

fn scope_for(actor: &CurrentActor) -> UserScope {
    match (actor.role, &actor.purok) {
        (Role::TeamOfficer, Some(purok)) => UserScope::Purok(purok.clone()),
        // an officer without a purok sees only fellow officers
        (Role::TeamOfficer, None) => UserScope::Purok(String::new()),
        _ => UserScope::Everyone,
    }
}

/// GET /admin/users
pub async fn users_page(
    State(state): State<AppState>,
    actor: CurrentActor,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<UsersPage>> {
    let filter = UserFilter {
        role: parse_filter(query.role.as_deref()),
        status: parse_filter(query.status.as_deref()),
        search: query.search,
    };
    let page = Page::parse(query.page.as_deref());
    let scope = scope_for(&actor);

    let payload = run_db(&state, move |conn| {
        Ok(UsersPage {
            stats: users::user_stats(conn)?,
            users: users::list_users(conn, &filter, &scope, page)?,
        })
    })
    .await?;
    Ok(Json(payload))
}

/// GET /admin/users/{id}
pub async fn user_profile(
    State(state): State<AppState>,
    _actor: CurrentActor,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserProfile>> {
    let profile = run_db(&state, move |conn| {
        let Some(user) = users::get_user(conn, user_id)? else {
            return Ok(None);
        };
        Ok(Some(UserProfile {
            user,
            recent_donations: donations::recent_for_user(conn, user_id, 5)?,
            recent_announcements: announcements::recent_for_user(conn, user_id, 5)?,
            recent_challenges: challenges::recent_participations(conn, user_id, 3)?,
        }))
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(profile))
}

/// POST /admin/users
pub async fn user_action(
    State(state): State<AppState>,
    actor: CurrentActor,
    form: ActionForm,
) -> Json<ActionResponse> {
    let result = match form.action() {
        "add_user" => add_user(&state, &actor, &form).await,
        "edit_user" => edit_user(&state, &actor, &form).await,
        "archive_user" => {
            change_status(&state, &actor, &form, UserStatus::Inactive, "User archived successfully!").await
        }
        "restore_user" => {
            change_status(&state, &actor, &form, UserStatus::Approved, "User restored successfully!").await
        }
        "approve_user" => {
            change_status(&state, &actor, &form, UserStatus::Approved, "User approved successfully!").await
        }
        "reject_user" => {
            change_status(&state, &actor, &form, UserStatus::Rejected, "User rejected successfully!").await
        }
        "update_status" => update_status(&state, &actor, &form).await,
        "delete_user" => delete_user(&state, &actor, &form).await,
        "get_residents" => get_residents(&state, &actor, &form).await,
        "update_resident_status" => update_resident_status(&state, &actor, &form).await,
        "update_profile_picture" => update_profile_picture(&state, &actor, &form).await,
        other => Ok(ActionResponse::fail(format!("Unknown action: {other}"))),
    };
    Json(result.unwrap_or_else(ApiError::into_envelope))
}

fn check_role_grant(actor: &CurrentActor, role: Role) -> ApiResult<()> {
    if role == Role::Admin && !actor.is_admin() {
        return Err(ApiError::validation(
            "Only administrators can grant the admin role",
        ));
    }
    Ok(())
}

/// Officers may only touch accounts their scope lists, never an admin's.
async fn check_target(state: &AppState, actor: &CurrentActor, user_id: i64) -> ApiResult<()> {
    if actor.is_admin() {
        return Ok(());
    }
    let scope = scope_for(actor);
    let target = run_db(state, move |conn| users::get_user(conn, user_id)).await?;
    match target {
        Some(user) if !scope.covers(&user) => {
            warn!("{} refused access to user {}", actor.username, user_id);
            Err(ApiError::Forbidden(
                "You do not have permission to manage this user".into(),
            ))
        }
        _ => Ok(()),
    }
}

fn check_email(email: &str) -> ApiResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::validation("Invalid email address")),
    }
}

async fn add_user(state: &AppState, actor: &CurrentActor, form: &ActionForm) -> ApiResult<ActionResponse> {
    let full_name = form.required("full_name", "Full name")?.to_string();
    let username = form.required("username", "Username")?.to_string();
    let email = form.required("email", "Email")?.to_string();
    let password = form.required("password", "Password")?.to_string();
    let role: Role = form.required_choice("role", "Role")?;
    check_email(&email)?;
    check_role_grant(actor, role)?;
    if password.len() < 6 {
        return Err(ApiError::validation("Password must be at least 6 characters"));
    }

    let password_hash = blocking(move || hash_password(&password)).await?;
    let new_user = NewUser {
        full_name,
        username,
        email,
        password_hash,
        role,
        status: UserStatus::Approved,
        phone_number: form.owned("phone_number"),
        address: form.owned("address"),
    };

    let created = run_db(state, move |conn| {
        if users::identity_taken(conn, &new_user.username, &new_user.email, None)? {
            return Ok(None);
        }
        let id = users::insert_user(conn, &new_user)?;
        Ok(Some((id, new_user.username)))
    })
    .await?;

    match created {
        Some((user_id, username)) => {
            info!("User {} ({}) added by {}", username, user_id, actor.username);
            Ok(ActionResponse::ok("User added successfully!").with("user_id", user_id))
        }
        None => Ok(ActionResponse::fail("Username or email already exists")),
    }
}

async fn edit_user(state: &AppState, actor: &CurrentActor, form: &ActionForm) -> ApiResult<ActionResponse> {
    let user_id = form.id("user_id")?;
    let update = UserUpdate {
        full_name: form.required("full_name", "Full name")?.to_string(),
        username: form.required("username", "Username")?.to_string(),
        email: form.required("email", "Email")?.to_string(),
        role: form.required_choice("role", "Role")?,
        status: form.required_choice("status", "Status")?,
        phone_number: form.owned("phone_number"),
        address: form.owned("address"),
    };
    check_email(&update.email)?;
    check_role_grant(actor, update.role)?;
    check_target(state, actor, user_id).await?;

    let outcome = run_db(state, move |conn| {
        if users::identity_taken(conn, &update.username, &update.email, Some(user_id))? {
            return Ok(Err("Username or email already exists"));
        }
        if !users::update_user(conn, user_id, &update)? {
            return Ok(Err("User not found"));
        }
        Ok(Ok(()))
    })
    .await?;

    match outcome {
        Ok(()) => {
            info!("User {} updated by {}", user_id, actor.username);
            Ok(ActionResponse::ok("User updated successfully!"))
        }
        Err(message) => Ok(ActionResponse::fail(message)),
    }
}

async fn change_status(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
    status: UserStatus,
    message: &'static str,
) -> ApiResult<ActionResponse> {
    let user_id = form.id("user_id")?;
    check_target(state, actor, user_id).await?;
    if run_db(state, move |conn| users::set_user_status(conn, user_id, status)).await? {
        info!("User {} status -> {} by {}", user_id, status, actor.username);
        Ok(ActionResponse::ok(message))
    } else {
        Ok(ActionResponse::fail("User not found"))
    }
}

async fn update_status(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let status: UserStatus = form.required_choice("status", "Status")?;
    change_status(state, actor, form, status, "Status updated successfully!").await
}

async fn delete_user(state: &AppState, actor: &CurrentActor, form: &ActionForm) -> ApiResult<ActionResponse> {
    let user_id = form.id("user_id")?;
    if user_id == actor.user_id {
        return Ok(ActionResponse::fail("You cannot delete your own account"));
    }
    check_target(state, actor, user_id).await?;

    let Some(removed) = run_db(state, move |conn| users::delete_user(conn, user_id)).await? else {
        return Ok(ActionResponse::fail("User not found"));
    };
    info!("User {} deleted by {}", removed.username, actor.username);

    if let Some(picture) = removed.profile_img {
        if !state.storage.delete_file(&picture).await {
            warn!("Profile picture {} of deleted user {} left behind", picture, user_id);
        }
    }
    Ok(ActionResponse::ok("User deleted successfully!"))
}

/// Admins name the purok; officers are pinned to their own.
fn purok_for(actor: &CurrentActor, form: &ActionForm) -> ApiResult<String> {
    if actor.is_admin() {
        return Ok(form.required("purok", "Purok")?.to_string());
    }
    actor
        .purok
        .clone()
        .ok_or_else(|| ApiError::validation("No purok assigned to your account"))
}

async fn get_residents(state: &AppState, actor: &CurrentActor, form: &ActionForm) -> ApiResult<ActionResponse> {
    let purok = purok_for(actor, form)?;
    let residents = run_db(state, move |conn| users::residents_in_purok(conn, &purok)).await?;
    Ok(ActionResponse::ok(format!("{} residents found", residents.len())).with("residents", residents))
}

async fn update_resident_status(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let user_id = form.id("user_id")?;
    let status: UserStatus = form.required_choice("status", "Status")?;
    let purok = purok_for(actor, form)?;

    let changed = run_db(state, move |conn| {
        users::update_resident_status(conn, user_id, &purok, status)
    })
    .await?;
    if changed {
        info!("Resident {} status -> {} by {}", user_id, status, actor.username);
        Ok(ActionResponse::ok("Resident status updated successfully!"))
    } else {
        Ok(ActionResponse::fail("Resident not found in your purok"))
    }
}

async fn update_profile_picture(
    state: &AppState,
    actor: &CurrentActor,
    form: &ActionForm,
) -> ApiResult<ActionResponse> {
    let user_id = form.id("user_id")?;
    check_target(state, actor, user_id).await?;
    let file = form
        .file("profile_picture")
        .ok_or_else(|| ApiError::validation("Please select a profile picture"))?;

    let Some(user) = run_db(state, move |conn| users::get_user(conn, user_id)).await? else {
        return Ok(ActionResponse::fail("User not found"));
    };

    let stored = state.storage.save(UploadCategory::ProfilePicture, file).await?;
    let path = stored.path.clone();
    let saved = run_db(state, move |conn| users::set_profile_img(conn, user_id, &path)).await;
    match saved {
        Ok(true) => {}
        Ok(false) => {
            state.storage.delete_file(&stored.path).await;
            return Ok(ActionResponse::fail("User not found"));
        }
        Err(e) => {
            state.storage.delete_file(&stored.path).await;
            return Err(e);
        }
    }

    if let Some(old) = user.profile_img {
        state.storage.delete_file(&old).await;
    }
    Ok(ActionResponse::ok("Profile picture updated successfully!").with("profile_img", stored.path))
}
