use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};

use foodshare_db::Database;
use foodshare_db::models::NewUser;
use foodshare_db::users;
use foodshare_types::api::{Claims, LoginRequest, LoginResponse};
use foodshare_types::enums::{Role, UserStatus};

use crate::error::ApiError;
use crate::{AppState, run_db};

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn create_token(
    secret: &str,
    ttl_hours: i64,
    user_id: i64,
    username: &str,
    role: Role,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::hours(ttl_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = req.username.trim().to_string();
    let creds = run_db(&state, move |conn| users::credentials_by_username(conn, &username))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid username or password".into()))?;

    if !verify_password(&req.password, &creds.password_hash) {
        warn!("Failed login for {}", creds.username);
        return Err(ApiError::Unauthorized("Invalid username or password".into()));
    }
    if creds.status != UserStatus::Approved {
        return Err(ApiError::Unauthorized("Account is not active".into()));
    }

    let token = create_token(
        &state.jwt_secret,
        state.token_ttl_hours,
        creds.user_id,
        &creds.username,
        creds.role,
    )?;

    info!("User {} logged in", creds.username);
    Ok(Json(LoginResponse {
        user_id: creds.user_id,
        username: creds.username,
        role: creds.role,
        token,
    }))
}

/// Create an approved admin account when the database has none.
///
/// Returns whether an account was created.
pub fn ensure_admin(db: &Database, username: &str, password: &str) -> anyhow::Result<bool> {
    let password_hash = hash_password(password)?;
    db.with_conn(|conn| {
        if users::admin_exists(conn)? {
            return Ok(false);
        }
        users::insert_user(
            conn,
            &NewUser {
                full_name: "Administrator".to_string(),
                username: username.to_string(),
                email: format!("{username}@localhost"),
                password_hash,
                role: Role::Admin,
                status: UserStatus::Approved,
                phone_number: None,
                address: None,
            },
        )?;
        info!("Created bootstrap admin account {}", username);
        Ok(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn tokens_carry_identity_and_reject_other_secrets() {
        let token = create_token("s3cret", 1, 42, "root", Role::Admin).unwrap();
        let claims = decode_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Admin);
        assert!(decode_token("other", &token).is_err());
    }

    #[test]
    fn bootstrap_admin_is_created_once() {
        let db = Database::open_in_memory().unwrap();
        assert!(ensure_admin(&db, "root", "pw").unwrap());
        assert!(!ensure_admin(&db, "root2", "pw").unwrap());
    }
}
