use sqlx::SqliteConnection;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    auth::{
        claims::Claims,
        error::AuthError,
        jwt::JwtKeys,
        ledger::TokenLedger,
        password::{hash_password, verify_dummy, verify_password},
        repo_types::User,
    },
    db::is_unique_violation,
    error::AppError,
};

/// Stores a salted hash of `raw_password` and returns the new user id.
pub async fn register(
    conn: &mut SqliteConnection,
    username: &str,
    raw_password: &str,
) -> Result<i64, AppError> {
    let hash = hash_password(raw_password)?;
    let user = User::create(conn, username, &hash).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::DuplicateUsername
        } else {
            AppError::Storage(e)
        }
    })?;
    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user.id)
}

/// Returns the user id on an exact password match. Unknown usernames and
/// wrong passwords are indistinguishable to the caller.
pub async fn verify_credentials(
    conn: &mut SqliteConnection,
    username: &str,
    raw_password: &str,
) -> Result<i64, AppError> {
    let Some(user) = User::find_by_username(conn, username).await? else {
        verify_dummy(raw_password);
        warn!(%username, "login unknown username");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(raw_password, &user.password_hash)? {
        warn!(%username, user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }
    Ok(user.id)
}

pub async fn delete_user(conn: &mut SqliteConnection, user_id: i64) -> Result<(), AppError> {
    if User::delete(conn, user_id).await? == 0 {
        return Err(AppError::NotFound("User"));
    }
    info!(user_id, "user deleted");
    Ok(())
}

pub async fn get_user(conn: &mut SqliteConnection, user_id: i64) -> Result<User, AppError> {
    User::find_by_id(conn, user_id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Verifies the credentials and mints an access token.
pub async fn login(
    conn: &mut SqliteConnection,
    keys: &JwtKeys,
    username: &str,
    raw_password: &str,
) -> Result<String, AppError> {
    let user_id = verify_credentials(conn, username, raw_password).await?;
    let token = keys.sign_access(user_id)?;
    info!(user_id, "user logged in");
    Ok(token)
}

/// Decides whether a bearer token may be trusted. Signature and expiry come
/// first; a token that passes them is still refused once its jti is revoked.
pub async fn authenticate(
    keys: &JwtKeys,
    ledger: &dyn TokenLedger,
    token: Option<&str>,
) -> Result<Claims, AppError> {
    let token = token.ok_or(AuthError::MissingToken)?;
    let claims = keys.verify(token).map_err(|e| {
        warn!(reason = e.code(), "token rejected");
        e
    })?;
    if ledger.is_revoked(&claims.jti).await? {
        warn!(user_id = claims.sub, jti = %claims.jti, "revoked token presented");
        return Err(AuthError::TokenRevoked.into());
    }
    Ok(claims)
}

pub async fn logout(
    ledger: &dyn TokenLedger,
    claims: &Claims,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    ledger.revoke(&claims.jti, now).await?;
    info!(user_id = claims.sub, jti = %claims.jti, "user logged out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::ledger::MemoryTokenLedger, config::JwtConfig, db};
    use sqlx::SqlitePool;

    async fn pool() -> SqlitePool {
        let pool = db::connect_in_memory().await.expect("pool");
        db::migrate(&pool).await.expect("migrate");
        pool
    }

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 5,
        })
    }

    #[tokio::test]
    async fn register_then_verify() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let id = register(&mut conn, "alice", "pw1").await.expect("register");
        assert_eq!(verify_credentials(&mut conn, "alice", "pw1").await.unwrap(), id);
        assert!(matches!(
            verify_credentials(&mut conn, "alice", "pw2").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn unknown_user_and_bad_password_look_the_same() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        register(&mut conn, "alice", "pw1").await.unwrap();

        let unknown = verify_credentials(&mut conn, "bob", "pw1").await.unwrap_err();
        let wrong = verify_credentials(&mut conn, "alice", "nope").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.code(), wrong.code());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        register(&mut conn, "alice", "pw1").await.unwrap();
        assert!(matches!(
            register(&mut conn, "alice", "other").await,
            Err(AppError::DuplicateUsername)
        ));
    }

    #[tokio::test]
    async fn password_is_not_stored_in_plaintext() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let id = register(&mut conn, "alice", "hunter2").await.unwrap();
        let user = get_user(&mut conn, id).await.unwrap();
        assert!(!user.password_hash.contains("hunter2"));
        assert!(user.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn delete_user_twice_is_not_found() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let id = register(&mut conn, "alice", "pw1").await.unwrap();
        delete_user(&mut conn, id).await.unwrap();
        assert!(matches!(delete_user(&mut conn, id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            verify_credentials(&mut conn, "alice", "pw1").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn login_issues_token_for_user() {
        let pool = pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let id = register(&mut conn, "alice", "pw1").await.unwrap();
        let keys = keys();

        let token = login(&mut conn, &keys, "alice", "pw1").await.unwrap();
        let ledger = MemoryTokenLedger::new();
        let claims = authenticate(&keys, &ledger, Some(&token)).await.unwrap();
        assert_eq!(claims.sub, id);

        assert!(matches!(
            login(&mut conn, &keys, "alice", "pw").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn authenticate_distinguishes_failures() {
        let keys = keys();
        let ledger = MemoryTokenLedger::new();

        let missing = authenticate(&keys, &ledger, None).await.unwrap_err();
        assert_eq!(missing.code(), "authorization_required");

        let invalid = authenticate(&keys, &ledger, Some("garbage")).await.unwrap_err();
        assert_eq!(invalid.code(), "invalid_token");

        let stale = keys
            .sign_access_at(1, OffsetDateTime::now_utc() - time::Duration::hours(1))
            .unwrap();
        let expired = authenticate(&keys, &ledger, Some(&stale)).await.unwrap_err();
        assert_eq!(expired.code(), "token_expired");
    }

    #[tokio::test]
    async fn token_just_past_expiry_is_refused() {
        let keys = keys();
        let ledger = MemoryTokenLedger::new();
        // five minute ttl, issued five and a half minutes ago
        let token = keys
            .sign_access_at(1, OffsetDateTime::now_utc() - time::Duration::seconds(330))
            .unwrap();
        let err = authenticate(&keys, &ledger, Some(&token)).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn logout_revokes_only_that_token() {
        let keys = keys();
        let ledger = MemoryTokenLedger::new();
        let t1 = keys.sign_access(1).unwrap();
        let t2 = keys.sign_access(1).unwrap();

        let claims = authenticate(&keys, &ledger, Some(&t1)).await.unwrap();
        logout(&ledger, &claims, OffsetDateTime::now_utc()).await.unwrap();

        let err = authenticate(&keys, &ledger, Some(&t1)).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenRevoked)));
        // signature and expiry are still fine on the revoked token
        assert!(keys.verify(&t1).is_ok());
        assert!(authenticate(&keys, &ledger, Some(&t2)).await.is_ok());
    }

    #[tokio::test]
    async fn expired_and_revoked_token_reports_expiry() {
        let keys = keys();
        let ledger = MemoryTokenLedger::new();
        let stale = keys
            .sign_access_at(1, OffsetDateTime::now_utc() - time::Duration::hours(1))
            .unwrap();
        let jti = {
            let mut validation = jsonwebtoken::Validation::default();
            validation.validate_exp = false;
            validation.set_audience(&["aud"]);
            validation.set_issuer(&["iss"]);
            jsonwebtoken::decode::<Claims>(&stale, &keys.decoding, &validation)
                .unwrap()
                .claims
                .jti
        };
        ledger.revoke(&jti, OffsetDateTime::now_utc()).await.unwrap();

        let err = authenticate(&keys, &ledger, Some(&stale)).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::TokenExpired)));
    }
}
