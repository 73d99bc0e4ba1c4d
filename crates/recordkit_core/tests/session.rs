use chrono::{DateTime, TimeZone, Utc};
use recordkit_core::session::{SessionError, SignerError};
use recordkit_core::{
    open_db_in_memory, SessionService, SqliteTokenRepository, TokenClaims, TokenConfig, TokenKind,
    TokenSigner,
};
use rusqlite::Connection;

/// `secret|claims-json`; deterministic, like an HMAC-signed JWT.
struct PlainSigner;

impl TokenSigner for PlainSigner {
    fn sign(&self, claims: &TokenClaims, secret: &str) -> Result<String, SignerError> {
        let payload = serde_json::to_string(claims).map_err(|e| SignerError(e.to_string()))?;
        Ok(format!("{secret}|{payload}"))
    }

    fn verify(&self, token: &str, secret: &str) -> Result<TokenClaims, SignerError> {
        let payload = token
            .strip_prefix(&format!("{secret}|"))
            .ok_or_else(|| SignerError("invalid signature".to_string()))?;
        serde_json::from_str(payload).map_err(|e| SignerError(e.to_string()))
    }
}

fn service(conn: &Connection) -> SessionService<SqliteTokenRepository<'_>, PlainSigner> {
    SessionService::try_new(
        SqliteTokenRepository::try_new(conn).unwrap(),
        PlainSigner,
        config(),
    )
    .ok()
    .unwrap()
}

#[test]
fn refresh_rotation_invalidates_previous_refresh_token() {
    let conn = open_db_in_memory().unwrap();
    let sessions = service(&conn);

    let first = sessions.generate_auth_tokens("u-1").unwrap();
    let second = sessions.refresh_auth(&first.refresh.token).unwrap();
    assert_ne!(first.refresh.token, second.refresh.token);
    assert_ne!(first.access.token, second.access.token);

    let err = sessions.refresh_auth(&first.refresh.token).unwrap_err();
    assert!(matches!(err, SessionError::TokenNotFound));
    assert_eq!(err.status_code(), 400);

    let claims = sessions.authenticate(&second.access.token).unwrap();
    assert_eq!(claims.sub, "u-1");
    assert_eq!(claims.kind, TokenKind::Access);
}

#[test]
fn same_second_issues_are_still_distinct_tokens() {
    let conn = open_db_in_memory().unwrap();
    let sessions = service(&conn).with_clock(start_of_today);

    let first = sessions.generate_auth_tokens("u-1").unwrap();
    let second = sessions.generate_auth_tokens("u-1").unwrap();
    assert_eq!(first.refresh.expires, second.refresh.expires);
    assert_ne!(first.refresh.token, second.refresh.token);

    sessions.logout(&first.refresh.token).unwrap();
    assert_eq!(
        sessions
            .verify_token(&second.refresh.token, TokenKind::Refresh)
            .unwrap()
            .user_id,
        "u-1"
    );
}

#[test]
fn logout_removes_refresh_token_once() {
    let conn = open_db_in_memory().unwrap();
    let sessions = service(&conn);

    let tokens = sessions.generate_auth_tokens("u-1").unwrap();
    sessions.logout(&tokens.refresh.token).unwrap();

    assert!(matches!(
        sessions.logout(&tokens.refresh.token),
        Err(SessionError::TokenNotFound)
    ));
    assert!(matches!(
        sessions.refresh_auth(&tokens.refresh.token),
        Err(SessionError::TokenNotFound)
    ));
}

#[test]
fn tokens_only_verify_as_their_own_kind() {
    let conn = open_db_in_memory().unwrap();
    let sessions = service(&conn);

    let tokens = sessions.generate_auth_tokens("u-1").unwrap();

    let err = sessions.authenticate(&tokens.refresh.token).unwrap_err();
    assert_eq!(err.status_code(), 401);
    assert!(sessions
        .verify_token(&tokens.access.token, TokenKind::Refresh)
        .is_err());
}

#[test]
fn consuming_reset_token_drops_every_reset_token_of_user() {
    let conn = open_db_in_memory().unwrap();
    let sessions = service(&conn);

    let first = sessions.generate_reset_password_token("u-1").unwrap();
    let second = sessions.generate_reset_password_token("u-1").unwrap();
    let other_user = sessions.generate_reset_password_token("u-2").unwrap();

    let user_id = sessions
        .consume_token(&first.token, TokenKind::ResetPassword)
        .unwrap();
    assert_eq!(user_id, "u-1");

    assert!(matches!(
        sessions.verify_token(&second.token, TokenKind::ResetPassword),
        Err(SessionError::TokenNotFound)
    ));
    assert_eq!(
        sessions
            .verify_token(&other_user.token, TokenKind::ResetPassword)
            .unwrap()
            .user_id,
        "u-2"
    );
}

#[test]
fn revoked_token_no_longer_verifies() {
    let conn = open_db_in_memory().unwrap();
    let sessions = service(&conn);

    let issued = sessions.generate_verify_email_token("u-1").unwrap();
    sessions.revoke(&issued.token, TokenKind::VerifyEmail).unwrap();

    assert!(matches!(
        sessions.revoke(&issued.token, TokenKind::VerifyEmail),
        Err(SessionError::TokenNotFound)
    ));
}

#[test]
fn expired_tokens_are_unauthorized() {
    let conn = open_db_in_memory().unwrap();
    let issued = service(&conn)
        .with_clock(long_ago)
        .generate_reset_password_token("u-1")
        .unwrap();
    assert_eq!(issued.expires, long_ago() + chrono::Duration::minutes(10));

    let err = service(&conn)
        .verify_token(&issued.token, TokenKind::ResetPassword)
        .unwrap_err();
    assert!(matches!(err, SessionError::Unauthorized(_)));
    assert_eq!(err.status_code(), 401);
}

fn start_of_today() -> DateTime<Utc> {
    Utc::now().date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc()
}

fn long_ago() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

fn config() -> TokenConfig {
    TokenConfig {
        access_secret: "access-secret".to_string(),
        refresh_secret: "refresh-secret".to_string(),
        reset_password_secret: "reset-secret".to_string(),
        verify_email_secret: "verify-secret".to_string(),
        ..TokenConfig::default()
    }
}
