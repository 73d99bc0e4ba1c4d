//! Token-based session lifecycle.
//!
//! # Responsibility
//! - Issue access/refresh pairs and single-purpose reset/verify tokens.
//! - Verify, rotate, revoke and consume persisted tokens.
//!
//! # Invariants
//! - Every kind is signed and verified with its own non-blank secret.
//! - Every issued token carries a fresh `jti`, so a deterministic signer
//!   never reissues a string that was already rotated out.
//! - Only refresh, reset-password and verify-email tokens are persisted;
//!   access tokens are self-contained.
//! - A refresh token is single-use: rotation removes it before issuing a
//!   new pair.
//! - Token strings never appear in log events.
//!
//! Signing is delegated to a [`TokenSigner`]; this module never implements
//! cryptography itself.

use crate::config::{ConfigError, TokenConfig};
use crate::repo::error::RepoError;
use crate::repo::token_repo::{TokenKind, TokenRecord, TokenRepository};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type SessionResult<T> = Result<T, SessionError>;

/// Payload carried inside every signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject user id.
    pub sub: String,
    /// Expiry as unix seconds.
    pub exp: i64,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Unique token id.
    pub jti: Uuid,
}

/// Signer could not produce or accept a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerError(pub String);

impl Display for SignerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "token signer error: {}", self.0)
    }
}

impl Error for SignerError {}

/// Opaque token signing collaborator, e.g. a JWT implementation.
pub trait TokenSigner {
    fn sign(&self, claims: &TokenClaims, secret: &str) -> Result<String, SignerError>;
    /// Checks the signature and returns the embedded claims.
    fn verify(&self, token: &str, secret: &str) -> Result<TokenClaims, SignerError>;
}

#[derive(Debug)]
pub enum SessionError {
    /// Token is expired or of the wrong kind.
    Unauthorized(&'static str),
    /// Token verified but is not (or no longer) stored.
    TokenNotFound,
    AlreadyBlacklisted,
    Signer(SignerError),
    Repo(RepoError),
    Config(ConfigError),
}

impl SessionError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) | Self::Signer(_) => 401,
            Self::TokenNotFound | Self::AlreadyBlacklisted => 400,
            Self::Repo(err) => err.status_code(),
            Self::Config(_) => 500,
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized(reason) => write!(f, "unauthorized: {reason}"),
            Self::TokenNotFound => write!(f, "Token not found"),
            Self::AlreadyBlacklisted => write!(f, "token already blacklisted"),
            Self::Signer(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Signer(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SignerError> for SessionError {
    fn from(value: SignerError) -> Self {
        Self::Signer(value)
    }
}

impl From<ConfigError> for SessionError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// One issued token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// Access/refresh pair returned on login and rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthTokens {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Session use-cases over a token store and a signer.
pub struct SessionService<R: TokenRepository, G: TokenSigner> {
    tokens: R,
    signer: G,
    config: TokenConfig,
    clock: fn() -> DateTime<Utc>,
}

impl<R: TokenRepository, G: TokenSigner> SessionService<R, G> {
    /// Builds the service once `config` has a distinct secret per kind.
    pub fn try_new(tokens: R, signer: G, config: TokenConfig) -> SessionResult<Self> {
        config.ensure_secrets().map_err(|err| {
            warn!("event=session_init module=session status=error error_code=invalid_secrets");
            err
        })?;
        Ok(Self {
            tokens,
            signer,
            config,
            clock: Utc::now,
        })
    }

    /// Replaces the wall clock used for issuing and expiry checks.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Issues an access token and a persisted refresh token.
    pub fn generate_auth_tokens(&self, user_id: &str) -> SessionResult<AuthTokens> {
        let access = self.issue(user_id, TokenKind::Access)?;
        let refresh = self.issue_persisted(user_id, TokenKind::Refresh)?;
        Ok(AuthTokens { access, refresh })
    }

    /// Verifies `token` as `kind` and returns its stored record.
    pub fn verify_token(&self, token: &str, kind: TokenKind) -> SessionResult<TokenRecord> {
        let claims = self.verify_claims(token, kind)?;
        self.tokens
            .find_active(token, kind, &claims.sub)?
            .ok_or_else(|| {
                warn!(
                    "event=token_verify module=session status=error kind={} error_code=token_not_found",
                    kind.as_str()
                );
                SessionError::TokenNotFound
            })
    }

    /// Rotates a refresh token into a fresh access/refresh pair.
    pub fn refresh_auth(&self, refresh_token: &str) -> SessionResult<AuthTokens> {
        let record = self.verify_token(refresh_token, TokenKind::Refresh)?;
        self.tokens.remove_by_refresh_token(refresh_token)?;
        info!("event=token_rotate module=session status=ok kind=refresh");
        self.generate_auth_tokens(&record.user_id)
    }

    /// Removes a refresh token; unknown tokens are `TokenNotFound`.
    pub fn logout(&self, refresh_token: &str) -> SessionResult<()> {
        if !self.tokens.remove_by_refresh_token(refresh_token)? {
            return Err(SessionError::TokenNotFound);
        }
        info!("event=logout module=session status=ok");
        Ok(())
    }

    /// Verifies an access token and returns its claims.
    pub fn authenticate(&self, access_token: &str) -> SessionResult<TokenClaims> {
        self.verify_claims(access_token, TokenKind::Access)
    }

    pub fn generate_reset_password_token(&self, user_id: &str) -> SessionResult<IssuedToken> {
        self.issue_persisted(user_id, TokenKind::ResetPassword)
    }

    pub fn generate_verify_email_token(&self, user_id: &str) -> SessionResult<IssuedToken> {
        self.issue_persisted(user_id, TokenKind::VerifyEmail)
    }

    /// Redeems a single-purpose token and drops every token of that kind
    /// for its user. Returns the user id.
    pub fn consume_token(&self, token: &str, kind: TokenKind) -> SessionResult<String> {
        let record = self.verify_token(token, kind)?;
        let removed = self
            .tokens
            .remove_many_by_user_and_kind(&record.user_id, kind)?;
        info!(
            "event=token_consume module=session status=ok kind={} removed={removed}",
            kind.as_str()
        );
        Ok(record.user_id)
    }

    /// Blacklists a stored token so it can no longer be verified.
    pub fn revoke(&self, token: &str, kind: TokenKind) -> SessionResult<()> {
        let record = self.verify_token(token, kind)?;
        if !self.tokens.blacklist(record.id)? {
            return Err(SessionError::AlreadyBlacklisted);
        }
        info!(
            "event=token_revoke module=session status=ok kind={}",
            kind.as_str()
        );
        Ok(())
    }

    fn issue(&self, user_id: &str, kind: TokenKind) -> SessionResult<IssuedToken> {
        let expires = (self.clock)() + self.config.ttl_for(kind);
        let claims = TokenClaims {
            sub: user_id.to_string(),
            exp: expires.timestamp(),
            kind,
            jti: Uuid::new_v4(),
        };
        let token = self.signer.sign(&claims, self.config.secret_for(kind))?;
        Ok(IssuedToken { token, expires })
    }

    fn issue_persisted(&self, user_id: &str, kind: TokenKind) -> SessionResult<IssuedToken> {
        let issued = self.issue(user_id, kind)?;
        self.tokens.insert(&TokenRecord::new(
            issued.token.as_str(),
            user_id,
            kind,
            issued.expires.timestamp(),
        ))?;
        info!(
            "event=token_issue module=session status=ok kind={}",
            kind.as_str()
        );
        Ok(issued)
    }

    fn verify_claims(&self, token: &str, kind: TokenKind) -> SessionResult<TokenClaims> {
        let claims = self.signer.verify(token, self.config.secret_for(kind))?;
        if claims.kind != kind {
            return Err(SessionError::Unauthorized("unexpected token type"));
        }
        if claims.exp <= (self.clock)().timestamp() {
            return Err(SessionError::Unauthorized("token expired"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionError, SessionService, SignerError, TokenClaims, TokenSigner};
    use crate::config::{ConfigError, TokenConfig};
    use crate::db::open_db_in_memory;
    use crate::repo::token_repo::SqliteTokenRepository;

    /// Prefixes JSON claims with the secret; no cryptography.
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

    #[test]
    fn status_codes_follow_error_class() {
        assert_eq!(SessionError::Unauthorized("x").status_code(), 401);
        assert_eq!(SessionError::TokenNotFound.status_code(), 400);
        assert_eq!(
            SessionError::Signer(SignerError("bad".to_string())).status_code(),
            401
        );
    }

    #[test]
    fn plain_signer_rejects_foreign_secret() {
        let claims = TokenClaims {
            sub: "u-1".to_string(),
            exp: 10,
            kind: crate::repo::token_repo::TokenKind::Access,
            jti: uuid::Uuid::new_v4(),
        };
        let token = PlainSigner.sign(&claims, "a").unwrap();
        assert_eq!(PlainSigner.verify(&token, "a").unwrap(), claims);
        assert!(PlainSigner.verify(&token, "b").is_err());
    }

    #[test]
    fn service_requires_configured_secrets() {
        let conn = open_db_in_memory().unwrap();
        let tokens = SqliteTokenRepository::try_new(&conn).unwrap();

        let err = SessionService::try_new(tokens, PlainSigner, TokenConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SessionError::Config(ConfigError::MissingSecret(_))
        ));
        assert_eq!(err.status_code(), 500);
    }
}
