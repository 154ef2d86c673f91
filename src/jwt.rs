//! JWT token issuance and verification.
//!
//! Dual-token system: short-lived access tokens (15 minutes, stateless) and
//! long-lived refresh tokens (7 days, tracked in the session store). The two
//! kinds are signed with independent secrets, so leaking one key never
//! confers forging power over the other.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Claims carried by an access token.
///
/// Exactly `sub`/`iat`/`exp`; any extra field rejects the token before its
/// contents are trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessClaims {
    /// Subject (user UUID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Claims carried by a refresh token, signed with the refresh secret.
///
/// Carries a unique `jti` on top of the base claim set: revocation works by
/// comparing the presented token against the store's current value, which
/// only holds if every issuance produces a distinct string; two logins in
/// the same second would otherwise mint byte-identical tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    /// Subject (user UUID)
    pub sub: String,
    /// Unique token identifier
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// A signed token string with its expiry metadata.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds (cookie Max-Age)
    pub duration: u64,
}

/// The access/refresh pair issued at login and signup.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Issues and verifies the token pair. No side effects; never touches the
/// session store.
#[derive(Clone)]
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenIssuer {
    /// Create an issuer from the two independent signing secrets.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
        }
    }

    /// Issue a fresh access/refresh pair for a subject at the current time.
    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, TokenError> {
        self.issue_pair_at(subject, unix_now()?)
    }

    /// Issue a pair with an explicit clock. Used directly by tests.
    pub fn issue_pair_at(&self, subject: &str, now: u64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue_access_at(subject, now)?,
            refresh: self.issue_refresh_at(subject, now)?,
        })
    }

    /// Issue a new access token only. This is the refresh path: the refresh
    /// token is not rotated.
    pub fn issue_access(&self, subject: &str) -> Result<IssuedToken, TokenError> {
        self.issue_access_at(subject, unix_now()?)
    }

    pub fn issue_access_at(&self, subject: &str, now: u64) -> Result<IssuedToken, TokenError> {
        let exp = now + ACCESS_TOKEN_DURATION_SECS;
        let claims = AccessClaims {
            sub: subject.to_string(),
            iat: now,
            exp,
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(TokenError::Encoding)?;
        Ok(IssuedToken {
            token,
            expires_at: exp,
            duration: ACCESS_TOKEN_DURATION_SECS,
        })
    }

    pub fn issue_refresh_at(&self, subject: &str, now: u64) -> Result<IssuedToken, TokenError> {
        let exp = now + REFRESH_TOKEN_DURATION_SECS;
        let claims = RefreshClaims {
            sub: subject.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp,
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(TokenError::Encoding)?;
        Ok(IssuedToken {
            token,
            expires_at: exp,
            duration: REFRESH_TOKEN_DURATION_SECS,
        })
    }

    /// Verify an access token against the current time.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify_access_at(token, unix_now()?)
    }

    /// Verify an access token against an explicit clock.
    ///
    /// Signature and claim shape are checked first; a well-signed token whose
    /// `exp` has passed yields [`TokenError::Expired`], which is the only
    /// failure a caller may answer with a refresh attempt.
    pub fn verify_access_at(&self, token: &str, now: u64) -> Result<AccessClaims, TokenError> {
        let data =
            jsonwebtoken::decode::<AccessClaims>(token, &self.access_decoding, &validation())
                .map_err(TokenError::Malformed)?;
        if now >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }

    /// Verify a refresh token against the current time.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify_refresh_at(token, unix_now()?)
    }

    /// Verify a refresh token against an explicit clock.
    pub fn verify_refresh_at(&self, token: &str, now: u64) -> Result<RefreshClaims, TokenError> {
        let data =
            jsonwebtoken::decode::<RefreshClaims>(token, &self.refresh_decoding, &validation())
                .map_err(TokenError::Malformed)?;
        if now >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}

/// Expiry is checked by the caller against its own clock, so only signature
/// and claim shape are delegated to jsonwebtoken.
fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = false;
    validation
}

fn unix_now() -> Result<u64, TokenError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TokenError::TimeError)?
        .as_secs())
}

/// Errors that can occur during token operations.
#[derive(Debug)]
pub enum TokenError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature or claim shape; terminal, never answered with a refresh
    Malformed(jsonwebtoken::errors::Error),
    /// Well-signed but past its expiry
    Expired,
    /// System time error
    TimeError,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Malformed(e) => write!(f, "Invalid token: {}", e),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_issuer() -> TokenIssuer {
        TokenIssuer::new(b"access-secret-for-testing", b"refresh-secret-for-testing")
    }

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn test_issue_and_verify_round_trip() {
        let issuer = test_issuer();
        let pair = issuer.issue_pair_at("uuid-123", NOW).unwrap();

        let access = issuer.verify_access_at(&pair.access.token, NOW).unwrap();
        assert_eq!(access.sub, "uuid-123");
        assert_eq!(access.iat, NOW);
        assert_eq!(access.exp, NOW + ACCESS_TOKEN_DURATION_SECS);

        let refresh = issuer.verify_refresh_at(&pair.refresh.token, NOW).unwrap();
        assert_eq!(refresh.sub, "uuid-123");
        assert_eq!(refresh.exp, NOW + REFRESH_TOKEN_DURATION_SECS);
        assert!(!refresh.jti.is_empty());
    }

    #[test]
    fn test_refresh_tokens_are_unique_per_issuance() {
        let issuer = test_issuer();

        // Same subject, same clock second: the strings must still differ, or
        // store-equality revocation could not tell two logins apart.
        let first = issuer.issue_refresh_at("uuid-123", NOW).unwrap();
        let second = issuer.issue_refresh_at("uuid-123", NOW).unwrap();
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_access_token_valid_until_exactly_expiry() {
        let issuer = test_issuer();
        let pair = issuer.issue_pair_at("uuid-123", NOW).unwrap();

        // Valid over the whole half-open window [iat, iat + 900)
        assert!(issuer.verify_access_at(&pair.access.token, NOW).is_ok());
        assert!(
            issuer
                .verify_access_at(&pair.access.token, NOW + ACCESS_TOKEN_DURATION_SECS - 1)
                .is_ok()
        );

        // Expired at iat + 900 and after
        for t in [
            NOW + ACCESS_TOKEN_DURATION_SECS,
            NOW + ACCESS_TOKEN_DURATION_SECS + 1,
            NOW + REFRESH_TOKEN_DURATION_SECS,
        ] {
            match issuer.verify_access_at(&pair.access.token, t) {
                Err(TokenError::Expired) => {}
                other => panic!("expected Expired at t={}, got {:?}", t, other),
            }
        }
    }

    #[test]
    fn test_expired_is_distinct_from_malformed() {
        let issuer = test_issuer();
        let pair = issuer.issue_pair_at("uuid-123", NOW).unwrap();

        assert!(matches!(
            issuer.verify_access_at(&pair.access.token, NOW + ACCESS_TOKEN_DURATION_SECS),
            Err(TokenError::Expired)
        ));
        assert!(matches!(
            issuer.verify_access_at("not-a-token", NOW),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = test_issuer();
        let other = TokenIssuer::new(b"different-access-secret", b"different-refresh-secret");

        let pair = issuer.issue_pair_at("uuid-123", NOW).unwrap();
        assert!(matches!(
            other.verify_access_at(&pair.access.token, NOW),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            other.verify_refresh_at(&pair.refresh.token, NOW),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_tokens_do_not_cross_validate() {
        let issuer = test_issuer();
        let pair = issuer.issue_pair_at("uuid-123", NOW).unwrap();

        // Distinct secrets: a refresh token never verifies as an access token
        // and vice versa, even though the claim shapes match.
        assert!(matches!(
            issuer.verify_access_at(&pair.refresh.token, NOW),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            issuer.verify_refresh_at(&pair.access.token, NOW),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_tampered_payload_rejected_regardless_of_expiry() {
        let issuer = test_issuer();
        let pair = issuer.issue_pair_at("uuid-123", NOW).unwrap();

        // Splice in a forged payload with a far-future expiry, keeping the
        // original header and signature.
        let parts: Vec<&str> = pair.access.token.split('.').collect();
        let forged_claims = format!(
            r#"{{"sub":"uuid-456","iat":{},"exp":{}}}"#,
            NOW,
            NOW + 10 * REFRESH_TOKEN_DURATION_SECS
        );
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            encode_segment(forged_claims.as_bytes()),
            parts[2]
        );

        assert!(matches!(
            issuer.verify_access_at(&forged, NOW),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_extra_claim_fields_rejected() {
        // A token whose payload carries fields beyond sub/iat/exp fails shape
        // validation even when the signature is genuine.
        #[derive(Serialize)]
        struct WideClaims {
            sub: String,
            iat: u64,
            exp: u64,
            role: String,
        }

        let secret = b"access-secret-for-testing";
        let token = jsonwebtoken::encode(
            &Header::default(),
            &WideClaims {
                sub: "uuid-123".to_string(),
                iat: NOW,
                exp: NOW + ACCESS_TOKEN_DURATION_SECS,
                role: "admin".to_string(),
            },
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let issuer = TokenIssuer::new(secret, b"refresh-secret-for-testing");
        assert!(matches!(
            issuer.verify_access_at(&token, NOW),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_claim_fields_rejected() {
        #[derive(Serialize)]
        struct NarrowClaims {
            sub: String,
            exp: u64,
        }

        let secret = b"access-secret-for-testing";
        let token = jsonwebtoken::encode(
            &Header::default(),
            &NarrowClaims {
                sub: "uuid-123".to_string(),
                exp: NOW + ACCESS_TOKEN_DURATION_SECS,
            },
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let issuer = TokenIssuer::new(secret, b"refresh-secret-for-testing");
        assert!(matches!(
            issuer.verify_access_at(&token, NOW),
            Err(TokenError::Malformed(_))
        ));
    }

    /// Minimal base64url encoder for building forged JWT segments in tests.
    fn encode_segment(input: &[u8]) -> String {
        const ALPHABET: &[u8; 64] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
        let mut out = String::new();
        for chunk in input.chunks(3) {
            let b = [
                chunk[0],
                chunk.get(1).copied().unwrap_or(0),
                chunk.get(2).copied().unwrap_or(0),
            ];
            out.push(ALPHABET[(b[0] >> 2) as usize] as char);
            out.push(ALPHABET[(((b[0] & 0x03) << 4) | (b[1] >> 4)) as usize] as char);
            if chunk.len() > 1 {
                out.push(ALPHABET[(((b[1] & 0x0f) << 2) | (b[2] >> 6)) as usize] as char);
            }
            if chunk.len() > 2 {
                out.push(ALPHABET[(b[2] & 0x3f) as usize] as char);
            }
        }
        out
    }
}
