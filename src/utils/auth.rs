//! Authentication utilities: password hashing and JWT handling

use anyhow::Result;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

const PBKDF2_ITERATIONS: u32 = 100_000;
const HASH_LENGTH: usize = 32;

/// Access tokens are short-lived; refresh tokens last a month
pub const ACCESS_TOKEN_TTL: u64 = 3600;
pub const REFRESH_TOKEN_TTL: u64 = 30 * 24 * 3600;

/// JWT claims. `jti` identifies the token in the revocation set.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: i64,
    pub exp: usize,
    pub jti: String,
    #[serde(default)]
    pub token_type: String,
}

/// Hash a password using pbkdf2-sha256 with the server salt
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut hash,
    );
    hex::encode(hash)
}

/// Verify a password against a hash using constant-time comparison
pub fn verify_password(password: &str, salt: &str, hash: &str) -> bool {
    let computed = hash_password(password, salt);
    computed.as_bytes().ct_eq(hash.as_bytes()).into()
}

/// Generate a random alphanumeric string of the given length
pub fn generate_random_string(length: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Create a JWT with token type and ttl seconds; returns (token, jti)
pub fn create_jwt(
    user_id: i64,
    secret: &str,
    token_type: &str,
    expires_in: u64,
) -> Result<(String, String)> {
    let expiration = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() + expires_in;
    let jti = uuid::Uuid::new_v4().to_string();

    let claims = Claims {
        sub: user_id,
        exp: expiration as usize,
        jti: jti.clone(),
        token_type: token_type.to_string(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, jti))
}

/// Verify a JWT and optionally enforce its token type
pub fn verify_jwt(token: &str, secret: &str, expected_type: Option<&str>) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.sub = None;
    validation.required_spec_claims.clear();

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    let claims = token_data.claims;
    if let Some(t) = expected_type {
        if claims.token_type != t {
            return Err(anyhow::anyhow!("Invalid token type"));
        }
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_verify() {
        let hash = hash_password("sekrit", "salt-1");
        assert!(verify_password("sekrit", "salt-1", &hash));
        assert!(!verify_password("wrong", "salt-1", &hash));
        assert!(!verify_password("sekrit", "salt-2", &hash));
    }

    #[test]
    fn test_jwt_roundtrip() {
        let (token, jti) = create_jwt(42, "secret", "access", 60).unwrap();
        let claims = verify_jwt(&token, "secret", Some("access")).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.jti, jti);

        // wrong secret rejected
        assert!(verify_jwt(&token, "other", Some("access")).is_err());
        // wrong type rejected
        assert!(verify_jwt(&token, "secret", Some("refresh")).is_err());
    }

    #[test]
    fn test_random_string() {
        let s1 = generate_random_string(16);
        let s2 = generate_random_string(16);
        assert_eq!(s1.len(), 16);
        assert_ne!(s1, s2);
    }
}
