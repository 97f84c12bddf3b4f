use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::models::{Claims, TokenType};

/// Decodes and checks a bearer token. Only access tokens open the API;
/// refresh tokens belong to the identity provider.
pub fn verify_access_token(token: &str, secret: &str) -> Result<Claims, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())?;

    if claims.token_type != TokenType::Access {
        return Err("not an access token".to_string());
    }
    Ok(claims)
}

#[cfg(test)]
pub mod testing {
    use std::time::{SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    use crate::models::{Claims, TokenType};

    /// Mints a token the way the identity provider does.
    pub fn token(
        user_id: u64,
        role: u8,
        employee_id: Option<u64>,
        token_type: TokenType,
        secret: &str,
    ) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize;
        let claims = Claims {
            user_id,
            sub: format!("user{user_id}"),
            role,
            exp: now + 900,
            jti: Uuid::new_v4().to_string(),
            token_type,
            employee_id,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::token;
    use super::*;

    #[test]
    fn access_token_verifies() {
        let t = token(4, 2, Some(40), TokenType::Access, "s3cret");
        let claims = verify_access_token(&t, "s3cret").unwrap();
        assert_eq!(claims.user_id, 4);
        assert_eq!(claims.employee_id, Some(40));
    }

    #[test]
    fn refresh_token_is_refused() {
        let t = token(4, 2, None, TokenType::Refresh, "s3cret");
        assert!(verify_access_token(&t, "s3cret").is_err());
    }

    #[test]
    fn wrong_secret_is_refused() {
        let t = token(4, 2, None, TokenType::Access, "s3cret");
        assert!(verify_access_token(&t, "other").is_err());
    }
}
