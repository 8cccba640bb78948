use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Session token minted by the login service after the OAuth exchange.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub:  String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp:  i64,
}

/// Identity a verified token binds to one socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub name:    Option<String>,
}

pub fn verify(token: &str, secret: &str) -> Option<Identity> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()),
                     &Validation::new(Algorithm::HS256))
        .map(|d| Identity { user_id: d.claims.sub, name: d.claims.name })
        .map_err(|e| tracing::debug!(error = %e, "token rejected"))
        .ok()
}

#[cfg(test)]
pub fn sign(uid: &str, name: Option<&str>, secret: &str, ttl_secs: i64) -> String {
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    let c = Claims { sub: uid.into(), name: name.map(Into::into), exp: Utc::now().timestamp() + ttl_secs };
    encode(&Header::default(), &c, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("HS256 signing cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_carries_name() {
        let t = sign("u-1", Some("Ada"), "k", 60);
        assert_eq!(
            verify(&t, "k"),
            Some(Identity { user_id: "u-1".into(), name: Some("Ada".into()) })
        );
    }

    #[test]
    fn wrong_secret_or_expired_is_rejected() {
        let t = sign("u-1", None, "k", 60);
        assert_eq!(verify(&t, "other"), None);

        let stale = sign("u-1", None, "k", -3600);
        assert_eq!(verify(&stale, "k"), None);
        assert_eq!(verify("not-a-jwt", "k"), None);
    }
}
