use anyhow::{bail, Context};
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub addr:         SocketAddr,
    pub frontend_url: String,
    pub jwt_secret:   Option<String>,
    pub require_auth: bool,
}

impl Config {
    /// `.env` first, then the process environment.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = match get("PORT") {
            Some(p) => p.parse().with_context(|| format!("PORT is not a port number: {p}"))?,
            None    => 4000,
        };
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("bad HOST: {host}"))?;

        let jwt_secret = get("JWT_SECRET").filter(|s| !s.is_empty());
        let require_auth = match get("REQUIRE_AUTH").as_deref() {
            None | Some("") => false,
            Some(v) => parse_bool(v).with_context(|| format!("REQUIRE_AUTH is not a bool: {v}"))?,
        };
        if require_auth && jwt_secret.is_none() {
            bail!("REQUIRE_AUTH=true needs JWT_SECRET");
        }

        Ok(Self {
            addr,
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".into()),
            jwt_secret,
            require_auth,
        })
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on"  => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = cfg(&[]).unwrap();
        assert_eq!(c.addr.to_string(), "0.0.0.0:4000");
        assert_eq!(c.frontend_url, "http://localhost:3000");
        assert!(c.jwt_secret.is_none());
        assert!(!c.require_auth);
    }

    #[test]
    fn overrides() {
        let c = cfg(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("JWT_SECRET", "s3cret"),
            ("REQUIRE_AUTH", "yes"),
        ])
        .unwrap();
        assert_eq!(c.addr.to_string(), "127.0.0.1:9000");
        assert_eq!(c.jwt_secret.as_deref(), Some("s3cret"));
        assert!(c.require_auth);
    }

    #[test]
    fn rejects_garbage() {
        assert!(cfg(&[("PORT", "http")]).is_err());
        assert!(cfg(&[("REQUIRE_AUTH", "maybe"), ("JWT_SECRET", "x")]).is_err());
        assert!(cfg(&[("REQUIRE_AUTH", "true")]).is_err());
    }
}
