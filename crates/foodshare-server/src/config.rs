use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Bootstrap admin credentials, used only while no admin exists.
    pub admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("FOODSHARE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FOODSHARE_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let port = var("FOODSHARE_PORT", "3000")
            .parse()
            .context("FOODSHARE_PORT must be a port number")?;
        let token_ttl_hours: i64 = var("FOODSHARE_TOKEN_TTL_HOURS", "12")
            .parse()
            .context("FOODSHARE_TOKEN_TTL_HOURS must be a number of hours")?;
        if token_ttl_hours <= 0 {
            bail!("FOODSHARE_TOKEN_TTL_HOURS must be positive");
        }

        let admin = match (
            get("FOODSHARE_ADMIN_USERNAME"),
            get("FOODSHARE_ADMIN_PASSWORD"),
        ) {
            (Some(user), Some(pass)) if !user.trim().is_empty() && !pass.is_empty() => {
                Some((user.trim().to_string(), pass))
            }
            _ => None,
        };

        Ok(Self {
            host: var("FOODSHARE_HOST", "0.0.0.0"),
            port,
            db_path: var("FOODSHARE_DB_PATH", "foodshare.db").into(),
            data_dir: var("FOODSHARE_DATA_DIR", ".").into(),
            jwt_secret,
            token_ttl_hours,
            admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_once_secret_is_set() {
        let cfg = config(&[("FOODSHARE_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, PathBuf::from("foodshare.db"));
        assert_eq!(cfg.token_ttl_hours, 12);
        assert!(cfg.admin.is_none());
    }

    #[test]
    fn placeholder_secrets_are_rejected() {
        assert!(config(&[]).is_err());
        assert!(config(&[("FOODSHARE_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn admin_needs_both_halves() {
        let cfg = config(&[
            ("FOODSHARE_JWT_SECRET", "a-real-secret"),
            ("FOODSHARE_ADMIN_USERNAME", "root"),
        ])
        .unwrap();
        assert!(cfg.admin.is_none());

        let cfg = config(&[
            ("FOODSHARE_JWT_SECRET", "a-real-secret"),
            ("FOODSHARE_ADMIN_USERNAME", "root"),
            ("FOODSHARE_ADMIN_PASSWORD", "hunter22"),
        ])
        .unwrap();
        assert_eq!(cfg.admin, Some(("root".into(), "hunter22".into())));
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(config(&[("FOODSHARE_JWT_SECRET", "x1"), ("FOODSHARE_PORT", "http")]).is_err());
    }
}
