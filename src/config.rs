//! Runtime configuration, read once from the environment (after `.env` is loaded).

use std::net::SocketAddr;

use crate::db::DbConfig;

/// Fallback token secret for local development only.
pub const DEV_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match std::env::var("ENVIRONMENT").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// How session tokens from the identity provider are verified.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 shared secret
    pub jwt_secret: String,
    /// RS256 public key (PEM). Takes precedence over the secret when set.
    pub jwt_public_key: Option<String>,
    pub issuer: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            jwt_secret: std::env::var("AUTH_JWT_SECRET")
                .unwrap_or_else(|_| DEV_JWT_SECRET.to_string()),
            jwt_public_key: non_empty_var("AUTH_JWT_PUBLIC_KEY"),
            issuer: non_empty_var("AUTH_JWT_ISSUER"),
        }
    }

    /// True when neither a public key nor a non-default secret is configured.
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_public_key.is_none()
            && (self.jwt_secret.is_empty() || self.jwt_secret == DEV_JWT_SECRET)
    }
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

impl CloudinaryConfig {
    /// `None` unless cloud name, key and secret are all present.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            cloud_name: non_empty_var("CLOUDINARY_CLOUD_NAME")?,
            api_key: non_empty_var("CLOUDINARY_API_KEY")?,
            api_secret: non_empty_var("CLOUDINARY_API_SECRET")?,
            folder: non_empty_var("CLOUDINARY_FOLDER").unwrap_or_else(|| "portfolio".to_string()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub bind_addr: SocketAddr,
    /// `None` runs the service on the in-memory store.
    pub database: Option<DbConfig>,
    pub auth: AuthConfig,
    pub cloudinary: Option<CloudinaryConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        // Bind address is configurable via HOST / PORT env vars.
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3001);
        let bind_addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| format!("Invalid HOST/PORT configuration: {}", e))?;

        let database = std::env::var("DATABASE_URL")
            .ok()
            .map(|_| DbConfig::default());

        Ok(Self {
            environment: Environment::from_env(),
            bind_addr,
            database,
            auth: AuthConfig::from_env(),
            cloudinary: CloudinaryConfig::from_env(),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_secret_detection() {
        let auth = AuthConfig {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_public_key: None,
            issuer: None,
        };
        assert!(auth.uses_default_secret());

        let auth = AuthConfig {
            jwt_public_key: Some("-----BEGIN PUBLIC KEY-----".to_string()),
            ..auth
        };
        assert!(!auth.uses_default_secret());
    }

    #[test]
    fn test_environment_names() {
        assert_eq!(Environment::Production.as_str(), "production");
        assert!(!Environment::Development.is_production());
    }
}
