use std::env;
use std::time::Duration;
use tracing::warn;

const DEFAULT_STORAGE_BUCKET: &str = "chat-files";
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_API_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_storage_bucket: String,
    /// Shared secret for message payload encryption. `None` when unset; the
    /// codec refuses to start without it.
    pub message_encryption_secret: Option<String>,
    pub store_write_timeout_secs: u64,
    pub api_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using in-process stores");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, every bearer token will be rejected");
                    String::new()
                }),
            supabase_storage_bucket: env::var("SUPABASE_STORAGE_BUCKET")
                .unwrap_or_else(|_| DEFAULT_STORAGE_BUCKET.to_string()),
            message_encryption_secret: env::var("MESSAGE_ENCRYPTION_SECRET")
                .ok()
                .filter(|secret| !secret.trim().is_empty()),
            store_write_timeout_secs: parse_or_default("STORE_WRITE_TIMEOUT_SECS", DEFAULT_WRITE_TIMEOUT_SECS),
            api_port: parse_or_default("API_PORT", DEFAULT_API_PORT),
        };

        if !config.is_configured() {
            warn!("Supabase not fully configured - falling back to in-process persistence");
        }

        config
    }

    /// Whether the remote document store and blob storage can be used.
    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_service_role_key.is_empty()
    }

    pub fn store_write_timeout(&self) -> Duration {
        Duration::from_secs(self.store_write_timeout_secs.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            supabase_storage_bucket: DEFAULT_STORAGE_BUCKET.to_string(),
            message_encryption_secret: None,
            store_write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            api_port: DEFAULT_API_PORT,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_not_remote() {
        let config = AppConfig::default();
        assert!(!config.is_configured());
        assert!(config.message_encryption_secret.is_none());
        assert_eq!(config.supabase_storage_bucket, "chat-files");
    }

    #[test]
    fn write_timeout_never_zero() {
        let config = AppConfig {
            store_write_timeout_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.store_write_timeout(), Duration::from_secs(1));
    }
}
