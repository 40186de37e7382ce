use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_VIDEO_ROOM_BASE_URL: &str = "https://meet.medportal.app/rooms";
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 10;
pub const DEFAULT_EXPIRY_WARNING_DAYS: i64 = 30;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub video_room_base_url: String,
    pub inventory_low_stock_threshold: u32,
    pub inventory_expiry_warning_days: i64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            video_room_base_url: DEFAULT_VIDEO_ROOM_BASE_URL.to_string(),
            inventory_low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            inventory_expiry_warning_days: DEFAULT_EXPIRY_WARNING_DAYS,
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: required_var("SUPABASE_URL"),
            supabase_anon_key: required_var("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: required_var("SUPABASE_JWT_SECRET"),
            video_room_base_url: env::var("VIDEO_ROOM_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_VIDEO_ROOM_BASE_URL.to_string()),
            inventory_low_stock_threshold: parsed_var(
                "INVENTORY_LOW_STOCK_THRESHOLD",
                DEFAULT_LOW_STOCK_THRESHOLD,
            ),
            inventory_expiry_warning_days: parsed_var(
                "INVENTORY_EXPIRY_WARNING_DAYS",
                DEFAULT_EXPIRY_WARNING_DAYS,
            ),
            port: parsed_var("PORT", DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn room_url(&self, room_id: &str) -> String {
        format!("{}/{}", self.video_room_base_url.trim_end_matches('/'), room_id)
    }
}

fn required_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

fn parsed_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{}={:?} is not valid, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_not_configured() {
        let config = AppConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.inventory_low_stock_threshold, 10);
    }

    #[test]
    fn room_url_joins_without_double_slash() {
        let config = AppConfig {
            video_room_base_url: "https://rooms.example.com/".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.room_url("abc"), "https://rooms.example.com/abc");
    }
}
