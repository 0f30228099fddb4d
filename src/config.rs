use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Configuración del bot, tomada de variables de entorno (con `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub opus_bitrate: i32,

    // yt-dlp
    pub cache_dir: PathBuf,
    pub proxy: Option<String>,

    // Sesiones
    pub idle_check_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            opus_bitrate: std::env::var("OPUS_BITRATE")
                .unwrap_or_else(|_| "96000".to_string()) // 96kbps (Discord default)
                .parse()?,

            cache_dir: match std::env::var("CACHE_DIR") {
                Ok(dir) if !dir.trim().is_empty() => dir.into(),
                _ => std::env::temp_dir().join("ritmo-bot"),
            },
            proxy: std::env::var("HTTP_PROXY").ok().filter(|s| !s.is_empty()),

            idle_check_interval: Duration::from_secs(
                std::env::var("IDLE_CHECK_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
            ),
        };

        std::fs::create_dir_all(&config.cache_dir)?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.opus_bitrate > 510_000 {
            anyhow::bail!(
                "Opus bitrate cannot exceed 510kbps, got: {}",
                self.opus_bitrate
            );
        }
        if self.opus_bitrate < 8_000 {
            anyhow::bail!("Opus bitrate too low, minimum 8kbps, got: {}", self.opus_bitrate);
        }

        if self.idle_check_interval.is_zero() {
            anyhow::bail!("Idle check interval must be greater than zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            discord_token: "token".into(),
            guild_id: None,
            opus_bitrate: 96_000,
            cache_dir: std::env::temp_dir(),
            proxy: None,
            idle_check_interval: Duration::from_secs(60),
        }
    }

    #[test]
    fn default_values_validate() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn out_of_range_bitrate_rejected() {
        let mut config = base();
        config.opus_bitrate = 600_000;
        assert!(config.validate().is_err());

        config.opus_bitrate = 4_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_idle_interval_rejected() {
        let mut config = base();
        config.idle_check_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
