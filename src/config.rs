use serenity::model::id::ChannelId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DISCORD_TOKEN is not set")]
    MissingToken,
    #[error("NOTIFY_CHANNEL_ID is not set")]
    MissingChannel,
    #[error("NOTIFY_CHANNEL_ID is not a valid channel id: {0}")]
    InvalidChannel(String),
}

/// Runtime configuration, read once at startup from the environment
/// (after `.env` has been loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    /// Text channel that receives disconnect announcements.
    pub notify_channel: ChannelId,
    /// Directory for the daily spreadsheet files.
    pub export_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("DISCORD_TOKEN").map_err(|_| ConfigError::MissingToken)?;

        let raw_channel =
            std::env::var("NOTIFY_CHANNEL_ID").map_err(|_| ConfigError::MissingChannel)?;
        let notify_channel = raw_channel
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(ChannelId::new)
            .ok_or(ConfigError::InvalidChannel(raw_channel))?;

        let export_dir = std::env::var("EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("estadisticas_excel"));

        Ok(Self {
            token,
            notify_channel,
            export_dir,
        })
    }
}
