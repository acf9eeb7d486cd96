use crate::format::{format_date, format_duration_ms};
use crate::history::CompletedSession;
use serenity::http::Http;
use serenity::model::id::ChannelId;
use std::sync::Arc;

/// Announcement sent to the text channel when a session ends.
pub fn disconnect_message(display_name: &str, session: &CompletedSession) -> String {
    format!(
        "👤 **Usuario:** {}\n🎧 **Canal:** {}\n📅 **Conectó:** {}\n📅 **Desconectó:** {}\n⏱ **Tiempo conectado:** {}",
        display_name,
        session.channel_name,
        format_date(&session.joined_at),
        format_date(&session.left_at),
        format_duration_ms(session.duration_ms),
    )
}

/// Fire-and-forget delivery; a failed send is logged and dropped.
pub async fn announce(http: &Arc<Http>, channel: ChannelId, message: String) {
    if let Err(e) = channel.say(http, message).await {
        tracing::error!(channel = channel.get(), "failed to send announcement: {e}");
    }
}
