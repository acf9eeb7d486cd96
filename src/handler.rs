use crate::commands;
use crate::config::Config;
use crate::export;
use crate::notify;
use crate::tracker::{LeaveOutcome, Transition, VoiceTracker, classify};
use chrono::Utc;
use serenity::all::{Interaction, Ready};
use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use serenity::model::voice::VoiceState;
use serenity::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

pub struct TrackerKey;

impl TypeMapKey for TrackerKey {
    type Value = Arc<VoiceTracker>;
}

pub struct ConfigKey;

impl TypeMapKey for ConfigKey {
    type Value = Arc<Config>;
}

pub struct VoiceHandler;

#[async_trait]
impl EventHandler for VoiceHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("conectado como {}", ready.user.name);
        commands::register(&ctx).await;
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let (tracker, config) = {
            let data = ctx.data.read().await;
            (
                data.get::<TrackerKey>().cloned(),
                data.get::<ConfigKey>().cloned(),
            )
        };
        let (Some(tracker), Some(config)) = (tracker, config) else {
            return;
        };
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let user_id = new.user_id.get();
        let old_channel = old.as_ref().and_then(|v| v.channel_id);

        match classify(old_channel.map(ChannelId::get), new.channel_id.map(ChannelId::get)) {
            Transition::Joined => {
                if let Some(channel_id) = new.channel_id {
                    let name = channel_name(&ctx, guild_id, channel_id);
                    tracker.record_join(user_id, name).await;
                }
            }
            Transition::Left => {
                let username = new
                    .member
                    .as_ref()
                    .map(|m| m.user.name.clone())
                    .unwrap_or_else(|| user_id.to_string());

                if let LeaveOutcome::Completed(session) = tracker.record_leave(user_id).await {
                    // the session is already committed; announcement and
                    // export run detached so a slow channel or disk cannot
                    // hold up the next event
                    let http = ctx.http.clone();
                    let channel = config.notify_channel;
                    let message = notify::disconnect_message(&username, &session);
                    tokio::spawn(async move {
                        notify::announce(&http, channel, message).await;
                    });

                    let names = member_names(&ctx, guild_id);
                    let snapshot = tracker.history().lock().await.snapshot();
                    let rows = export::session_rows(&snapshot, |id| names.get(&id).cloned());
                    let dir = config.export_dir.clone();
                    tokio::task::spawn_blocking(move || {
                        if let Err(e) = export::write_daily(&dir, Utc::now().date_naive(), &rows) {
                            tracing::error!("daily export failed: {e}");
                        }
                    });
                }
            }
            Transition::Unchanged => {}
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(cmd) = interaction else {
            return;
        };
        let tracker = {
            let data = ctx.data.read().await;
            data.get::<TrackerKey>().cloned()
        };
        let Some(tracker) = tracker else {
            return;
        };

        match cmd.data.name.as_str() {
            "horario" => commands::handle_horario(&ctx, &cmd, &tracker).await,
            "exportar" => commands::handle_exportar(&ctx, &cmd, &tracker).await,
            _ => {}
        }
    }
}

fn channel_name(ctx: &Context, guild_id: GuildId, channel_id: ChannelId) -> String {
    if let Some(guild) = ctx.cache.guild(guild_id) {
        if let Some(channel) = guild.channels.get(&channel_id) {
            return channel.name.clone();
        }
    }
    "desconocido".to_string()
}

fn member_names(ctx: &Context, guild_id: GuildId) -> HashMap<u64, String> {
    ctx.cache
        .guild(guild_id)
        .map(|guild| {
            guild
                .members
                .iter()
                .map(|(id, member)| (id.get(), member.user.name.clone()))
                .collect()
        })
        .unwrap_or_default()
}
