use crate::export;
use crate::format::{format_date, format_duration_ms};
use crate::history::UserStats;
use crate::tracker::VoiceTracker;
use chrono::Utc;
use serenity::all::{
    Command, CommandDataOptionValue, CommandInteraction, CommandOptionType, CreateAttachment,
    CreateCommand, CreateCommandOption, CreateInteractionResponse, CreateInteractionResponseMessage,
};
use serenity::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

pub fn create_commands() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("horario")
            .description("Muestra el historial de voz de un usuario")
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "usuario", "Usuario a consultar")
                    .required(true),
            ),
        CreateCommand::new("exportar")
            .description("Exporta las estadísticas de voz a Excel (solo admins)"),
    ]
}

/// Register the slash commands globally and on every cached guild, so they
/// show up immediately instead of waiting for global propagation.
pub async fn register(ctx: &Context) {
    for cmd in create_commands() {
        if let Err(e) = Command::create_global_command(&ctx.http, cmd).await {
            tracing::error!("global command registration failed: {e}");
        }
    }
    for guild_id in ctx.cache.guilds() {
        for cmd in create_commands() {
            if let Err(e) = guild_id.create_command(&ctx.http, cmd).await {
                tracing::error!(guild = guild_id.get(), "guild command registration failed: {e}");
            }
        }
    }
}

pub async fn handle_horario(ctx: &Context, cmd: &CommandInteraction, tracker: &Arc<VoiceTracker>) {
    let Some(user_id) = cmd
        .data
        .options
        .iter()
        .find(|o| o.name == "usuario")
        .and_then(|o| match &o.value {
            CommandDataOptionValue::User(id) => Some(*id),
            _ => None,
        })
    else {
        respond(ctx, cmd, "❌ Falta el usuario a consultar.".to_string(), true).await;
        return;
    };

    let name = cmd
        .data
        .resolved
        .users
        .get(&user_id)
        .map(|u| u.name.clone())
        .unwrap_or_else(|| user_id.to_string());

    let history = tracker.history();
    let history = history.lock().await;
    match history.get(user_id.get()) {
        None => {
            respond(ctx, cmd, format!("❌ {name} no tiene registros aún."), true).await;
        }
        Some(stats) => {
            let reply = horario_reply(&name, stats);
            respond(ctx, cmd, reply, false).await;
        }
    }
}

fn horario_reply(name: &str, stats: &UserStats) -> String {
    let mut reply = format!(
        "📊 **Horario de {}**\n🔁 Conexiones: {}\n⏱ Tiempo total en voz: {}",
        name,
        stats.session_count,
        format_duration_ms(stats.total_ms),
    );
    for (i, session) in stats.sessions.iter().enumerate() {
        reply.push_str(&format!(
            "\n🔹 Sesión {}: {} → {} ({})",
            i + 1,
            format_date(&session.joined_at),
            format_date(&session.left_at),
            session.channel_name,
        ));
    }
    reply
}

pub async fn handle_exportar(ctx: &Context, cmd: &CommandInteraction, tracker: &Arc<VoiceTracker>) {
    let is_admin = cmd
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map(|p| p.administrator())
        .unwrap_or(false);
    if !is_admin {
        respond(
            ctx,
            cmd,
            "❌ Solo los administradores pueden usar este comando.".to_string(),
            true,
        )
        .await;
        return;
    }

    let snapshot = {
        let history = tracker.history();
        let history = history.lock().await;
        history.snapshot()
    };

    // cache lookups stay synchronous; the guard must not live across an await
    let names: HashMap<u64, String> = cmd
        .guild_id
        .and_then(|gid| {
            ctx.cache.guild(gid).map(|guild| {
                guild
                    .members
                    .iter()
                    .map(|(id, member)| (id.get(), member.user.name.clone()))
                    .collect()
            })
        })
        .unwrap_or_default();

    let rows = export::session_rows(&snapshot, |id| names.get(&id).cloned());
    match export::build_workbook(&rows) {
        Err(export::ExportError::NoData) => {
            respond(ctx, cmd, "❌ No hay estadísticas para exportar.".to_string(), true).await;
        }
        Err(e) => {
            tracing::error!("export failed: {e}");
            respond(ctx, cmd, "❌ No se pudo generar el archivo.".to_string(), true).await;
        }
        Ok(bytes) => {
            let filename = format!("horario_{}.xlsx", Utc::now().timestamp_millis());
            let message = CreateInteractionResponseMessage::new()
                .content("📊 Estadísticas exportadas:")
                .add_file(CreateAttachment::bytes(bytes, filename));
            if let Err(e) = cmd
                .create_response(&ctx.http, CreateInteractionResponse::Message(message))
                .await
            {
                tracing::error!("failed to reply to /exportar: {e}");
            }
        }
    }
}

async fn respond(ctx: &Context, cmd: &CommandInteraction, content: String, ephemeral: bool) {
    let message = CreateInteractionResponseMessage::new()
        .content(content)
        .ephemeral(ephemeral);
    if let Err(e) = cmd
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await
    {
        tracing::error!("failed to respond to /{}: {e}", cmd.data.name);
    }
}
