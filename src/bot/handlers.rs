use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serenity::{
    builder::{
        CreateAutocompleteResponse, CreateInteractionResponse,
        CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
    },
    cache::Cache,
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use songbird::driver::Bitrate;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    config::Config,
    playback::{watchdog, CancelCause, PlaybackError, Player, PlayerRegistry},
    resolver::{MediaResolver, Track},
    ui::embeds,
};

const ALLOWED_HOSTS: [&str; 4] = [
    "www.youtube.com",
    "youtube.com",
    "youtu.be",
    "music.youtube.com",
];

const AUTOCOMPLETE_MIN_CHARS: usize = 3;
const AUTOCOMPLETE_TIMEOUT: Duration = Duration::from_secs(3);
const AUTOCOMPLETE_CHOICES: usize = 5;
const QUEUE_SHOWN_DEFAULT: i64 = 25;

/// Estado compartido entre handlers, clonable hacia tareas spawneadas.
#[derive(Clone)]
pub struct Shared {
    pub config: Arc<Config>,
    pub resolver: Arc<dyn MediaResolver>,
    pub registry: Arc<PlayerRegistry>,
    pub tracker: TaskTracker,
}

/// Rutea un comando slash a su handler y reporta el error al usuario
/// si falla. Los mensajes de error son aptos para mostrarse tal cual.
pub async fn dispatch(shared: Shared, ctx: Context, command: CommandInteraction) {
    let name = command.data.name.clone();
    let result = match name.as_str() {
        "play" => handle_play(&shared, &ctx, &command).await,
        "playlist" => handle_playlist(&shared, &ctx, &command).await,
        "skip" => handle_skip(&shared, &ctx, &command).await,
        "stop" => handle_stop(&shared, &ctx, &command).await,
        "queue" => handle_queue(&shared, &ctx, &command).await,
        other => Err(anyhow!("Comando no reconocido: {other}")),
    };

    if let Err(error) = result {
        error!(command = %name, ?error, "command failed");
        display_error(&ctx, &command, &error).await;
    }
}

async fn handle_play(shared: &Shared, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let guild_id = guild_of(command)?;
    let query = option_str(command, "search")
        .ok_or_else(|| anyhow!("Falta el término de búsqueda."))?
        .to_string();

    // resolver metadata puede tardar varios segundos
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let track = resolve_query(shared.resolver.as_ref(), &query).await?;
    let player = get_or_create_player(shared, ctx, guild_id, command.user.id).await?;
    player.enqueue(track.clone());

    let embed = embeds::added_to_queue(&track, player.count());
    command
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new().embed(embed),
        )
        .await?;
    Ok(())
}

async fn handle_playlist(
    shared: &Shared,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<()> {
    let guild_id = guild_of(command)?;
    let url = option_str(command, "url")
        .ok_or_else(|| anyhow!("Falta la URL de la playlist."))?
        .to_string();
    let shuffle = option_bool(command, "shuffle").unwrap_or(false);

    let player = same_channel_player(shared, ctx, guild_id, command.user.id)?;
    if !player.is_running() {
        anyhow::bail!("No hay una sesión activa. Usa /play primero.");
    }

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let tracks = shared.resolver.playlist(&url, shuffle).await.map_err(|e| {
        debug!(%url, error = %e, "playlist resolution failed");
        anyhow!("No se encontraron canciones reproducibles en la playlist.")
    })?;

    let added = match player.enqueue_playlist(tracks) {
        Ok(added) => added,
        Err(PlaybackError::NotRunning) => {
            anyhow::bail!("La sesión terminó mientras se resolvía la playlist.")
        }
        Err(e) => return Err(e.into()),
    };

    command
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new()
                .content(format!("📃 {added} canciones añadidas a la cola")),
        )
        .await?;
    Ok(())
}

async fn handle_skip(shared: &Shared, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let guild_id = guild_of(command)?;
    let amount = option_i64(command, "amount").unwrap_or(1);
    let player = same_channel_player(shared, ctx, guild_id, command.user.id)?;

    match player.skip(amount) {
        Ok(()) => respond_text(ctx, command, format!("⏭️ Saltando {amount} canción(es)")).await,
        Err(PlaybackError::SkipUnavailable) => {
            respond_text(ctx, command, "No hay nada que saltar.").await
        }
        Err(PlaybackError::SkipNotPossible) => {
            respond_text(ctx, command, "La cantidad a saltar debe ser al menos 1.").await
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_stop(shared: &Shared, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let guild_id = guild_of(command)?;
    let player = same_channel_player(shared, ctx, guild_id, command.user.id)?;

    player.stop();
    respond_text(ctx, command, "⏹️ Deteniendo la reproducción").await
}

async fn handle_queue(shared: &Shared, ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let guild_id = guild_of(command)?;
    let amount = option_i64(command, "amount").unwrap_or(QUEUE_SHOWN_DEFAULT);
    let player = shared
        .registry
        .get(guild_id)
        .ok_or_else(|| anyhow!("No hay música reproduciéndose."))?;

    let visible = player.visible_queue();
    if visible.is_empty() {
        return respond_text(ctx, command, "No hay nada en la cola.").await;
    }

    let embed = embeds::queue_overview(&visible, amount.max(1) as usize);
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;
    Ok(())
}

/// Autocompleta `/play search` con resultados de búsqueda en vivo.
///
/// Discord descarta respuestas tardías, así que la búsqueda corre con
/// un timeout corto y ante cualquier fallo se responde sin opciones.
pub async fn handle_autocomplete(shared: Shared, ctx: Context, interaction: CommandInteraction) {
    let query = interaction
        .data
        .options
        .iter()
        .find(|opt| opt.name == "search")
        .and_then(|opt| opt.value.as_str())
        .unwrap_or_default()
        .to_string();

    let mut response = CreateAutocompleteResponse::new();
    if query.chars().count() >= AUTOCOMPLETE_MIN_CHARS && Url::parse(&query).is_err() {
        match tokio::time::timeout(AUTOCOMPLETE_TIMEOUT, shared.resolver.search(&query)).await {
            Ok(Ok(tracks)) => {
                for track in tracks.into_iter().take(AUTOCOMPLETE_CHOICES) {
                    response = response.add_string_choice(choice_label(&track), track.url);
                }
            }
            Ok(Err(error)) => warn!(%error, "autocomplete search failed"),
            Err(_) => debug!(%query, "autocomplete search timed out"),
        }
    }

    if let Err(error) = interaction
        .create_response(&ctx.http, CreateInteractionResponse::Autocomplete(response))
        .await
    {
        debug!(%error, "autocomplete response failed");
    }
}

// Sesiones

/// Devuelve la sesión de la guild, creándola (con conexión de voz,
/// watchdog y loop de sesión) si no existe. El usuario debe estar en
/// un canal de voz, y en el del bot si la sesión ya corre.
async fn get_or_create_player(
    shared: &Shared,
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<Arc<Player>> {
    let user_channel = voice_channel_of(ctx, guild_id, user_id)
        .ok_or_else(|| anyhow!("Debes estar en un canal de voz."))?;

    if let Some(player) = shared.registry.get(guild_id) {
        if player.channel_id() != user_channel {
            anyhow::bail!("Debes estar en el mismo canal de voz que el bot.");
        }
        return Ok(player);
    }

    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| anyhow!("Songbird no inicializado"))?;
    let call = manager.join(guild_id, user_channel).await?;
    call.lock()
        .await
        .set_bitrate(Bitrate::BitsPerSecond(shared.config.opus_bitrate));

    let player = Arc::new(Player::new(
        call,
        guild_id,
        user_channel,
        shared.resolver.clone(),
    ));

    if shared.registry.add(guild_id, player.clone()).is_err() {
        // otro comando ganó la carrera; su sesión ya corre en esta guild
        warn!(guild = %guild_id, "player registered concurrently, reusing");
        return shared
            .registry
            .get(guild_id)
            .ok_or_else(|| anyhow!("La sesión terminó, intenta de nuevo."));
    }

    info!(guild = %guild_id, channel = %user_channel, "session created");
    spawn_watchdog(shared, ctx, guild_id, user_channel, &player);
    spawn_session(shared, ctx, guild_id, player.clone());

    Ok(player)
}

fn spawn_watchdog(
    shared: &Shared,
    ctx: &Context,
    guild_id: GuildId,
    channel_id: ChannelId,
    player: &Arc<Player>,
) {
    let canceller = player.canceller();
    let cache = ctx.cache.clone();
    let interval = shared.config.idle_check_interval;

    shared.tracker.spawn(async move {
        watchdog::run(interval, canceller, move || {
            // el guard de caché no es Send; consultar fuera del future
            let alone = bot_is_alone(&cache, guild_id, channel_id);
            async move { alone }
        })
        .await;
    });
}

fn spawn_session(shared: &Shared, ctx: &Context, guild_id: GuildId, player: Arc<Player>) {
    let registry = shared.registry.clone();
    let ctx = ctx.clone();

    shared.tracker.spawn(async move {
        if let Err(error) = player.run().await {
            error!(guild = %guild_id, %error, "session loop failed");
        }

        // liberar el watchdog aunque la cola se haya agotado sola
        player.canceller().cancel(CancelCause::None);

        if let Some(manager) = songbird::get(&ctx).await {
            if let Err(error) = manager.remove(guild_id).await {
                debug!(guild = %guild_id, %error, "voice disconnect failed");
            }
        }
        if let Err(error) = registry.delete(guild_id) {
            warn!(guild = %guild_id, %error, "session already deregistered");
        }
        info!(guild = %guild_id, "session finished");
    });
}

// Resolución de queries

async fn resolve_query(resolver: &dyn MediaResolver, query: &str) -> Result<Track> {
    if let Ok(url) = Url::parse(query) {
        let host = url.host_str().unwrap_or_default();
        if !ALLOWED_HOSTS.contains(&host) {
            anyhow::bail!("Solo se admiten enlaces de YouTube.");
        }
        return resolver
            .metadata(query)
            .await
            .map_err(|e| anyhow!("No se pudo resolver el enlace: {e}"));
    }

    let mut results = resolver
        .search(query)
        .await
        .map_err(|e| anyhow!("La búsqueda falló: {e}"))?;
    if results.is_empty() {
        anyhow::bail!("Sin resultados para «{query}».");
    }
    Ok(results.remove(0))
}

fn choice_label(track: &Track) -> String {
    // los nombres de choices de Discord admiten hasta 100 caracteres
    let label = format!("{} ({})", track.title, track.duration);
    if label.chars().count() <= 100 {
        label
    } else {
        let cut: String = label.chars().take(99).collect();
        format!("{cut}…")
    }
}

// Funciones auxiliares

fn guild_of(command: &CommandInteraction) -> Result<GuildId> {
    command
        .guild_id
        .ok_or_else(|| anyhow!("Este comando solo funciona dentro de un servidor."))
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_i64(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn option_bool(command: &CommandInteraction, name: &str) -> Option<bool> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_bool())
}

fn same_channel_player(
    shared: &Shared,
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<Arc<Player>> {
    let player = shared
        .registry
        .get(guild_id)
        .ok_or_else(|| anyhow!("No hay música reproduciéndose."))?;
    let channel = voice_channel_of(ctx, guild_id, user_id)
        .ok_or_else(|| anyhow!("Debes estar en un canal de voz."))?;
    if player.channel_id() != channel {
        anyhow::bail!("Debes estar en el mismo canal de voz que el bot.");
    }
    Ok(player)
}

fn voice_channel_of(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
}

/// El bot está solo si ningún otro usuario comparte su canal de voz.
fn bot_is_alone(cache: &Arc<Cache>, guild_id: GuildId, channel_id: ChannelId) -> Result<bool> {
    let bot_id = cache.current_user().id;
    let guild = cache
        .guild(guild_id)
        .ok_or_else(|| anyhow!("guild {guild_id} not in cache"))?;

    let listeners = guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id) && state.user_id != bot_id)
        .count();
    Ok(listeners == 0)
}

async fn respond_text(
    ctx: &Context,
    command: &CommandInteraction,
    text: impl Into<String>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(text),
            ),
        )
        .await?;
    Ok(())
}

async fn display_error(ctx: &Context, command: &CommandInteraction, error: &anyhow::Error) {
    let message = format!("❌ {error}");

    let direct = command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(message.clone())
                    .ephemeral(true),
            ),
        )
        .await;

    // si la interacción ya fue diferida toca responder por followup
    if direct.is_err() {
        if let Err(error) = command
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new()
                    .content(message)
                    .ephemeral(true),
            )
            .await
        {
            error!(?error, "failed reporting command error to the user");
        }
    }
}
