//! Capa de Discord: registro de comandos slash y despacho de
//! interacciones hacia las sesiones de reproducción.
//!
//! Cada interacción se atiende en una tarea propia dentro de un
//! [`TaskTracker`], igual que los loops de sesión y los watchdogs, de
//! modo que el shutdown pueda esperarlas a todas.

use std::sync::Arc;

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready},
    async_trait,
};
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{config::Config, playback::PlayerRegistry, resolver::MediaResolver};

use handlers::Shared;

/// Handler principal de eventos del gateway.
pub struct RitmoBot {
    shared: Shared,
}

impl RitmoBot {
    pub fn new(
        config: Arc<Config>,
        resolver: Arc<dyn MediaResolver>,
        registry: Arc<PlayerRegistry>,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            shared: Shared {
                config,
                resolver,
                registry,
                tracker,
            },
        }
    }

    /// Registra los comandos slash: por guild si hay `GUILD_ID`
    /// (propagación inmediata, útil en desarrollo), globales si no.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        match self.shared.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild configurada: {guild_id}");
                    return Ok(());
                }
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos registrados para la guild {guild_id}");
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for RitmoBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(error) = self.register_commands(&ctx).await {
            error!(?error, "command registration failed");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                let shared = self.shared.clone();
                self.shared.tracker.spawn(async move {
                    handlers::dispatch(shared, ctx, command).await;
                });
            }
            Interaction::Autocomplete(interaction) => {
                let shared = self.shared.clone();
                self.shared.tracker.spawn(async move {
                    handlers::handle_autocomplete(shared, ctx, interaction).await;
                });
            }
            _ => {}
        }
    }
}
