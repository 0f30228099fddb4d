use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

mod bot;
mod config;
mod playback;
mod resolver;
mod ui;

use crate::bot::RitmoBot;
use crate::config::Config;
use crate::playback::PlayerRegistry;
use crate::resolver::{MediaResolver, YtDlp};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ritmo_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Ritmo Bot v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);

    // Verificación rápida de dependencias externas
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let resolver: Arc<dyn MediaResolver> =
        Arc::new(YtDlp::new(config.cache_dir.clone(), config.proxy.clone()));
    let registry = Arc::new(PlayerRegistry::new());

    // una sola bandeja para handlers, loops de sesión y watchdogs
    let tracker = TaskTracker::new();

    // Intents mínimos: comandos slash y estados de voz
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = RitmoBot::new(config.clone(), resolver, registry.clone(), tracker.clone());

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    // Shutdown graceful con Ctrl+C
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(?error, "failed to install Ctrl+C handler");
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    // Cerrar las sesiones activas y esperar sus tareas antes de salir
    registry.stop_all();
    tracker.close();
    tracker.wait().await;

    Ok(())
}

async fn health_check() -> Result<()> {
    let yt_dlp = tokio::process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    if yt_dlp.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("yt-dlp no disponible");
    }
}
