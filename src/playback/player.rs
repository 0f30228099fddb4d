use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serenity::model::id::{ChannelId, GuildId};
use songbird::Call;
use tracing::{debug, info};

use super::cancel::{CancelCause, Canceller};
use super::error::PlaybackError;
use super::pipeline;
use super::queue::SessionQueue;
use crate::resolver::{MediaResolver, Track};

/// Sesión de reproducción de una guild.
///
/// Es dueña de la cola con su cursor, de la conexión de voz y del
/// scope de cancelación raíz de la sesión. Los handlers de comandos
/// producen (enqueue/skip) mientras el loop de sesión consume; todo el
/// estado mutable de la cola está detrás de un único `RwLock`.
pub struct Player {
    call: Arc<tokio::sync::Mutex<Call>>,
    guild_id: GuildId,
    channel_id: ChannelId,
    queue: RwLock<SessionQueue>,
    running: AtomicBool,
    root: Canceller,
    resolver: Arc<dyn MediaResolver>,
}

impl Player {
    pub fn new(
        call: Arc<tokio::sync::Mutex<Call>>,
        guild_id: GuildId,
        channel_id: ChannelId,
        resolver: Arc<dyn MediaResolver>,
    ) -> Self {
        Self {
            call,
            guild_id,
            channel_id,
            queue: RwLock::new(SessionQueue::new()),
            running: AtomicBool::new(false),
            root: Canceller::new(),
            resolver,
        }
    }

    /// Handle del scope raíz de la sesión, compartido con el watchdog.
    pub fn canceller(&self) -> Canceller {
        self.root.clone()
    }

    /// Cancela toda la sesión a pedido del usuario.
    pub fn stop(&self) {
        self.root.cancel(CancelCause::Stop);
    }

    pub fn enqueue(&self, track: Track) {
        self.queue.write().enqueue(track);
    }

    /// Agrega una playlist completa; requiere una sesión corriendo.
    pub fn enqueue_playlist(&self, tracks: Vec<Track>) -> Result<usize, PlaybackError> {
        if !self.is_running() {
            return Err(PlaybackError::NotRunning);
        }
        Ok(self.queue.write().extend(tracks))
    }

    pub fn skip(&self, amount: i64) -> Result<(), PlaybackError> {
        self.queue.write().skip(amount)
    }

    pub fn visible_queue(&self) -> Vec<Track> {
        self.queue.read().visible()
    }

    pub fn count(&self) -> usize {
        self.queue.read().count()
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Loop de sesión: consume la cola vía el cursor y corre un intento
    /// de pipeline por track hasta agotarla o ser cancelado.
    ///
    /// El llamador es responsable de la limpieza al retornar (baja del
    /// registro y desconexión de voz); el loop solo decide terminar.
    pub async fn run(&self) -> Result<(), PlaybackError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PlaybackError::AlreadyRunning);
        }

        let result = self.run_loop().await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_loop(&self) -> Result<(), PlaybackError> {
        // la sesión se registra al unirse al canal, antes del primer
        // enqueue; esperar acá en vez de fallar con cola vacía
        self.wait_for_tracks().await;

        loop {
            if !self.queue.write().advance() {
                info!(guild = %self.guild_id, "queue exhausted, ending session");
                return Ok(());
            }
            let Some(track) = self.queue.read().current().cloned() else {
                return Ok(());
            };

            let attempt = self.root.child();
            self.queue.write().arm(attempt.clone());

            info!(guild = %self.guild_id, track = %track.title, "playing track");
            let result =
                pipeline::play_track(self.resolver.as_ref(), &track, self.call.clone(), &attempt)
                    .await;
            self.queue.write().disarm();

            match result {
                Ok(()) => {}
                Err(PlaybackError::Cancelled(CancelCause::Skip)) => {
                    debug!(guild = %self.guild_id, track = %track.title, "track skipped");
                }
                Err(ref e) if e.is_session_end() => {
                    info!(guild = %self.guild_id, cause = %e, "session cancelled");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn wait_for_tracks(&self) {
        loop {
            if self.count() > 0 {
                return;
            }
            tokio::select! {
                _ = self.root.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }
    }
}
