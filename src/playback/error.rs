use thiserror::Error;

use super::cancel::CancelCause;

/// Errores del dominio de reproducción.
///
/// Las variantes `Cancelled` no son fallos: transportan la causa de una
/// cancelación cooperativa y el loop de sesión las traduce en "continuar"
/// o "terminar". El resto sí son errores reales.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("player is already running")]
    AlreadyRunning,

    #[error("playback session isn't running")]
    NotRunning,

    #[error("nothing to skip")]
    SkipUnavailable,

    #[error("skip amount must be at least 1")]
    SkipNotPossible,

    #[error("playback session already exists")]
    AlreadyExists,

    #[error("playback session doesn't exist")]
    DoesntExist,

    #[error("playback cancelled ({0:?})")]
    Cancelled(CancelCause),

    #[error("audio track failed: {0}")]
    Track(String),

    #[error("failed to control track: {0}")]
    Control(#[from] songbird::tracks::ControlError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    /// Cierto si el loop de sesión debe terminar sin reportar un error.
    pub fn is_session_end(&self) -> bool {
        matches!(
            self,
            Self::Cancelled(CancelCause::Stop)
                | Self::Cancelled(CancelCause::Timeout)
                | Self::Cancelled(CancelCause::None)
        )
    }
}
