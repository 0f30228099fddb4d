use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// Motivo por el cual se canceló una operación en curso.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CancelCause {
    #[default]
    None,
    /// El usuario pidió detener la sesión.
    Stop,
    /// El watchdog detectó un canal vacío.
    Timeout,
    /// Salto al siguiente track.
    Skip,
}

/// Señal de cancelación con causa adjunta.
///
/// Envuelve un [`CancellationToken`] jerárquico: cancelar el padre
/// (stop/timeout) también desbloquea a cualquier hijo en vuelo, y el
/// hijo puede leer la causa del padre. Cancelar un hijo (skip) nunca
/// afecta al padre.
#[derive(Clone)]
pub struct Canceller {
    token: CancellationToken,
    cause: Arc<OnceLock<CancelCause>>,
    parent_cause: Option<Arc<OnceLock<CancelCause>>>,
}

impl Canceller {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            cause: Arc::new(OnceLock::new()),
            parent_cause: None,
        }
    }

    /// Crea un handle hijo para un intento de reproducción.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            cause: Arc::new(OnceLock::new()),
            parent_cause: Some(self.cause.clone()),
        }
    }

    /// Dispara la cancelación. La primera causa registrada gana.
    pub fn cancel(&self, cause: CancelCause) {
        let _ = self.cause.set(cause);
        self.token.cancel();
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Causa observada: la propia primero, la del padre como fallback.
    pub fn cause(&self) -> CancelCause {
        self.cause
            .get()
            .copied()
            .or_else(|| self.parent_cause.as_ref().and_then(|c| c.get().copied()))
            .unwrap_or_default()
    }
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}
