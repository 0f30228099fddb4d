use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::cancel::{CancelCause, Canceller};

/// Watchdog de inactividad de una sesión.
///
/// Comparte el scope de cancelación de la sesión: si éste se cancela
/// por cualquier otro motivo (stop, cola agotada) el watchdog termina
/// de inmediato y sin efectos. En cada tick consulta `is_alone`; si el
/// bot quedó solo en el canal cancela la sesión con causa `Timeout`.
/// Si la consulta falla, loguea y termina: reintentar para siempre
/// enmascararía un fallo persistente como un bot eternamente inactivo.
pub async fn run<F, Fut>(interval: Duration, canceller: Canceller, mut is_alone: F)
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = anyhow::Result<bool>> + Send,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // el primer tick de interval() resuelve al instante
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = canceller.cancelled() => return,
            _ = ticker.tick() => match is_alone().await {
                Err(error) => {
                    warn!(%error, "idle watchdog probe failed, giving up");
                    return;
                }
                Ok(true) => {
                    info!("bot is alone in the voice channel, ending session");
                    canceller.cancel(CancelCause::Timeout);
                    return;
                }
                Ok(false) => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn cancels_with_timeout_when_alone() {
        let session = Canceller::new();
        run(Duration::from_secs(60), session.clone(), || async { Ok(true) }).await;

        assert!(session.is_cancelled());
        assert_eq!(session.cause(), CancelCause::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_ticking_while_listeners_remain() {
        let session = Canceller::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let probe_ticks = ticks.clone();
        run(Duration::from_secs(60), session.clone(), move || {
            let ticks = probe_ticks.clone();
            async move {
                // tres ticks acompañado, después solo
                Ok(ticks.fetch_add(1, Ordering::SeqCst) >= 3)
            }
        })
        .await;

        assert_eq!(ticks.load(Ordering::SeqCst), 4);
        assert_eq!(session.cause(), CancelCause::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn exits_without_side_effects_when_session_cancelled() {
        let session = Canceller::new();
        session.cancel(CancelCause::Stop);

        let probed = Arc::new(AtomicUsize::new(0));
        let probe_count = probed.clone();
        run(Duration::from_secs(60), session.clone(), move || {
            let probed = probe_count.clone();
            async move {
                probed.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        })
        .await;

        assert_eq!(probed.load(Ordering::SeqCst), 0);
        assert_eq!(session.cause(), CancelCause::Stop);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_error_stops_the_watchdog_without_cancelling() {
        let session = Canceller::new();
        run(Duration::from_secs(60), session.clone(), || async {
            Err(anyhow::anyhow!("cache miss"))
        })
        .await;

        assert!(!session.is_cancelled());
        assert_eq!(session.cause(), CancelCause::None);
    }
}
