use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStderr};
use std::sync::Arc;

use parking_lot::Mutex;
use songbird::input::{AudioStream, Input, LiveInput};
use songbird::tracks::PlayMode;
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use symphonia::core::io::{MediaSource, ReadOnlySource};
use tracing::{debug, error, warn};

use super::cancel::Canceller;
use super::error::PlaybackError;
use crate::resolver::{MediaResolver, Track};

/// Cuántas líneas de stderr de yt-dlp se retienen para diagnóstico.
const STDERR_TAIL_LINES: usize = 32;

/// Un intento de reproducción de un solo track.
///
/// Cadena de recursos con liberación garantizada en cualquier salida:
/// el subproceso yt-dlp se mata (si hace falta) y se espera siempre, su
/// stdout lo consume y cierra el driver de songbird, y su stderr lo
/// drena una tarea bloqueante que termina al cerrarse el pipe. La
/// codificación Opus (estéreo, frames de 20 ms, VBR, buffer acotado) la
/// hace el driver sobre la conexión de voz.
pub async fn play_track(
    resolver: &dyn MediaResolver,
    track: &Track,
    call: Arc<tokio::sync::Mutex<Call>>,
    attempt: &Canceller,
) -> Result<(), PlaybackError> {
    let mut child = resolver.open_stream(&track.url)?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| PlaybackError::Track("decode process has no stdout".into()))?;

    let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
    if let Some(stderr) = child.stderr.take() {
        let tail = stderr_tail.clone();
        tokio::task::spawn_blocking(move || drain_stderr(stderr, tail));
    }

    let source: Box<dyn MediaSource> = Box::new(ReadOnlySource::new(stdout));
    let input = Input::Live(LiveInput::Raw(AudioStream { input: source, hint: None }), None);

    let handle = { call.lock().await.play_input(input) };

    let (tx, rx) = flume::bounded(2);
    let result = arm_track_events(&handle, tx);

    let outcome = match result {
        Err(e) => {
            let _ = handle.stop();
            Err(e)
        }
        Ok(()) => tokio::select! {
            _ = attempt.cancelled() => {
                debug!(track = %track.title, cause = ?attempt.cause(), "stopping cancelled attempt");
                let _ = handle.stop();
                Err(PlaybackError::Cancelled(attempt.cause()))
            }
            end = rx.recv_async() => match end {
                Ok(TrackEnd::Finished) => {
                    debug!(track = %track.title, "playback finished");
                    Ok(())
                }
                Ok(TrackEnd::Errored(reason)) => {
                    error!(
                        track = %track.title,
                        %reason,
                        ytdlp_stderr = %dump_tail(&stderr_tail),
                        "error occurred while playing audio"
                    );
                    Err(PlaybackError::Track(reason))
                }
                Err(_) => Err(PlaybackError::Track("track event channel closed".into())),
            },
        },
    };

    reap(child).await;
    outcome
}

fn arm_track_events(
    handle: &songbird::tracks::TrackHandle,
    tx: flume::Sender<TrackEnd>,
) -> Result<(), PlaybackError> {
    handle.add_event(
        Event::Track(TrackEvent::End),
        TrackEndNotifier { tx: tx.clone() },
    )?;
    handle.add_event(Event::Track(TrackEvent::Error), TrackEndNotifier { tx })?;
    Ok(())
}

enum TrackEnd {
    Finished,
    Errored(String),
}

/// Traduce los eventos de fin de track del driver en una señal de
/// completitud sobre la que el pipeline puede hacer select.
struct TrackEndNotifier {
    tx: flume::Sender<TrackEnd>,
}

#[async_trait::async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            if let Some((state, _)) = tracks.first() {
                let end = match &state.playing {
                    PlayMode::Errored(e) => TrackEnd::Errored(e.to_string()),
                    _ => TrackEnd::Finished,
                };
                let _ = self.tx.send(end);
            }
        }
        Some(Event::Cancel)
    }
}

fn drain_stderr(stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
    for line in BufReader::new(stderr).lines() {
        match line {
            Ok(line) => {
                debug!(target: "ritmo_bot::ytdlp", "{line}");
                let mut tail = tail.lock();
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(error) => {
                warn!(%error, "yt-dlp stderr reader error");
                return;
            }
        }
    }
}

fn dump_tail(tail: &Mutex<VecDeque<String>>) -> String {
    tail.lock().iter().cloned().collect::<Vec<_>>().join("\n")
}

/// Mata (si sigue vivo) y espera al subproceso de decodificación. Se
/// llama en todas las salidas del intento: ningún camino puede dejar un
/// zombi ni un descriptor abierto.
async fn reap(mut child: Child) {
    let result = tokio::task::spawn_blocking(move || {
        if matches!(child.try_wait(), Ok(None)) {
            let _ = child.kill();
        }
        child.wait()
    })
    .await;

    match result {
        Ok(Ok(status)) => debug!(%status, "decode process reaped"),
        Ok(Err(error)) => warn!(%error, "failed to reap decode process"),
        Err(error) => warn!(%error, "decode process reaper task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    #[tokio::test]
    async fn reap_kills_and_waits_running_child() {
        let child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .expect("spawn sleep");
        let pid = child.id();

        reap(child).await;

        // un proceso cosechado ya no puede recibir señales
        let alive = Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .expect("run kill -0");
        assert!(!alive.success());
    }

    #[tokio::test]
    async fn reap_tolerates_already_finished_child() {
        let child = Command::new("true")
            .stdout(Stdio::null())
            .spawn()
            .expect("spawn true");
        // no hay nada que matar; solo debe esperar sin fallar
        reap(child).await;
    }

    #[test]
    fn stderr_tail_is_bounded() {
        let tail = Arc::new(Mutex::new(VecDeque::new()));
        {
            let mut guard = tail.lock();
            for i in 0..(STDERR_TAIL_LINES + 10) {
                if guard.len() == STDERR_TAIL_LINES {
                    guard.pop_front();
                }
                guard.push_back(format!("line {i}"));
            }
        }
        assert_eq!(tail.lock().len(), STDERR_TAIL_LINES);
        assert_eq!(dump_tail(&tail).lines().count(), STDERR_TAIL_LINES);
    }
}
