use tracing::debug;

use super::cancel::{CancelCause, Canceller};
use super::error::PlaybackError;
use crate::resolver::Track;

/// Cola de una sesión: secuencia ordenada de tracks más un cursor.
///
/// El cursor arranca en -1 ("todavía no empezó") y solo avanza hacia
/// adelante; nunca se eliminan entradas, un skip solo mueve el cursor.
/// El handle de cancelación del intento en curso vive aquí para que un
/// `skip` concurrente nunca corra contra el loop armando el handle del
/// siguiente track. El `Player` dueño serializa todo con un `RwLock`.
pub struct SessionQueue {
    tracks: Vec<Track>,
    position: isize,
    armed: Option<Canceller>,
}

impl SessionQueue {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            position: -1,
            armed: None,
        }
    }

    /// Agrega un track si no está ya presente (dedup por identidad).
    pub fn enqueue(&mut self, track: Track) {
        if self.tracks.iter().any(|t| t.id == track.id) {
            debug!(track = %track.title, "track already queued, skipping enqueue");
            return;
        }
        self.tracks.push(track);
    }

    /// Agrega los tracks de una playlist tal cual, sin dedup.
    pub fn extend(&mut self, tracks: Vec<Track>) -> usize {
        let added = tracks.len();
        self.tracks.extend(tracks);
        added
    }

    /// Largo total de la cola, no lo que queda por reproducir.
    pub fn count(&self) -> usize {
        self.tracks.len()
    }

    /// Snapshot de `queue[position..]`: el track actual primero.
    pub fn visible(&self) -> Vec<Track> {
        let start = self.position.max(0) as usize;
        let start = start.min(self.tracks.len());
        self.tracks[start..].to_vec()
    }

    /// Único primitivo de "dequeue": mueve el cursor una posición y
    /// devuelve si todavía apunta dentro de la cola.
    pub fn advance(&mut self) -> bool {
        self.position += 1;
        (self.position as usize) < self.tracks.len()
    }

    /// Track bajo el cursor. `None` si el cursor no es válido; el loop
    /// solo debe llamar esto tras un `advance()` que devolvió `true`.
    pub fn current(&self) -> Option<&Track> {
        if self.position < 0 {
            return None;
        }
        self.tracks.get(self.position as usize)
    }

    /// Arma el handle de cancelación del intento en curso.
    pub fn arm(&mut self, attempt: Canceller) {
        self.armed = Some(attempt);
    }

    /// Desarma el handle al terminar el intento, falle o no. Un skip
    /// contra un handle viejo debe fallar, no cancelar otro intento.
    pub fn disarm(&mut self) {
        self.armed = None;
    }

    /// Salta `amount` tracks: cancela el intento armado con causa
    /// `Skip` y suma `amount - 1` al cursor; el avance natural del loop
    /// aporta el paso restante, así `skip(N)` adelanta exactamente N.
    pub fn skip(&mut self, amount: i64) -> Result<(), PlaybackError> {
        if amount < 1 {
            return Err(PlaybackError::SkipNotPossible);
        }
        let Some(armed) = self.armed.take() else {
            return Err(PlaybackError::SkipUnavailable);
        };

        armed.cancel(CancelCause::Skip);
        self.position += (amount - 1) as isize;

        Ok(())
    }

    #[cfg(test)]
    pub fn position(&self) -> isize {
        self.position
    }
}

impl Default for SessionQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Track {id}"),
            thumbnail: String::new(),
            duration: "3:00".to_string(),
            url: format!("https://youtu.be/{id}"),
        }
    }

    #[test]
    fn enqueue_deduplicates_by_identity() {
        let mut queue = SessionQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.enqueue(track("a"));
        assert_eq!(queue.count(), 2);
    }

    #[test]
    fn cursor_arithmetic_over_full_queue() {
        let mut queue = SessionQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(track(id));
        }

        // después de k avances el cursor queda en k-1
        for k in 0..3 {
            assert!(queue.advance());
            assert_eq!(queue.position(), k);
            assert_eq!(queue.current().unwrap().id, ["a", "b", "c"][k as usize]);
        }

        // el avance k+1 agota la cola
        assert!(!queue.advance());
    }

    #[test]
    fn current_before_first_advance_is_invalid() {
        let mut queue = SessionQueue::new();
        queue.enqueue(track("a"));
        assert!(queue.current().is_none());
    }

    #[test]
    fn visible_queue_starts_at_cursor() {
        let mut queue = SessionQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(track(id));
        }

        // antes de empezar se ve todo
        assert_eq!(queue.visible().len(), 3);

        queue.advance();
        queue.advance();
        let visible: Vec<_> = queue.visible().into_iter().map(|t| t.id).collect();
        assert_eq!(visible, vec!["b", "c"]);
    }

    #[test]
    fn skip_without_armed_handle_fails_cleanly() {
        let mut queue = SessionQueue::new();
        queue.enqueue(track("a"));
        queue.advance();

        let err = queue.skip(1).unwrap_err();
        assert!(matches!(err, PlaybackError::SkipUnavailable));
        assert_eq!(queue.position(), 0);
    }

    #[test]
    fn skip_rejects_amount_below_one() {
        let mut queue = SessionQueue::new();
        queue.enqueue(track("a"));
        queue.advance();
        queue.arm(Canceller::new());

        assert!(matches!(queue.skip(0), Err(PlaybackError::SkipNotPossible)));
        // el handle sigue armado y el cursor no se movió
        assert!(matches!(queue.skip(1), Ok(())));
        assert_eq!(queue.position(), 0);
    }

    #[test]
    fn skip_cancels_attempt_with_skip_cause() {
        let mut queue = SessionQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue(track(id));
        }
        queue.advance();

        let attempt = Canceller::new();
        queue.arm(attempt.clone());
        queue.skip(1).unwrap();

        assert!(attempt.is_cancelled());
        assert_eq!(attempt.cause(), CancelCause::Skip);
        // skip(1): el cursor no se mueve acá, lo mueve el avance del loop
        assert_eq!(queue.position(), 0);
        assert!(queue.advance());
        assert_eq!(queue.current().unwrap().id, "b");
    }

    #[test]
    fn skip_n_jumps_forward_n_tracks() {
        let mut queue = SessionQueue::new();
        for id in ["a", "b", "c", "d"] {
            queue.enqueue(track(id));
        }
        queue.advance(); // reproduciendo "a"

        queue.arm(Canceller::new());
        queue.skip(3).unwrap();

        // skip(3) adelantó 2; el avance natural del loop completa los 3
        assert!(queue.advance());
        assert_eq!(queue.current().unwrap().id, "d");
    }

    #[test]
    fn skip_past_end_exhausts_queue() {
        let mut queue = SessionQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.advance();

        queue.arm(Canceller::new());
        queue.skip(5).unwrap();

        assert!(!queue.advance());
    }

    #[test]
    fn scenario_enqueue_advance_skip() {
        let mut queue = SessionQueue::new();
        for id in ["t1", "t2", "t3"] {
            queue.enqueue(track(id));
        }

        assert!(queue.advance());
        assert_eq!(queue.current().unwrap().id, "t1");
        assert_eq!(
            queue.visible().iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["t1", "t2", "t3"]
        );

        let attempt = Canceller::new();
        queue.arm(attempt.clone());
        queue.skip(1).unwrap();
        assert_eq!(attempt.cause(), CancelCause::Skip);

        // el loop observa la cancelación y hace su avance natural
        assert!(queue.advance());
        assert_eq!(queue.current().unwrap().id, "t2");
        assert_eq!(
            queue.visible().iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["t2", "t3"]
        );
    }
}
