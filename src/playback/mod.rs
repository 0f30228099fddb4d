//! Ciclo de vida de las sesiones de reproducción.
//!
//! Una sesión por guild: el [`registry`] garantiza exclusividad, el
//! [`player`] corre el loop consumiendo su [`queue`], cada track pasa
//! por un intento de [`pipeline`] cancelable, y el [`watchdog`] corta
//! sesiones abandonadas. Toda cancelación viaja con causa ([`cancel`])
//! para distinguir "saltá este track" de "terminá la sesión".

pub mod cancel;
pub mod error;
pub mod pipeline;
pub mod player;
pub mod queue;
pub mod registry;
pub mod watchdog;

pub use cancel::{CancelCause, Canceller};
pub use error::PlaybackError;
pub use player::Player;
pub use registry::PlayerRegistry;
