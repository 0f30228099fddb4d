//! Resolución de media vía yt-dlp: búsqueda, metadata, playlists y el
//! subproceso de streaming que alimenta al pipeline de reproducción.

pub mod model;
pub mod ytdlp;

use std::io;
use std::process::Child;

use async_trait::async_trait;

pub use model::Track;
pub use ytdlp::{ResolveError, YtDlp};

/// Colaborador externo que resuelve queries y abre streams de audio.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Busca candidatos para un query libre (acotado, hasta 5).
    async fn search(&self, query: &str) -> Result<Vec<Track>, ResolveError>;

    /// Metadata de un solo video por URL.
    async fn metadata(&self, url: &str) -> Result<Track, ResolveError>;

    /// Tracks reproducibles de una playlist, ya filtrados.
    async fn playlist(&self, url: &str, shuffle: bool) -> Result<Vec<Track>, ResolveError>;

    /// Lanza el subproceso que decodifica `url` a bytes crudos por
    /// stdout, con diagnóstico por stderr. El dueño del `Child` es el
    /// pipeline, que lo mata y espera en cada salida.
    fn open_stream(&self, url: &str) -> io::Result<Child>;
}
