use serde::Deserialize;

/// Referencia inmutable a un track resuelto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    /// Duración ya formateada para mostrar ("3:45").
    pub duration: String,
    /// URL canónica usada para el streaming.
    pub url: String,
}

impl Track {
    pub fn short_url(&self) -> String {
        format!("https://youtu.be/{}", self.id)
    }
}

/// Metadata de un video según `yt-dlp --dump-json`.
///
/// Solo los campos que consumimos; el JSON real trae decenas más.
#[derive(Debug, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub duration_string: Option<String>,
    #[serde(default)]
    pub is_live: Option<bool>,
}

impl VideoMetadata {
    /// URL canónica preferida para reproducir este resultado.
    pub fn canonical_url(&self) -> Option<String> {
        self.original_url
            .clone()
            .or_else(|| self.webpage_url.clone())
            .or_else(|| self.url.clone())
    }

    pub fn display_duration(&self) -> String {
        self.duration_string
            .clone()
            .unwrap_or_else(|| format_clock(self.duration.unwrap_or(0.0)))
    }

    pub fn into_track(self, playback_url: String) -> Track {
        let thumbnail = max_res_thumbnail(&self.id);
        let duration = self.display_duration();
        Track {
            id: self.id,
            title: self.title,
            thumbnail,
            duration,
            url: playback_url,
        }
    }
}

/// Entrada de `yt-dlp --flat-playlist --dump-json` (una por línea).
#[derive(Debug, Deserialize)]
pub struct PlaylistEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub duration_string: Option<String>,
    #[serde(default)]
    pub is_live: Option<bool>,
}

pub fn max_res_thumbnail(id: &str) -> String {
    format!("https://i.ytimg.com/vi/{id}/maxresdefault.jpg")
}

/// Formatea segundos como reloj: "3:45", "1:02:03".
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
