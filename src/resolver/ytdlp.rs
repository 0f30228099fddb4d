use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::model::{max_res_thumbnail, PlaylistEntry, Track, VideoMetadata};
use super::MediaResolver;

const SEARCH_LIMIT: usize = 5;
const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);
const METADATA_TIMEOUT: Duration = Duration::from_secs(60);
const PLAYLIST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no songs found in playlist")]
    NoSongsFoundInPlaylist,

    #[error("failed parsing yt-dlp output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("yt-dlp exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("yt-dlp timed out")]
    TimedOut,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Adaptador sobre el binario `yt-dlp`.
pub struct YtDlp {
    cache_dir: PathBuf,
    proxy: Option<String>,
}

impl YtDlp {
    pub fn new(cache_dir: PathBuf, proxy: Option<String>) -> Self {
        Self { cache_dir, proxy }
    }

    fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("yt-dlp");
        cmd.arg("--cache-dir").arg(&self.cache_dir);
        if let Some(proxy) = &self.proxy {
            cmd.args(["--proxy", proxy]);
        }
        cmd.stdin(Stdio::null());
        // si el timeout dropea el future, el proceso no debe sobrevivir
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(
        &self,
        mut cmd: tokio::process::Command,
        timeout: Duration,
    ) -> Result<Output, ResolveError> {
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| ResolveError::TimedOut)??;

        if !output.status.success() {
            return Err(ResolveError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl MediaResolver for YtDlp {
    async fn search(&self, query: &str) -> Result<Vec<Track>, ResolveError> {
        let mut cmd = self.command();
        cmd.args([
            "--dump-json",
            "--flat-playlist",
            "--lazy-playlist",
            "--no-warnings",
            "--ies",
            "youtube:search",
        ])
        .arg(format!("ytsearch{SEARCH_LIMIT}:{query}"));

        let output = self.run(cmd, SEARCH_TIMEOUT).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let mut tracks = Vec::with_capacity(SEARCH_LIMIT);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            let meta: VideoMetadata = serde_json::from_str(line)?;
            let Some(url) = meta.canonical_url() else {
                continue;
            };
            tracks.push(meta.into_track(url));
        }

        info!(%query, results = tracks.len(), "search finished");
        Ok(tracks)
    }

    async fn metadata(&self, url: &str) -> Result<Track, ResolveError> {
        let mut cmd = self.command();
        cmd.arg(url).args([
            "-f",
            "ba",
            "--dump-json",
            "--no-playlist",
            "--no-progress",
        ]);

        let output = self.run(cmd, METADATA_TIMEOUT).await?;
        let meta: VideoMetadata = serde_json::from_slice(&output.stdout)?;
        Ok(meta.into_track(url.to_string()))
    }

    async fn playlist(&self, url: &str, shuffle: bool) -> Result<Vec<Track>, ResolveError> {
        let mut cmd = self.command();
        cmd.args([
            "--dump-json",
            "--flat-playlist",
            "--no-progress",
            "--no-warnings",
            "--skip-download",
            "--default-search",
            "ytsearch",
        ]);
        if shuffle {
            cmd.arg("--playlist-random");
        }
        cmd.arg(url);

        let output = self.run(cmd, PLAYLIST_TIMEOUT).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let mut entries = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<PlaylistEntry>(line) {
                Ok(entry) => entries.push(entry),
                // una entrada corrupta no invalida el resto
                Err(error) => warn!(%error, "skipping unparseable playlist entry"),
            }
        }

        filter_playlist_entries(entries)
    }

    fn open_stream(&self, url: &str) -> io::Result<std::process::Child> {
        let mut cmd = std::process::Command::new("yt-dlp");
        cmd.args(["--format", "ba"])
            .arg(url)
            .args(["--quiet", "--no-warnings", "--no-progress", "-o", "-"])
            .arg("--cache-dir")
            .arg(&self.cache_dir);
        if let Some(proxy) = &self.proxy {
            cmd.args(["--proxy", proxy]);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.spawn()
    }
}

/// Descarta entradas no reproducibles: videos privados o borrados, y
/// duración cero o ausente salvo que sean transmisiones en vivo.
fn filter_playlist_entries(entries: Vec<PlaylistEntry>) -> Result<Vec<Track>, ResolveError> {
    let mut tracks = Vec::with_capacity(entries.len());
    for entry in entries {
        let live = entry.is_live.unwrap_or(false);
        let unplayable = entry.duration.unwrap_or(0.0) == 0.0 && !live;
        if unplayable || entry.title == "[Deleted video]" || entry.title == "[Private video]" {
            debug!(title = %entry.title, url = %entry.url, "skipping invalid playlist entry");
            continue;
        }

        let duration = entry
            .duration_string
            .unwrap_or_else(|| super::model::format_clock(entry.duration.unwrap_or(0.0)));
        tracks.push(Track {
            thumbnail: max_res_thumbnail(&entry.id),
            id: entry.id,
            title: entry.title,
            duration,
            url: entry.url,
        });
    }

    if tracks.is_empty() {
        return Err(ResolveError::NoSongsFoundInPlaylist);
    }
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(title: &str, duration: Option<f64>, is_live: bool) -> PlaylistEntry {
        PlaylistEntry {
            id: "xyz".into(),
            url: "https://youtu.be/xyz".into(),
            title: title.into(),
            duration,
            duration_string: None,
            is_live: Some(is_live),
        }
    }

    #[test]
    fn filters_private_deleted_and_zero_duration_entries() {
        let entries = vec![
            entry("[Private video]", Some(120.0), false),
            entry("[Deleted video]", Some(120.0), false),
            entry("unlisted upload", Some(0.0), false),
            entry("missing duration", None, false),
            entry("a real song", Some(200.0), false),
        ];

        let tracks = filter_playlist_entries(entries).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "a real song");
        assert_eq!(tracks[0].duration, "3:20");
    }

    #[test]
    fn live_entries_without_duration_are_kept() {
        let entries = vec![entry("24/7 radio", None, true)];
        let tracks = filter_playlist_entries(entries).unwrap();
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn empty_playlist_after_filtering_is_an_error() {
        let entries = vec![
            entry("[Private video]", None, false),
            entry("[Deleted video]", None, false),
        ];
        assert!(matches!(
            filter_playlist_entries(entries),
            Err(ResolveError::NoSongsFoundInPlaylist)
        ));
    }

    #[test]
    fn search_line_maps_to_track() {
        let line = r#"{
            "id": "abc123",
            "title": "Flat Result",
            "url": "https://www.youtube.com/watch?v=abc123",
            "duration": 185.0
        }"#;
        let meta: VideoMetadata = serde_json::from_str(line).unwrap();
        let url = meta.canonical_url().unwrap();
        let track = meta.into_track(url);
        assert_eq!(track.url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(track.duration, "3:05");
    }
}
