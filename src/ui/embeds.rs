use std::time::Duration;

use serenity::builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};

use crate::resolver::Track;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Títulos más largos se truncan para que cada línea de la cola quepa
/// en un solo renglón del embed.
const MAX_TITLE_CHARS: usize = 44;

/// Canciones por field en el embed de cola.
const TRACKS_PER_FIELD: usize = 10;

/// Embed de confirmación al encolar un track.
pub fn added_to_queue(track: &Track, queue_len: usize) -> CreateEmbed {
    CreateEmbed::default()
        .author(CreateEmbedAuthor::new("🎵 Añadido a la cola"))
        .title(&track.title)
        .url(track.short_url())
        .thumbnail(&track.thumbnail)
        .description(format!("⏱️ {}", track.duration))
        .color(colors::SUCCESS_GREEN)
        .footer(CreateEmbedFooter::new(format!(
            "{queue_len} canciones en la cola"
        )))
}

/// Embed con la vista de la cola: la canción actual primero y el resto
/// en bloques numerados.
pub fn queue_overview(tracks: &[Track], max_shown: usize) -> CreateEmbed {
    let shown = &tracks[..tracks.len().min(max_shown)];

    let mut embed = CreateEmbed::default().color(colors::MUSIC_PURPLE);

    if let Some(current) = shown.first() {
        embed = embed.field(
            "▶️ Reproduciendo ahora",
            format!(
                "[{}]({}) - ({})",
                truncate_title(&current.title),
                current.short_url(),
                current.duration
            ),
            false,
        );
    }

    let upcoming = shown.get(1..).unwrap_or_default();
    for (chunk_idx, chunk) in upcoming.chunks(TRACKS_PER_FIELD).enumerate() {
        let lines: Vec<String> = chunk
            .iter()
            .enumerate()
            .map(|(i, track)| {
                format!(
                    "`{}.` [{}]({}) - ({})",
                    chunk_idx * TRACKS_PER_FIELD + i + 1,
                    truncate_title(&track.title),
                    track.short_url(),
                    track.duration
                )
            })
            .collect();

        let name = if chunk_idx == 0 {
            "📋 A continuación"
        } else {
            "\u{200b}"
        };
        embed = embed.field(name, lines.join("\n"), false);
    }

    let total: Duration = tracks.iter().filter_map(|t| parse_clock(&t.duration)).sum();
    embed.footer(CreateEmbedFooter::new(format!(
        "{} canciones • {}",
        tracks.len(),
        humantime::format_duration(total)
    )))
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let cut: String = title.chars().take(MAX_TITLE_CHARS - 1).collect();
    format!("{}…", cut.trim_end())
}

/// Inversa de `format_clock`: "3:45" y "1:02:03" vuelven a segundos.
fn parse_clock(clock: &str) -> Option<Duration> {
    let mut seconds: u64 = 0;
    for part in clock.split(':') {
        seconds = seconds
            .checked_mul(60)?
            .checked_add(part.trim().parse().ok()?)?;
    }
    Some(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_clock_handles_common_formats() {
        assert_eq!(parse_clock("3:45"), Some(Duration::from_secs(225)));
        assert_eq!(parse_clock("1:02:03"), Some(Duration::from_secs(3723)));
        assert_eq!(parse_clock("0:00"), Some(Duration::ZERO));
        assert_eq!(parse_clock("en vivo"), None);
    }

    #[test]
    fn long_titles_are_truncated_with_ellipsis() {
        let long = "a".repeat(80);
        let shown = truncate_title(&long);
        assert!(shown.chars().count() <= MAX_TITLE_CHARS);
        assert!(shown.ends_with('…'));

        assert_eq!(truncate_title("short"), "short");
    }
}
