//! Filename templating
//!
//! Turns a naming pattern plus episode information into file and directory
//! names. Patterns use Python-style placeholders (`{season:02d}`), because
//! that is what existing series configs are written in.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Default pattern for episode file names
pub const DEFAULT_NAMING_PATTERN: &str = "S{season:02d}E{episode:02d}_{title}.mp4";

/// Default pattern for season directory names
pub const DEFAULT_DIRECTORY_PATTERN: &str = "Season_{season}_HD";

static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").expect("valid regex"));
static EPISODE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[Ss]\d+\s*[Ee]\d+[\s_\-:.|]*").expect("valid regex")
});
static EPISODE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)S(\d+)\s*E(\d+)").expect("valid regex"));
static FILENAME_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ss](\d+)[Ee](\d+)").expect("valid regex"));
static SPECIAL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ss][Pp](\d+)").expect("valid regex"));

/// Errors that can occur while rendering a naming pattern
#[derive(Debug, Error, PartialEq)]
pub enum NamingError {
    #[error("Unknown placeholder {{{name}}} in pattern '{pattern}'")]
    UnknownPlaceholder { pattern: String, name: String },

    #[error("Invalid format spec '{spec}' for {{{name}}} in pattern '{pattern}'")]
    InvalidFormatSpec {
        pattern: String,
        name: String,
        spec: String,
    },

    #[error("Unbalanced braces in pattern '{0}'")]
    UnbalancedBraces(String),
}

/// Values available to naming and directory patterns
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternValues<'a> {
    pub series_name: &'a str,
    pub season_name: &'a str,
    pub season: u32,
    pub episode: u32,
    pub title: &'a str,
}

/// Cleans a title for use in a filename
///
/// Keeps word characters, whitespace and hyphens, turns whitespace into
/// underscores, collapses repeated underscores and trims them from both ends.
pub fn sanitize_title(title: &str) -> String {
    let kept = DISALLOWED_CHARS.replace_all(title, "");
    let underscored = WHITESPACE.replace_all(&kept, "_");
    let collapsed = UNDERSCORES.replace_all(&underscored, "_");
    collapsed.trim_matches('_').to_string()
}

/// Removes a leading `SxxExx` token (and its separator) from a title
pub fn strip_episode_prefix(title: &str) -> &str {
    match EPISODE_PREFIX.find(title) {
        Some(m) => &title[m.end()..],
        None => title,
    }
}

/// Finds the first `S<n> E<n>` marker anywhere in a title
pub fn parse_episode_info(title: &str) -> Option<(u32, u32)> {
    let caps = EPISODE_MARKER.captures(title)?;
    let season = caps[1].parse().ok()?;
    let episode = caps[2].parse().ok()?;
    Some((season, episode))
}

/// Determines season and episode numbers for a catalog or config entry
///
/// Explicit numbers win over whatever the title says.
pub fn episode_numbers(
    season: Option<u32>,
    episode: Option<u32>,
    title: Option<&str>,
) -> Option<(u32, u32)> {
    if let (Some(season), Some(episode)) = (season, episode) {
        return Some((season, episode));
    }
    title.and_then(parse_episode_info)
}

/// Extracts season and episode numbers from an existing file name
///
/// `S3E14` anywhere in the name counts, as does `SP01` for specials
/// (season 0).
pub fn parse_filename_numbers(file_name: &str) -> Option<(u32, u32)> {
    if let Some(caps) = FILENAME_MARKER.captures(file_name) {
        return Some((caps[1].parse().ok()?, caps[2].parse().ok()?));
    }
    let caps = SPECIAL_MARKER.captures(file_name)?;
    Some((0, caps[1].parse().ok()?))
}

/// Renders a pattern with the given values
///
/// Supported placeholders:
/// - `{series_name}`, `{season_name}`, `{title}` - inserted as is
/// - `{season}`, `{episode}` - integers, optionally formatted as `{season:02d}`
///   or `{season:02}` (zero padding) or `{season:3d}` (space padding)
///
/// `{{` and `}}` produce literal braces.
pub fn render_pattern(pattern: &str, values: &PatternValues<'_>) -> Result<String, NamingError> {
    let mut result = String::with_capacity(pattern.len() + values.title.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                result.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                result.push('}');
            }
            '}' => return Err(NamingError::UnbalancedBraces(pattern.to_string())),
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(NamingError::UnbalancedBraces(pattern.to_string()));
                        }
                        Some(c) => field.push(c),
                    }
                }
                let (name, spec) = match field.split_once(':') {
                    Some((name, spec)) => (name, Some(spec)),
                    None => (field.as_str(), None),
                };
                result.push_str(&render_field(pattern, name, spec, values)?);
            }
            c => result.push(c),
        }
    }

    Ok(result)
}

fn render_field(
    pattern: &str,
    name: &str,
    spec: Option<&str>,
    values: &PatternValues<'_>,
) -> Result<String, NamingError> {
    let number = match name {
        "season" => Some(values.season),
        "episode" => Some(values.episode),
        _ => None,
    };

    let invalid_spec = |spec: &str| NamingError::InvalidFormatSpec {
        pattern: pattern.to_string(),
        name: name.to_string(),
        spec: spec.to_string(),
    };

    if let Some(value) = number {
        return match spec {
            None | Some("") | Some("d") => Ok(value.to_string()),
            Some(spec) => {
                let digits = spec.strip_suffix('d').unwrap_or(spec);
                let zero_fill = digits.starts_with('0');
                let width: usize = digits.parse().map_err(|_| invalid_spec(spec))?;
                if zero_fill {
                    Ok(format!("{:0width$}", value, width = width))
                } else {
                    Ok(format!("{:>width$}", value, width = width))
                }
            }
        };
    }

    let text = match name {
        "title" => values.title,
        "series_name" => values.series_name,
        "season_name" => values.season_name,
        _ => {
            return Err(NamingError::UnknownPlaceholder {
                pattern: pattern.to_string(),
                name: name.to_string(),
            });
        }
    };

    match spec {
        None | Some("") | Some("s") => Ok(text.to_string()),
        Some(spec) => Err(invalid_spec(spec)),
    }
}

/// Checks that a pattern only uses known placeholders and valid specs
pub fn validate_pattern(pattern: &str) -> Result<(), NamingError> {
    render_pattern(pattern, &PatternValues::default()).map(|_| ())
}

/// Generates the file name for an episode
///
/// The title has any leading `SxxExx` token removed before it is sanitized,
/// so titles like "S01E01 One" do not repeat the numbering.
pub fn generate_filename(
    pattern: &str,
    series_name: &str,
    season: u32,
    episode: u32,
    title: &str,
) -> Result<String, NamingError> {
    let clean_title = sanitize_title(strip_episode_prefix(title));
    render_pattern(
        pattern,
        &PatternValues {
            series_name,
            season_name: "",
            season,
            episode,
            title: &clean_title,
        },
    )
}

/// Generates the season directory name
pub fn season_directory_name(
    pattern: &str,
    series_name: &str,
    season: u32,
    season_name: &str,
) -> Result<String, NamingError> {
    render_pattern(
        pattern,
        &PatternValues {
            series_name,
            season_name,
            season,
            episode: 0,
            title: "",
        },
    )
}
