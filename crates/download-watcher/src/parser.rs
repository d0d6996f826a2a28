//! Download file name grammar.
//!
//! `<series><optional season marker><episode marker><anything>.<extension>`,
//! matched case-insensitively on the lower-cased name.

use once_cell::sync::Lazy;
use regex::Regex;
use shared::{Classification, ParsedName, SeriesName};

/// Series prefix (non-greedy), separators, optional `sNN` with one optional
/// `-`/space, required `eNN`, anything, and the text after the final dot.
static FILE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)[\s._-]*(?:s(\d+)[- ]?)?e(\d+).*\.([^.]+)$")
        .expect("file name pattern is valid")
});

/// Classify a download by its file name.
///
/// Names without an episode marker, without a series part, or with a season or
/// episode number of zero are `Unparseable`.
pub fn parse(file_name: &str) -> Classification {
    let lowered = file_name.to_lowercase();
    let Some(captures) = FILE_NAME_PATTERN.captures(&lowered) else {
        return Classification::Unparseable;
    };

    let series = SeriesName::new(captures.get(1).map_or("", |m| m.as_str()));
    if series.is_empty() {
        return Classification::Unparseable;
    }

    let season = match captures.get(2) {
        Some(m) => match parse_number(m.as_str()) {
            Some(season) => Some(season),
            None => return Classification::Unparseable,
        },
        None => None,
    };

    let Some(episode) = captures.get(3).and_then(|m| parse_number(m.as_str())) else {
        return Classification::Unparseable;
    };

    let extension = captures
        .get(4)
        .map_or_else(String::new, |m| m.as_str().to_string());

    Classification::Parsed(ParsedName {
        series,
        season,
        episode,
        extension,
    })
}

/// Positive number, leading zeros allowed
fn parse_number(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok().filter(|n| *n >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(file_name: &str) -> ParsedName {
        match parse(file_name) {
            Classification::Parsed(name) => name,
            Classification::Unparseable => panic!("{file_name} should parse"),
        }
    }

    #[test]
    fn test_parse_dotted_series_with_dash_separator() {
        let name = parsed("mysteries.of.laur.a - s01e03.mkv");
        assert_eq!(name.series.as_str(), "mysteries.of.laur.a");
        assert_eq!(name.season, Some(1));
        assert_eq!(name.episode, 3);
        assert_eq!(name.extension, "mkv");
    }

    #[test]
    fn test_parse_without_episode_marker() {
        assert_eq!(parse("randomfile.mkv"), Classification::Unparseable);
        assert_eq!(parse("Movie.2020.1080p.mp4"), Classification::Unparseable);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let name = parsed("Naruto Shippuden S02E15.MKV");
        assert_eq!(name.series.as_str(), "naruto shippuden");
        assert_eq!(name.season, Some(2));
        assert_eq!(name.episode, 15);
        assert_eq!(name.extension, "mkv");
    }

    #[test]
    fn test_parse_without_season() {
        let name = parsed("Bleach e05.mp4");
        assert_eq!(name.series.as_str(), "bleach");
        assert_eq!(name.season, None);
        assert_eq!(name.episode, 5);
    }

    #[test]
    fn test_parse_season_separators() {
        assert_eq!(parsed("show s01-e02.avi").season, Some(1));
        assert_eq!(parsed("show s01 e02.avi").episode, 2);
        assert_eq!(parsed("show.s01e02.avi").series.as_str(), "show");
    }

    #[test]
    fn test_parse_leading_zeros_and_long_numbers() {
        let name = parsed("one piece s001e0105.mkv");
        assert_eq!(name.season, Some(1));
        assert_eq!(name.episode, 105);
    }

    #[test]
    fn test_parse_trailing_text_and_final_extension() {
        let name = parsed("Dark s03e08 German.1080p.WEB.x264.mkv");
        assert_eq!(name.series.as_str(), "dark");
        assert_eq!(name.season, Some(3));
        assert_eq!(name.episode, 8);
        assert_eq!(name.extension, "mkv");
    }

    #[test]
    fn test_parse_rejects_missing_series() {
        assert_eq!(parse("s01e01.mkv"), Classification::Unparseable);
        assert_eq!(parse(" - e01.mkv"), Classification::Unparseable);
    }

    #[test]
    fn test_parse_rejects_zero_numbers() {
        assert_eq!(parse("show s00e01.mkv"), Classification::Unparseable);
        assert_eq!(parse("show s01e00.mkv"), Classification::Unparseable);
    }

    #[test]
    fn test_parse_rejects_missing_extension() {
        assert_eq!(parse("show s01e01"), Classification::Unparseable);
        assert_eq!(parse("show s01e01."), Classification::Unparseable);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = parse("Attack on Titan - s04e28.mkv");
        for _ in 0..3 {
            assert_eq!(parse("Attack on Titan - s04e28.mkv"), first);
        }
    }
}
