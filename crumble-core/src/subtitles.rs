//! SRT and WebVTT subtitle parsing

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static SRT_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2}),(\d{3})")
        .expect("SRT timing pattern is valid")
});

static VTT_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d{2,}):)?(\d{2}):(\d{2})\.(\d{3})\s*-->\s*(?:(\d{2,}):)?(\d{2}):(\d{2})\.(\d{3})")
        .expect("WebVTT timing pattern is valid")
});

/// One timed subtitle cue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Seconds
    pub start: f64,
    /// Seconds
    pub end: f64,
    /// Cue lines joined by `\n`
    pub text: String,
}

#[derive(Debug, Default)]
struct CueBuilder {
    index: Option<u32>,
    start: f64,
    end: f64,
    text: Option<String>,
}

impl CueBuilder {
    fn push_line(&mut self, line: &str) {
        match &mut self.text {
            Some(text) => {
                text.push('\n');
                text.push_str(line);
            }
            None => self.text = Some(line.to_string()),
        }
    }

    fn finish(&mut self, cues: &mut Vec<Cue>) {
        let builder = std::mem::take(self);
        if let Some(text) = builder.text {
            cues.push(Cue {
                index: builder.index,
                start: builder.start,
                end: builder.end,
                text,
            });
        }
    }
}

fn seconds(h: Option<&str>, m: &str, s: &str, ms: &str) -> f64 {
    let num = |v: &str| v.parse::<f64>().unwrap_or(0.0);
    h.map_or(0.0, num) * 3600.0 + num(m) * 60.0 + num(s) + num(ms) / 1000.0
}

fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

/// Parse SubRip (`.srt`) content
#[must_use]
pub fn parse_srt(content: &str) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut current = CueBuilder::default();

    for line in strip_bom(content).lines().map(str::trim) {
        if line.is_empty() {
            current.finish(&mut cues);
            continue;
        }

        if current.text.is_none() && line.bytes().all(|b| b.is_ascii_digit()) {
            current.index = line.parse().ok();
        } else if let Some(caps) = SRT_TIMING.captures(line) {
            current.start = seconds(Some(&caps[1]), &caps[2], &caps[3], &caps[4]);
            current.end = seconds(Some(&caps[5]), &caps[6], &caps[7], &caps[8]);
        } else {
            current.push_line(line);
        }
    }
    current.finish(&mut cues);
    cues
}

/// Parse WebVTT content. Header, NOTE blocks and cue identifiers are skipped.
#[must_use]
pub fn parse_vtt(content: &str) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut current = CueBuilder::default();
    let mut in_cue = false;

    for line in strip_bom(content).lines().map(str::trim) {
        if line.starts_with("WEBVTT") {
            continue;
        }
        if line.is_empty() {
            current.finish(&mut cues);
            in_cue = false;
            continue;
        }

        if let Some(caps) = VTT_TIMING.captures(line) {
            current.start = seconds(caps.get(1).map(|m| m.as_str()), &caps[2], &caps[3], &caps[4]);
            current.end = seconds(caps.get(5).map(|m| m.as_str()), &caps[6], &caps[7], &caps[8]);
            in_cue = true;
        } else if in_cue {
            current.push_line(line);
        }
    }
    current.finish(&mut cues);
    cues
}

/// Parse either format, sniffing the `WEBVTT` header
#[must_use]
pub fn parse(content: &str) -> Vec<Cue> {
    if strip_bom(content).trim_start().starts_with("WEBVTT") {
        parse_vtt(content)
    } else {
        parse_srt(content)
    }
}

/// Text of the cue showing at `time` (inclusive bounds)
#[must_use]
pub fn cue_at(cues: &[Cue], time: f64) -> Option<&str> {
    cues.iter()
        .find(|c| time >= c.start && time <= c.end)
        .map(|c| c.text.as_str())
}

/// Format seconds as `h:mm:ss`, or `m:ss` under an hour. Non-finite input is `0:00`.
#[must_use]
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRT: &str = "1\n00:00:01,000 --> 00:00:04,500\nSay my name.\n\n2\n00:01:02,250 --> 00:01:05,000\nHeisenberg.\nYou're goddamn right.\n";

    const VTT: &str = "WEBVTT\n\nNOTE ignored\n\nintro\n00:00:01.000 --> 00:00:02.000\nWinter is coming.\n\n01:02.500 --> 01:04.000 align:start\nFirst line\nSecond line\n";

    #[test]
    fn test_parse_srt() {
        let cues = parse_srt(SRT);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].index, Some(1));
        assert!((cues[0].start - 1.0).abs() < 1e-9);
        assert!((cues[0].end - 4.5).abs() < 1e-9);
        assert!((cues[1].start - 62.25).abs() < 1e-9);
        assert_eq!(cues[1].text, "Heisenberg.\nYou're goddamn right.");
    }

    #[test]
    fn test_parse_srt_crlf() {
        let cues = parse_srt(&SRT.replace('\n', "\r\n"));
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Say my name.");
    }

    #[test]
    fn test_parse_srt_with_bom() {
        let cues = parse_srt(&format!("\u{feff}{SRT}"));
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].index, Some(1));
        assert_eq!(cues[0].text, "Say my name.");

        let cues = parse(&format!("\u{feff}{}", SRT.replace('\n', "\r\n")));
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].index, Some(1));
    }

    #[test]
    fn test_parse_vtt_with_bom() {
        let cues = parse(&format!("\u{feff}{VTT}"));
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Winter is coming.");
    }

    #[test]
    fn test_parse_vtt() {
        let cues = parse_vtt(VTT);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Winter is coming.");
        assert!((cues[1].start - 62.5).abs() < 1e-9);
        assert_eq!(cues[1].text, "First line\nSecond line");
    }

    #[test]
    fn test_parse_sniffs_format() {
        assert_eq!(parse(VTT).len(), 2);
        assert_eq!(parse(SRT).len(), 2);
    }

    #[test]
    fn test_cue_at() {
        let cues = parse_srt(SRT);
        assert_eq!(cue_at(&cues, 1.0), Some("Say my name."));
        assert_eq!(cue_at(&cues, 4.5), Some("Say my name."));
        assert_eq!(cue_at(&cues, 10.0), None);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(3725.0), "1:02:05");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
    }
}
