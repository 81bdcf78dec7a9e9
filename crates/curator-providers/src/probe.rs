//! Media probe backed by `ffprobe`.
//!
//! Runs `ffprobe -print_format json -show_format -show_streams` and lifts
//! the stream/format sections into a [`ProbeReport`]. Any non-zero exit or
//! unreadable output is a probe failure the analyze handler records on the
//! item.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::error::ProviderError;
use crate::traits::MediaProbe;
use crate::types::ProbeReport;

const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct FfprobeMediaProbe {
    ffprobe_path: String,
}

impl FfprobeMediaProbe {
    pub fn new() -> Self {
        Self {
            ffprobe_path: "ffprobe".to_string(),
        }
    }

    pub fn with_binary(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

impl Default for FfprobeMediaProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn int_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

/// kbps from ffprobe's bits-per-second strings.
fn kbps_of(value: &Value) -> Option<i64> {
    int_of(value).map(|bps| bps / 1000)
}

fn channel_layout(channels: i64) -> String {
    match channels {
        1 => "Mono".to_string(),
        2 => "Stereo".to_string(),
        6 => "5.1".to_string(),
        8 => "7.1".to_string(),
        other => format!("{other}ch"),
    }
}

fn stream_language(stream: &Value) -> Option<String> {
    stream["tags"]["language"]
        .as_str()
        .filter(|s| !s.is_empty() && *s != "und")
        .map(String::from)
}

fn parse_report(data: &Value) -> ProbeReport {
    let mut report = ProbeReport::default();

    let format = &data["format"];
    report.container = format["format_name"]
        .as_str()
        .map(|s| s.split(',').next().unwrap_or(s).to_string());
    report.duration = format["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .map(|secs| secs as i64);
    report.overall_bitrate = kbps_of(&format["bit_rate"]);

    let streams = data["streams"].as_array().cloned().unwrap_or_default();
    for stream in &streams {
        match stream["codec_type"].as_str() {
            Some("video") if report.video_codec.is_none() => {
                report.video_codec = stream["codec_name"].as_str().map(str::to_uppercase);
                report.video_profile = stream["profile"].as_str().map(String::from);
                report.video_width = stream["width"].as_i64();
                report.video_height = stream["height"].as_i64();
                if let (Some(w), Some(h)) = (report.video_width, report.video_height) {
                    report.video_resolution = Some(format!("{w}x{h}"));
                }
                report.video_aspect_ratio =
                    stream["display_aspect_ratio"].as_str().map(String::from);
                report.video_bitrate = kbps_of(&stream["bit_rate"]);
                report.video_framerate = stream["avg_frame_rate"]
                    .as_str()
                    .and_then(parse_frame_rate);
                report.video_hdr = detect_hdr(stream);
            }
            Some("audio") if report.audio_codec.is_none() => {
                report.audio_codec = stream["codec_name"].as_str().map(str::to_uppercase);
                report.audio_channels = stream["channels"].as_i64().map(channel_layout);
                report.audio_bitrate = kbps_of(&stream["bit_rate"]);
                report.audio_language = stream_language(stream);
            }
            Some("subtitle") => {
                report.subtitle_count += 1;
                if let Some(lang) = stream_language(stream) {
                    if !report.subtitle_languages.contains(&lang) {
                        report.subtitle_languages.push(lang);
                    }
                }
            }
            _ => {}
        }
    }
    report
}

fn parse_frame_rate(raw: &str) -> Option<String> {
    let (num, den) = raw.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(format!("{:.3}", num / den))
}

fn detect_hdr(stream: &Value) -> Option<String> {
    let transfer = stream["color_transfer"].as_str().unwrap_or_default();
    match transfer {
        "smpte2084" => Some("HDR10".to_string()),
        "arib-std-b67" => Some("HLG".to_string()),
        _ => None,
    }
}

#[async_trait]
impl MediaProbe for FfprobeMediaProbe {
    async fn probe(&self, path: &Path) -> Result<ProbeReport, ProviderError> {
        if !path.exists() {
            return Err(ProviderError::Probe(format!(
                "file does not exist: {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "probing media file");
        let output = tokio::time::timeout(
            PROBE_TIMEOUT,
            Command::new(&self.ffprobe_path)
                .arg("-v")
                .arg("quiet")
                .arg("-print_format")
                .arg("json")
                .arg("-show_format")
                .arg("-show_streams")
                .arg(path)
                .output(),
        )
        .await
        .map_err(|_| ProviderError::Probe("ffprobe timed out".to_string()))?
        .map_err(|e| ProviderError::Probe(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Probe(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let data: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProviderError::Probe(format!("unreadable ffprobe output: {e}")))?;
        Ok(parse_report(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_ffprobe_output() {
        let data = json!({
            "format": {
                "format_name": "matroska,webm",
                "duration": "5400.321",
                "bit_rate": "8000000"
            },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "hevc",
                    "profile": "Main 10",
                    "width": 1920,
                    "height": 800,
                    "display_aspect_ratio": "2.40:1",
                    "avg_frame_rate": "24000/1001",
                    "color_transfer": "smpte2084",
                    "bit_rate": "6500000"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "eac3",
                    "channels": 6,
                    "bit_rate": "640000",
                    "tags": {"language": "eng"}
                },
                {"codec_type": "subtitle", "tags": {"language": "eng"}},
                {"codec_type": "subtitle", "tags": {"language": "ger"}},
                {"codec_type": "subtitle", "tags": {"language": "eng"}}
            ]
        });
        let report = parse_report(&data);
        assert_eq!(report.container.as_deref(), Some("matroska"));
        assert_eq!(report.duration, Some(5400));
        assert_eq!(report.overall_bitrate, Some(8000));
        assert_eq!(report.video_codec.as_deref(), Some("HEVC"));
        assert_eq!(report.video_resolution.as_deref(), Some("1920x800"));
        assert_eq!(report.video_framerate.as_deref(), Some("23.976"));
        assert_eq!(report.video_hdr.as_deref(), Some("HDR10"));
        assert_eq!(report.audio_channels.as_deref(), Some("5.1"));
        assert_eq!(report.audio_language.as_deref(), Some("eng"));
        assert_eq!(report.subtitle_count, 3);
        assert_eq!(report.subtitle_languages, vec!["eng", "ger"]);
    }

    #[test]
    fn channel_layouts() {
        assert_eq!(channel_layout(2), "Stereo");
        assert_eq!(channel_layout(6), "5.1");
        assert_eq!(channel_layout(8), "7.1");
        assert_eq!(channel_layout(3), "3ch");
    }

    #[tokio::test]
    async fn missing_file_is_a_probe_error() {
        let probe = FfprobeMediaProbe::new();
        let err = probe
            .probe(Path::new("/nonexistent/video.mkv"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Probe(_)));
    }
}
