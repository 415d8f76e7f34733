//! `ffprobe` output parsing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: String,
    #[serde(default)]
    codec_name: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    sample_rate: Option<String>,
    #[serde(default)]
    channels: u32,
    #[serde(default)]
    avg_frame_rate: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeResponse {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

/// Summary of a media file as reported by `ffprobe`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaInfo {
    /// Seconds
    pub duration: f64,
    pub has_video: bool,
    pub has_audio: bool,
    pub video_codec: String,
    pub audio_codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub sample_rate: u32,
    pub channels: u32,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(raw: &[u8]) -> Result<MediaInfo, serde_json::Error> {
    let response: ProbeResponse = serde_json::from_slice(raw)?;

    let mut info = MediaInfo {
        duration: response
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0.0),
        ..Default::default()
    };

    for stream in response.streams {
        match stream.codec_type.as_str() {
            "video" => {
                info.has_video = true;
                info.video_codec = stream.codec_name;
                info.width = stream.width;
                info.height = stream.height;
                info.frame_rate = parse_frame_rate(&stream.avg_frame_rate);
            }
            "audio" => {
                info.has_audio = true;
                info.audio_codec = stream.codec_name;
                info.sample_rate = stream
                    .sample_rate
                    .as_deref()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                info.channels = stream.channels;
            }
            _ => {}
        }
    }

    Ok(info)
}

/// "30000/1001" -> 29.97; malformed or zero denominators give 0.
fn parse_frame_rate(raw: &str) -> f64 {
    let Some((num, den)) = raw.split_once('/') else {
        return 0.0;
    };
    match (num.parse::<f64>(), den.parse::<f64>()) {
        (Ok(n), Ok(d)) if d != 0.0 => n / d,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "avg_frame_rate": "30000/1001"},
            {"codec_type": "audio", "codec_name": "aac", "sample_rate": "48000", "channels": 2, "avg_frame_rate": "0/0"}
        ],
        "format": {"duration": "12.480000"}
    }"#;

    #[test]
    fn test_parse_full_probe() {
        let info = parse_probe_output(SAMPLE.as_bytes()).unwrap();
        assert!(info.has_video && info.has_audio);
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(info.video_codec, "h264");
        assert_eq!(info.sample_rate, 48000);
        assert_eq!(info.channels, 2);
        assert!((info.duration - 12.48).abs() < 1e-9);
        assert!((info.frame_rate - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_audio_only() {
        let raw = r#"{"streams":[{"codec_type":"audio","codec_name":"mp3"}],"format":{}}"#;
        let info = parse_probe_output(raw.as_bytes()).unwrap();
        assert!(!info.has_video);
        assert!(info.has_audio);
        assert_eq!(info.duration, 0.0);
    }

    #[test]
    fn test_frame_rate_edge_cases() {
        assert_eq!(parse_frame_rate("0/0"), 0.0);
        assert_eq!(parse_frame_rate("garbage"), 0.0);
        assert_eq!(parse_frame_rate("25/1"), 25.0);
    }
}
