//! Pure helpers that build ffmpeg arguments, filter graphs and output names.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::{MediaError, MediaResult};

/// Padding in pixels kept between an overlay and the frame edge.
pub const OVERLAY_PADDING: u32 = 8;

/// Font size used by text watermarks.
pub const WATERMARK_FONT_SIZE: u32 = 24;

pub const DEFAULT_SCREENSHOT_MOMENT: &str = "00:00:01";

static MOMENT_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):([0-5]?\d):([0-5]?\d)(\.\d+)?$").ok());

static FFMPEG_TIME_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"time=(\d{2}):(\d{2}):(\d{2}\.\d{2})").ok());

static TEXT_COLORS: &[&str] = &[
    "black",
    "white",
    "red",
    "green",
    "blue",
    "yellow",
    "cyan",
    "magenta",
    "gray",
    "grey",
    "darkred",
    "darkgreen",
    "darkblue",
    "darkyellow",
    "darkcyan",
    "darkmagenta",
    "lightgray",
    "lightgrey",
];

/// Target resolution presets for transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    P360,
    P480,
    P720,
    P1080,
}

impl Resolution {
    pub fn parse(label: &str) -> MediaResult<Self> {
        match label.trim() {
            "" | "480p" => Ok(Self::P480),
            "360p" => Ok(Self::P360),
            "720p" => Ok(Self::P720),
            "1080p" => Ok(Self::P1080),
            _ => Err(MediaError::InvalidInput(
                "unsupported video_resolution".to_string(),
            )),
        }
    }

    pub fn lines(self) -> u32 {
        match self {
            Self::P360 => 360,
            Self::P480 => 480,
            Self::P720 => 720,
            Self::P1080 => 1080,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::P360 => "360p",
            Self::P480 => "480p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
        }
    }

    /// Scale a source frame to this preset keeping the aspect ratio.
    ///
    /// The short side becomes the preset line count; both dimensions are
    /// rounded up to even numbers as libx264 requires.
    pub fn scale(self, src_width: u32, src_height: u32) -> MediaResult<(u32, u32)> {
        if src_width == 0 || src_height == 0 {
            return Err(MediaError::InvalidInput(
                "source video has no dimensions".to_string(),
            ));
        }
        let lines = self.lines() as f64;
        let ratio = src_width as f64 / src_height as f64;
        let (w, h) = if src_width >= src_height {
            (lines * ratio, lines)
        } else {
            (lines, lines / ratio)
        };
        Ok((round_even(w as u32), round_even(h as u32)))
    }
}

fn round_even(value: u32) -> u32 {
    value.div_ceil(2) * 2
}

/// Corner or center placement for overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl Placement {
    /// Unknown values fall back to top-right.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "top_left" => Self::TopLeft,
            "bottom_left" => Self::BottomLeft,
            "bottom_right" => Self::BottomRight,
            "center" | "centre" => Self::Center,
            _ => Self::TopRight,
        }
    }

    /// Pixel offset of an `overlay_w x overlay_h` box inside `frame_w x frame_h`.
    pub fn offset(self, frame_w: u32, frame_h: u32, overlay_w: u32, overlay_h: u32) -> (u32, u32) {
        let right = frame_w.saturating_sub(overlay_w + OVERLAY_PADDING);
        let bottom = frame_h.saturating_sub(overlay_h + OVERLAY_PADDING);
        match self {
            Self::TopLeft => (OVERLAY_PADDING, OVERLAY_PADDING),
            Self::TopRight => (right, OVERLAY_PADDING),
            Self::BottomLeft => (OVERLAY_PADDING, bottom),
            Self::BottomRight => (right, bottom),
            Self::Center => (
                frame_w.saturating_sub(overlay_w) / 2,
                frame_h.saturating_sub(overlay_h) / 2,
            ),
        }
    }

    /// drawtext position expressions; text extent is only known to ffmpeg.
    pub fn text_expr(self) -> (String, String) {
        let pad = OVERLAY_PADDING;
        let (x, y) = match self {
            Self::TopLeft => (format!("{pad}"), format!("{pad}")),
            Self::TopRight => (format!("w-tw-{pad}"), format!("{pad}")),
            Self::BottomLeft => (format!("{pad}"), format!("h-th-{pad}")),
            Self::BottomRight => (format!("w-tw-{pad}"), format!("h-th-{pad}")),
            Self::Center => ("(w-tw)/2".to_string(), "(h-th)/2".to_string()),
        };
        (x, y)
    }
}

pub fn is_supported_text_color(color: &str) -> bool {
    TEXT_COLORS.contains(&color)
}

/// Validate `HH:MM:SS[.fff]` and return the hour/minute/second parts.
pub fn parse_moment(moment: &str) -> MediaResult<(u32, u32, u32)> {
    let invalid =
        || MediaError::InvalidInput("invalid moment format, should be HH:MM:SS".to_string());
    let re = MOMENT_RE.as_ref().ok_or_else(invalid)?;
    let caps = re.captures(moment.trim()).ok_or_else(invalid)?;
    let part = |i: usize| -> MediaResult<u32> {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(invalid)
    };
    Ok((part(1)?, part(2)?, part(3)?))
}

/// Seconds elapsed in an ffmpeg progress line, if it carries `time=`.
pub fn parse_progress_time(line: &str) -> Option<f64> {
    let caps = FFMPEG_TIME_RE.as_ref()?.captures(line)?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// `dir/stem{suffix}` next to the input.
pub fn sibling_path(input: &str, suffix: &str) -> PathBuf {
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!("{stem}{suffix}"))
}

pub fn transcode_args(input: &str, width: u32, height: u32, output: &str) -> Vec<String> {
    [
        "-i",
        input,
        "-c:v",
        "libx264",
        "-vf",
        &format!("scale={width}:{height}"),
        "-r",
        "30",
        "-g",
        "90",
        "-c:a",
        "aac",
        "-ar",
        "48000",
        "-ac",
        "2",
        "-ab",
        "64k",
        "-f",
        "mp4",
        "-y",
        output,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn m4a_args(input: &str, output: &str) -> Vec<String> {
    [
        "-y", "-i", input, "-vn", "-acodec", "aac", "-ac", "2", "-ar", "44100", "-b:a", "64k",
        output,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Letterbox every input to 1080p and concatenate video plus audio.
pub fn concat_video_filter(count: usize) -> String {
    let scaled: Vec<String> = (0..count)
        .map(|i| {
            format!(
                "[{i}:v]scale=1920:1080:force_original_aspect_ratio=decrease,\
                 pad=1920:1080:(ow-iw)/2:(oh-ih)/2,setsar=1[v{i}]"
            )
        })
        .collect();
    let pairs: String = (0..count).map(|i| format!("[v{i}][{i}:a]")).collect();
    format!(
        "{};{pairs}concat=n={count}:v=1:a=1[outv][outa]",
        scaled.join("; ")
    )
}

pub fn concat_audio_filter(count: usize) -> String {
    let inputs: String = (0..count).map(|i| format!("[{i}:a]")).collect();
    format!("{inputs}concat=n={count}:v=0:a=1[outa]")
}

pub fn concat_video_args(inputs: &[String], output: &str) -> Vec<String> {
    let mut args: Vec<String> = inputs
        .iter()
        .flat_map(|f| ["-i".to_string(), f.clone()])
        .collect();
    args.extend(
        [
            "-filter_complex",
            &concat_video_filter(inputs.len()),
            "-map",
            "[outv]",
            "-map",
            "[outa]",
            "-c:v",
            "libx264",
            "-crf",
            "23",
            "-preset",
            "fast",
            "-c:a",
            "aac",
            "-b:a",
            "64k",
            "-y",
            output,
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

pub fn concat_audio_args(inputs: &[String], output: &str) -> Vec<String> {
    let mut args: Vec<String> = inputs
        .iter()
        .flat_map(|f| ["-i".to_string(), f.clone()])
        .collect();
    args.extend(
        [
            "-filter_complex",
            &concat_audio_filter(inputs.len()),
            "-map",
            "[outa]",
            "-c:a",
            "aac",
            "-b:a",
            "64k",
            "-ar",
            "44100",
            "-ac",
            "2",
            "-vn",
            "-y",
            output,
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

pub fn image_watermark_args(video: &str, image: &str, x: u32, y: u32, output: &str) -> Vec<String> {
    [
        "-i",
        video,
        "-i",
        image,
        "-filter_complex",
        &format!("overlay={x}:{y}"),
        "-codec:a",
        "copy",
        "-y",
        output,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// drawtext filter; single quotes and colons in the text are escaped.
pub fn drawtext_filter(text: &str, color: &str, placement: Placement) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:");
    let (x, y) = placement.text_expr();
    format!(
        "drawtext=text='{escaped}':fontcolor={color}:fontsize={WATERMARK_FONT_SIZE}:x={x}:y={y}"
    )
}

pub fn text_watermark_args(video: &str, filter: &str, output: &str) -> Vec<String> {
    ["-i", video, "-vf", filter, "-codec:a", "copy", "-y", output]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn srt_args(video: &str, srt: &str, output: &str) -> Vec<String> {
    [
        "-i", video, "-i", srt, "-c:v", "copy", "-c:a", "copy", "-c:s", "mov_text", "-f", "mp4",
        "-y", output,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn keyframe_args(input: &str, out_dir: &Path) -> Vec<String> {
    let pattern = out_dir.join("out_%04d.jpg");
    vec![
        "-i".to_string(),
        input.to_string(),
        "-vf".to_string(),
        r"select='eq(pict_type\,I)'".to_string(),
        "-vsync".to_string(),
        "vfr".to_string(),
        "-frame_pts".to_string(),
        "true".to_string(),
        "-y".to_string(),
        pattern.to_string_lossy().into_owned(),
    ]
}

pub fn screenshot_args(input: &str, moment: &str, output: &str) -> Vec<String> {
    ["-ss", moment, "-i", input, "-vframes", "1", "-q:v", "2", "-y", output]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_landscape_and_portrait() {
        assert_eq!(Resolution::P480.scale(1920, 1080).unwrap(), (854, 480));
        assert_eq!(Resolution::P720.scale(1280, 720).unwrap(), (1280, 720));
        // portrait: width takes the preset, height rounded up to even
        assert_eq!(Resolution::P360.scale(1080, 1920).unwrap(), (360, 640));
        assert!(Resolution::P360.scale(0, 0).is_err());
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!(Resolution::parse("").unwrap(), Resolution::P480);
        assert_eq!(Resolution::parse("1080p").unwrap(), Resolution::P1080);
        let err = Resolution::parse("4k").unwrap_err();
        assert_eq!(err.to_string(), "unsupported video_resolution");
    }

    #[test]
    fn test_overlay_offsets() {
        assert_eq!(Placement::TopLeft.offset(1920, 1080, 100, 50), (8, 8));
        assert_eq!(Placement::TopRight.offset(1920, 1080, 100, 50), (1812, 8));
        assert_eq!(
            Placement::BottomRight.offset(1920, 1080, 100, 50),
            (1812, 1022)
        );
        assert_eq!(Placement::Center.offset(1920, 1080, 100, 50), (910, 515));
        assert_eq!(Placement::parse("nonsense"), Placement::TopRight);
        assert_eq!(Placement::parse("Bottom-Left"), Placement::BottomLeft);
    }

    #[test]
    fn test_parse_moment() {
        assert_eq!(parse_moment("00:01:05").unwrap(), (0, 1, 5));
        assert_eq!(parse_moment("1:2:3.5").unwrap(), (1, 2, 3));
        let err = parse_moment("00:61:00").unwrap_err();
        assert_eq!(err.to_string(), "invalid moment format, should be HH:MM:SS");
        assert!(parse_moment("abc").is_err());
    }

    #[test]
    fn test_parse_progress_time() {
        let line = "frame=  240 fps= 60 q=28.0 size=512kB time=00:01:02.50 bitrate=...";
        assert_eq!(parse_progress_time(line), Some(62.5));
        assert_eq!(parse_progress_time("Press [q] to stop"), None);
    }

    #[test]
    fn test_sibling_path() {
        assert_eq!(
            sibling_path("/data/clip.mov", "_480p.mp4"),
            PathBuf::from("/data/clip_480p.mp4")
        );
        assert_eq!(sibling_path("clip.mp4", "_pics"), PathBuf::from("clip_pics"));
    }

    #[test]
    fn test_concat_filters() {
        let video = concat_video_filter(2);
        assert!(video.contains("[0:v]scale=1920:1080"));
        assert!(video.contains("[v0]; [1:v]"));
        assert!(video.ends_with("[v0][0:a][v1][1:a]concat=n=2:v=1:a=1[outv][outa]"));
        assert_eq!(concat_audio_filter(3), "[0:a][1:a][2:a]concat=n=3:v=0:a=1[outa]");
    }

    #[test]
    fn test_drawtext_escaping() {
        let filter = drawtext_filter("it's 10:30", "white", Placement::TopLeft);
        assert_eq!(
            filter,
            r"drawtext=text='it\'s 10\:30':fontcolor=white:fontsize=24:x=8:y=8"
        );
        assert!(is_supported_text_color("darkcyan"));
        assert!(!is_supported_text_color("chartreuse"));
    }
}
