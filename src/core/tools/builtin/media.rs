//! ffmpeg-backed tools.
//!
//! Each tool validates its arguments, runs the media command and reports the
//! output path (or the failure) as text. `transcode_with_progress` is the
//! only detached one; it returns immediately and publishes progress under
//! the call id.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::core::media::commands::{
    self, DEFAULT_SCREENSHOT_MOMENT, Placement, Resolution, sibling_path,
};
use crate::core::media::{MediaToolkit, transcode_with_progress};
use crate::core::tools::{Tool, ToolInvocation};
use crate::utils::{now_ms, spawn_guarded};

const M4A_TIMEOUT: Duration = Duration::from_secs(30);

fn file_param(description: &str) -> Value {
    json!({"type": "string", "description": description})
}

fn file_list_param() -> Value {
    json!({
        "type": "array",
        "items": {"type": "string"},
        "description": "Paths of the media files, in order"
    })
}

fn path_string(path: std::path::PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

// =============================================================================
// Version / audio extraction
// =============================================================================

pub struct FfmpegVersionTool {
    toolkit: Arc<MediaToolkit>,
}

impl FfmpegVersionTool {
    pub fn new(toolkit: Arc<MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Tool for FfmpegVersionTool {
    fn name(&self) -> &'static str {
        "get_ffmpeg_version"
    }

    fn description(&self) -> &'static str {
        "Get the ffmpeg version available to the agent"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn call(&self, _invocation: ToolInvocation) -> String {
        match self.toolkit.version().await {
            Ok(version) => format!("ffmpeg version: {version}"),
            Err(e) => {
                error!("Failed to read ffmpeg version: {}", e);
                "ffmpeg version: unknown".to_string()
            }
        }
    }
}

pub struct ExtractM4aTool {
    toolkit: Arc<MediaToolkit>,
}

impl ExtractM4aTool {
    pub fn new(toolkit: Arc<MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Tool for ExtractM4aTool {
    fn name(&self) -> &'static str {
        "get_m4a_from_media_file"
    }

    fn description(&self) -> &'static str {
        "Extract the audio track of a media file into an m4a file"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"input_file": file_param("Path of the input media file")},
            "required": ["input_file"]
        })
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let Some(input) = invocation.str_arg("input_file") else {
            return "invalid input_file arguments for GetM4aFromMediaFile".to_string();
        };
        let info = match self.toolkit.probe(input).await {
            Ok(info) => info,
            Err(e) => {
                error!(input = %input, "Probe failed: {}", e);
                return format!("error getting media info: {e}");
            }
        };
        if !info.has_audio {
            return "input file has no audio stream".to_string();
        }

        let output = path_string(sibling_path(input, "_audio.m4a"));
        match self
            .toolkit
            .run(&commands::m4a_args(input, &output), Some(M4A_TIMEOUT))
            .await
        {
            Ok(()) => format!(
                "converted m4a file: {output}, duration: {:.02}",
                info.duration
            ),
            Err(e) => format!("error converting to m4a: {e}"),
        }
    }
}

// =============================================================================
// Transcode
// =============================================================================

pub struct TranscodeTool {
    toolkit: Arc<MediaToolkit>,
}

impl TranscodeTool {
    pub fn new(toolkit: Arc<MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Tool for TranscodeTool {
    fn name(&self) -> &'static str {
        "transcode_with_progress"
    }

    fn description(&self) -> &'static str {
        "Transcode a media file to mp4 in the background and report progress"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input_file": file_param("Path of the input media file"),
                "video_resolution": {
                    "type": "string",
                    "description": "Target resolution, one of: 360p 480p 720p 1080p"
                }
            },
            "required": ["input_file", "video_resolution"]
        })
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let Some(input) = invocation.str_arg("input_file").map(str::to_string) else {
            return "invalid input_file arguments for TranscodeWithProgressTool".to_string();
        };
        let requested = invocation.str_arg("video_resolution").unwrap_or_default();
        let resolution = match Resolution::parse(requested) {
            Ok(r) => r,
            Err(e) => return e.to_string(),
        };
        if invocation.call_id.is_empty() {
            return "invalid call_id arguments for TranscodeWithProgressTool".to_string();
        }

        let info = match self.toolkit.probe(&input).await {
            Ok(info) => info,
            Err(e) => {
                error!(input = %input, "Probe failed: {}", e);
                return format!("error getting media info: {e}");
            }
        };
        let size = match resolution.scale(info.width, info.height) {
            Ok(size) => size,
            Err(e) => return format!("failed to compute target resolution: {e}"),
        };

        let output = path_string(sibling_path(&input, &format!("_{}.mp4", resolution.label())));
        info!(
            task_id = %invocation.call_id,
            input = %input,
            output = %output,
            "Starting transcode with progress"
        );

        let toolkit = self.toolkit.clone();
        let task_id = invocation.call_id.clone();
        let progress = invocation.progress.clone();
        let detached_output = output.clone();
        let duration = info.duration;
        spawn_guarded("transcode", async move {
            // outcome is published through the progress handle
            let _ = transcode_with_progress(
                &toolkit,
                &task_id,
                &input,
                size,
                duration,
                &detached_output,
                progress,
            )
            .await;
        });

        let media = serde_json::to_string(&info).unwrap_or_default();
        format!(
            "source media: {media}\ntranscode task started, it may take a few minutes, output file: {output}"
        )
    }
}

// =============================================================================
// Concatenation
// =============================================================================

fn concat_inputs(invocation: &ToolInvocation, tool: &str) -> Result<Vec<String>, String> {
    if !invocation.arguments.contains_key("input_files") {
        return Err(format!("invalid input_files arguments for {tool}"));
    }
    let files = invocation.string_list("input_files");
    if files.len() < 2 {
        return Err("need at least two valid input file paths to concat".to_string());
    }
    Ok(files)
}

pub struct ConcatVideoTool {
    toolkit: Arc<MediaToolkit>,
}

impl ConcatVideoTool {
    pub fn new(toolkit: Arc<MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Tool for ConcatVideoTool {
    fn name(&self) -> &'static str {
        "concat_media_files"
    }

    fn description(&self) -> &'static str {
        "Concatenate several media files into one mp4 with video and audio"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"input_files": file_list_param()},
            "required": ["input_files"]
        })
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let files = match concat_inputs(&invocation, "ConcatMediaFiles") {
            Ok(files) => files,
            Err(msg) => return msg,
        };
        let output = path_string(sibling_path(
            &files[0],
            &format!("_concat_{}.mp4", now_ms() % 10_000),
        ));
        info!(inputs = ?files, output = %output, "Concatenating media files");
        match self
            .toolkit
            .run(&commands::concat_video_args(&files, &output), None)
            .await
        {
            Ok(()) => output,
            Err(e) => format!("error concatenating media files: {e}"),
        }
    }
}

pub struct ConcatAudioTool {
    toolkit: Arc<MediaToolkit>,
}

impl ConcatAudioTool {
    pub fn new(toolkit: Arc<MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Tool for ConcatAudioTool {
    fn name(&self) -> &'static str {
        "concat_media_audio_files"
    }

    fn description(&self) -> &'static str {
        "Concatenate the audio of several media files into one m4a file"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"input_files": file_list_param()},
            "required": ["input_files"]
        })
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let files = match concat_inputs(&invocation, "ConcatAudioFiles") {
            Ok(files) => files,
            Err(msg) => return msg,
        };
        let output = path_string(sibling_path(
            &files[0],
            &format!("_audio_concat_{}.m4a", now_ms() % 10_000),
        ));
        info!(inputs = ?files, output = %output, "Concatenating audio tracks");
        match self
            .toolkit
            .run(&commands::concat_audio_args(&files, &output), None)
            .await
        {
            Ok(()) => output,
            Err(e) => format!("error concatenating audio files: {e}"),
        }
    }
}

// =============================================================================
// Watermarks and subtitles
// =============================================================================

const POSITION_DESCRIPTION: &str =
    "Watermark position, one of: top-left, top-right, bottom-left, bottom-right";

pub struct ImageWatermarkTool {
    toolkit: Arc<MediaToolkit>,
}

impl ImageWatermarkTool {
    pub fn new(toolkit: Arc<MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Tool for ImageWatermarkTool {
    fn name(&self) -> &'static str {
        "image_watermark_to_video"
    }

    fn description(&self) -> &'static str {
        "Overlay an image watermark on a video"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input_file": file_param("Path of the input video"),
                "watermark_file": file_param("Path of the watermark image"),
                "position": {"type": "string", "description": POSITION_DESCRIPTION}
            },
            "required": ["input_file", "watermark_file"]
        })
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let Some(input) = invocation.str_arg("input_file") else {
            return "invalid input_file arguments for ImageWatermark2Video".to_string();
        };
        let Some(image) = invocation.str_arg("watermark_file") else {
            return "invalid watermark_file arguments for ImageWatermark2Video".to_string();
        };
        let placement = Placement::parse(invocation.str_arg("position").unwrap_or("top-right"));

        let (video_info, image_info) =
            match tokio::try_join!(self.toolkit.probe(input), self.toolkit.probe(image)) {
                Ok(pair) => pair,
                Err(e) => {
                    error!(input = %input, image = %image, "Probe failed: {}", e);
                    return "error getting media info".to_string();
                }
            };
        let (x, y) = placement.offset(
            video_info.width,
            video_info.height,
            image_info.width,
            image_info.height,
        );

        let output = path_string(sibling_path(input, "_watermarked.mp4"));
        match self
            .toolkit
            .run(
                &commands::image_watermark_args(input, image, x, y, &output),
                None,
            )
            .await
        {
            Ok(()) => output,
            Err(e) => format!("error adding image watermark to video: {e}"),
        }
    }
}

pub struct TextWatermarkTool {
    toolkit: Arc<MediaToolkit>,
}

impl TextWatermarkTool {
    pub fn new(toolkit: Arc<MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Tool for TextWatermarkTool {
    fn name(&self) -> &'static str {
        "text_watermark_to_video"
    }

    fn description(&self) -> &'static str {
        "Draw a text watermark on a video"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input_file": file_param("Path of the input video"),
                "watermark_text": {"type": "string", "description": "Watermark text"},
                "position": {"type": "string", "description": POSITION_DESCRIPTION},
                "color": {
                    "type": "string",
                    "description": "Text color, e.g. white, black, red, yellow, lightgray"
                }
            },
            "required": ["input_file", "watermark_text"]
        })
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let Some(input) = invocation.str_arg("input_file") else {
            return "invalid input_file arguments for TextWatermark2Video".to_string();
        };
        let Some(text) = invocation.str_arg("watermark_text") else {
            return "invalid watermark_text arguments for TextWatermark2Video".to_string();
        };
        let placement = Placement::parse(invocation.str_arg("position").unwrap_or("top-right"));
        let color = invocation.str_arg("color").unwrap_or("white");
        if !commands::is_supported_text_color(color) {
            return format!("unsupported color: {color}");
        }

        match self
            .toolkit
            .has_build_flags(&["--enable-gpl", "--enable-freetype"])
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return "ffmpeg is not compiled with --enable-gpl --enable-freetype, cannot add text watermark"
                    .to_string();
            }
            Err(e) => {
                error!("Failed to read ffmpeg configuration: {}", e);
                return "error getting ffmpeg config".to_string();
            }
        }

        let filter = commands::drawtext_filter(text, color, placement);
        let output = path_string(sibling_path(input, "_text_watermarked.mp4"));
        match self
            .toolkit
            .run(&commands::text_watermark_args(input, &filter, &output), None)
            .await
        {
            Ok(()) => output,
            Err(e) => format!("error adding text watermark to video: {e}"),
        }
    }
}

pub struct SubtitleTool {
    toolkit: Arc<MediaToolkit>,
}

impl SubtitleTool {
    pub fn new(toolkit: Arc<MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Tool for SubtitleTool {
    fn name(&self) -> &'static str {
        "srt_to_video"
    }

    fn description(&self) -> &'static str {
        "Embed an srt subtitle track into a video"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input_file": file_param("Path of the input video"),
                "srt_file": file_param("Path of the srt subtitle file")
            },
            "required": ["input_file", "srt_file"]
        })
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let Some(input) = invocation.str_arg("input_file") else {
            return "invalid input_file arguments for Srt2Video".to_string();
        };
        let Some(srt) = invocation.str_arg("srt_file") else {
            return "invalid srt_file arguments for Srt2Video".to_string();
        };
        let output = path_string(sibling_path(input, "_srt.mp4"));
        match self
            .toolkit
            .run(&commands::srt_args(input, srt, &output), None)
            .await
        {
            Ok(()) => output,
            Err(e) => format!("error adding srt to video: {e}"),
        }
    }
}

// =============================================================================
// Stills
// =============================================================================

pub struct KeyframePicturesTool {
    toolkit: Arc<MediaToolkit>,
}

impl KeyframePicturesTool {
    pub fn new(toolkit: Arc<MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Tool for KeyframePicturesTool {
    fn name(&self) -> &'static str {
        "gen_pictures_from_video"
    }

    fn description(&self) -> &'static str {
        "Export every I-frame of a video as a jpg picture"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"input_file": file_param("Path of the input video")},
            "required": ["input_file"]
        })
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let Some(input) = invocation.str_arg("input_file") else {
            return "invalid input_file arguments".to_string();
        };
        let out_dir = sibling_path(input, "_pics");
        if let Err(e) = tokio::fs::create_dir_all(&out_dir).await {
            error!(dir = %out_dir.display(), "Failed to create output directory: {}", e);
            return format!("error ensuring output directory: {e}");
        }
        match self
            .toolkit
            .run(&commands::keyframe_args(input, &out_dir), None)
            .await
        {
            Ok(()) => path_string(out_dir),
            Err(e) => format!("error generating pictures from video: {e}"),
        }
    }
}

pub struct ScreenshotTool {
    toolkit: Arc<MediaToolkit>,
}

impl ScreenshotTool {
    pub fn new(toolkit: Arc<MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Tool for ScreenshotTool {
    fn name(&self) -> &'static str {
        "screenshot_at_moment"
    }

    fn description(&self) -> &'static str {
        "Capture one video frame at the given moment as a png"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input_file": file_param("Path of the input video"),
                "moment": {"type": "string", "description": "Moment to capture, HH:MM:SS"}
            },
            "required": ["input_file", "moment"]
        })
    }

    async fn call(&self, invocation: ToolInvocation) -> String {
        let Some(input) = invocation.str_arg("input_file") else {
            return "invalid input_file arguments".to_string();
        };
        let moment = invocation
            .str_arg("moment")
            .unwrap_or(DEFAULT_SCREENSHOT_MOMENT);
        let (h, m, s) = match commands::parse_moment(moment) {
            Ok(parts) => parts,
            Err(e) => return e.to_string(),
        };
        let output = path_string(sibling_path(
            input,
            &format!("_screenshot_{h:02}_{m:02}_{s:02}.png"),
        ));
        match self
            .toolkit
            .run(&commands::screenshot_args(input, moment, &output), None)
            .await
        {
            Ok(()) => output,
            Err(e) => format!("error screenshotting picture from video: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::ProgressTracker;

    fn toolkit() -> Arc<MediaToolkit> {
        Arc::new(MediaToolkit::new(
            "/nonexistent/ffmpeg-binary",
            "/nonexistent/ffprobe-binary",
        ))
    }

    fn invocation(args: Value) -> ToolInvocation {
        ToolInvocation::new(
            args.as_object().cloned().unwrap_or_default(),
            "call_1",
            Arc::new(ProgressTracker::new()),
        )
    }

    #[tokio::test]
    async fn test_concat_needs_two_inputs() {
        let tool = ConcatVideoTool::new(toolkit());
        assert_eq!(
            tool.call(invocation(json!({}))).await,
            "invalid input_files arguments for ConcatMediaFiles"
        );
        assert_eq!(
            tool.call(invocation(json!({"input_files": ["a.mp4"]}))).await,
            "need at least two valid input file paths to concat"
        );
    }

    #[tokio::test]
    async fn test_screenshot_rejects_bad_moment() {
        let tool = ScreenshotTool::new(toolkit());
        let out = tool
            .call(invocation(json!({"input_file": "a.mp4", "moment": "soon"})))
            .await;
        assert_eq!(out, "invalid moment format, should be HH:MM:SS");
    }

    #[tokio::test]
    async fn test_transcode_rejects_unknown_resolution() {
        let tool = TranscodeTool::new(toolkit());
        let out = tool
            .call(invocation(
                json!({"input_file": "a.mp4", "video_resolution": "8k"}),
            ))
            .await;
        assert_eq!(out, "unsupported video_resolution");
    }

    #[tokio::test]
    async fn test_probe_failure_is_reported_as_text() {
        let tool = ExtractM4aTool::new(toolkit());
        let out = tool.call(invocation(json!({"input_file": "a.mp4"}))).await;
        assert!(out.starts_with("error getting media info"));
    }

    #[tokio::test]
    async fn test_text_watermark_color_check() {
        let tool = TextWatermarkTool::new(toolkit());
        let out = tool
            .call(invocation(
                json!({"input_file": "a.mp4", "watermark_text": "hi", "color": "chartreuse"}),
            ))
            .await;
        assert_eq!(out, "unsupported color: chartreuse");
    }
}
