//! Tools registered at startup.

mod media;
mod progress;
mod weather;

use std::sync::Arc;

pub use media::{
    ConcatAudioTool, ConcatVideoTool, ExtractM4aTool, FfmpegVersionTool, ImageWatermarkTool,
    KeyframePicturesTool, ScreenshotTool, SubtitleTool, TextWatermarkTool, TranscodeTool,
};
pub use progress::{CHECK_PROGRESS_TOOL, CheckProgressTool};
pub use weather::WeatherTool;

use super::ToolRegistry;
use crate::core::media::MediaToolkit;

/// Registry holding every built-in tool.
pub fn builtin_registry(toolkit: Arc<MediaToolkit>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(FfmpegVersionTool::new(toolkit.clone()));
    registry.register(WeatherTool);
    registry.register(ExtractM4aTool::new(toolkit.clone()));
    registry.register(TranscodeTool::new(toolkit.clone()));
    registry.register(CheckProgressTool);
    registry.register(ConcatVideoTool::new(toolkit.clone()));
    registry.register(ConcatAudioTool::new(toolkit.clone()));
    registry.register(ImageWatermarkTool::new(toolkit.clone()));
    registry.register(TextWatermarkTool::new(toolkit.clone()));
    registry.register(SubtitleTool::new(toolkit.clone()));
    registry.register(KeyframePicturesTool::new(toolkit.clone()));
    registry.register(ScreenshotTool::new(toolkit));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_registry(Arc::new(MediaToolkit::default()));
        assert_eq!(registry.len(), 12);
        assert!(registry.lookup(CHECK_PROGRESS_TOOL).is_some());

        let listing = registry.describe();
        assert_eq!(listing.lines().count(), 10);
        assert!(!listing.contains("get_current_weather"));
        assert!(!listing.contains("check_progress"));
        assert!(listing.contains("transcode_with_progress"));
    }
}
