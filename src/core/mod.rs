pub mod llm;
pub mod media;
pub mod progress;
pub mod session;
pub mod speech;
pub mod tools;

pub use llm::{BoxedChatBackend, ChatBackend, HttpsChatBackend, LlmError, LlmProvider, LlmResult};
pub use media::{MediaError, MediaInfo, MediaResult, MediaToolkit};
pub use progress::{
    ProbeConfig, ProgressHandle, ProgressProbe, ProgressReporter, ProgressSnapshot,
    ProgressTracker,
};
pub use session::{
    ConversationSession, OutboundMessage, SessionConfig, SessionError, SessionResult, VoiceChunk,
};
pub use speech::{
    HttpSpeechConfig, HttpSpeechFactory, RecognitionEvent, SpeechError, SpeechFactory,
    SpeechResult, SynthesisEvent,
};
pub use tools::{Tool, ToolDispatcher, ToolError, ToolInvocation, ToolRegistry, builtin_registry};
