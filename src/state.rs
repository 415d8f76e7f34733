use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::llm::{BoxedChatBackend, HttpsChatBackend, LlmError};
use crate::core::media::MediaToolkit;
use crate::core::progress::{ProgressProbe, ProgressTracker};
use crate::core::session::ConversationSession;
use crate::core::speech::{DisabledSpeechFactory, HttpSpeechFactory, SpeechError, SpeechFactory};
use crate::core::tools::{ToolDispatcher, ToolRegistry, builtin_registry};
use crate::utils::spawn_guarded;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to create model backend: {0}")]
    Backend(#[from] LlmError),
    #[error("Failed to create speech service: {0}")]
    Speech(#[from] SpeechError),
}

/// Shared application state handed to every route.
pub struct AppState {
    pub config: ServerConfig,
    pub session: Arc<ConversationSession>,
    pub progress: Arc<ProgressTracker>,
    pub registry: Arc<ToolRegistry>,
    pub toolkit: Arc<MediaToolkit>,
}

impl AppState {
    /// Build the production state: HTTPS model backend, speech service when
    /// configured, and the built-in tool set.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, StateError> {
        let backend: BoxedChatBackend = Arc::new(HttpsChatBackend::new(
            &config.llm_url(),
            &config.llm_api_key,
            config.allow_insecure_localhost,
        )?);

        let speech: Arc<dyn SpeechFactory> = match config.speech_config() {
            Some(speech_config) => Arc::new(HttpSpeechFactory::new(speech_config)?),
            None => {
                warn!("SPEECH_API_KEY not set, voice input and output are disabled");
                Arc::new(DisabledSpeechFactory)
            }
        };

        Ok(Self::with_components(config, backend, speech))
    }

    /// Assemble state around explicit backends.
    pub fn with_components(
        config: ServerConfig,
        backend: BoxedChatBackend,
        speech: Arc<dyn SpeechFactory>,
    ) -> Arc<Self> {
        let toolkit = Arc::new(config.media_toolkit());
        let registry = Arc::new(builtin_registry(toolkit.clone()));
        let progress = Arc::new(ProgressTracker::new());

        let session = ConversationSession::new(
            config.session_config(),
            backend,
            ToolDispatcher::new(registry.clone()),
            progress.clone(),
            speech,
        );

        Arc::new(Self {
            config,
            session,
            progress,
            registry,
            toolkit,
        })
    }

    /// Start the voice consumer and the progress probe.
    pub fn spawn_background(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);
        if let Some(handle) = self.session.start() {
            handles.push(handle);
        }

        let probe = ProgressProbe::new(
            self.session.clone(),
            self.progress.clone(),
            self.config.probe_config(),
        );
        handles.push(spawn_guarded("progress-probe", probe.run(shutdown)));

        info!(tasks = handles.len(), "Background tasks started");
        handles
    }
}
