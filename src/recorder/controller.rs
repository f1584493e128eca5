//! Recording session controller
//!
//! Reconciles caller requests, the consent result and recorder callbacks into
//! exactly-once answers. All session mutation goes through the single
//! [`Session`] record behind one lock; the lock is never held across an
//! `.await`.

use super::adapter::{RecorderAdapter, RecorderEvent, RecorderFactory, RecorderListener, TaggedEvent};
use super::completion::{Completer, CompletionHandle};
use super::config::{ControllerConfig, UnclaimedPolicy};
use super::state::{
    CleanOutcome, Configuration, SessionState, SetupOptions, StartOutcome, StopResult,
};
use crate::capture::permissions::{PermissionGateway, PermissionOutcome, PermissionToken};
use crate::capture::traits::{select_encoder, CapabilityProbe, VideoEncoder};
use crate::gallery::{GalleryEntry, GalleryPublisher, MediaStore};
use crate::storage::ArtifactStore;
use crate::utils::error::{RecordError, RecordResult};
use anyhow::Context as _;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

/// Events observable by the host while a session runs
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged { from: SessionState, to: SessionState },
    /// Informational recorder callback (start/pause/resume) from the live recorder
    Recorder(RecorderEvent),
    /// A recording was published to the gallery
    Published(GalleryEntry),
    PublishFailed(String),
    /// A recording finished without a pending stop and was left in the working directory
    Unclaimed(PathBuf),
}

/// External collaborators the controller drives
#[derive(Clone)]
pub struct Collaborators {
    pub recorders: Arc<dyn RecorderFactory>,
    pub permissions: Arc<dyn PermissionGateway>,
    pub probe: Arc<dyn CapabilityProbe>,
    pub media_store: Arc<dyn MediaStore>,
}

/// The single recording attempt and its outstanding caller requests
struct Session {
    state: SessionState,
    /// Latest configuration from `setup`
    configuration: Configuration,
    /// Snapshot taken when the current recording started
    recording_configuration: Option<Configuration>,
    encoder: VideoEncoder,
    adapter: Option<Box<dyn RecorderAdapter>>,
    /// Id of the current adapter; callbacks tagged with any other id are stale
    instance: u64,
    /// The current adapter has not yet reported completion or error
    live: bool,
    output_path: Option<PathBuf>,
    id: Option<Uuid>,
    pending_start: Option<Completer<StartOutcome>>,
    pending_stop: Option<Completer<StopResult>>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            configuration: Configuration::default(),
            recording_configuration: None,
            encoder: VideoEncoder::Default,
            adapter: None,
            instance: 0,
            live: false,
            output_path: None,
            id: None,
            pending_start: None,
            pending_stop: None,
        }
    }

    fn is_busy(&self) -> bool {
        self.state.is_active() || self.pending_start.is_some() || self.pending_stop.is_some()
    }

    fn accepts(&self, instance: u64) -> bool {
        self.live && self.instance == instance
    }

    /// Discard the adapter and forget the artifact path
    fn release_recorder(&mut self) {
        self.adapter = None;
        self.live = false;
        self.output_path = None;
        self.recording_configuration = None;
    }
}

/// Publishing work left after a completion event
struct Completion {
    source: Option<PathBuf>,
    /// A stop request is waiting for this recording
    claimed: bool,
}

struct Inner {
    config: ControllerConfig,
    session: Mutex<Session>,
    recorders: Arc<dyn RecorderFactory>,
    permissions: Arc<dyn PermissionGateway>,
    probe: Arc<dyn CapabilityProbe>,
    artifacts: ArtifactStore,
    publisher: GalleryPublisher,
    recorder_tx: mpsc::UnboundedSender<TaggedEvent>,
    event_tx: broadcast::Sender<SessionEvent>,
}

/// Coordinates one screen recording session at a time
#[derive(Clone)]
pub struct RecordingController {
    inner: Arc<Inner>,
}

impl RecordingController {
    /// Create a controller and start its recorder event loop
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ControllerConfig, artifacts: ArtifactStore, collaborators: Collaborators) -> Self {
        let (recorder_tx, recorder_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(100);
        let publisher = GalleryPublisher::new(collaborators.media_store, config.gallery.clone());

        let inner = Arc::new(Inner {
            config,
            session: Mutex::new(Session::new()),
            recorders: collaborators.recorders,
            permissions: collaborators.permissions,
            probe: collaborators.probe,
            artifacts,
            publisher,
            recorder_tx,
            event_tx,
        });

        tokio::spawn(run_event_loop(Arc::downgrade(&inner), recorder_rx));
        tracing::debug!("Recording controller ready, working dir {:?}", inner.artifacts.dir());

        Self { inner }
    }

    /// Create a controller whose working directory is named by
    /// `config.working_dir_name`
    ///
    /// The directory goes under `external_root` when the platform offers
    /// app-specific external storage, otherwise under `fallback_root`.
    pub fn open(
        config: ControllerConfig,
        external_root: Option<&Path>,
        fallback_root: &Path,
        collaborators: Collaborators,
    ) -> RecordResult<Self> {
        let artifacts = ArtifactStore::resolve(external_root, fallback_root, &config.working_dir_name)?;
        Ok(Self::new(config, artifacts, collaborators))
    }

    /// Store the configuration and bind a recorder
    ///
    /// Failures are logged and swallowed; they resurface when recording starts.
    pub fn setup(&self, options: SetupOptions) {
        if let Err(e) = self.inner.try_setup(options) {
            tracing::error!("Recorder setup failed: {:#}", e);
        }
    }

    /// Ask for capture consent and start recording once granted
    pub fn start_recording(&self) -> CompletionHandle<StartOutcome> {
        let (completer, handle) = CompletionHandle::pair();
        let mut session = self.inner.session.lock();

        if session.pending_start.is_some() {
            return CompletionHandle::rejected(RecordError::Conflict(
                "Recording already in progress".to_string(),
            ));
        }
        if session.is_busy() {
            return CompletionHandle::rejected(RecordError::Conflict(format!(
                "Recording session busy ({:?})",
                session.state
            )));
        }

        session.encoder = select_encoder(self.inner.probe.as_ref(), &self.inner.config.preferred_encoder);
        if let Err(e) = self.inner.bind_recorder(&mut session) {
            tracing::error!("Could not create recorder: {}", e);
            return CompletionHandle::rejected(e);
        }

        let id = Uuid::new_v4();
        session.id = Some(id);
        session.output_path = Some(self.inner.artifacts.allocate());
        session.recording_configuration = Some(session.configuration.clone());
        session.pending_start = Some(completer);
        let instance = session.instance;
        self.inner.transition(&mut session, SessionState::AwaitingPermission);
        drop(session);

        tracing::info!(session = %id, "Requesting screen capture consent");
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = inner.permissions.request_capture().await;
            inner.on_permission(instance, outcome);
        });

        handle
    }

    /// Ask the recorder to stop; resolves once the recording is published
    pub fn stop_recording(&self) -> CompletionHandle<StopResult> {
        let (completer, handle) = CompletionHandle::pair();
        let mut session = self.inner.session.lock();

        if session.pending_stop.is_some() {
            return CompletionHandle::rejected(RecordError::Conflict(
                "Stop recording already in progress".to_string(),
            ));
        }
        if session.adapter.is_none() {
            return CompletionHandle::rejected(RecordError::NotInitialized);
        }

        session.pending_stop = Some(completer);
        let instance = session.instance;
        drop(session);

        let inner = self.inner.clone();
        tokio::spawn(async move { inner.request_end(instance) });

        handle
    }

    /// Delete every file in the working directory
    pub async fn clean(&self) -> RecordResult<CleanOutcome> {
        let artifacts = self.inner.artifacts.clone();
        let removed = tokio::task::spawn_blocking(move || artifacts.clean())
            .await
            .map_err(|e| RecordError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        tracing::info!("Working directory cleaned ({} files)", removed);
        Ok(CleanOutcome::Cleaned)
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.inner.session.lock().state
    }

    /// Encoder chosen at the last setup or start
    pub fn selected_encoder(&self) -> VideoEncoder {
        self.inner.session.lock().encoder.clone()
    }

    pub fn configuration(&self) -> Configuration {
        self.inner.session.lock().configuration.clone()
    }

    pub fn working_dir(&self) -> &Path {
        self.inner.artifacts.dir()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.event_tx.subscribe()
    }
}

async fn run_event_loop(weak: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<TaggedEvent>) {
    while let Some((instance, event)) = rx.recv().await {
        let Some(inner) = weak.upgrade() else {
            break;
        };
        inner.on_recorder_event(instance, event).await;
    }
    tracing::debug!("Recorder event loop finished");
}

impl Inner {
    fn try_setup(&self, options: SetupOptions) -> anyhow::Result<()> {
        let configuration = Configuration::from(options);
        let encoder = select_encoder(self.probe.as_ref(), &self.config.preferred_encoder);
        tracing::info!(
            "Setup: {}x{}, mic={}, fps={:?}, bitrate={:?}, encoder={}",
            configuration.width,
            configuration.height,
            configuration.mic,
            configuration.fps,
            configuration.bitrate,
            encoder
        );

        let mut session = self.session.lock();
        session.configuration = configuration;
        session.encoder = encoder;

        if session.is_busy() {
            tracing::warn!(
                "Setup during an active session ({:?}); keeping the current recorder",
                session.state
            );
            return Ok(());
        }

        if let Err(e) = self.bind_recorder(&mut session) {
            session.release_recorder();
            return Err(e).context("constructing recorder");
        }
        Ok(())
    }

    /// Replace the adapter with a fresh instance bound to a fresh listener
    fn bind_recorder(&self, session: &mut Session) -> RecordResult<()> {
        session.instance += 1;
        session.live = false;
        session.adapter = None;

        let listener = RecorderListener::new(session.instance, self.recorder_tx.clone());
        let mut adapter = self.recorders.create(listener)?;
        adapter.select_encoder(&session.encoder);

        session.adapter = Some(adapter);
        session.live = true;
        tracing::debug!("Bound recorder instance {}", session.instance);
        Ok(())
    }

    fn transition(&self, session: &mut Session, to: SessionState) {
        let from = session.state;
        if from == to {
            return;
        }
        session.state = to;
        tracing::info!("Recording session: {:?} -> {:?}", from, to);
        let _ = self.event_tx.send(SessionEvent::StateChanged { from, to });
    }

    /// Return to idle, dropping the recorder unless a stop still waits on it
    fn settle_idle(&self, session: &mut Session) {
        if session.pending_stop.is_none() {
            session.release_recorder();
            self.transition(session, SessionState::Idle);
        }
    }

    fn on_permission(&self, instance: u64, outcome: RecordResult<PermissionOutcome>) {
        let mut session = self.session.lock();
        if session.instance != instance {
            tracing::debug!("Ignoring consent result for superseded recorder {}", instance);
            return;
        }
        let Some(start) = session.pending_start.take() else {
            tracing::debug!("Consent result arrived after the start was already settled");
            return;
        };

        match outcome {
            Ok(PermissionOutcome::Granted(token)) => {
                if session.state != SessionState::AwaitingPermission {
                    tracing::warn!("Consent granted after stop was requested; not starting capture");
                    drop(session);
                    start.reject(RecordError::SessionEnded);
                    return;
                }
                match Self::arm_and_begin(&mut session, token) {
                    Ok(()) => {
                        self.transition(&mut session, SessionState::Recording);
                        drop(session);
                        start.resolve(StartOutcome::Started);
                    }
                    Err(e) => {
                        tracing::error!("Recorder failed to start: {}", e);
                        self.settle_idle(&mut session);
                        drop(session);
                        start.reject(e);
                    }
                }
            }
            Ok(PermissionOutcome::Denied) => {
                tracing::info!("Screen capture permission denied");
                self.settle_idle(&mut session);
                drop(session);
                start.resolve(StartOutcome::PermissionDenied);
            }
            Err(e) => {
                tracing::error!("Could not request screen capture consent: {}", e);
                self.settle_idle(&mut session);
                drop(session);
                start.reject(RecordError::PermissionFailure(e.to_string()));
            }
        }
    }

    fn arm_and_begin(session: &mut Session, token: PermissionToken) -> RecordResult<()> {
        let output_path = session.output_path.clone().ok_or(RecordError::OutputPathMissing)?;
        let configuration = session
            .recording_configuration
            .clone()
            .unwrap_or_else(|| session.configuration.clone());
        let adapter = session.adapter.as_mut().ok_or(RecordError::NotInitialized)?;

        adapter.arm(&configuration, &output_path)?;
        adapter.begin(token)
    }

    fn request_end(&self, instance: u64) {
        let mut session = self.session.lock();
        if !session.accepts(instance) {
            tracing::debug!("Recorder {} already finished; stop will settle from its final event", instance);
            return;
        }

        let result = match session.adapter.as_mut() {
            Some(adapter) => adapter.end(),
            None => Err(RecordError::NotInitialized),
        };

        match result {
            Ok(()) => {
                tracing::info!("Stop requested, waiting for recorder to finish");
                if matches!(
                    session.state,
                    SessionState::Recording | SessionState::AwaitingPermission
                ) {
                    self.transition(&mut session, SessionState::Stopping);
                }
            }
            Err(e) => {
                tracing::error!("Error stopping recording: {}", e);
                if let Some(stop) = session.pending_stop.take() {
                    drop(session);
                    stop.reject(e);
                }
            }
        }
    }

    async fn on_recorder_event(&self, instance: u64, event: RecorderEvent) {
        if let Some(completion) = self.apply_recorder_event(instance, event) {
            self.finish_completion(completion).await;
        }
    }

    /// Apply a recorder callback under the session lock
    ///
    /// Returns the publishing work left over when the recording completed.
    fn apply_recorder_event(&self, instance: u64, event: RecorderEvent) -> Option<Completion> {
        let mut session = self.session.lock();
        if !session.accepts(instance) {
            tracing::debug!("Ignoring {:?} from stale recorder instance {}", event, instance);
            return None;
        }

        match event {
            RecorderEvent::Started | RecorderEvent::Paused | RecorderEvent::Resumed => {
                tracing::debug!(session = ?session.id, "Recorder reported {:?}", event);
                let _ = self.event_tx.send(SessionEvent::Recorder(event));
                None
            }
            RecorderEvent::Completed { output_file } => {
                let source = output_file.or_else(|| session.output_path.clone());
                let start = session.pending_start.take();
                let claimed = session.pending_stop.is_some();
                session.release_recorder();
                self.transition(&mut session, SessionState::Saving);
                drop(session);

                if let Some(start) = start {
                    tracing::warn!("Recording completed before the start request settled");
                    start.reject(RecordError::SessionEnded);
                }
                Some(Completion { source, claimed })
            }
            RecorderEvent::Error(failure) => {
                tracing::error!(
                    session = ?session.id,
                    "Recorder error {}: {}",
                    failure.code,
                    failure.reason
                );
                let start = session.pending_start.take();
                let stop = session.pending_stop.take();
                session.release_recorder();
                self.transition(&mut session, SessionState::Errored);
                self.transition(&mut session, SessionState::Idle);
                drop(session);

                if let Some(start) = start {
                    start.reject(RecordError::Recorder(failure.clone()));
                }
                if let Some(stop) = stop {
                    stop.reject(RecordError::Recorder(failure));
                }
                None
            }
        }
    }

    async fn finish_completion(&self, completion: Completion) {
        if !completion.claimed {
            self.handle_unclaimed(completion.source).await;
            let mut session = self.session.lock();
            self.transition(&mut session, SessionState::Idle);
            return;
        }

        let result = match completion.source {
            Some(path) => self.publish(&path).await,
            None => Err(RecordError::OutputPathMissing),
        };

        let stop = {
            let mut session = self.session.lock();
            self.transition(&mut session, SessionState::Idle);
            session.pending_stop.take()
        };
        if let Some(stop) = stop {
            stop.settle(result.map(|entry| StopResult::success((&entry).into())));
        }
    }

    async fn publish(&self, source: &Path) -> RecordResult<GalleryEntry> {
        match self.publisher.publish(source).await {
            Ok(entry) => {
                let _ = self.event_tx.send(SessionEvent::Published(entry.clone()));
                Ok(entry)
            }
            Err(e) => {
                tracing::error!("Publishing {:?} failed: {}", source, e);
                let _ = self.event_tx.send(SessionEvent::PublishFailed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn handle_unclaimed(&self, source: Option<PathBuf>) {
        let Some(source) = source else {
            tracing::warn!("Recording completed without a stop request and without an output file");
            return;
        };
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            tracing::debug!("Recording completed before anything was written to {:?}", source);
            return;
        }

        match self.config.unclaimed_completion {
            UnclaimedPolicy::Keep => {
                tracing::warn!("Recording completed without a stop request; keeping {:?}", source);
                let _ = self.event_tx.send(SessionEvent::Unclaimed(source));
            }
            UnclaimedPolicy::Publish => {
                tracing::info!("Recording completed without a stop request; publishing {:?}", source);
                let _ = self.publish(&source).await;
            }
            UnclaimedPolicy::Discard => {
                tracing::info!("Recording completed without a stop request; discarding {:?}", source);
                if let Err(e) = tokio::fs::remove_file(&source).await {
                    tracing::warn!("Could not discard {:?}: {}", source, e);
                }
            }
        }
    }
}
