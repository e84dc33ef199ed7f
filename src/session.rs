//! The conversion session: one file's upload → convert → download lifecycle.
//!
//! [`ConversionSession`] is a pure reducer. Front ends translate user and
//! network happenings into [`SessionEvent`]s, call
//! [`ConversionSession::dispatch`], and carry out the returned [`Effect`]s
//! (show the drop zone, start the request, write the file, ...). Nothing in
//! here touches the network, the file system or a terminal, so every
//! transition is unit-testable.
//!
//! ```text
//!            TargetSelected
//!   Idle ─────────────────────▶ Idle (selection set, intake shown)
//!    │ FileProvided
//!    ▼
//!  Uploading ──ResponseOk──────▶ Succeeded ──Download──▶ Succeeded
//!    │                              │
//!    ├─ResponseRejected─┐           │ FileProvided / Reset / Close
//!    └─TransportFailed──┴▶ Failed ──┘
//! ```
//!
//! The session owns the [`DownloadArtifact`] outright. Whenever the
//! artifact is dropped (new upload, reset, close, new target) the reducer
//! emits [`Effect::ReleaseArtifact`] first, so a driver holding an external
//! handle for it can revoke that handle.

use crate::error::SessionError;
use crate::format::FormatId;
use serde::Serialize;
use std::fmt;
use tracing::debug;

// ── Selection ────────────────────────────────────────────────────────────

/// A chosen source → target conversion. Both sides are always set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConversionSelection {
    source: FormatId,
    target: FormatId,
}

impl ConversionSelection {
    pub fn new(source: FormatId, target: FormatId) -> Self {
        Self { source, target }
    }

    pub fn source(&self) -> &FormatId {
        &self.source
    }

    pub fn target(&self) -> &FormatId {
        &self.target
    }

    /// Heading for the intake surface, e.g. `PDF to DOCX`.
    pub fn title(&self) -> String {
        format!(
            "{} to {}",
            self.source.display_name(),
            self.target.display_name()
        )
    }
}

impl fmt::Display for ConversionSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

// ── Progress ─────────────────────────────────────────────────────────────

/// Coarse, stage-based upload progress.
///
/// These are fixed points in the request lifecycle, not byte counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Checkpoint {
    RequestStarted,
    BodyBuilt,
    ResponseReceived,
    Complete,
}

impl Checkpoint {
    pub fn percent(self) -> u8 {
        match self {
            Checkpoint::RequestStarted => 10,
            Checkpoint::BodyBuilt => 30,
            Checkpoint::ResponseReceived => 80,
            Checkpoint::Complete => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Checkpoint::RequestStarted => "Preparing upload",
            Checkpoint::BodyBuilt => "Uploading & Converting...",
            Checkpoint::ResponseReceived => "Receiving result",
            Checkpoint::Complete => "Done",
        }
    }
}

// ── Artifact ─────────────────────────────────────────────────────────────

/// Identifies one artifact for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArtifactId(u64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact#{}", self.0)
    }
}

/// The converted file: bytes plus the filename to save it under.
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    id: ArtifactId,
    bytes: Vec<u8>,
    filename: String,
}

impl DownloadArtifact {
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for DownloadArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadArtifact")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

// ── State machine ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Uploading { file_name: String, progress: Checkpoint },
    Succeeded { artifact: DownloadArtifact },
    Failed { message: String },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Uploading { .. } => "uploading",
            SessionState::Succeeded { .. } => "succeeded",
            SessionState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded { .. } | SessionState::Failed { .. })
    }
}

/// Everything that can happen to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A target button was clicked.
    TargetSelected(ConversionSelection),
    /// A file was dropped or picked.
    FileProvided { file_name: String },
    /// The upload reached a progress checkpoint.
    Checkpoint(Checkpoint),
    /// The server answered 2xx with the converted file.
    ResponseOk { bytes: Vec<u8>, filename: String },
    /// The server answered non-2xx.
    ResponseRejected { message: String },
    /// The request failed before a usable response arrived.
    TransportFailed { message: String },
    /// "Convert another file".
    Reset,
    /// "Download".
    Download,
    /// The intake surface was dismissed.
    Close,
}

/// Instructions for the front end, in the order they must be carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ShowIntake,
    HideIntake,
    ClearError,
    ClearInput,
    BeginUpload { file_name: String, target: FormatId },
    Progress(Checkpoint),
    ShowResult { filename: String },
    ShowError { message: String },
    ReleaseArtifact(ArtifactId),
    SaveArtifact { id: ArtifactId, filename: String },
}

/// What a renderer should draw for the session right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub title: Option<String>,
    pub intake_visible: bool,
    pub progress: Option<ProgressView>,
    pub result_filename: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub file_name: String,
    pub percent: u8,
    pub status: &'static str,
}

/// Client-side state machine for one conversion attempt.
#[derive(Debug, Clone)]
pub struct ConversionSession {
    selection: Option<ConversionSelection>,
    state: SessionState,
    intake_visible: bool,
    next_artifact: u64,
}

impl Default for ConversionSession {
    fn default() -> Self {
        Self {
            selection: None,
            state: SessionState::Idle,
            intake_visible: false,
            next_artifact: 0,
        }
    }
}

impl ConversionSession {
    /// A session whose target has already been chosen, intake shown.
    pub fn new(selection: ConversionSelection) -> Self {
        Self {
            selection: Some(selection),
            intake_visible: true,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn selection(&self) -> Option<&ConversionSelection> {
        self.selection.as_ref()
    }

    pub fn intake_visible(&self) -> bool {
        self.intake_visible
    }

    /// The stored artifact, when the last upload succeeded.
    pub fn artifact(&self) -> Option<&DownloadArtifact> {
        match &self.state {
            SessionState::Succeeded { artifact } => Some(artifact),
            _ => None,
        }
    }

    pub fn view(&self) -> SessionView {
        let (progress, result_filename, error) = match &self.state {
            SessionState::Idle => (None, None, None),
            SessionState::Uploading { file_name, progress } => (
                Some(ProgressView {
                    file_name: file_name.clone(),
                    percent: progress.percent(),
                    status: progress.label(),
                }),
                None,
                None,
            ),
            SessionState::Succeeded { artifact } => (None, Some(artifact.filename.clone()), None),
            SessionState::Failed { message } => (None, None, Some(message.clone())),
        };
        SessionView {
            title: self.selection.as_ref().map(ConversionSelection::title),
            intake_visible: self.intake_visible,
            progress,
            result_filename,
            error,
        }
    }

    /// Apply `event`, returning the effects to perform.
    ///
    /// A refused event leaves the session exactly as it was.
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<Vec<Effect>, SessionError> {
        let from = self.state.name();
        let effects = match event {
            SessionEvent::TargetSelected(selection) => {
                self.ensure_not_uploading()?;
                let mut effects = self.release_artifact();
                self.selection = Some(selection);
                self.state = SessionState::Idle;
                self.intake_visible = true;
                effects.extend([Effect::ClearError, Effect::ShowIntake]);
                effects
            }

            SessionEvent::FileProvided { file_name } => {
                self.ensure_not_uploading()?;
                let target = self
                    .selection
                    .as_ref()
                    .map(|s| s.target.clone())
                    .ok_or(SessionError::NoSelection)?;
                let mut effects = self.release_artifact();
                self.state = SessionState::Uploading {
                    file_name: file_name.clone(),
                    progress: Checkpoint::RequestStarted,
                };
                self.intake_visible = false;
                effects.extend([
                    Effect::ClearError,
                    Effect::HideIntake,
                    Effect::Progress(Checkpoint::RequestStarted),
                    Effect::BeginUpload { file_name, target },
                ]);
                effects
            }

            SessionEvent::Checkpoint(checkpoint) => match &mut self.state {
                SessionState::Uploading { progress, .. } => {
                    if checkpoint > *progress {
                        *progress = checkpoint;
                        vec![Effect::Progress(checkpoint)]
                    } else {
                        Vec::new()
                    }
                }
                _ => return Err(SessionError::NotUploading),
            },

            SessionEvent::ResponseOk { bytes, filename } => {
                self.ensure_uploading()?;
                self.next_artifact += 1;
                let artifact = DownloadArtifact {
                    id: ArtifactId(self.next_artifact),
                    bytes,
                    filename: filename.clone(),
                };
                self.state = SessionState::Succeeded { artifact };
                vec![
                    Effect::Progress(Checkpoint::Complete),
                    Effect::ShowResult { filename },
                ]
            }

            SessionEvent::ResponseRejected { message }
            | SessionEvent::TransportFailed { message } => {
                self.ensure_uploading()?;
                self.state = SessionState::Failed {
                    message: message.clone(),
                };
                self.intake_visible = true;
                vec![Effect::ShowError { message }, Effect::ShowIntake]
            }

            SessionEvent::Reset => {
                self.ensure_not_uploading()?;
                let mut effects = self.release_artifact();
                self.selection = None;
                self.state = SessionState::Idle;
                self.intake_visible = true;
                effects.extend([Effect::ClearError, Effect::ClearInput, Effect::ShowIntake]);
                effects
            }

            SessionEvent::Download => match &self.state {
                SessionState::Succeeded { artifact } => vec![Effect::SaveArtifact {
                    id: artifact.id,
                    filename: artifact.filename.clone(),
                }],
                _ => return Err(SessionError::NothingToDownload),
            },

            SessionEvent::Close => {
                self.ensure_not_uploading()?;
                let mut effects = self.release_artifact();
                self.selection = None;
                self.state = SessionState::Idle;
                self.intake_visible = false;
                effects.push(Effect::HideIntake);
                effects
            }
        };
        debug!("session {} -> {}", from, self.state.name());
        Ok(effects)
    }

    fn ensure_not_uploading(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Uploading { .. } => Err(SessionError::UploadInProgress),
            _ => Ok(()),
        }
    }

    fn ensure_uploading(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Uploading { .. } => Ok(()),
            _ => Err(SessionError::NotUploading),
        }
    }

    /// Drop the stored artifact, if any, and say so.
    fn release_artifact(&mut self) -> Vec<Effect> {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Succeeded { artifact } => {
                debug!("releasing {}", artifact.id);
                vec![Effect::ReleaseArtifact(artifact.id)]
            }
            other => {
                self.state = other;
                Vec::new()
            }
        }
    }
}
