//! The capability catalog: which source formats convert to which targets.
//!
//! The catalog is populated once per run from the capability endpoint and is
//! read-only afterwards. It turns the raw map into something a front end can
//! draw: a filtered list of [`ToolCard`]s, a "no results" placeholder that
//! echoes the query, or a load error shown in place of the grid.
//!
//! ## Search policy
//!
//! Matching is a case-insensitive substring test against display names
//! (`.pdf` is shown and matched as `PDF`). A leading `.` in the query is
//! ignored. When the query matches the *source*, every target is listed;
//! when it only matches some *targets*, only those targets are listed. A
//! source left with no listed targets is dropped, which also hides sources
//! the server declared with an empty target list.

use crate::backend::ConversionBackend;
use crate::error::BridgeError;
use crate::format::{self, FormatId};
use crate::session::ConversionSelection;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Message rendered in place of the grid when loading failed.
pub const LOAD_ERROR_MESSAGE: &str = "Failed to load tools. Please refresh.";

/// Supported conversions, in the order the server declared them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CapabilityMap(IndexMap<FormatId, Vec<FormatId>>);

impl CapabilityMap {
    /// Parse a capability payload.
    ///
    /// Accepts both `{".pdf": [".docx"]}` and `{"conversions": {".pdf": [".docx"]}}`.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, BridgeError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| BridgeError::CapabilityPayload {
                detail: format!("not JSON: {e}"),
            })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, BridgeError> {
        let Value::Object(mut root) = value else {
            return Err(BridgeError::CapabilityPayload {
                detail: "expected a JSON object".into(),
            });
        };

        let entries = match root.remove("conversions") {
            Some(Value::Object(nested)) => {
                debug!("Capability map nested under 'conversions'");
                nested
            }
            Some(other) => {
                return Err(BridgeError::CapabilityPayload {
                    detail: format!("'conversions' must be an object, got {}", kind(&other)),
                })
            }
            None => root,
        };

        let mut map: IndexMap<FormatId, Vec<FormatId>> = IndexMap::with_capacity(entries.len());
        for (source, targets) in entries {
            let items = match targets {
                Value::Array(items) => items,
                other => {
                    return Err(BridgeError::CapabilityPayload {
                        detail: format!(
                            "targets for '{source}' must be an array, got {}",
                            kind(&other)
                        ),
                    })
                }
            };
            let slot = map.entry(FormatId::new(&source)).or_default();
            for item in items {
                let target = match item {
                    Value::String(target) => FormatId::new(target),
                    other => {
                        return Err(BridgeError::CapabilityPayload {
                            detail: format!("target of '{source}' is not a string: {other}"),
                        })
                    }
                };
                if !slot.contains(&target) {
                    slot.push(target);
                }
            }
        }
        Ok(CapabilityMap(map))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn targets_for(&self, source: &FormatId) -> Option<&[FormatId]> {
        self.0.get(source).map(Vec::as_slice)
    }

    pub fn supports(&self, source: &FormatId, target: &FormatId) -> bool {
        self.targets_for(source)
            .is_some_and(|targets| targets.contains(target))
    }

    /// The source identifier as the server declared it.
    pub fn declared_source(&self, source: &FormatId) -> Option<&FormatId> {
        self.0.get_key_value(source).map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FormatId, &[FormatId])> {
        self.0.iter().map(|(s, t)| (s, t.as_slice()))
    }
}

impl<S: Into<FormatId>, T: Into<FormatId>> FromIterator<(S, Vec<T>)> for CapabilityMap {
    fn from_iter<I: IntoIterator<Item = (S, Vec<T>)>>(iter: I) -> Self {
        CapabilityMap(
            iter.into_iter()
                .map(|(s, ts)| (s.into(), ts.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One row of a search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub source: FormatId,
    pub targets: Vec<FormatId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CatalogState {
    Unloaded,
    Ready(CapabilityMap),
    Failed(String),
}

/// Holds the capability map for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct CapabilityCatalog {
    state: CatalogState,
}

impl Default for CapabilityCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityCatalog {
    pub fn new() -> Self {
        Self {
            state: CatalogState::Unloaded,
        }
    }

    /// A catalog that is already populated.
    pub fn with_map(map: CapabilityMap) -> Self {
        Self {
            state: CatalogState::Ready(map),
        }
    }

    /// Fetch and parse the capability map.
    ///
    /// On failure the catalog switches to its error state (rendered as
    /// [`LOAD_ERROR_MESSAGE`]) and the error is returned. There is no retry.
    pub async fn load<B>(&mut self, backend: &B) -> Result<&CapabilityMap, BridgeError>
    where
        B: ConversionBackend + ?Sized,
    {
        let outcome = backend
            .fetch_capabilities()
            .await
            .and_then(|body| CapabilityMap::from_json_slice(&body));

        match outcome {
            Ok(map) => {
                info!("Loaded {} conversion sources", map.len());
                self.state = CatalogState::Ready(map);
                let CatalogState::Ready(map) = &self.state else {
                    unreachable!("state was just set to Ready");
                };
                Ok(map)
            }
            Err(e) => {
                warn!("Capability load failed: {}", e);
                self.state = CatalogState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    pub fn map(&self) -> Option<&CapabilityMap> {
        match &self.state {
            CatalogState::Ready(map) => Some(map),
            _ => None,
        }
    }

    /// The load error, if the last load failed.
    pub fn load_error(&self) -> Option<&str> {
        match &self.state {
            CatalogState::Failed(msg) => Some(msg.as_str()),
            _ => None,
        }
    }

    /// Filter the catalog by `query`. See the module docs for the policy.
    pub fn search(&self, query: &str) -> Vec<CatalogEntry> {
        let Some(map) = self.map() else {
            return Vec::new();
        };
        let needle = normalise_query(query);

        map.iter()
            .filter_map(|(source, targets)| {
                let listed: Vec<FormatId> = if source.display_contains(&needle) {
                    targets.to_vec()
                } else {
                    targets
                        .iter()
                        .filter(|t| t.display_contains(&needle))
                        .cloned()
                        .collect()
                };
                (!listed.is_empty()).then(|| CatalogEntry {
                    source: source.clone(),
                    targets: listed,
                })
            })
            .collect()
    }

    /// Produce the view for `query`: cards, a no-results placeholder, or
    /// the load error.
    pub fn render(&self, query: &str) -> CatalogView {
        match &self.state {
            CatalogState::Unloaded => CatalogView::Loading,
            CatalogState::Failed(_) => CatalogView::LoadError {
                message: LOAD_ERROR_MESSAGE.to_string(),
            },
            CatalogState::Ready(_) => {
                let cards: Vec<ToolCard> =
                    self.search(query).into_iter().map(ToolCard::from).collect();
                if cards.is_empty() {
                    CatalogView::NoResults {
                        query: query.to_string(),
                    }
                } else {
                    CatalogView::Cards(cards)
                }
            }
        }
    }

    /// Source format for a local file, if the service converts from it.
    pub fn source_for_path(&self, path: impl AsRef<Path>) -> Result<FormatId, BridgeError> {
        let path = path.as_ref();
        let source = FormatId::from_path(path).ok_or_else(|| BridgeError::UnsupportedSource {
            source_format: path.display().to_string(),
        })?;
        self.map()
            .and_then(|map| map.declared_source(&source))
            .cloned()
            .ok_or_else(|| BridgeError::UnsupportedSource {
                source_format: source.to_string(),
            })
    }

    /// Validate a pair against the catalog and build the selection for it.
    ///
    /// The selection carries the identifiers as the server spelled them,
    /// whatever spelling the caller used.
    pub fn select(
        &self,
        source: &FormatId,
        target: &FormatId,
    ) -> Result<ConversionSelection, BridgeError> {
        let (declared_source, targets) = self
            .map()
            .and_then(|m| m.0.get_key_value(source))
            .ok_or_else(|| BridgeError::UnsupportedSource {
                source_format: source.to_string(),
            })?;
        let Some(declared_target) = targets.iter().find(|t| *t == target) else {
            return Err(BridgeError::UnsupportedTarget {
                source_format: source.to_string(),
                target: target.to_string(),
                supported: format::join(targets),
            });
        };
        Ok(ConversionSelection::new(
            declared_source.clone(),
            declared_target.clone(),
        ))
    }
}

/// Trim and lower-case; a leading `.` is dropped only when an extension
/// follows it, so a lone `.` matches nothing.
fn normalise_query(query: &str) -> String {
    let q = query.trim();
    match q.strip_prefix('.') {
        Some(rest) if !rest.is_empty() => rest.to_lowercase(),
        _ => q.to_lowercase(),
    }
}

// ── View ─────────────────────────────────────────────────────────────────

/// What the catalog area of the screen shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogView {
    /// Capabilities have not been fetched yet.
    Loading,
    /// One card per matching source.
    Cards(Vec<ToolCard>),
    /// Nothing matched; echoes the literal query.
    NoResults { query: String },
    /// The capability load failed.
    LoadError { message: String },
}

/// A selectable card: one source format and a button per target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCard {
    pub source: FormatId,
    pub title: String,
    pub buttons: Vec<TargetButton>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetButton {
    pub source: FormatId,
    pub target: FormatId,
    pub label: String,
}

impl TargetButton {
    /// The selection produced by clicking this button.
    pub fn select(&self) -> ConversionSelection {
        ConversionSelection::new(self.source.clone(), self.target.clone())
    }
}

impl From<CatalogEntry> for ToolCard {
    fn from(entry: CatalogEntry) -> Self {
        let buttons = entry
            .targets
            .iter()
            .map(|t| TargetButton {
                source: entry.source.clone(),
                target: t.clone(),
                label: format!("to {}", t.display_name()),
            })
            .collect();
        ToolCard {
            title: format!("{} Converter", entry.source.display_name()),
            source: entry.source,
            buttons,
        }
    }
}

impl fmt::Display for ToolCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.buttons.iter().map(|b| b.label.as_str()).collect();
        write!(f, "{:<16} {}", self.title, labels.join("  "))
    }
}

impl fmt::Display for CatalogView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogView::Loading => write!(f, "Loading tools…"),
            CatalogView::Cards(cards) => {
                for (i, card) in cards.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{card}")?;
                }
                Ok(())
            }
            CatalogView::NoResults { query } => {
                write!(f, "No tools found matching \"{query}\"")
            }
            CatalogView::LoadError { message } => write!(f, "{message}"),
        }
    }
}
