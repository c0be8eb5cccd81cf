//! Track-to-role classification
//!
//! Two recv-only video slots are registered before negotiation (RGB first,
//! depth second), but tracks can arrive in any order and carry no role label.
//! The rule is:
//!
//! 1. First video track binds to RGB.
//! 2. Next video track binds to depth if its id differs from the RGB track.
//! 3. Anything else is dropped and reported as a [`ClassificationAnomaly`].
//!
//! Non-video tracks are ignored. Bindings never change once made.

use super::{MediaStream, RemoteTrack, Role, TrackKind};
use crate::Error;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Track ids bound to each role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleBindings {
    rgb: Option<String>,
    depth: Option<String>,
}

impl RoleBindings {
    pub fn bound(&self, role: Role) -> Option<&str> {
        match role {
            Role::Rgb => self.rgb.as_deref(),
            Role::Depth => self.depth.as_deref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.rgb.is_some() && self.depth.is_some()
    }

    fn with(&self, role: Role, track_id: &str) -> Self {
        let mut next = self.clone();
        match role {
            Role::Rgb => next.rgb = Some(track_id.to_string()),
            Role::Depth => next.depth = Some(track_id.to_string()),
        }
        next
    }
}

/// Why a video track was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationAnomaly {
    /// Second track reused the RGB track's id
    DuplicateIdentity { track_id: String },
    /// Both roles were already bound
    SurplusTrack { track_id: String },
}

impl ClassificationAnomaly {
    pub fn track_id(&self) -> &str {
        match self {
            ClassificationAnomaly::DuplicateIdentity { track_id }
            | ClassificationAnomaly::SurplusTrack { track_id } => track_id,
        }
    }
}

impl fmt::Display for ClassificationAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationAnomaly::DuplicateIdentity { track_id } => {
                write!(f, "track '{}' has the same id as the RGB track", track_id)
            }
            ClassificationAnomaly::SurplusTrack { track_id } => {
                write!(f, "track '{}' arrived after both roles were bound", track_id)
            }
        }
    }
}

impl From<ClassificationAnomaly> for Error {
    fn from(anomaly: ClassificationAnomaly) -> Self {
        Error::ClassificationAnomaly(anomaly.to_string())
    }
}

/// Outcome of classifying one arriving track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Bound(Role),
    /// Not a video track
    Ignored,
    Dropped(ClassificationAnomaly),
}

/// Decide the role of an arriving track.
///
/// Pure: returns the new bindings and the outcome without side effects.
pub fn classify(
    bindings: &RoleBindings,
    kind: TrackKind,
    track_id: &str,
) -> (RoleBindings, Classification) {
    if kind != TrackKind::Video {
        return (bindings.clone(), Classification::Ignored);
    }

    match (&bindings.rgb, &bindings.depth) {
        (None, _) => (
            bindings.with(Role::Rgb, track_id),
            Classification::Bound(Role::Rgb),
        ),
        (Some(rgb), None) if rgb != track_id => (
            bindings.with(Role::Depth, track_id),
            Classification::Bound(Role::Depth),
        ),
        (Some(_), None) => (
            bindings.clone(),
            Classification::Dropped(ClassificationAnomaly::DuplicateIdentity {
                track_id: track_id.to_string(),
            }),
        ),
        (Some(_), Some(_)) => (
            bindings.clone(),
            Classification::Dropped(ClassificationAnomaly::SurplusTrack {
                track_id: track_id.to_string(),
            }),
        ),
    }
}

/// Stateful classifier owned by a session
#[derive(Debug, Default)]
pub struct TrackClassifier {
    bindings: RoleBindings,
    streams: HashMap<Role, MediaStream>,
    anomalies: Vec<ClassificationAnomaly>,
}

impl TrackClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify an arriving track.
    ///
    /// Returns the role and its freshly wrapped stream when the track was
    /// bound; `None` when it was ignored or dropped.
    pub fn on_track(&mut self, track: RemoteTrack) -> Option<(Role, MediaStream)> {
        let (next, outcome) = classify(&self.bindings, track.kind(), track.id());
        self.bindings = next;

        match outcome {
            Classification::Bound(role) => {
                info!("Track '{}' bound to {} role", track.id(), role);
                let stream = MediaStream::single(track);
                self.streams.insert(role, stream.clone());
                Some((role, stream))
            }
            Classification::Ignored => {
                debug!("Ignoring non-video track '{}' ({:?})", track.id(), track.kind());
                None
            }
            Classification::Dropped(anomaly) => {
                warn!("Dropping track: {}", anomaly);
                self.anomalies.push(anomaly);
                None
            }
        }
    }

    pub fn bindings(&self) -> &RoleBindings {
        &self.bindings
    }

    pub fn stream(&self, role: Role) -> Option<&MediaStream> {
        self.streams.get(&role)
    }

    pub fn anomalies(&self) -> &[ClassificationAnomaly] {
        &self.anomalies
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }
}
