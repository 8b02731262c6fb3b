//! Gestion des erreurs pour pmolink

use std::fmt;
use thiserror::Error;

/// Type Result personnalisé pour pmolink
pub type Result<T> = std::result::Result<T, LinkError>;

/// Raison d'un échec d'ouverture du WebSocket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailureKind {
    /// Le nœud a refusé le mot de passe (HTTP 401/403 à l'upgrade)
    InvalidCredentials,
    /// Hôte ou port impossible à transformer en URI
    InvalidUri,
    /// DNS, réseau, ou handshake interrompu
    Unreachable,
}

impl fmt::Display for ConnectionFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InvalidCredentials => "the password is invalid",
            Self::InvalidUri => "the URI is invalid",
            Self::Unreachable => "the node could not be reached",
        };
        f.write_str(text)
    }
}

/// Raison d'un échec de chargement de piste
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackLoadKind {
    /// Réponse sans `loadType` (ou avec une valeur inconnue)
    NoLoadType,
    NoMatches,
    /// Le nœud a rapporté une exception
    LoadFailed { severity: String },
    /// `/decodetrack` a répondu autre chose que 200
    DecodeFailed,
    /// Pièce jointe Discord sans piste
    AttachmentEmpty,
}

impl TrackLoadKind {
    /// Étiquette courte, telle qu'affichée dans les messages
    pub fn tag(&self) -> &str {
        match self {
            Self::NoLoadType => "NO_LOADTYPE",
            Self::NoMatches => "NO_MATCHES",
            Self::LoadFailed { severity } => severity,
            Self::DecodeFailed => "DECODE_FAILED",
            Self::AttachmentEmpty => "ATTACHMENT_EMPTY",
        }
    }
}

/// Erreurs possibles lors de l'utilisation de pmolink
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Node '{identifier}' failed to connect: {kind}")]
    ConnectionFailure {
        identifier: String,
        kind: ConnectionFailureKind,
    },

    /// Le nœud ne doit plus recevoir de travail
    #[error("The node '{0}' is unavailable")]
    NodeUnavailable(String),

    #[error("There are no nodes available")]
    NoNodesAvailable,

    #[error("A node with identifier '{0}' already exists")]
    DuplicateNodeIdentifier(String),

    #[error("{message} [{}]", .kind.tag())]
    TrackLoad { kind: TrackLoadKind, message: String },

    #[error("No Spotify client credentials were configured for this node")]
    InvalidSpotifyCredentials,

    #[error("Invalid filter argument: {0}")]
    InvalidFilterArgument(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Spotify error: {0}")]
    Spotify(#[from] pmospotify::SpotifyError),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl LinkError {
    pub(crate) fn connection(identifier: &str, kind: ConnectionFailureKind) -> Self {
        Self::ConnectionFailure {
            identifier: identifier.to_string(),
            kind,
        }
    }

    pub(crate) fn track_load(kind: TrackLoadKind, message: impl Into<String>) -> Self {
        Self::TrackLoad {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilterArgument(message.into())
    }

    /// Retourne la raison du chargement raté, le cas échéant
    pub fn track_load_kind(&self) -> Option<&TrackLoadKind> {
        match self {
            Self::TrackLoad { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_load_message() {
        let err = LinkError::track_load(TrackLoadKind::NoMatches, "No matches found.");
        assert_eq!(err.to_string(), "No matches found. [NO_MATCHES]");

        let err = LinkError::track_load(
            TrackLoadKind::LoadFailed {
                severity: "COMMON".into(),
            },
            "This video is unavailable",
        );
        assert_eq!(err.to_string(), "This video is unavailable [COMMON]");
    }

    #[test]
    fn test_connection_failure_message() {
        let err = LinkError::connection("main", ConnectionFailureKind::InvalidCredentials);
        assert_eq!(
            err.to_string(),
            "Node 'main' failed to connect: the password is invalid"
        );
    }
}
