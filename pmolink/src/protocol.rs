//! Messages échangés avec un nœud Lavalink
//!
//! - [`Frame`] : trames reçues sur le WebSocket (`stats`, `event`, `playerUpdate`)
//! - [`ControlMessage`] : opérations envoyées au nœud
//! - [`LoadTracksResponse`] : corps de `GET /loadtracks`

use crate::objects::TrackInfo;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Clé de reprise de session envoyée au nœud
pub const RESUME_KEY: &str = "pmolinkResumeKey";

/// Délai (secondes) pendant lequel le nœud garde la session après une coupure
pub const RESUME_TIMEOUT_SECS: u64 = 60;

/// Mémoire du processus Lavalink, en octets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub free: u64,
    pub used: u64,
    pub allocated: u64,
    pub reservable: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    pub cores: u32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

/// Trames audio de la dernière minute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub sent: i64,
    pub nulled: i64,
    pub deficit: i64,
}

/// Dernier état de charge rapporté par un nœud
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub players: u32,
    pub playing_players: u32,
    /// Millisecondes
    pub uptime: u64,
    pub memory: MemoryStats,
    pub cpu: CpuStats,
    #[serde(default)]
    pub frame_stats: Option<FrameStats>,
}

/// Trame entrante décodée
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Stats(NodeStats),
    /// Événement de lecture (`TrackStartEvent`, `TrackEndEvent`, ...)
    Event { guild_id: u64, payload: Value },
    PlayerUpdate { guild_id: u64, payload: Value },
    /// Opération inconnue de ce client
    Other { op: String },
}

/// Erreur de décodage d'une trame
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no op")]
    MissingOp,
    #[error("'{0}' frame has no usable guildId")]
    MissingGuildId(String),
}

impl Frame {
    /// Décode le texte d'une trame
    ///
    /// Le `guildId` est accepté sous forme de chaîne ou de nombre ; le
    /// payload d'un `event` / `playerUpdate` est conservé tel quel.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let payload: Value = serde_json::from_str(text)?;
        let op = payload
            .get("op")
            .and_then(Value::as_str)
            .filter(|op| !op.is_empty())
            .ok_or(FrameError::MissingOp)?
            .to_string();

        match op.as_str() {
            "stats" => Ok(Frame::Stats(serde_json::from_value(payload)?)),
            "event" | "playerUpdate" => {
                let guild_id = payload
                    .get("guildId")
                    .and_then(parse_snowflake)
                    .ok_or_else(|| FrameError::MissingGuildId(op.clone()))?;
                if op == "event" {
                    Ok(Frame::Event { guild_id, payload })
                } else {
                    Ok(Frame::PlayerUpdate { guild_id, payload })
                }
            }
            _ => Ok(Frame::Other { op }),
        }
    }

    pub fn op(&self) -> &str {
        match self {
            Frame::Stats(_) => "stats",
            Frame::Event { .. } => "event",
            Frame::PlayerUpdate { .. } => "playerUpdate",
            Frame::Other { op } => op,
        }
    }
}

/// Lit un identifiant Discord transmis en chaîne ou en nombre
pub fn parse_snowflake(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn snowflake_as_string<S: Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&id.to_string())
}

/// Opération envoyée au nœud
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ControlMessage {
    ConfigureResuming {
        key: String,
        timeout: u64,
    },
    /// Filtres audio fusionnés ; voir `ControlMessage::filters`
    Filters {
        #[serde(serialize_with = "snowflake_as_string")]
        guild_id: u64,
        #[serde(flatten)]
        payload: Map<String, Value>,
    },
    Destroy {
        #[serde(serialize_with = "snowflake_as_string")]
        guild_id: u64,
    },
    VoiceUpdate {
        #[serde(serialize_with = "snowflake_as_string")]
        guild_id: u64,
        session_id: String,
        event: Value,
    },
}

impl ControlMessage {
    /// Message de reprise envoyé après chaque ouverture du socket
    pub fn configure_resuming() -> Self {
        Self::ConfigureResuming {
            key: RESUME_KEY.to_string(),
            timeout: RESUME_TIMEOUT_SECS,
        }
    }

    pub fn destroy(guild_id: u64) -> Self {
        Self::Destroy { guild_id }
    }

    pub fn voice_update(guild_id: u64, session_id: impl Into<String>, event: Value) -> Self {
        Self::VoiceUpdate {
            guild_id,
            session_id: session_id.into(),
            event,
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Self::ConfigureResuming { .. } => "configureResuming",
            Self::Filters { .. } => "filters",
            Self::Destroy { .. } => "destroy",
            Self::VoiceUpdate { .. } => "voiceUpdate",
        }
    }
}

/// Piste brute renvoyée par le nœud
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrack {
    /// Identifiant encodé, opaque pour ce client
    pub track: String,
    pub info: TrackInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    #[serde(default)]
    pub name: String,
    /// -1 quand aucune piste n'est sélectionnée
    #[serde(default = "no_selection")]
    pub selected_track: i64,
}

fn no_selection() -> i64 {
    -1
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadException {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

/// Corps de `GET /loadtracks`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTracksResponse {
    #[serde(default)]
    pub load_type: Option<String>,
    #[serde(default)]
    pub playlist_info: Option<PlaylistInfo>,
    #[serde(default)]
    pub tracks: Vec<RawTrack>,
    #[serde(default)]
    pub exception: Option<LoadException>,
}
