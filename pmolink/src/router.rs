//! Routage des trames vers les sessions de lecture
//!
//! Une session (un « player » par guilde) est fournie par l'application
//! hôte via le trait [`Session`]. Le routeur ne fait que conserver les
//! sessions d'un nœud et leur transmettre ce qui les concerne.

use crate::protocol::{parse_snowflake, Frame, NodeStats};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Session de lecture d'une guilde, implémentée par l'application
#[async_trait]
pub trait Session: Send + Sync {
    /// Trame `event` du nœud, transmise telle quelle
    async fn on_event(&self, payload: Value);

    /// Trame `playerUpdate` du nœud, transmise telle quelle
    async fn on_player_update(&self, payload: Value);

    /// Événement `VOICE_SERVER_UPDATE` de la gateway Discord
    async fn on_voice_server_update(&self, _data: Value) {}

    /// Événement `VOICE_STATE_UPDATE` concernant le bot lui-même
    async fn on_voice_state_update(&self, _data: Value) {}

    /// Appelé une fois quand le nœud propriétaire est déconnecté
    async fn destroy(&self);
}

/// Événement vocal reçu de la gateway hôte (`{"t": ..., "d": ...}`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoiceDispatch {
    #[serde(rename = "t")]
    pub kind: String,
    #[serde(rename = "d")]
    pub data: Value,
}

impl VoiceDispatch {
    pub const VOICE_SERVER_UPDATE: &'static str = "VOICE_SERVER_UPDATE";
    pub const VOICE_STATE_UPDATE: &'static str = "VOICE_STATE_UPDATE";

    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    fn guild_id(&self) -> Option<u64> {
        self.data.get("guild_id").and_then(parse_snowflake)
    }

    fn user_id(&self) -> Option<u64> {
        self.data.get("user_id").and_then(parse_snowflake)
    }
}

/// Ce qu'il est advenu d'une trame routée
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Statistiques à conserver par le nœud
    Stats(NodeStats),
    Delivered,
    /// Aucune session pour cette guilde : trame ignorée
    UnknownSession,
    /// Trame sans destinataire (opération inconnue, voix d'un autre utilisateur)
    Ignored,
}

/// Table guilde → session d'un nœud
#[derive(Default)]
pub struct SessionRouter {
    sessions: RwLock<HashMap<u64, Arc<dyn Session>>>,
}

impl SessionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre la session d'une guilde, en remplaçant la précédente
    pub async fn register(
        &self,
        guild_id: u64,
        session: Arc<dyn Session>,
    ) -> Option<Arc<dyn Session>> {
        self.sessions.write().await.insert(guild_id, session)
    }

    pub async fn get(&self, guild_id: u64) -> Option<Arc<dyn Session>> {
        self.sessions.read().await.get(&guild_id).cloned()
    }

    pub async fn unregister(&self, guild_id: u64) -> Option<Arc<dyn Session>> {
        self.sessions.write().await.remove(&guild_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn guild_ids(&self) -> Vec<u64> {
        self.sessions.read().await.keys().copied().collect()
    }

    /// Retire et retourne toutes les sessions
    pub async fn drain(&self) -> Vec<(u64, Arc<dyn Session>)> {
        self.sessions.write().await.drain().collect()
    }

    /// Transmet une trame à la session concernée
    ///
    /// Le verrou est relâché avant l'appel à la session.
    pub async fn route_frame(&self, frame: Frame) -> RouteOutcome {
        match frame {
            Frame::Stats(stats) => RouteOutcome::Stats(stats),
            Frame::Event { guild_id, payload } => match self.get(guild_id).await {
                Some(session) => {
                    session.on_event(payload).await;
                    RouteOutcome::Delivered
                }
                None => {
                    debug!(guild_id, "Dropping event for unknown session");
                    RouteOutcome::UnknownSession
                }
            },
            Frame::PlayerUpdate { guild_id, payload } => match self.get(guild_id).await {
                Some(session) => {
                    session.on_player_update(payload).await;
                    RouteOutcome::Delivered
                }
                None => {
                    debug!(guild_id, "Dropping player update for unknown session");
                    RouteOutcome::UnknownSession
                }
            },
            Frame::Other { op } => {
                debug!(op = %op, "Ignoring unsupported frame");
                RouteOutcome::Ignored
            }
        }
    }

    /// Transmet un événement vocal de la gateway hôte
    ///
    /// `VOICE_STATE_UPDATE` n'est transmis que s'il concerne `own_user_id`.
    pub async fn route_voice_dispatch(
        &self,
        dispatch: &VoiceDispatch,
        own_user_id: u64,
    ) -> RouteOutcome {
        let is_server_update = dispatch.kind == VoiceDispatch::VOICE_SERVER_UPDATE;
        let is_state_update = dispatch.kind == VoiceDispatch::VOICE_STATE_UPDATE;

        if !is_server_update && !is_state_update {
            return RouteOutcome::Ignored;
        }
        if is_state_update && dispatch.user_id() != Some(own_user_id) {
            return RouteOutcome::Ignored;
        }

        let Some(guild_id) = dispatch.guild_id() else {
            return RouteOutcome::Ignored;
        };
        let Some(session) = self.get(guild_id).await else {
            return RouteOutcome::UnknownSession;
        };

        if is_server_update {
            session.on_voice_server_update(dispatch.data.clone()).await;
        } else {
            session.on_voice_state_update(dispatch.data.clone()).await;
        }
        RouteOutcome::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(&'static str, Value)>>,
    }

    #[async_trait]
    impl Session for Recorder {
        async fn on_event(&self, payload: Value) {
            self.calls.lock().unwrap().push(("event", payload));
        }
        async fn on_player_update(&self, payload: Value) {
            self.calls.lock().unwrap().push(("playerUpdate", payload));
        }
        async fn on_voice_server_update(&self, data: Value) {
            self.calls.lock().unwrap().push(("voiceServer", data));
        }
        async fn on_voice_state_update(&self, data: Value) {
            self.calls.lock().unwrap().push(("voiceState", data));
        }
        async fn destroy(&self) {
            self.calls.lock().unwrap().push(("destroy", Value::Null));
        }
    }

    #[tokio::test]
    async fn test_event_delivered_once() {
        let router = SessionRouter::new();
        let recorder = Arc::new(Recorder::default());
        router.register(7, recorder.clone()).await;

        let payload = json!({"op": "event", "guildId": "7", "type": "TrackEndEvent"});
        let outcome = router
            .route_frame(Frame::Event {
                guild_id: 7,
                payload: payload.clone(),
            })
            .await;

        assert_eq!(outcome, RouteOutcome::Delivered);
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("event", payload));
    }

    #[tokio::test]
    async fn test_unknown_guild_is_dropped() {
        let router = SessionRouter::new();
        let recorder = Arc::new(Recorder::default());
        router.register(7, recorder.clone()).await;

        let outcome = router
            .route_frame(Frame::PlayerUpdate {
                guild_id: 8,
                payload: json!({}),
            })
            .await;

        assert_eq!(outcome, RouteOutcome::UnknownSession);
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_replaces_session() {
        let router = SessionRouter::new();
        assert!(router.register(1, Arc::new(Recorder::default())).await.is_none());
        assert!(router.register(1, Arc::new(Recorder::default())).await.is_some());
        assert_eq!(router.len().await, 1);

        let drained = router.drain().await;
        assert_eq!(drained.len(), 1);
        assert!(router.is_empty().await);
    }

    #[tokio::test]
    async fn test_voice_state_only_for_own_user() {
        let router = SessionRouter::new();
        let recorder = Arc::new(Recorder::default());
        router.register(5, recorder.clone()).await;

        let other = VoiceDispatch::new(
            VoiceDispatch::VOICE_STATE_UPDATE,
            json!({"guild_id": "5", "user_id": "99", "session_id": "s"}),
        );
        assert_eq!(router.route_voice_dispatch(&other, 1).await, RouteOutcome::Ignored);

        let own = VoiceDispatch::new(
            VoiceDispatch::VOICE_STATE_UPDATE,
            json!({"guild_id": "5", "user_id": "1", "session_id": "s"}),
        );
        assert_eq!(router.route_voice_dispatch(&own, 1).await, RouteOutcome::Delivered);

        let server = VoiceDispatch::new(
            VoiceDispatch::VOICE_SERVER_UPDATE,
            json!({"guild_id": 5, "token": "t", "endpoint": "e"}),
        );
        assert_eq!(router.route_voice_dispatch(&server, 1).await, RouteOutcome::Delivered);

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "voiceState");
        assert_eq!(calls[1].0, "voiceServer");
    }

    #[test]
    fn test_voice_dispatch_from_gateway_json() {
        let dispatch: VoiceDispatch =
            serde_json::from_value(json!({"t": "VOICE_SERVER_UPDATE", "d": {"guild_id": "3"}}))
                .unwrap();
        assert_eq!(dispatch.kind, VoiceDispatch::VOICE_SERVER_UPDATE);
        assert_eq!(dispatch.guild_id(), Some(3));
    }
}
