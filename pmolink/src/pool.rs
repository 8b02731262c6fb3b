//! Pool de nœuds
//!
//! Le pool est un objet de service explicite : l'application en crée un
//! (ou plusieurs) et le partage en le clonant.

use crate::config_ext::LinkConfigExt;
use crate::error::{LinkError, Result};
use crate::node::{Node, NodeConfig};
use crate::router::VoiceDispatch;
use pmoconfig::Config;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// État partagé du pool ; les nœuds n'en gardent qu'une référence faible
pub(crate) struct PoolShared {
    user_id: u64,
    nodes: RwLock<HashMap<String, Node>>,
}

impl PoolShared {
    /// Retire `node` s'il est toujours l'entrée enregistrée sous son identifiant
    pub(crate) async fn remove_if_same(&self, node: &Node) -> bool {
        let mut nodes = self.nodes.write().await;
        match nodes.get(node.identifier()) {
            Some(registered) if registered.ptr_eq(node) => {
                nodes.remove(node.identifier());
                debug!(node = %node.identifier(), "Node removed from pool");
                true
            }
            _ => false,
        }
    }
}

/// Registre identifiant → nœud
#[derive(Clone)]
pub struct NodePool {
    shared: Arc<PoolShared>,
}

impl fmt::Debug for NodePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodePool")
            .field("user_id", &self.shared.user_id)
            .finish_non_exhaustive()
    }
}

impl NodePool {
    /// Crée un pool vide pour le bot `user_id`
    pub fn new(user_id: u64) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                user_id,
                nodes: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Crée un pool et y enregistre chaque nœud déclaré dans la configuration
    ///
    /// # Exemple
    ///
    /// ```rust,no_run
    /// use pmolink::NodePool;
    ///
    /// #[tokio::main]
    /// async fn main() -> pmolink::Result<()> {
    ///     let config = pmoconfig::get_config();
    ///     let pool = NodePool::from_config(&config, 123456789).await?;
    ///     println!("{} node(s) ready", pool.node_count().await);
    ///     Ok(())
    /// }
    /// ```
    pub async fn from_config(config: &Config, user_id: u64) -> Result<Self> {
        let pool = Self::new(user_id);
        for node_config in config.get_link_nodes()? {
            pool.create_node(node_config).await?;
        }
        Ok(pool)
    }

    pub fn user_id(&self) -> u64 {
        self.shared.user_id
    }

    /// Crée, connecte et enregistre un nœud
    ///
    /// # Errors
    ///
    /// * `LinkError::DuplicateNodeIdentifier` - identifiant déjà utilisé ;
    ///   le registre n'est pas modifié
    /// * `LinkError::ConnectionFailure` - le nœud n'a pas pu être joint
    pub async fn create_node(&self, config: NodeConfig) -> Result<Node> {
        let identifier = config.identifier.clone();
        if self.shared.nodes.read().await.contains_key(&identifier) {
            return Err(LinkError::DuplicateNodeIdentifier(identifier));
        }

        let node = Node::new(config, self.shared.user_id)?;
        node.attach_pool(Arc::downgrade(&self.shared));
        node.connect().await?;

        let duplicate = {
            let mut nodes = self.shared.nodes.write().await;
            if nodes.contains_key(&identifier) {
                true
            } else {
                nodes.insert(identifier.clone(), node.clone());
                false
            }
        };

        if duplicate {
            warn!(node = %identifier, "Node registered concurrently, dropping new connection");
            node.disconnect().await?;
            return Err(LinkError::DuplicateNodeIdentifier(identifier));
        }

        info!(node = %identifier, "Node added to pool");
        Ok(node)
    }

    /// Choisit un nœud
    ///
    /// - `Some(id)` : ce nœud s'il est enregistré et disponible, sinon `None`
    /// - `None` : le nœud disponible ayant le moins de sessions
    ///
    /// # Errors
    ///
    /// * `LinkError::NoNodesAvailable` - aucun nœud disponible (sélection sans identifiant)
    pub async fn select(&self, identifier: Option<&str>) -> Result<Option<Node>> {
        match identifier {
            Some(id) => Ok(self.get_node(id).await.filter(Node::is_available)),
            None => self.best_node().await.map(Some),
        }
    }

    /// Nœud disponible le moins chargé ; à charge égale, le premier par identifiant
    pub async fn best_node(&self) -> Result<Node> {
        let candidates: Vec<Node> = self
            .nodes()
            .await
            .into_iter()
            .filter(Node::is_available)
            .collect();

        let mut best: Option<(usize, Node)> = None;
        for node in candidates {
            let load = node.session_count().await;
            let better = match &best {
                Some((best_load, best_node)) => {
                    (load, node.identifier()) < (*best_load, best_node.identifier())
                }
                None => true,
            };
            if better {
                best = Some((load, node));
            }
        }

        best.map(|(_, node)| node).ok_or(LinkError::NoNodesAvailable)
    }

    /// Nœud enregistré sous cet identifiant, disponible ou non
    pub async fn get_node(&self, identifier: &str) -> Option<Node> {
        self.shared.nodes.read().await.get(identifier).cloned()
    }

    /// Déconnecte et retire un nœud ; sans effet s'il est absent
    pub async fn remove(&self, identifier: &str) -> Result<()> {
        match self.get_node(identifier).await {
            Some(node) => node.disconnect().await,
            None => Ok(()),
        }
    }

    pub async fn node_count(&self) -> usize {
        self.shared.nodes.read().await.len()
    }

    /// Instantané des nœuds enregistrés, triés par identifiant
    pub async fn nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.shared.nodes.read().await.values().cloned().collect();
        nodes.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        nodes
    }

    /// Transmet un événement vocal de la gateway hôte à tous les nœuds
    pub async fn dispatch_voice(&self, dispatch: &VoiceDispatch) {
        for node in self.nodes().await {
            node.handle_voice_dispatch(dispatch).await;
        }
    }

    /// Déconnecte tous les nœuds
    pub async fn shutdown(&self) -> Result<()> {
        for node in self.nodes().await {
            node.disconnect().await?;
        }
        Ok(())
    }
}
