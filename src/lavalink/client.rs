use async_trait::async_trait;
use lavalink_rs::{
    client::LavalinkClient,
    model::{http::UpdatePlayer, player::ConnectionInfo, track},
    node::Node,
};
use serenity::model::id::GuildId;
use std::sync::{atomic::Ordering, Arc, OnceLock};

use super::error::NodeError;

/// The node calls players and search need. Implemented by the Lavalink client and
/// mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn load_tracks(&self, identifier: String) -> Result<track::Track, NodeError>;

    /// Registers the guild's player on the node with its voice credentials.
    async fn create_player(&self, guild_id: GuildId, voice: ConnectionInfo) -> Result<(), NodeError>;

    /// Unset fields are left untouched by the node.
    async fn update_player(&self, guild_id: GuildId, update: UpdatePlayer) -> Result<(), NodeError>;

    /// Stops the current track, the player stays.
    async fn stop_track(&self, guild_id: GuildId) -> Result<(), NodeError>;

    async fn delete_player(&self, guild_id: GuildId) -> Result<(), NodeError>;
}

/// Running node to send guild-less requests to, falling back to the first one.
fn search_node(client: &LavalinkClient) -> Result<&Arc<Node>, NodeError> {
    client
        .nodes
        .iter()
        .find(|node| node.is_running.load(Ordering::SeqCst))
        .or_else(|| client.nodes.first())
        .ok_or(NodeError::NotConnected)
}

#[async_trait]
impl NodeClient for LavalinkClient {
    async fn load_tracks(&self, identifier: String) -> Result<track::Track, NodeError> {
        Ok(search_node(self)?.http.load_tracks(&identifier).await?)
    }

    async fn create_player(&self, guild_id: GuildId, voice: ConnectionInfo) -> Result<(), NodeError> {
        LavalinkClient::create_player(self, guild_id, voice).await?;
        Ok(())
    }

    async fn update_player(&self, guild_id: GuildId, update: UpdatePlayer) -> Result<(), NodeError> {
        LavalinkClient::update_player(self, guild_id, &update, false).await?;
        Ok(())
    }

    async fn stop_track(&self, guild_id: GuildId) -> Result<(), NodeError> {
        // UpdatePlayer drops unset fields, so an explicit null track needs a raw PATCH
        let node = self.get_node_for_guild(guild_id).await;
        let path = node.http.path_to_uri(
            &format!("/sessions/{}/players/{}", node.session_id.load(), guild_id.get()),
            true,
        )?;
        let _: serde_json::Value = node
            .http
            .request(
                http::Method::PATCH,
                path,
                Some(&serde_json::json!({ "track": { "encoded": null } })),
            )
            .await?;
        Ok(())
    }

    async fn delete_player(&self, guild_id: GuildId) -> Result<(), NodeError> {
        LavalinkClient::delete_player(self, guild_id).await?;
        Ok(())
    }
}

/// Node client shared by the manager and its players. Empty until the Discord gateway
/// is ready and the client has been built.
#[derive(Default)]
pub struct ClientSlot(OnceLock<Arc<dyn NodeClient>>);

impl ClientSlot {
    /// Returns `false` when a client was already set.
    pub fn set(&self, client: Arc<dyn NodeClient>) -> bool {
        self.0.set(client).is_ok()
    }

    pub fn get(&self) -> Result<&Arc<dyn NodeClient>, NodeError> {
        self.0.get().ok_or(NodeError::NotConnected)
    }
}
