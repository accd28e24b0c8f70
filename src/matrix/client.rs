use anyhow::Result;
use async_trait::async_trait;
use matrix_sdk::{
    matrix_auth::{MatrixSession, MatrixSessionTokens},
    ruma::{
        api::client::{
            error::ErrorKind,
            membership::{kick_user, leave_room},
            space::get_hierarchy,
            state::get_state_events_for_key,
        },
        events::{room::member::MembershipState, StateEventType},
        DeviceId, OwnedDeviceId, OwnedRoomId, OwnedServerName, RoomAliasId, RoomId, UInt, UserId,
    },
    Client, SessionMeta,
};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::core::config::MatrixConfig;
use crate::core::error::{AppError, AppResult};
use crate::core::types::{AdminIdentity, RoomHierarchyEntry};
use crate::matrix::host::{HierarchyQuery, HomeserverApi};

const KICK_REASON: &str = "Left the parent space";

/// Homeserver access as the configured admin user.
pub struct MatrixClient {
    client: Client,
    http: reqwest::Client,
    config: MatrixConfig,
}

#[derive(Deserialize)]
struct JoinedRoomsResponse {
    joined_rooms: Vec<OwnedRoomId>,
}

impl MatrixClient {
    pub async fn new(config: &MatrixConfig) -> Result<Self> {
        info!("Initializing Matrix client for homeserver: {}", config.homeserver_url);

        let client = Client::builder()
            .homeserver_url(&config.homeserver_url)
            .build()
            .await?;

        let user_id = UserId::parse(&config.admin_user_id)?;
        let device_id: OwnedDeviceId = match &config.device_id {
            Some(id) => id.as_str().into(),
            None => DeviceId::new(),
        };
        client
            .restore_session(MatrixSession {
                meta: SessionMeta { user_id, device_id },
                tokens: MatrixSessionTokens {
                    access_token: config.admin_access_token.clone(),
                    refresh_token: None,
                },
            })
            .await?;
        info!("Restored Matrix session for admin user: {}", config.admin_user_id);

        Ok(Self {
            client,
            http: reqwest::Client::new(),
            config: config.clone(),
        })
    }

    /// Admin identity this client acts as.
    pub fn admin_identity(&self) -> AppResult<AdminIdentity> {
        let user_id = UserId::parse(&self.config.admin_user_id)
            .map_err(|e| AppError::Config(format!("Invalid admin user ID: {}", e)))?;
        Ok(AdminIdentity { user_id })
    }

}

/// `/_synapse/admin/v1/users/{user_id}/joined_rooms`, with the user ID as a
/// single encoded path segment.
fn joined_rooms_url(homeserver_url: &str, user_id: &UserId) -> AppResult<reqwest::Url> {
    let mut url = reqwest::Url::parse(homeserver_url)
        .map_err(|e| AppError::Config(format!("Invalid homeserver URL {}: {}", homeserver_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Config(format!("Homeserver URL {} cannot carry a path", homeserver_url)))?
        .pop_if_empty()
        .extend(["_synapse", "admin", "v1", "users", user_id.as_str(), "joined_rooms"]);
    Ok(url)
}

/// Token for the next hierarchy page. Stops on a limited query, on the last
/// page, or when the server hands back the token it was just given.
fn next_page(from: Option<&str>, next_batch: Option<String>, limited: bool) -> Option<String> {
    if limited {
        return None;
    }
    next_batch.filter(|token| Some(token.as_str()) != from)
}

#[async_trait]
impl HomeserverApi for MatrixClient {
    async fn room_hierarchy(
        &self,
        requester: &AdminIdentity,
        room_id: &RoomId,
        query: HierarchyQuery,
    ) -> AppResult<Option<Vec<RoomHierarchyEntry>>> {
        debug!("Requesting hierarchy of {} as {}", room_id, requester.user_id);

        let mut rooms = Vec::new();
        let mut from = None;
        loop {
            let mut request = get_hierarchy::v1::Request::new(room_id.to_owned());
            request.from = from.clone();
            request.suggested_only = query.suggested_only;
            request.max_depth = query.max_depth.map(UInt::from);
            request.limit = query.limit.map(UInt::from);

            let response = self.client.send(request, None).await
                .map_err(|e| AppError::Matrix(format!("Failed to get hierarchy of {}: {}", room_id, e)))?;

            rooms.extend(response.rooms.into_iter().map(|chunk| RoomHierarchyEntry {
                room_id: chunk.room_id.to_string(),
                name: chunk.name,
                room_type: chunk.room_type.map(|t| t.to_string()),
            }));

            match next_page(from.as_deref(), response.next_batch, query.limit.is_some()) {
                Some(token) => from = Some(token),
                None => break,
            }
        }

        Ok(Some(rooms))
    }

    async fn rooms_for_user(&self, user_id: &UserId) -> AppResult<HashSet<OwnedRoomId>> {
        let url = joined_rooms_url(&self.config.homeserver_url, user_id)?;
        let response: JoinedRoomsResponse = self
            .http
            .get(url)
            .bearer_auth(&self.config.admin_access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.joined_rooms.into_iter().collect())
    }

    async fn lookup_room_alias(
        &self,
        alias: &RoomAliasId,
    ) -> AppResult<Option<(OwnedRoomId, Vec<OwnedServerName>)>> {
        match self.client.resolve_room_alias(alias).await {
            Ok(response) => Ok(Some((response.room_id, response.servers))),
            Err(e) if matches!(e.client_api_error_kind(), Some(ErrorKind::NotFound)) => Ok(None),
            Err(e) => Err(AppError::Matrix(format!("Failed to resolve {}: {}", alias, e))),
        }
    }

    async fn room_create_type(&self, room_id: &RoomId) -> AppResult<Option<String>> {
        let request = get_state_events_for_key::v3::Request::new(
            room_id.to_owned(),
            StateEventType::RoomCreate,
            String::new(),
        );
        let response = self.client.send(request, None).await
            .map_err(|e| AppError::Matrix(format!("Failed to read create event of {}: {}", room_id, e)))?;

        let content: serde_json::Value = response.content.deserialize_as()?;
        Ok(content.get("type").and_then(|t| t.as_str()).map(str::to_string))
    }

    async fn update_membership(
        &self,
        sender: &AdminIdentity,
        target: &UserId,
        room_id: &RoomId,
        membership: MembershipState,
    ) -> AppResult<()> {
        if membership != MembershipState::Leave {
            return Err(AppError::Matrix(format!("Unsupported membership change: {}", membership)));
        }

        if *sender.user_id == *target {
            self.client
                .send(leave_room::v3::Request::new(room_id.to_owned()), None)
                .await
                .map_err(|e| AppError::Matrix(format!("Failed to leave room: {}", e)))?;
        } else {
            let mut request = kick_user::v3::Request::new(room_id.to_owned(), target.to_owned());
            request.reason = Some(KICK_REASON.to_string());
            self.client.send(request, None).await
                .map_err(|e| AppError::Matrix(format!("Failed to remove {} from {}: {}", target, room_id, e)))?;
        }

        info!("{} removed {} from {}", sender.user_id, target, room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_rooms_url_encodes_the_user_id() {
        let user_id = UserId::parse("@team/lead:example.org").unwrap();

        let url = joined_rooms_url("https://matrix.example.org/", &user_id).unwrap();

        assert_eq!(
            url.as_str(),
            "https://matrix.example.org/_synapse/admin/v1/users/@team%2Flead:example.org/joined_rooms"
        );
    }

    #[test]
    fn joined_rooms_url_keeps_a_base_path() {
        let user_id = UserId::parse("@alice:example.org").unwrap();

        let url = joined_rooms_url("http://localhost:8008/matrix", &user_id).unwrap();

        assert_eq!(url.path(), "/matrix/_synapse/admin/v1/users/@alice:example.org/joined_rooms");
    }

    #[test]
    fn pagination_follows_fresh_tokens() {
        assert_eq!(next_page(None, Some("p1".into()), false), Some("p1".to_string()));
        assert_eq!(next_page(Some("p1"), Some("p2".into()), false), Some("p2".to_string()));
        assert_eq!(next_page(Some("p2"), None, false), None);
    }

    #[test]
    fn pagination_stops_on_repeated_token_or_limit() {
        assert_eq!(next_page(Some("p1"), Some("p1".into()), false), None);
        assert_eq!(next_page(None, Some("p1".into()), true), None);
    }
}
