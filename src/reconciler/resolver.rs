use matrix_sdk::ruma::{OwnedRoomId, OwnedServerName, RoomAliasId, RoomId};
use std::sync::Arc;
use tracing::debug;

use crate::core::error::{AppError, AppResult};
use crate::matrix::host::HomeserverApi;

/// Turns a room ID or alias into a canonical room ID.
pub struct RoomIdentifierResolver {
    host: Arc<dyn HomeserverApi>,
}

impl RoomIdentifierResolver {
    pub fn new(host: Arc<dyn HomeserverApi>) -> Self {
        Self { host }
    }

    /// Resolve `reference`, returning the room ID and the servers believed
    /// to host it. Room IDs pass through with the given hints untouched.
    pub async fn resolve(
        &self,
        reference: &str,
        remote_room_hosts: Vec<OwnedServerName>,
    ) -> AppResult<(OwnedRoomId, Vec<OwnedServerName>)> {
        if let Ok(room_id) = RoomId::parse(reference) {
            return Ok((room_id, remote_room_hosts));
        }

        let alias = RoomAliasId::parse(reference)
            .map_err(|_| AppError::InvalidRoomReference(reference.to_string()))?;

        debug!("Resolving room alias {}", alias);
        match self.host.lookup_room_alias(&alias).await? {
            Some((room_id, servers)) => Ok((room_id, servers)),
            None => Err(AppError::UnknownRoom(reference.to_string())),
        }
    }
}
