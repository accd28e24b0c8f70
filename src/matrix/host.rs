//! The narrow slice of the homeserver that the reconciler talks to.

use async_trait::async_trait;
use matrix_sdk::ruma::{
    events::room::member::MembershipState, OwnedRoomId, OwnedServerName, RoomAliasId, RoomId,
    UserId,
};
use std::collections::HashSet;

use crate::core::error::AppResult;
use crate::core::types::{AdminIdentity, RoomHierarchyEntry};

/// Parameters of a hierarchy request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyQuery {
    pub suggested_only: bool,
    pub max_depth: Option<u32>,
    pub limit: Option<u32>,
}

impl HierarchyQuery {
    /// Direct children only, suggested or not, unbounded.
    pub fn direct_children() -> Self {
        Self { suggested_only: false, max_depth: Some(1), limit: None }
    }
}

#[async_trait]
pub trait HomeserverApi: Send + Sync {
    /// Rooms beneath `room_id`. `None` when the server returned no room list.
    async fn room_hierarchy(
        &self,
        requester: &AdminIdentity,
        room_id: &RoomId,
        query: HierarchyQuery,
    ) -> AppResult<Option<Vec<RoomHierarchyEntry>>>;

    /// Rooms the user currently belongs to.
    async fn rooms_for_user(&self, user_id: &UserId) -> AppResult<HashSet<OwnedRoomId>>;

    /// `None` when the alias does not map to any room.
    async fn lookup_room_alias(
        &self,
        alias: &RoomAliasId,
    ) -> AppResult<Option<(OwnedRoomId, Vec<OwnedServerName>)>>;

    /// The `type` field of the room's current create event.
    async fn room_create_type(&self, room_id: &RoomId) -> AppResult<Option<String>>;

    async fn update_membership(
        &self,
        sender: &AdminIdentity,
        target: &UserId,
        room_id: &RoomId,
        membership: MembershipState,
    ) -> AppResult<()>;
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use crate::core::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory homeserver recording every call it receives.
    #[derive(Default)]
    pub struct FakeHomeserver {
        pub hierarchy: Mutex<Option<Vec<RoomHierarchyEntry>>>,
        pub hierarchy_error: Mutex<Option<String>>,
        pub memberships: Mutex<HashSet<OwnedRoomId>>,
        pub memberships_error: Mutex<Option<String>>,
        pub aliases: Mutex<HashMap<String, (OwnedRoomId, Vec<OwnedServerName>)>>,
        pub create_types: Mutex<HashMap<OwnedRoomId, String>>,
        pub failing_rooms: Mutex<HashSet<OwnedRoomId>>,
        pub calls: Mutex<Vec<String>>,
        pub updates: Mutex<Vec<(String, String, String, MembershipState)>>,
    }

    impl FakeHomeserver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_hierarchy(self, rooms: Vec<RoomHierarchyEntry>) -> Self {
            *self.hierarchy.lock().unwrap() = Some(rooms);
            self
        }

        pub fn with_memberships(self, rooms: &[&str]) -> Self {
            *self.memberships.lock().unwrap() =
                rooms.iter().map(|r| RoomId::parse(*r).unwrap()).collect();
            self
        }

        pub fn with_alias(self, alias: &str, room_id: &str, servers: &[&str]) -> Self {
            let servers: Vec<OwnedServerName> = servers.iter().map(|s| (*s).try_into().unwrap()).collect();
            self.aliases
                .lock()
                .unwrap()
                .insert(alias.to_string(), (RoomId::parse(room_id).unwrap(), servers));
            self
        }

        pub fn with_create_type(self, room_id: &str, room_type: &str) -> Self {
            self.create_types
                .lock()
                .unwrap()
                .insert(RoomId::parse(room_id).unwrap(), room_type.to_string());
            self
        }

        pub fn failing_on(self, room_id: &str) -> Self {
            self.failing_rooms.lock().unwrap().insert(RoomId::parse(room_id).unwrap());
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn left_rooms(&self) -> Vec<String> {
            self.updates.lock().unwrap().iter().map(|(_, _, room, _)| room.clone()).collect()
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    pub fn room(room_id: &str, room_type: Option<&str>) -> RoomHierarchyEntry {
        RoomHierarchyEntry {
            room_id: room_id.to_string(),
            name: Some(format!("name of {}", room_id)),
            room_type: room_type.map(str::to_string),
        }
    }

    #[async_trait]
    impl HomeserverApi for FakeHomeserver {
        async fn room_hierarchy(
            &self,
            _requester: &AdminIdentity,
            room_id: &RoomId,
            query: HierarchyQuery,
        ) -> AppResult<Option<Vec<RoomHierarchyEntry>>> {
            self.record(&format!("hierarchy {} depth={:?}", room_id, query.max_depth));
            if let Some(e) = self.hierarchy_error.lock().unwrap().clone() {
                return Err(AppError::Matrix(e));
            }
            Ok(self.hierarchy.lock().unwrap().clone())
        }

        async fn rooms_for_user(&self, user_id: &UserId) -> AppResult<HashSet<OwnedRoomId>> {
            self.record(&format!("rooms_for_user {}", user_id));
            if let Some(e) = self.memberships_error.lock().unwrap().clone() {
                return Err(AppError::Matrix(e));
            }
            Ok(self.memberships.lock().unwrap().clone())
        }

        async fn lookup_room_alias(
            &self,
            alias: &RoomAliasId,
        ) -> AppResult<Option<(OwnedRoomId, Vec<OwnedServerName>)>> {
            self.record(&format!("lookup_room_alias {}", alias));
            Ok(self.aliases.lock().unwrap().get(alias.as_str()).cloned())
        }

        async fn room_create_type(&self, room_id: &RoomId) -> AppResult<Option<String>> {
            self.record(&format!("room_create_type {}", room_id));
            Ok(self.create_types.lock().unwrap().get(room_id).cloned())
        }

        async fn update_membership(
            &self,
            sender: &AdminIdentity,
            target: &UserId,
            room_id: &RoomId,
            membership: MembershipState,
        ) -> AppResult<()> {
            self.record(&format!("update_membership {} {}", target, room_id));
            if self.failing_rooms.lock().unwrap().contains(room_id) {
                return Err(AppError::Matrix(format!("kick failed in {}", room_id)));
            }
            self.updates.lock().unwrap().push((
                sender.user_id.to_string(),
                target.to_string(),
                room_id.to_string(),
                membership,
            ));
            Ok(())
        }
    }
}
