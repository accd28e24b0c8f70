use matrix_sdk::ruma::{
    events::room::member::MembershipState, OwnedRoomId, OwnedServerName, RoomId, UserId,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::config::SpaceDetection;
use crate::core::error::AppResult;
use crate::core::types::{
    AdminIdentity, MembershipEvent, ReconcileSummary, RoomFailure, RoomHierarchyEntry, SPACE_ROOM_TYPE,
};
use crate::matrix::events::{EventClassifier, RoomKind};
use crate::matrix::host::{HierarchyQuery, HomeserverApi};
use crate::reconciler::resolver::RoomIdentifierResolver;

/// Kicks local users out of a space's rooms once they leave the space.
pub struct SpaceLeaveReconciler {
    host: Arc<dyn HomeserverApi>,
    classifier: EventClassifier,
    resolver: RoomIdentifierResolver,
    admin: AdminIdentity,
    space_detection: SpaceDetection,
}

impl SpaceLeaveReconciler {
    pub fn new(
        host: Arc<dyn HomeserverApi>,
        server_name: OwnedServerName,
        admin: AdminIdentity,
        space_detection: SpaceDetection,
    ) -> Self {
        Self {
            classifier: EventClassifier::new(server_name),
            resolver: RoomIdentifierResolver::new(Arc::clone(&host)),
            host,
            admin,
            space_detection,
        }
    }

    /// Pipeline callback, called once per new state event.
    ///
    /// Never fails: errors are logged and the event is dropped. Returns the
    /// summary of the walk when the event was a local space leave.
    pub async fn on_new_event(&self, event: &MembershipEvent) -> Option<ReconcileSummary> {
        if !self.classifier.is_local_leave(event) {
            return None;
        }

        let (Ok(space_id), Some(Ok(user_id))) = (
            RoomId::parse(&event.room_id),
            event.state_key.as_deref().map(UserId::parse),
        ) else {
            debug!("Ignoring leave with malformed ids in {}", event.room_id);
            return None;
        };

        if !self.is_space(event, &space_id).await {
            return None;
        }

        info!("{} left space {}, removing from child rooms", user_id, space_id);
        match self.reconcile_space_leave(&space_id, &user_id).await {
            Ok(summary) => {
                info!(
                    "Space {} reconciled for {}: {} attempted, {} left, {} skipped, {} failed",
                    space_id,
                    user_id,
                    summary.attempted(),
                    summary.left.len(),
                    summary.skipped(),
                    summary.failed.len()
                );
                Some(summary)
            }
            Err(e) => {
                error!("Failed to reconcile space {} for {}: {}", space_id, user_id, e);
                None
            }
        }
    }

    async fn is_space(&self, event: &MembershipEvent, space_id: &RoomId) -> bool {
        match (self.classifier.room_kind(event), self.space_detection) {
            (RoomKind::Space, _) => true,
            (RoomKind::NotSpace, _) => {
                debug!("Leave in {}, which is not a space", space_id);
                false
            }
            (RoomKind::Unknown, SpaceDetection::EventMetadata) => {
                warn!(
                    "Leave in {} carries no create event, space status unknown; \
                     set SPACE_DETECTION=current_state to query it",
                    space_id
                );
                false
            }
            (RoomKind::Unknown, SpaceDetection::CurrentState) => {
                match self.host.room_create_type(space_id).await {
                    Ok(room_type) => {
                        let is_space = room_type.as_deref() == Some(SPACE_ROOM_TYPE);
                        if !is_space {
                            debug!("Leave in {}, which is not a space", space_id);
                        }
                        is_space
                    }
                    Err(e) => {
                        warn!("Could not read create event of {}: {}", space_id, e);
                        false
                    }
                }
            }
        }
    }

    /// Remove `user_id` from every direct, non-space child room of
    /// `space_id` they are still in.
    ///
    /// Failing to list the hierarchy or the user's rooms aborts the walk.
    /// A failure on one child room is recorded and the walk moves on.
    pub async fn reconcile_space_leave(
        &self,
        space_id: &RoomId,
        user_id: &UserId,
    ) -> AppResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::new(space_id.to_owned(), user_id.to_owned());

        debug!("Requesting hierarchy of {}", space_id);
        let Some(rooms) = self
            .host
            .room_hierarchy(&self.admin, space_id, HierarchyQuery::direct_children())
            .await?
        else {
            info!("No rooms returned for space {}", space_id);
            return Ok(summary);
        };

        let joined = self.host.rooms_for_user(user_id).await?;

        for room in rooms {
            if room.is_space() {
                summary.skipped_spaces.push(room.room_id);
                continue;
            }

            let is_member = RoomId::parse(&room.room_id).map_or(false, |id| joined.contains(&id));
            if !is_member {
                summary.skipped_not_member.push(room.room_id);
                continue;
            }

            match self.leave_room(&room, user_id).await {
                Ok(room_id) => summary.left.push(room_id),
                Err(e) => {
                    warn!("Failed to remove {} from {}: {}", user_id, room.room_id, e);
                    summary.failed.push(RoomFailure { room: room.room_id, error: e.to_string() });
                }
            }
        }

        Ok(summary)
    }

    async fn leave_room(
        &self,
        room: &RoomHierarchyEntry,
        user_id: &UserId,
    ) -> AppResult<OwnedRoomId> {
        info!(
            "Leaving {} ({}) for {}",
            room.room_id,
            room.name.as_deref().unwrap_or("unnamed"),
            user_id
        );
        let (room_id, _servers) = self.resolver.resolve(&room.room_id, Vec::new()).await?;
        self.host
            .update_membership(&self.admin, user_id, &room_id, MembershipState::Leave)
            .await?;
        Ok(room_id)
    }
}
