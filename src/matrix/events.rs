// Recognises membership events that should trigger a space walk.

use matrix_sdk::ruma::{OwnedServerName, UserId};

use crate::core::types::{MembershipEvent, CREATE_EVENT_TYPE, LEAVE, MEMBER_EVENT_TYPE, SPACE_ROOM_TYPE};

/// What the stripped state of an event says about its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomKind {
    Space,
    NotSpace,
    /// No create entry was delivered with the event.
    Unknown,
}

pub struct EventClassifier {
    server_name: OwnedServerName,
}

impl EventClassifier {
    pub fn new(server_name: OwnedServerName) -> Self {
        Self { server_name }
    }

    /// A local user's membership in the event's room became `leave`.
    pub fn is_local_leave(&self, event: &MembershipEvent) -> bool {
        event.event_type == MEMBER_EVENT_TYPE
            && event.is_state()
            && event.membership() == Some(LEAVE)
            && event
                .state_key
                .as_deref()
                .and_then(|key| UserId::parse(key).ok())
                .map_or(false, |user| user.server_name() == &*self.server_name)
    }

    pub fn room_kind(&self, event: &MembershipEvent) -> RoomKind {
        let Some(state) = event.unsigned.invite_room_state.as_deref() else {
            return RoomKind::Unknown;
        };

        let mut kind = RoomKind::Unknown;
        for entry in state {
            if entry.event_type.as_deref() != Some(CREATE_EVENT_TYPE) {
                continue;
            }
            let room_type = entry.content.get("type").and_then(|t| t.as_str());
            kind = if room_type == Some(SPACE_ROOM_TYPE) { RoomKind::Space } else { RoomKind::NotSpace };
        }
        kind
    }

    pub fn is_space_leave(&self, event: &MembershipEvent) -> bool {
        self.is_local_leave(event) && self.room_kind(event) == RoomKind::Space
    }
}
