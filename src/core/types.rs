use matrix_sdk::ruma::{OwnedRoomId, OwnedUserId};
use serde::{Deserialize, Serialize};

pub const MEMBER_EVENT_TYPE: &str = "m.room.member";
pub const CREATE_EVENT_TYPE: &str = "m.room.create";
pub const SPACE_ROOM_TYPE: &str = "m.space";
pub const LEAVE: &str = "leave";

/// A state event as delivered by the homeserver's event pipeline.
///
/// Only the fields needed to recognise a space leave are kept; everything
/// is optional so that unrelated events still deserialize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipEvent {
    pub room_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub state_key: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub content: MemberContent,
    #[serde(default)]
    pub unsigned: Unsigned,
}

impl MembershipEvent {
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    pub fn membership(&self) -> Option<&str> {
        self.content.membership.as_deref()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberContent {
    #[serde(default)]
    pub membership: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Unsigned {
    #[serde(default)]
    pub invite_room_state: Option<Vec<StrippedStateEvent>>,
}

/// Minimal prior state shipped alongside a membership event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrippedStateEvent {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub state_key: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomHierarchyEntry {
    pub room_id: String,
    pub name: Option<String>,
    pub room_type: Option<String>,
}

impl RoomHierarchyEntry {
    pub fn is_space(&self) -> bool {
        self.room_type.as_deref() == Some(SPACE_ROOM_TYPE)
    }
}

/// The privileged user that performs membership changes for others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub user_id: OwnedUserId,
}

/// Outcome of walking one space after a leave.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileSummary {
    pub space_id: OwnedRoomId,
    pub user_id: OwnedUserId,
    pub left: Vec<OwnedRoomId>,
    pub skipped_spaces: Vec<String>,
    pub skipped_not_member: Vec<String>,
    pub failed: Vec<RoomFailure>,
}

impl ReconcileSummary {
    pub fn new(space_id: OwnedRoomId, user_id: OwnedUserId) -> Self {
        Self {
            space_id,
            user_id,
            left: Vec::new(),
            skipped_spaces: Vec::new(),
            skipped_not_member: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.left.len() + self.failed.len()
    }

    pub fn skipped(&self) -> usize {
        self.skipped_spaces.len() + self.skipped_not_member.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomFailure {
    pub room: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_leave_with_invite_state() {
        let event: MembershipEvent = serde_json::from_value(json!({
            "room_id": "!space:example.org",
            "type": "m.room.member",
            "state_key": "@alice:example.org",
            "sender": "@alice:example.org",
            "content": { "membership": "leave" },
            "unsigned": {
                "invite_room_state": [
                    { "type": "m.room.create", "state_key": "", "content": { "type": "m.space" } },
                    { "content": { "name": "no type here" } }
                ]
            }
        }))
        .unwrap();

        assert!(event.is_state());
        assert_eq!(event.membership(), Some("leave"));
        let state = event.unsigned.invite_room_state.unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state[1].event_type, None);
    }

    #[test]
    fn message_events_deserialize_without_state() {
        let event: MembershipEvent = serde_json::from_value(json!({
            "room_id": "!r:example.org",
            "type": "m.room.message",
            "content": { "body": "hi", "msgtype": "m.text" }
        }))
        .unwrap();

        assert!(!event.is_state());
        assert_eq!(event.membership(), None);
        assert!(event.unsigned.invite_room_state.is_none());
    }
}
