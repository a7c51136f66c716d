use arrayvec::ArrayVec;

use crate::protocol::MAX_ROOM_MEMBERS;

/// A chat room. Membership is an indexable, capacity-bounded slot array
/// matching the original's `User *members[MAX_CLIENT]`.
pub struct Room {
    pub room_no: u32,
    pub name: String,
    pub manager: String,
    pub members: ArrayVec<String, MAX_ROOM_MEMBERS>,
}

impl Room {
    pub fn new(room_no: u32, name: impl Into<String>, manager: impl Into<String>) -> Self {
        Self {
            room_no,
            name: name.into(),
            manager: manager.into(),
            members: ArrayVec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.members.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn has_member(&self, nickname: &str) -> bool {
        self.members.iter().any(|m| m == nickname)
    }
}
