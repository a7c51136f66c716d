/// A row of the `user` table.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub user_id: String,
    pub connected: bool,
    pub timestamp: String,
}

/// A row of the `room` table.
#[derive(Debug, Clone)]
pub struct RoomRow {
    pub room_no: u32,
    pub room_name: String,
    pub manager_id: String,
    pub member_count: u32,
    pub created_time: String,
}
