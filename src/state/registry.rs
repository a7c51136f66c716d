use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::CommandError;
use crate::protocol::{Packet, MAX_CLIENTS};
use crate::store::Store;

use super::{Room, SessionEvent, User};

/// The in-memory authoritative catalog of users and rooms.
///
/// Lock ordering, enforced by convention throughout this module: **users →
/// rooms → store**. A caller holding `users` must never acquire `rooms`; a
/// caller holding `rooms` may acquire `store`. `*_unlocked` helpers assume
/// the caller already holds the relevant lock(s); the public wrappers
/// acquire them.
pub struct Registry {
    users: Mutex<HashMap<String, User>>,
    rooms: Mutex<HashMap<u32, Room>>,
    next_room_id: AtomicU32,
    store: Arc<Store>,
}

impl Registry {
    pub fn new(store: Arc<Store>, next_room_id: u32) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            rooms: Mutex::new(HashMap::new()),
            next_room_id: AtomicU32::new(next_room_id),
            store,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ---- users ------------------------------------------------------------

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn is_full(&self) -> bool {
        self.user_count() >= MAX_CLIENTS
    }

    /// Nickname taken either by a connected user or a persisted (offline) row.
    pub fn nickname_taken(&self, nickname: &str) -> Result<bool, CommandError> {
        if self.users.lock().unwrap().contains_key(nickname) {
            return Ok(true);
        }
        self.store
            .user_exists(nickname)
            .map_err(|e| CommandError::Internal(e.to_string()))
    }

    pub fn add_user(
        &self,
        nickname: &str,
        outbox: mpsc::Sender<SessionEvent>,
    ) -> Result<(), CommandError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(nickname) {
            return Err(CommandError::NicknameTaken(nickname.to_string()));
        }
        self.store
            .insert_user(nickname)
            .map_err(|e| CommandError::Internal(e.to_string()))?;
        users.insert(nickname.to_string(), User::new(nickname, outbox));
        Ok(())
    }

    pub fn remove_user_unlocked(users: &mut HashMap<String, User>, nickname: &str) {
        users.remove(nickname);
    }

    pub fn remove_user(&self, nickname: &str) {
        let mut users = self.users.lock().unwrap();
        Self::remove_user_unlocked(&mut users, nickname);
    }

    pub fn rename_user(&self, old: &str, new: &str) -> Result<(), CommandError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(new) {
            return Err(CommandError::NicknameTaken(new.to_string()));
        }
        self.store
            .rename_user(old, new)
            .map_err(|e| CommandError::Internal(e.to_string()))?;
        if let Some(mut user) = users.remove(old) {
            user.nickname = new.to_string();
            users.insert(new.to_string(), user);
        }
        Ok(())
    }

    pub fn send_to(&self, nickname: &str, packet: Packet) {
        let users = self.users.lock().unwrap();
        if let Some(user) = users.get(nickname) {
            let _ = user.outbox.try_send(SessionEvent::Deliver(packet));
        }
    }

    /// Tells `nickname`'s own session task to stop and run cleanup, e.g.
    /// after a kick. Enqueued on the same channel as outbound packets, so it
    /// is always processed after anything already queued ahead of it.
    pub fn close_session(&self, nickname: &str) {
        let users = self.users.lock().unwrap();
        if let Some(user) = users.get(nickname) {
            let _ = user.outbox.try_send(SessionEvent::Close);
        }
    }

    pub fn user_room(&self, nickname: &str) -> Option<u32> {
        self.users.lock().unwrap().get(nickname).and_then(|u| u.room)
    }

    pub fn set_pending_delete(&self, nickname: &str, pending: bool) {
        if let Some(user) = self.users.lock().unwrap().get_mut(nickname) {
            user.pending_delete = pending;
        }
    }

    pub fn is_pending_delete(&self, nickname: &str) -> bool {
        self.users
            .lock()
            .unwrap()
            .get(nickname)
            .map(|u| u.pending_delete)
            .unwrap_or(false)
    }

    pub fn all_nicknames(&self) -> Vec<String> {
        self.users.lock().unwrap().keys().cloned().collect()
    }

    // ---- rooms --------------------------------------------------------------

    pub fn room_name_taken(&self, name: &str) -> Result<bool, CommandError> {
        if self.rooms.lock().unwrap().values().any(|r| r.name == name) {
            return Ok(true);
        }
        self.store
            .room_name_exists(name)
            .map_err(|e| CommandError::Internal(e.to_string()))
    }

    pub fn create_room(&self, name: &str, manager: &str) -> Result<u32, CommandError> {
        let users = self.users.lock().unwrap();
        if !users.contains_key(manager) {
            return Err(CommandError::UserNotFound(manager.to_string()));
        }
        if users.get(manager).and_then(|u| u.room).is_some() {
            return Err(CommandError::AlreadyInRoom);
        }
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.values().any(|r| r.name == name) {
            return Err(CommandError::RoomNameTaken(name.to_string()));
        }
        drop(users);

        let room_no = self.next_room_id.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.store.insert_room(room_no, name, manager) {
            return Err(CommandError::Internal(e.to_string()));
        }
        rooms.insert(room_no, Room::new(room_no, name, manager));
        drop(rooms);

        self.add_member_to_room(room_no, manager)?;
        Ok(room_no)
    }

    pub fn room_exists(&self, room_no: u32) -> bool {
        self.rooms.lock().unwrap().contains_key(&room_no)
    }

    pub fn room_manager(&self, room_no: u32) -> Option<String> {
        self.rooms
            .lock()
            .unwrap()
            .get(&room_no)
            .map(|r| r.manager.clone())
    }

    pub fn room_id_by_name(&self, name: &str) -> Option<u32> {
        self.rooms
            .lock()
            .unwrap()
            .iter()
            .find(|(_, r)| r.name == name)
            .map(|(id, _)| *id)
    }

    pub fn room_members(&self, room_no: u32) -> Vec<String> {
        self.rooms
            .lock()
            .unwrap()
            .get(&room_no)
            .map(|r| r.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_listing(&self) -> Vec<(u32, String, usize)> {
        self.rooms
            .lock()
            .unwrap()
            .values()
            .map(|r| (r.room_no, r.name.clone(), r.members.len()))
            .collect()
    }

    pub fn add_member_to_room(&self, room_no: u32, nickname: &str) -> Result<(), CommandError> {
        let mut users = self.users.lock().unwrap();
        if users.get(nickname).and_then(|u| u.room).is_some() {
            return Err(CommandError::AlreadyInRoom);
        }
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms
            .get_mut(&room_no)
            .ok_or(CommandError::RoomNotFound(room_no))?;
        if room.has_member(nickname) {
            return Ok(());
        }
        if room.is_full() {
            return Err(CommandError::RoomFull);
        }

        self.store
            .join_room(room_no, nickname)
            .map_err(|e| CommandError::Internal(e.to_string()))?;

        room.members.push(nickname.to_string());
        let count = room.members.len() as u32;
        let _ = self.store.set_room_member_count(room_no, count);

        if let Some(user) = users.get_mut(nickname) {
            user.room = Some(room_no);
        }
        Ok(())
    }

    /// Removes `nickname` from `room_no`. If the room becomes empty it is
    /// destroyed. Returns whether the room was destroyed.
    ///
    /// The `room_user` row persisting `nickname`'s earliest `join_time` in
    /// this room is deliberately left in place (see `Store::join_room`) so a
    /// later rejoin still replays history from the original join (I7).
    pub fn remove_member_from_room(
        &self,
        room_no: u32,
        nickname: &str,
    ) -> Result<bool, CommandError> {
        let mut users = self.users.lock().unwrap();
        let mut rooms = self.rooms.lock().unwrap();
        let destroyed = {
            let room = rooms
                .get_mut(&room_no)
                .ok_or(CommandError::RoomNotFound(room_no))?;
            room.members.retain(|m| m != nickname);
            let count = room.members.len() as u32;
            let _ = self.store.set_room_member_count(room_no, count);
            room.is_empty()
        };

        if let Some(user) = users.get_mut(nickname) {
            user.room = None;
        }

        if destroyed {
            rooms.remove(&room_no);
            if let Err(e) = self.store.delete_room(room_no) {
                log::error!("failed to delete empty room {room_no}: {e}");
            }
        }
        Ok(destroyed)
    }

    pub fn rename_room(&self, room_no: u32, new_name: &str) -> Result<(), CommandError> {
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.values().any(|r| r.name == new_name) {
            return Err(CommandError::RoomNameTaken(new_name.to_string()));
        }
        let room = rooms
            .get_mut(&room_no)
            .ok_or(CommandError::RoomNotFound(room_no))?;
        self.store
            .rename_room(room_no, new_name)
            .map_err(|e| CommandError::Internal(e.to_string()))?;
        room.name = new_name.to_string();
        Ok(())
    }

    pub fn set_room_manager(&self, room_no: u32, new_manager: &str) -> Result<(), CommandError> {
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms
            .get_mut(&room_no)
            .ok_or(CommandError::RoomNotFound(room_no))?;
        if !room.has_member(new_manager) {
            return Err(CommandError::UserNotFound(new_manager.to_string()));
        }
        self.store
            .set_room_manager(room_no, new_manager)
            .map_err(|e| CommandError::Internal(e.to_string()))?;
        room.manager = new_manager.to_string();
        Ok(())
    }

    // ---- broadcast ------------------------------------------------------------

    /// Sends `packet` to every member of `room_no` except `exclude` (if any).
    pub fn broadcast_room(&self, room_no: u32, exclude: Option<&str>, packet: Packet) {
        let members = self.room_members(room_no);
        let users = self.users.lock().unwrap();
        for member in &members {
            if Some(member.as_str()) == exclude {
                continue;
            }
            if let Some(user) = users.get(member) {
                if user
                    .outbox
                    .try_send(SessionEvent::Deliver(packet.clone()))
                    .is_err()
                {
                    log::warn!("dropped broadcast to {member}: outbox full or closed");
                }
            }
        }
    }

    /// Sends `packet` to every connected user with no current room, except `exclude`.
    pub fn broadcast_lobby(&self, exclude: Option<&str>, packet: Packet) {
        let users = self.users.lock().unwrap();
        for (nickname, user) in users.iter() {
            if user.room.is_some() {
                continue;
            }
            if Some(nickname.as_str()) == exclude {
                continue;
            }
            if user
                .outbox
                .try_send(SessionEvent::Deliver(packet.clone()))
                .is_err()
            {
                log::warn!("dropped lobby broadcast to {nickname}: outbox full or closed");
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn registry() -> Registry {
        let store = Arc::new(Store::open(":memory:").unwrap());
        Registry::new(store, 0)
    }

    fn chan() -> mpsc::Sender<SessionEvent> {
        mpsc::channel(8).0
    }

    #[test]
    fn add_user_rejects_duplicate() {
        let reg = registry();
        reg.add_user("alice", chan()).unwrap();
        assert!(matches!(
            reg.add_user("alice", chan()),
            Err(CommandError::NicknameTaken(_))
        ));
    }

    #[test]
    fn create_and_join_and_leave_destroys_empty_room() {
        let reg = registry();
        reg.add_user("alice", chan()).unwrap();
        let room_no = reg.create_room("lobby", "alice").unwrap();
        assert!(reg.room_exists(room_no));
        assert_eq!(reg.room_members(room_no), vec!["alice".to_string()]);

        let destroyed = reg.remove_member_from_room(room_no, "alice").unwrap();
        assert!(destroyed);
        assert!(!reg.room_exists(room_no));
    }

    #[test]
    fn room_full_rejects_extra_member() {
        let reg = registry();
        reg.add_user("alice", chan()).unwrap();
        let room_no = reg.create_room("lobby", "alice").unwrap();
        for i in 0..99 {
            let nick = format!("u{i}");
            reg.add_user(&nick, chan()).unwrap();
            reg.add_member_to_room(room_no, &nick).unwrap();
        }
        reg.add_user("overflow", chan()).unwrap();
        assert!(matches!(
            reg.add_member_to_room(room_no, "overflow"),
            Err(CommandError::RoomFull)
        ));
    }
}
