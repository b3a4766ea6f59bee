//! Server-side roster — membership, id assignment, name uniqueness.
//!
//! All methods are pure state transitions with no I/O. The roster is
//! owned exclusively by the server loop; every entry corresponds to one
//! live connection, and the loop re-establishes that equivalence on
//! every accept and disconnect.

use crate::wire::message::{MAX_CLIENTS, UserId, UserSummary};

/// First id handed to a client. `0` is reserved for the server.
pub const FIRST_CLIENT_ID: UserId = 1000;

#[derive(Debug)]
struct ChatUser {
    id: UserId,
    name: String,
}

/// The set of currently-connected users.
#[derive(Debug)]
pub struct ServerState {
    users: Vec<ChatUser>,
    /// Next id to assign. Monotonic for the life of the process — ids
    /// are never reused, a reconnect gets a fresh one.
    next_id: UserId,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            users: Vec::new(),
            next_id: FIRST_CLIENT_ID,
        }
    }

    /// Admit a new user with an empty name and return its assigned id,
    /// or `None` when the roster is at capacity.
    pub fn add_user(&mut self) -> Option<UserId> {
        if self.users.len() >= MAX_CLIENTS {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.users.push(ChatUser {
            id,
            name: String::new(),
        });
        Some(id)
    }

    /// Remove a user by swap-with-last. Returns false if the id was
    /// not present.
    pub fn remove_user(&mut self, id: UserId) -> bool {
        match self.users.iter().position(|u| u.id == id) {
            Some(index) => {
                self.users.swap_remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    /// Byte-exact uniqueness check against every roster member,
    /// including the requester's own current name.
    pub fn name_taken(&self, name: &str) -> bool {
        self.users.iter().any(|u| u.name == name)
    }

    pub fn set_name(&mut self, id: UserId, name: &str) {
        if let Some(user) = self.users.iter_mut().find(|u| u.id == id) {
            user.name = name.to_owned();
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Roster snapshot in the form ACTIVE_USERS carries.
    pub fn snapshot(&self) -> Vec<UserSummary> {
        self.users
            .iter()
            .map(|u| UserSummary {
                id: u.id,
                name: u.name.clone(),
            })
            .collect()
    }
}
