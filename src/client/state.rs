//! Client-side chat state — own identity and the mirror roster.
//!
//! Pure state transitions with no I/O. The roster is driven entirely
//! by server-sent events: the client never changes its own name until
//! the server's rename broadcast confirms it. [`ClientState::apply`]
//! returns the UI effects of each message so the run loop stays free
//! of presentation decisions.

use crate::wire::message::{Body, Message, UserId, UserSummary};

/// One displayed roster row.
///
/// A disconnected user is retained inactive so chat from before the
/// disconnect can still be attributed; removal happens only through an
/// ACTIVE_USERS reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: UserId,
    pub name: String,
    pub active: bool,
}

/// UI effect of applying one server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A line for the message pane (chat, notice, or error).
    Message(String),
    /// The roster changed; the user display needs a refresh.
    RosterChanged,
}

/// The client's view of the chat room.
#[derive(Debug)]
pub struct ClientState {
    pub id: UserId,
    users: Vec<RosterEntry>,
}

impl ClientState {
    /// Build the initial state from the server's welcome.
    ///
    /// The welcome is an ACTIVE_USERS snapshot addressed to the new
    /// client; its `to` field carries the assigned id. Returns `None`
    /// for any other message.
    pub fn from_welcome(welcome: &Message) -> Option<Self> {
        let Body::ActiveUsers { users } = &welcome.body else {
            return None;
        };
        Some(Self {
            id: welcome.to,
            users: users
                .iter()
                .map(|u| RosterEntry {
                    id: u.id,
                    name: u.name.clone(),
                    active: true,
                })
                .collect(),
        })
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.users
    }

    /// Apply one server message. `now_ms` is the local clock used to
    /// compute ping round-trip times.
    pub fn apply(&mut self, msg: &Message, now_ms: u32) -> Vec<UiEvent> {
        match &msg.body {
            Body::Ping { time } => {
                let elapsed = now_ms.wrapping_sub(*time);
                vec![UiEvent::Message(format!(
                    "<Ping reply from server: {elapsed} ms>"
                ))]
            }

            Body::SetName { id, name } => match self.find_mut(*id) {
                Some(user) => {
                    user.name = name.clone();
                    vec![
                        UiEvent::Message(format!("<Updated user {id} to {name}>")),
                        UiEvent::RosterChanged,
                    ]
                }
                None => vec![UiEvent::Message(format!(
                    "[ERROR] User id {id} doesn't exist."
                ))],
            },

            Body::Connect { id, .. } => {
                if self.find(*id).is_some() {
                    return vec![UiEvent::Message(format!(
                        "[ERROR] User id {id} already exists."
                    ))];
                }
                self.users.push(RosterEntry {
                    id: *id,
                    name: String::new(),
                    active: true,
                });
                vec![
                    UiEvent::Message(format!("<New User {id} Connected>")),
                    UiEvent::RosterChanged,
                ]
            }

            Body::Disconnect { id, .. } => match self.find_mut(*id) {
                Some(user) => {
                    user.active = false;
                    vec![
                        UiEvent::Message(format!("<User {id} Disconnected>")),
                        UiEvent::RosterChanged,
                    ]
                }
                None => vec![UiEvent::Message(format!(
                    "[ERROR] User id {id} does not exist."
                ))],
            },

            Body::ActiveUsers { users } => {
                self.reconcile(users);
                vec![
                    UiEvent::Message("<Updating active user list>".into()),
                    UiEvent::RosterChanged,
                ]
            }

            Body::Chat { text } => match self.find(msg.from) {
                Some(user) => {
                    let label = if user.name.is_empty() {
                        user.id.to_string()
                    } else {
                        user.name.clone()
                    };
                    vec![UiEvent::Message(format!("{label}: {text}"))]
                }
                None => vec![UiEvent::Message(
                    "[ERROR] Received message from unknown user.".into(),
                )],
            },

            Body::Error { text } => vec![UiEvent::Message(format!("[ERROR] {text}"))],
        }
    }

    /// Reconcile the roster against a full snapshot: add any new id,
    /// remove any local id the snapshot no longer lists. Names of
    /// already-known users are left alone — rename broadcasts own
    /// those.
    fn reconcile(&mut self, snapshot: &[UserSummary]) {
        for user in snapshot {
            if self.find(user.id).is_none() {
                self.users.push(RosterEntry {
                    id: user.id,
                    name: user.name.clone(),
                    active: true,
                });
            }
        }
        self.users
            .retain(|u| snapshot.iter().any(|s| s.id == u.id));
    }

    fn find(&self, id: UserId) -> Option<&RosterEntry> {
        self.users.iter().find(|u| u.id == id)
    }

    fn find_mut(&mut self, id: UserId) -> Option<&mut RosterEntry> {
        self.users.iter_mut().find(|u| u.id == id)
    }
}
