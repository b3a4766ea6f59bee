//! UI seam — message sink, roster display, input source.
//!
//! The client core consumes a narrow sink contract (print a line,
//! redraw the user display) and a source of committed input lines.
//! The terminal implementation prints to stdout and reads stdin lines;
//! a richer interactive UI can replace it behind the same seam.

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use crate::client::state::RosterEntry;

/// Sink operations the client core drives.
pub trait ChatUi {
    fn print_message(&mut self, line: &str);
    fn update_user_display(&mut self, users: &[RosterEntry]);
}

/// Plain line-oriented terminal UI.
#[derive(Debug, Default)]
pub struct TerminalUi;

impl TerminalUi {
    pub fn new() -> Self {
        Self
    }
}

impl ChatUi for TerminalUi {
    fn print_message(&mut self, line: &str) {
        println!("{line}");
    }

    fn update_user_display(&mut self, users: &[RosterEntry]) {
        println!("{}", roster_line(users));
    }
}

fn roster_line(users: &[RosterEntry]) -> String {
    let labels: Vec<String> = users
        .iter()
        .map(|u| {
            let label = if u.name.is_empty() {
                u.id.to_string()
            } else {
                u.name.clone()
            };
            if u.active {
                label
            } else {
                format!("{label} (offline)")
            }
        })
        .collect();
    format!("[{} user(s): {}]", users.len(), labels.join(", "))
}

/// A committed line of user input, or the end of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    Quit,
}

/// Spawn the stdin reader task and return its event channel.
///
/// Yields one [`InputEvent::Line`] per committed line and a single
/// [`InputEvent::Quit`] when stdin closes.
pub fn input_events() -> mpsc::UnboundedReceiver<InputEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = tx.send(InputEvent::Quit);
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    let _ = tx.send(InputEvent::Quit);
                    break;
                }
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u16, name: &str, active: bool) -> RosterEntry {
        RosterEntry {
            id,
            name: name.into(),
            active,
        }
    }

    #[test]
    fn roster_line_uses_names_and_falls_back_to_ids() {
        let users = [entry(1000, "alice", true), entry(1001, "", true)];
        assert_eq!(roster_line(&users), "[2 user(s): alice, 1001]");
    }

    #[test]
    fn roster_line_marks_inactive_users() {
        let users = [entry(1000, "alice", false)];
        assert_eq!(roster_line(&users), "[1 user(s): alice (offline)]");
    }
}
