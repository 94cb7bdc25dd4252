//! Message formatting and channel fan-out.
//!
//! Recipients are snapshotted under the channel guard; delivery goes through
//! each session's outbox after the guard is released. Every line sent to a
//! channel is also echoed to the console transcript on stdout.

use crate::state::{Channel, SessionHandle, SessionId};

/// Current local wall-clock time as `HH:MM:SS`.
pub fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// `[Server message (HH:MM:SS)] text`
pub fn server_line(text: &str) -> String {
    format!("[Server message ({})] {}", timestamp(), text)
}

/// `[ user (HH:MM:SS) ] text`
pub fn user_line(user: &str, text: &str) -> String {
    format!("[ {} ({}) ] {}", user, timestamp(), text)
}

/// `[ sender whispers to you: (HH:MM:SS) ] text`
pub fn whisper_line(sender: &str, text: &str) -> String {
    format!("[ {} whispers to you: ({}) ] {}", sender, timestamp(), text)
}

/// Console form of a whisper, naming both parties.
pub fn whisper_transcript(sender: &str, target: &str, text: &str) -> String {
    format!("[ {} whispers to {}: ({}) ] {}", sender, target, timestamp(), text)
}

/// Print a line to the console transcript.
pub fn echo(line: &str) {
    println!("{line}");
}

/// Print a server message to the console transcript.
pub fn announce(text: &str) {
    echo(&server_line(text));
}

/// Send `line` to every member of `channel` except `exclude`.
///
/// Returns how many members accepted the line.
pub fn fan_out(channel: &Channel, line: &str, exclude: Option<SessionId>) -> usize {
    let recipients = channel.recipients(exclude);
    crate::metrics::record_fanout(recipients.len());
    deliver_all(&recipients, line)
}

/// Broadcast a server notice to a channel and echo it to the console.
pub fn notify(channel: &Channel, text: &str, exclude: Option<SessionId>) -> usize {
    let line = server_line(text);
    echo(&line);
    fan_out(channel, &line, exclude)
}

/// Relay a user's chat line to everyone else in their channel.
pub fn relay(channel: &Channel, sender: &SessionHandle, text: &str) -> usize {
    let line = user_line(sender.username(), text);
    echo(&line);
    crate::metrics::record_relayed();
    fan_out(channel, &line, Some(sender.id()))
}

fn deliver_all(recipients: &[SessionHandle], line: &str) -> usize {
    recipients
        .iter()
        .filter(|r| r.send_line(line.to_string()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelDefinition;
    use crate::state::SessionIdGenerator;
    use crate::state::testing::TestSession;

    fn is_clock(s: &str) -> bool {
        s.len() == 8
            && s.char_indices().all(|(i, c)| match i {
                2 | 5 => c == ':',
                _ => c.is_ascii_digit(),
            })
    }

    #[test]
    fn test_line_formats() {
        let line = server_line("hello");
        assert!(line.starts_with("[Server message ("));
        assert!(line.ends_with(")] hello"));
        assert!(is_clock(&line[17..25]), "bad clock in {line}");

        let line = user_line("alice", "hi all");
        assert!(line.starts_with("[ alice ("));
        assert!(line.ends_with(") ] hi all"));

        let line = whisper_line("alice", "psst");
        assert!(line.starts_with("[ alice whispers to you: ("));
        assert!(line.ends_with(") ] psst"));
    }

    #[test]
    fn test_relay_skips_sender_and_non_members() {
        let ids = SessionIdGenerator::new();
        let channel = Channel::new(&ChannelDefinition {
            name: "general".into(),
            port: 80,
            capacity: 5,
        });
        let mut sessions: Vec<TestSession> = ["alice", "bob", "carol"]
            .iter()
            .map(|name| TestSession::new(&ids, name))
            .collect();
        for s in &sessions[..2] {
            channel.enqueue(s.handle.clone()).unwrap();
            channel.try_admit(s.handle.id(), None);
        }
        // carol stays queued
        channel.enqueue(sessions[2].handle.clone()).unwrap();

        let sender = sessions[0].handle.clone();
        assert_eq!(relay(&channel, &sender, "hello"), 1);

        assert!(sessions[0].lines().is_empty());
        let bob = sessions[1].lines();
        assert_eq!(bob.len(), 1);
        assert!(bob[0].starts_with("[ alice ("));
        assert!(bob[0].ends_with("] hello"));
        assert!(sessions[2].lines().is_empty());
    }
}
