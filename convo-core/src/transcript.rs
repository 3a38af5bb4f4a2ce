//! Transcript projection.

use convo_sdk::objects::TranscriptTurn;

/// Render speaker turns as `"role: message"` lines joined by `\n`.
///
/// Input order is kept as is; consecutive turns by the same role stay
/// separate lines. No trailing newline is emitted.
pub fn project_transcript(turns: &[TranscriptTurn]) -> String {
    let mut out = String::with_capacity(
        turns
            .iter()
            .map(|t| t.role.len() + t.message.len() + 3)
            .sum(),
    );
    for (i, turn) in turns.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&turn.role);
        out.push_str(": ");
        out.push_str(&turn.message);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, message: &str) -> TranscriptTurn {
        TranscriptTurn {
            role: role.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_two_turns() {
        let turns = [turn("agent", "hi"), turn("user", "hello")];
        assert_eq!(project_transcript(&turns), "agent: hi\nuser: hello");
    }

    #[test]
    fn test_order_and_repeats_preserved() {
        let turns = [
            turn("user", "b"),
            turn("user", "b"),
            turn("agent", "a"),
            turn("user", "c"),
        ];
        assert_eq!(
            project_transcript(&turns),
            "user: b\nuser: b\nagent: a\nuser: c"
        );
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(project_transcript(&[]), "");
        assert_eq!(project_transcript(&[turn("agent", "")]), "agent: ");
    }

    #[test]
    fn test_message_whitespace_untouched() {
        let turns = [turn("agent", " line one\nline two ")];
        assert_eq!(project_transcript(&turns), "agent:  line one\nline two ");
    }
}
