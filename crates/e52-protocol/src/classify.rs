//! Default classification of stream segments.

use crate::{ACK_TOKEN, LOCAL_PREFIX, SEND_SUCCESS_TOKEN};

/// Default predicate for command-generated traffic.
///
/// A segment is treated as command traffic when it contains `AT+`, `OK`, or
/// `SUCCESS` (case-insensitive) or an `=` sign. This errs on the side of
/// attributing ambiguous traffic to the active exchange; payload containing
/// any of these substrings is misrouted, which the wire format gives no way
/// to avoid.
pub fn is_command_response(segment: &str) -> bool {
    if segment.contains('=') {
        return true;
    }
    let upper = segment.to_ascii_uppercase();
    upper.contains(LOCAL_PREFIX) || upper.contains(ACK_TOKEN) || upper.contains(SEND_SUCCESS_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_is_command_response() {
        assert!(is_command_response("AT+CHANNEL=OK"));
        assert!(is_command_response("OK"));
        assert!(is_command_response("SUCCESS"));
    }

    #[test]
    fn test_query_result_is_command_response() {
        // Query replies carry an '=' even without the other tokens.
        assert!(is_command_response("AT+CHANNEL=0x0d,13"));
        assert!(is_command_response("channel=13"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(is_command_response("at+option=ok"));
        assert!(is_command_response("success"));
    }

    #[test]
    fn test_plain_payload_is_not_command_response() {
        assert!(!is_command_response("Hello Module A!"));
        assert!(!is_command_response("temperature 21.5"));
    }

    #[test]
    fn test_payload_with_token_misrouted() {
        // Documented limitation of the heuristic.
        assert!(is_command_response("OKEN"));
    }
}
