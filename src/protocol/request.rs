use std::str;

/// The only recognized command
const GET_SERVERS: &str = "GET_SERVERS";

/// A decoded client request
#[derive(Debug, PartialEq, Eq)]
pub enum Request<'a> {
    GetServers,
    /// Anything else, trimmed; answered with the error payload
    Unknown(&'a str),
}

/// Decode one request from the first read's bytes
///
/// The bytes are decoded as UTF-8 and stripped of leading/trailing
/// whitespace (including the trailing newline), then matched exactly and
/// case-sensitively against `GET_SERVERS`. Returns `None` for undecodable
/// input: such connections are closed without a response.
pub fn parse_request(data: &[u8]) -> Option<Request<'_>> {
    let text = str::from_utf8(data).ok()?;

    match text.trim() {
        GET_SERVERS => Some(Request::GetServers),
        other => Some(Request::Unknown(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_command_matches() {
        assert_eq!(parse_request(b"GET_SERVERS"), Some(Request::GetServers));
    }

    #[test]
    fn trailing_newline_stripped() {
        assert_eq!(parse_request(b"GET_SERVERS\n"), Some(Request::GetServers));
        assert_eq!(parse_request(b"GET_SERVERS\r\n"), Some(Request::GetServers));
        assert_eq!(parse_request(b"  GET_SERVERS  \n"), Some(Request::GetServers));
    }

    #[test]
    fn match_is_case_sensitive() {
        assert_eq!(
            parse_request(b"get_servers\n"),
            Some(Request::Unknown("get_servers"))
        );
    }

    #[test]
    fn unknown_command() {
        assert_eq!(parse_request(b"PING\n"), Some(Request::Unknown("PING")));
    }

    #[test]
    fn empty_read_is_unknown() {
        assert_eq!(parse_request(b""), Some(Request::Unknown("")));
    }

    #[test]
    fn prefix_with_trailing_garbage_does_not_match() {
        assert_eq!(
            parse_request(b"GET_SERVERS extra\n"),
            Some(Request::Unknown("GET_SERVERS extra"))
        );
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert_eq!(parse_request(&[0xff, 0xfe, 0xfd]), None);
    }
}
