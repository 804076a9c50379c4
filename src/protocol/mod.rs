mod request;
mod response;

pub use request::{parse_request, Request};
pub use response::{encode_error, encode_server_list};

/// Upper bound on the bytes considered for a command
///
/// Exactly one read of at most this many bytes is performed per connection.
/// Commands must fit in the first 1024 bytes of the stream to be recognized;
/// there is no reassembly of commands split across TCP segments.
pub const MAX_REQUEST_BYTES: usize = 1024;
