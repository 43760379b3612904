//! Address-announce handshake.
//!
//! A dialing peer identifies itself by sending its reachable address as the first
//! line. Only the first whitespace-separated token counts; the rest is ignored.
//! The accepting side reads that line inside the session so the read deadline applies.

use futures::{Sink, SinkExt};
use tokio_util::codec::LinesCodecError;

/// Announced address carried by a first line, if it holds any token.
pub fn parse_announce(line: &str) -> Option<String> {
    line.split_whitespace().next().map(str::to_string)
}

/// Send our own address as the first line of an outbound connection.
pub async fn send_announce<S>(writer: &mut S, address: &str) -> Result<(), LinesCodecError>
where
    S: Sink<String, Error = LinesCodecError> + Unpin,
{
    writer.send(address.to_string()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::codec::LineCodec;
    use futures::StreamExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    #[test]
    fn first_token_wins() {
        assert_eq!(parse_announce("10.0.0.1:9000 extra words"), Some("10.0.0.1:9000".into()));
        assert_eq!(parse_announce("   "), None);
    }

    #[tokio::test]
    async fn announce_round_trip_over_stream() {
        let (a, b) = tokio::io::duplex(256);
        let mut writer = FramedWrite::new(a, LineCodec::new());
        send_announce(&mut writer, "127.0.0.1:7001").await.unwrap();
        let mut reader = FramedRead::new(b, LineCodec::new());
        let line = reader.next().await.unwrap().unwrap();
        assert_eq!(parse_announce(&line), Some("127.0.0.1:7001".into()));
    }
}
