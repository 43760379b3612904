use crate::ledger::Block;

/// Greeting written to a peer right after its connection is accepted.
pub const WELCOME_LINE: &str = "Welcome to the P2P Blockchain Server!";

/// Wire-level messages. Every message occupies exactly one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// A JSON-encoded block.
    Block(Block),
    /// Anything else: chat text, acknowledgements, announcements.
    Text(String),
}

impl WireMessage {
    /// Classify one received line. Never fails: what is not a block is text.
    pub fn decode(line: &str) -> Self {
        match Block::from_json(line) {
            Some(block) => WireMessage::Block(block),
            None => WireMessage::Text(line.to_string()),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            WireMessage::Block(block) => block.to_json(),
            WireMessage::Text(text) => text.clone(),
        }
    }
}

/// Acknowledgement echoed after each processed line.
pub fn ack_line(received: &str) -> String {
    format!("Received: {}", received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_block_json() {
        let line = r#"{"index":1,"timestamp":"t","data":"d","previous_hash":"","hash":"h"}"#;
        match WireMessage::decode(line) {
            WireMessage::Block(b) => {
                assert_eq!(b.index, 1);
                assert_eq!(b.hash, "h");
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn everything_else_is_text() {
        assert_eq!(WireMessage::decode("hello"), WireMessage::Text("hello".into()));
        assert_eq!(WireMessage::decode("{broken"), WireMessage::Text("{broken".into()));
        assert_eq!(WireMessage::decode("[1,2]"), WireMessage::Text("[1,2]".into()));
    }

    #[test]
    fn block_encoding_is_one_line() {
        let b = Block::new(2, "t".into(), "multi\nline".into(), "p".into());
        let line = WireMessage::Block(b.clone()).encode();
        assert!(!line.contains('\n'));
        assert_eq!(WireMessage::decode(&line), WireMessage::Block(b));
    }
}
