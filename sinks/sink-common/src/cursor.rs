use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Position of the sink in the chain.
///
/// `cursor` is the opaque stream cursor used to resume the stream from this block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub block_number: u64,
    pub block_hash: String,
    /// Block timestamp, in seconds. Undo signals only carry the block number and hash.
    pub block_timestamp: Option<u64>,
    pub cursor: String,
}

impl Cursor {
    /// The cursor used when nothing was persisted yet.
    pub fn genesis(block_number: u64, block_hash: impl Into<String>) -> Self {
        Cursor {
            block_number,
            block_hash: block_hash.into(),
            block_timestamp: None,
            cursor: String::new(),
        }
    }

    /// Returns true if the stream can be resumed from this cursor.
    pub fn is_resumable(&self) -> bool {
        !self.cursor.is_empty()
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.block_hash.is_empty() {
            write!(f, "Cursor({})", self.block_number)
        } else {
            write!(f, "Cursor({}/{})", self.block_number, self.block_hash)
        }
    }
}

/// A newtype to display a cursor that may be `None` as "genesis".
pub struct DisplayCursor<'a>(pub &'a Option<Cursor>);

impl<'a> Display for DisplayCursor<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(cursor) => write!(f, "{}", cursor),
            None => write!(f, "Cursor(genesis)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cursor, DisplayCursor};

    #[test]
    fn test_display_cursor() {
        let cursor = Cursor {
            block_number: 1000,
            block_hash: "0xabc".to_string(),
            block_timestamp: Some(1_700_000_000),
            cursor: "opaque".to_string(),
        };
        assert_eq!(cursor.to_string(), "Cursor(1000/0xabc)");
        assert_eq!(DisplayCursor(&None).to_string(), "Cursor(genesis)");
        assert!(!Cursor::genesis(0, "").is_resumable());
    }
}
