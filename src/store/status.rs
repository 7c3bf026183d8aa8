use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{StoreError, StoreResult};

const DONE: u8 = 0;
const PENDING: u8 = 1;

/// Fulfilment state of a request. Persisted as a single byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Done,
    Pending,
}

impl Status {
    pub fn to_byte(self) -> u8 {
        match self {
            Status::Done => DONE,
            Status::Pending => PENDING,
        }
    }

    /// Decodes a stored value. Anything but exactly one `0` or `1` byte is
    /// reported as corruption of `key`.
    pub fn decode(key: &str, value: &[u8]) -> StoreResult<Self> {
        match value {
            [DONE] => Ok(Status::Done),
            [PENDING] => Ok(Status::Pending),
            _ => Err(StoreError::Corrupted(format!(
                "{key}: unexpected status value {value:?}"
            ))),
        }
    }

    pub fn is_pending(self) -> bool {
        self == Status::Pending
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = match self {
            Status::Done => "done",
            Status::Pending => "pending",
        };
        write!(f, "{}", status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_encoding() {
        assert_eq!(Status::Done.to_byte(), 0);
        assert_eq!(Status::Pending.to_byte(), 1);
        assert_eq!(Status::decode("k", &[0]).unwrap(), Status::Done);
        assert_eq!(Status::decode("k", &[1]).unwrap(), Status::Pending);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Status::decode("k", &[]).is_err());
        assert!(Status::decode("k", &[2]).is_err());
        assert!(Status::decode("k", &[1, 0]).is_err());
    }
}
