//! Network cost attribute.
//!
//! Carried in binding requests as a 16-bit network id followed by a 16-bit
//! cost. Lower cost means a cheaper path (wired beats cellular).

use crate::errors::StunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkCost {
    pub network_id: u16,
    pub cost: u16,
}

impl NetworkCost {
    pub fn new(network_id: u16, cost: u16) -> Self {
        Self { network_id, cost }
    }

    pub fn encode(&self) -> [u8; 4] {
        let mut value = [0u8; 4];
        value[..2].copy_from_slice(&self.network_id.to_be_bytes());
        value[2..].copy_from_slice(&self.cost.to_be_bytes());
        value
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StunError> {
        if bytes.len() < 4 {
            return Err(StunError::AttributeTooShort(0xC057));
        }
        Ok(Self {
            network_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            cost: u16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }

    /// Field-wise maximum, used to accumulate what a peer reported over time.
    pub fn merge_max(self, other: NetworkCost) -> NetworkCost {
        NetworkCost {
            network_id: self.network_id.max(other.network_id),
            cost: self.cost.max(other.cost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        assert_eq!(NetworkCost::new(0x0102, 0x0A0B).encode(), [1, 2, 10, 11]);
    }

    #[test]
    fn test_decode_short() {
        assert_eq!(
            NetworkCost::decode(&[0, 1]),
            Err(StunError::AttributeTooShort(0xC057))
        );
    }

    #[test]
    fn test_merge_max_is_fieldwise() {
        let merged = NetworkCost::new(3, 10).merge_max(NetworkCost::new(1, 50));
        assert_eq!(merged, NetworkCost::new(3, 50));
    }
}
