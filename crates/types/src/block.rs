use serde::{Deserialize, Serialize};

/// Block height.
pub type Height = u64;
/// Block time in unix seconds.
pub type Timestamp = u64;

/// The slice of block metadata the reward engine reads.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: Height,
    pub time: Timestamp,
}

impl BlockHeader {
    pub const fn new(height: Height, time: Timestamp) -> Self {
        Self { height, time }
    }

    /// Header of the following block, `block_time` seconds later.
    pub fn next(&self, block_time: Timestamp) -> Self {
        Self {
            height: self.height + 1,
            time: self.time + block_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_advances_height_and_time() {
        let header = BlockHeader::new(10, 1_000);
        assert_eq!(header.next(6), BlockHeader::new(11, 1_006));
    }
}
