/// Size of one test block, also the alignment required for direct I/O
pub const BLOCK_SIZE: usize = 4096;

/// Number of leading bytes of a block that carry its block number
pub const BLOCK_NUMBER_LEN: usize = 8;

/// One block-sized buffer aligned for `O_DIRECT` transfers
#[repr(C, align(4096))]
pub struct AlignedBlock(pub [u8; BLOCK_SIZE]);

impl AlignedBlock {
    pub fn zeroed() -> Box<Self> {
        Box::new(Self([0; BLOCK_SIZE]))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// Writes the expected contents of `block` into `buf`: the block number in
/// little-endian order, followed by zeroes.
pub fn fill_pattern(block: u64, buf: &mut [u8]) {
    let (number, rest) = buf.split_at_mut(BLOCK_NUMBER_LEN);
    number.copy_from_slice(&block.to_le_bytes());
    rest.fill(0);
}

/// A byte that differs between the expected and the actual block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Difference {
    pub offset: usize,
    pub expected: u8,
    pub actual: u8,
}

/// Lists every offset at which `expected` and `actual` differ
pub fn differences(expected: &[u8], actual: &[u8]) -> Vec<Difference> {
    expected
        .iter()
        .zip(actual)
        .enumerate()
        .filter(|(_, (e, a))| e != a)
        .map(|(offset, (&expected, &actual))| Difference {
            offset,
            expected,
            actual,
        })
        .collect()
}
