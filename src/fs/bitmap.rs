//! free-space bitmap for inodes and data blocks
//!
//! A set bit means the unit is **free**, a cleared bit means it is allocated.
//! Indices outside `[0, size)` are ignored by every operation.
use bitvec::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: BitVec<u8, Lsb0>,
}

impl Bitmap {
    /// a bitmap of `size` units, all of them allocated
    pub fn new(size: usize) -> Self {
        Bitmap {
            bits: bitvec![u8, Lsb0; 0; size],
        }
    }

    /// a bitmap of `size` units, all of them free
    pub fn all_free(size: usize) -> Self {
        Bitmap {
            bits: bitvec![u8, Lsb0; 1; size],
        }
    }

    pub fn size(&self) -> usize {
        self.bits.len()
    }

    /// mark unit `i` as used
    pub fn allocate(&mut self, i: usize) {
        if i < self.size() {
            self.bits.set(i, false);
        }
    }

    /// mark unit `i` as available
    pub fn free(&mut self, i: usize) {
        if i < self.size() {
            self.bits.set(i, true);
        }
    }

    /// check if unit `i` is in use, out of range units are reported as not allocated
    pub fn is_allocated(&self, i: usize) -> bool {
        self.bits.get(i).map(|bit| !*bit).unwrap_or(false)
    }

    /// lowest free index, [None] when nothing is free
    pub fn find_first_free(&self) -> Option<usize> {
        self.bits.first_one()
    }

    /// calculate the number of free units
    pub fn count_free(&self) -> usize {
        self.bits.count_ones()
    }

    /// serialize, bit `i` goes to byte `i / 8` bit `i % 8`,
    /// trailing bits of the last byte are zero
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bits = self.bits.clone();
        bits.set_uninitialized(false);
        bits.into_vec()
    }

    /// deserialize `size` units from `data`, missing bytes read as allocated
    pub fn from_bytes(data: &[u8], size: usize) -> Self {
        let mut bits = BitVec::<u8, Lsb0>::from_slice(data);
        bits.resize(size, false);
        Bitmap { bits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_free() {
        let mut bitmap = Bitmap::all_free(16);
        bitmap.allocate(0);
        bitmap.allocate(3);
        bitmap.allocate(7);
        bitmap.free(3);
        bitmap.allocate(10);
        assert!(bitmap.is_allocated(0));
        assert!(!bitmap.is_allocated(3));
        assert!(bitmap.is_allocated(7));
        assert!(bitmap.is_allocated(10));
        assert_eq!(bitmap.count_free(), 13);
        assert_eq!(bitmap.find_first_free(), Some(1));
    }

    #[test]
    fn test_round_trip_through_bytes() {
        let mut bitmap = Bitmap::all_free(21);
        for i in [0, 1, 5, 8, 13, 20] {
            bitmap.allocate(i);
        }
        let bytes = bitmap.to_bytes();
        assert_eq!(bytes.len(), 3);
        // bits 21..24 are padding
        assert_eq!(bytes[2] & 0b1110_0000, 0);

        let loaded = Bitmap::from_bytes(&bytes, 21);
        for i in 0..21 {
            assert_eq!(bitmap.is_allocated(i), loaded.is_allocated(i), "bit {i}");
        }
        assert_eq!(loaded.find_first_free(), bitmap.find_first_free());
        assert_eq!(loaded.count_free(), bitmap.count_free());
    }

    #[test]
    fn test_bit_order_on_disk() {
        let mut bitmap = Bitmap::new(10);
        bitmap.free(0);
        bitmap.free(9);
        assert_eq!(bitmap.to_bytes(), vec![0b0000_0001, 0b0000_0010]);
    }

    #[test]
    fn test_find_first_free_is_lowest() {
        let mut bitmap = Bitmap::new(15);
        assert_eq!(bitmap.find_first_free(), None);
        assert_eq!(bitmap.count_free(), 0);
        bitmap.free(14);
        assert_eq!(bitmap.find_first_free(), Some(14));
        bitmap.free(6);
        assert_eq!(bitmap.find_first_free(), Some(6));
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut bitmap = Bitmap::all_free(8);
        bitmap.allocate(8);
        bitmap.allocate(1000);
        bitmap.free(usize::MAX);
        assert_eq!(bitmap.count_free(), 8);
        assert!(!bitmap.is_allocated(8));
        assert_eq!(bitmap.size(), 8);
    }

    #[test]
    fn test_short_buffer_reads_as_allocated() {
        let bitmap = Bitmap::from_bytes(&[0xff], 12);
        assert_eq!(bitmap.count_free(), 8);
        assert!(bitmap.is_allocated(11));
    }
}
