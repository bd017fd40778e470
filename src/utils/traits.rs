use bincode::{
    config::{self, Config},
    Decode, Encode,
};

use crate::error::{FsError, Result};

/// every on-disk record is big endian with fixed width integers
pub fn codec_config() -> impl Config {
    config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

/// Trait for records that occupy a fixed number of bytes on disk
/// # Note
/// The encoded form is zero padded up to [FixedSizeRecord::SIZE],
/// so it can be placed in a table slot or a block without further framing.
pub trait FixedSizeRecord: Encode + Decode<()> + Sized {
    /// size of one record on disk
    const SIZE: usize;

    /// serialize into exactly [FixedSizeRecord::SIZE] bytes
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; Self::SIZE];
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// serialize into the head of `buf`, which must hold at least [FixedSizeRecord::SIZE] bytes
    /// # Returns
    /// The number of meaningful bytes written, the rest of the slot is left untouched
    fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < Self::SIZE {
            return Err(FsError::Codec(format!(
                "slot of {} bytes is smaller than a {} byte record",
                buf.len(),
                Self::SIZE
            )));
        }
        Ok(bincode::encode_into_slice(
            self,
            &mut buf[..Self::SIZE],
            codec_config(),
        )?)
    }

    /// deserialize from the head of `buf`
    fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(FsError::Codec(format!(
                "need {} bytes to decode a record, got {}",
                Self::SIZE,
                buf.len()
            )));
        }
        let (record, _) = bincode::decode_from_slice(&buf[..Self::SIZE], codec_config())?;
        Ok(record)
    }
}
