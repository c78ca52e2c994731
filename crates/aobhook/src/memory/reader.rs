use crate::error::Result;

/// Borrowed views into memory at absolute addresses.
///
/// Implementations return exactly `len` bytes or an error; the typed readers
/// below rely on that.
pub trait ReadMemory {
    fn view(&self, address: u64, len: usize) -> Result<&[u8]>;

    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        Ok(self.view(address, len)?.to_vec())
    }

    fn read_u16(&self, address: u64) -> Result<u16> {
        let b = self.view(address, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        let b = self.view(address, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        let b = self.view(address, 4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let b = self.view(address, 8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
}
