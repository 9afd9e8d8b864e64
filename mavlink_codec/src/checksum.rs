/// CRC-16/MCRF4XX, called "X.25" throughout the MAVLink sources.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Checksum(u16);

impl Default for Checksum {
    fn default() -> Self {
        Self(0xFFFF)
    }
}

impl Checksum {
    pub fn accumulate(&mut self, byte: u8) {
        let tmp = byte ^ (self.0 & 0xFF) as u8;
        let tmp = tmp ^ (tmp << 4);
        let tmp = u16::from(tmp);
        self.0 = (self.0 >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4);
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.accumulate(*byte);
        }
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn check_value() {
        let mut checksum = Checksum::default();
        checksum.update(b"123456789");
        assert_eq!(0x6F91, checksum.value());
    }

    #[test]
    fn empty_input_keeps_seed() {
        assert_eq!(0xFFFF, Checksum::default().value());
    }
}
