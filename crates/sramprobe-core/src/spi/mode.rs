//! Mode register encoding

/// Operating mode selected by mode register bits 7:6
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OperatingMode {
    /// Byte mode: one data byte per READ/WRITE instruction
    Byte,
    /// Page mode: the address wraps within a 32-byte page
    Page,
    /// Sequential mode: the address runs across the whole array
    #[default]
    Sequential,
}

impl OperatingMode {
    /// Mask of the mode bits in the mode register
    pub const MASK: u8 = 0xC0;

    /// Page size used by page mode
    pub const PAGE_SIZE: u32 = 32;

    /// Value written to the mode register
    pub const fn register_value(&self) -> u8 {
        match self {
            Self::Byte => 0x00,
            Self::Page => 0x80,
            Self::Sequential => 0x40,
        }
    }

    /// Decode a mode register value, ignoring reserved bits
    ///
    /// Returns `None` for the reserved `0b11` pattern.
    pub const fn from_register(value: u8) -> Option<Self> {
        match value & Self::MASK {
            0x00 => Some(Self::Byte),
            0x80 => Some(Self::Page),
            0x40 => Some(Self::Sequential),
            _ => None,
        }
    }

    /// Human readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Page => "page",
            Self::Sequential => "sequential",
        }
    }
}

impl core::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_round_trip() {
        for mode in [
            OperatingMode::Byte,
            OperatingMode::Page,
            OperatingMode::Sequential,
        ] {
            assert_eq!(
                OperatingMode::from_register(mode.register_value()),
                Some(mode)
            );
        }
    }

    #[test]
    fn test_reserved_bits_ignored() {
        assert_eq!(
            OperatingMode::from_register(0x41),
            Some(OperatingMode::Sequential)
        );
        assert_eq!(OperatingMode::from_register(0xC0), None);
    }
}
