//! Block cell data type

/// Well-known block type IDs
pub mod ids {
    pub const AIR: u16 = 0;
    pub const STONE: u16 = 1;
    pub const DIRT: u16 = 2;
    pub const GRASS: u16 = 3;
    pub const SAND: u16 = 4;
    pub const WATER: u16 = 5;
}

/// Single block cell - exactly 4 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Block {
    /// Block type ID
    pub id: u16,
    /// State bits (orientation, growth stage, etc.)
    pub state: u8,
    /// Packed sky/block light levels
    pub light: u8,
}

impl Block {
    /// Empty/air cell
    pub const AIR: Block = Block {
        id: ids::AIR,
        state: 0,
        light: 0,
    };

    /// Create a block with the given type ID and default state
    pub fn new(id: u16) -> Self {
        Self { id, state: 0, light: 0 }
    }

    /// Create a block with explicit state bits
    pub fn with_state(id: u16, state: u8) -> Self {
        Self { id, state, light: 0 }
    }

    /// Check if this cell is air
    pub fn is_air(&self) -> bool {
        self.id == ids::AIR
    }

    /// Serialize to 4 bytes (little-endian ID first)
    pub fn to_bytes(&self) -> [u8; 4] {
        let id = self.id.to_le_bytes();
        [id[0], id[1], self.state, self.light]
    }

    /// Deserialize from 4 bytes
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            id: u16::from_le_bytes([bytes[0], bytes[1]]),
            state: bytes[2],
            light: bytes[3],
        }
    }
}
