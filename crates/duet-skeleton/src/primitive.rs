//! Render primitives - weighted points for the scalar-field renderer

/// Subtract hint passed with every primitive (field falloff)
pub const SUBTRACT_HINT: u32 = 6;

/// 3D position in scene units
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Distance to another position
    pub fn distance(&self, other: &Position3D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Linear RGB color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Build from a 0xRRGGBB value
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    /// Palette entry for a body, cycling past the end
    pub fn for_body(body_index: usize) -> Self {
        BODY_PALETTE[body_index % BODY_PALETTE.len()]
    }
}

/// Body colors: person 1, person 2, then the two AI bodies
pub const BODY_PALETTE: [Color; 4] = [
    Color::from_hex(0xff8ff4),
    Color::from_hex(0xfc5bef),
    Color::from_hex(0x0000ff),
    Color::from_hex(0xff0000),
];

/// One weighted point of the metaball field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPrimitive {
    pub position: Position3D,
    pub strength: f32,
    pub subtract: u32,
    pub color: Color,
    /// Body (and lane) this primitive belongs to
    pub body_index: usize,
}
