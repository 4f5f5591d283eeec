/// Panel orientation. The ST7701 bring-up only implements 0 and 180
/// degrees (MADCTL/SDIR mirroring); the other two values exist so callers
/// can ask and be told no.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn is_supported(self) -> bool {
        matches!(self, Rotation::Deg0 | Rotation::Deg180)
    }
}

/// Logical panel geometry. The physical panel is always 480x480; a 240x240
/// geometry drives it at half resolution, doubling pixels horizontally via
/// a slower pixel clock and vertically by scanning each logical row twice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PanelGeometry {
    pub width: u16,
    pub height: u16,
    pub rotation: Rotation,
}

impl PanelGeometry {
    pub const fn new(width: u16, height: u16, rotation: Rotation) -> Option<Self> {
        match (width, height) {
            (480, 480) | (240, 240) => Some(Self {
                width,
                height,
                rotation,
            }),
            _ => None,
        }
    }

    /// Shift applied to the physical scan row to get the logical row.
    pub const fn row_shift(&self) -> u32 {
        if self.height == 240 { 1 } else { 0 }
    }

    /// Physical scan lines per frame, always the native line count.
    pub const fn display_lines(&self) -> u32 {
        (self.height as u32) << self.row_shift()
    }

    pub const fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Rectangular region for partial updates, in logical pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_validation() {
        assert!(PanelGeometry::new(480, 480, Rotation::Deg0).is_some());
        assert!(PanelGeometry::new(240, 240, Rotation::Deg180).is_some());
        assert!(PanelGeometry::new(320, 240, Rotation::Deg0).is_none());
    }

    #[test]
    fn half_res_addresses_every_line_twice() {
        let half = PanelGeometry::new(240, 240, Rotation::Deg0).unwrap();
        assert_eq!(half.row_shift(), 1);
        assert_eq!(half.display_lines(), 480);
        let full = PanelGeometry::new(480, 480, Rotation::Deg0).unwrap();
        assert_eq!(full.row_shift(), 0);
        assert_eq!(full.display_lines(), 480);
    }

    #[test]
    fn rotation_support() {
        assert!(Rotation::Deg0.is_supported());
        assert!(Rotation::Deg180.is_supported());
        assert!(!Rotation::Deg90.is_supported());
        assert!(!Rotation::Deg270.is_supported());
    }
}
