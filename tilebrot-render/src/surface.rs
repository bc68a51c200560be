use tilebrot_core::Tile;

/// Destination raster for composited tiles.
///
/// Only the coordinating thread writes to a surface.
pub trait Surface {
    /// Current size in pixels.
    fn size(&self) -> (u32, u32);

    /// Write a tile's packed pixels at the tile's absolute offset.
    fn put_pixels(&mut self, tile: Tile, pixels: &[u32]);

    /// Change the raster size. Existing contents need not survive.
    fn resize(&mut self, width: u32, height: u32);
}

/// Opaque black in the packed little-endian RGBA layout.
pub const OPAQUE_BLACK: u32 = 0xff00_0000;

/// An in-memory surface of packed RGBA pixels, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl RenderBuffer {
    /// Create a new buffer filled with opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![OPAQUE_BLACK; width as usize * height as usize],
        }
    }

    /// Packed pixel at `(x, y)`, if inside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Unpack into RGBA bytes, 4 per pixel.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
    }
}

impl Surface for RenderBuffer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Rows that fall outside the buffer are clipped.
    fn put_pixels(&mut self, tile: Tile, pixels: &[u32]) {
        debug_assert_eq!(pixels.len(), tile.pixel_count());
        if tile.x >= self.width || tile.y >= self.height {
            return;
        }
        let stride = self.width as usize;
        let tw = tile.width as usize;
        let copy_w = tile.width.min(self.width - tile.x) as usize;
        let rows = tile.height.min(self.height - tile.y) as usize;
        for row in 0..rows {
            let src_start = row * tw;
            let dst_start = (tile.y as usize + row) * stride + tile.x as usize;
            self.pixels[dst_start..dst_start + copy_w]
                .copy_from_slice(&pixels[src_start..src_start + copy_w]);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_black_opaque() {
        let buf = RenderBuffer::new(4, 4);
        assert_eq!(buf.pixels.len(), 16);
        for chunk in buf.to_rgba_bytes().chunks_exact(4) {
            assert_eq!(chunk, &[0, 0, 0, 255]);
        }
    }

    #[test]
    fn put_pixels_writes_correct_region() {
        let mut buf = RenderBuffer::new(8, 8);
        let tile = Tile::new(2, 1, 3, 2);
        let red = vec![0xff00_00ff; tile.pixel_count()];
        buf.put_pixels(tile, &red);

        assert_eq!(buf.pixel(2, 1), Some(0xff00_00ff));
        assert_eq!(buf.pixel(4, 2), Some(0xff00_00ff));
        assert_eq!(buf.pixel(0, 0), Some(OPAQUE_BLACK));
        assert_eq!(buf.pixel(5, 1), Some(OPAQUE_BLACK));
        assert_eq!(buf.pixel(2, 3), Some(OPAQUE_BLACK));
        assert_eq!(&buf.to_rgba_bytes()[(8 + 2) * 4..(8 + 2) * 4 + 4], &[255, 0, 0, 255]);
    }

    #[test]
    fn put_pixels_clips_overhang() {
        let mut buf = RenderBuffer::new(4, 4);
        let tile = Tile::new(2, 3, 4, 2);
        let pixels: Vec<u32> = (0..8).collect();
        buf.put_pixels(tile, &pixels);
        assert_eq!(buf.pixel(2, 3), Some(0));
        assert_eq!(buf.pixel(3, 3), Some(1));
        assert_eq!(buf.pixel(4, 3), None);
    }

    #[test]
    fn resize_reallocates() {
        let mut buf = RenderBuffer::new(4, 4);
        buf.put_pixels(Tile::new(0, 0, 1, 1), &[7]);
        buf.resize(6, 2);
        assert_eq!(buf.size(), (6, 2));
        assert_eq!(buf.pixels.len(), 12);
        assert_eq!(buf.pixel(0, 0), Some(OPAQUE_BLACK));
    }
}
