//! Tile deobfuscation: undo the viewer's pixel-block shuffle.
//!
//! The platform cuts each page into a 4×4 grid of equal tiles and transposes
//! the grid: the tile at column `c`, row `r` is served at column `r`, row `c`.
//! Transposing again restores the page, so the same routine scrambles and
//! unscrambles.
//!
//! ## Tile geometry
//!
//! Tile sizes are `(width / 32) * 8` by `(height / 32) * 8`, so the grid only
//! covers the largest 32-aligned rectangle at the top-left. The remaining
//! `width % 32` columns on the right and `height % 32` rows at the bottom are
//! never shuffled by the platform. The transform below leaves them
//! transparent; [`restore_right_strip`] and [`restore_bottom_strip`] copy them
//! over from the source unchanged.
//!
//! ## Two passes
//!
//! The output starts fully transparent. The first pass swaps every
//! off-diagonal tile pair, the second copies the four diagonal tiles in place.
//! Skipping the second pass leaves the diagonal blank.
//!
//! Everything here is pure and synchronous. Callers must reject declared sizes
//! below 32×32 (see [`TileGrid::is_valid`]) before calling in.

use image::RgbaImage;
use tracing::debug;

/// Tiles per row and per column.
pub const GRID_SIZE: u32 = 4;

const ALIGNMENT: u32 = 32;
const TILE_UNIT: u32 = 8;

/// Tile dimensions derived from a page's declared size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub tile_width: u32,
    pub tile_height: u32,
}

impl TileGrid {
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        Self {
            tile_width: (width / ALIGNMENT) * TILE_UNIT,
            tile_height: (height / ALIGNMENT) * TILE_UNIT,
        }
    }

    /// False when either dimension is below 32 and the tiles would be empty.
    pub fn is_valid(&self) -> bool {
        self.tile_width > 0 && self.tile_height > 0
    }

    /// Width of the region the grid covers, starting at x = 0.
    pub fn covered_width(&self) -> u32 {
        self.tile_width * GRID_SIZE
    }

    /// Height of the region the grid covers, starting at y = 0.
    pub fn covered_height(&self) -> u32 {
        self.tile_height * GRID_SIZE
    }

    fn origin(&self, col: u32, row: u32) -> (u32, u32) {
        (col * self.tile_width, row * self.tile_height)
    }
}

/// Reassemble a scrambled page into a freshly allocated `width × height` canvas.
///
/// Pixels outside the tile grid stay fully transparent.
pub fn deobfuscate(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let grid = TileGrid::for_dimensions(width, height);
    let mut dst = RgbaImage::new(width, height);
    if !grid.is_valid() {
        return dst;
    }

    for col in 0..GRID_SIZE {
        for row in (col + 1)..GRID_SIZE {
            copy_tile(src, &mut dst, &grid, (row, col), (col, row));
            copy_tile(src, &mut dst, &grid, (col, row), (row, col));
        }
    }

    for i in 0..GRID_SIZE {
        copy_tile(src, &mut dst, &grid, (i, i), (i, i));
    }

    debug!(
        "Deobfuscated {}x{} page with {}x{} tiles",
        width, height, grid.tile_width, grid.tile_height
    );
    dst
}

/// Count fully transparent columns from the right edge inward.
///
/// Assumes the only transparency in a deobfuscated page is the alignment
/// margin; a source image that is itself transparent along its right edge
/// will be over-counted.
pub fn detect_transparent_strip_width(img: &RgbaImage) -> u32 {
    let (width, height) = img.dimensions();
    (0..width)
        .rev()
        .take_while(|&x| (0..height).all(|y| img.get_pixel(x, y)[3] == 0))
        .count() as u32
}

/// Count fully transparent rows from the bottom edge upward.
pub fn detect_transparent_bottom_strip_height(img: &RgbaImage) -> u32 {
    let (width, height) = img.dimensions();
    (0..height)
        .rev()
        .take_while(|&y| (0..width).all(|x| img.get_pixel(x, y)[3] == 0))
        .count() as u32
}

/// Copy `[width - strip_width, width) × [0, height)` from `src` into `dst`.
///
/// No-op when `strip_width` is 0.
pub fn restore_right_strip(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    width: u32,
    height: u32,
    strip_width: u32,
) {
    if strip_width == 0 {
        return;
    }
    let strip_width = strip_width.min(width);
    let x = width - strip_width;
    copy_rect(src, dst, (x, 0), (x, 0), strip_width, height);
}

/// Copy `[0, width) × [height - strip_height, height)` from `src` into `dst`.
///
/// No-op when `strip_height` is 0.
pub fn restore_bottom_strip(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    width: u32,
    height: u32,
    strip_height: u32,
) {
    if strip_height == 0 {
        return;
    }
    let strip_height = strip_height.min(height);
    let y = height - strip_height;
    copy_rect(src, dst, (0, y), (0, y), width, strip_height);
}

/// A deobfuscated page and the margins that were refilled.
#[derive(Debug)]
pub struct Reassembled {
    pub image: RgbaImage,
    pub right_strip_width: u32,
    pub bottom_strip_height: u32,
}

/// Deobfuscate, then refill the alignment margins from the source.
///
/// Both strips are measured before either is restored: restoring the right
/// strip fills the right end of every bottom row, which would hide the bottom
/// strip from detection.
pub fn reassemble(
    src: &RgbaImage,
    width: u32,
    height: u32,
    restore_right: bool,
    restore_bottom: bool,
) -> Reassembled {
    let mut image = deobfuscate(src, width, height);

    let right = if restore_right {
        detect_transparent_strip_width(&image)
    } else {
        0
    };
    let bottom = if restore_bottom {
        detect_transparent_bottom_strip_height(&image)
    } else {
        0
    };

    restore_right_strip(&mut image, src, width, height, right);
    restore_bottom_strip(&mut image, src, width, height, bottom);

    Reassembled {
        image,
        right_strip_width: right,
        bottom_strip_height: bottom,
    }
}

fn copy_tile(
    src: &RgbaImage,
    dst: &mut RgbaImage,
    grid: &TileGrid,
    (src_col, src_row): (u32, u32),
    (dst_col, dst_row): (u32, u32),
) {
    copy_rect(
        src,
        dst,
        grid.origin(src_col, src_row),
        grid.origin(dst_col, dst_row),
        grid.tile_width,
        grid.tile_height,
    );
}

/// Row-wise block copy, clipped to both buffers.
fn copy_rect(
    src: &RgbaImage,
    dst: &mut RgbaImage,
    (sx, sy): (u32, u32),
    (dx, dy): (u32, u32),
    width: u32,
    height: u32,
) {
    let width = width
        .min(src.width().saturating_sub(sx))
        .min(dst.width().saturating_sub(dx));
    let height = height
        .min(src.height().saturating_sub(sy))
        .min(dst.height().saturating_sub(dy));
    if width == 0 || height == 0 {
        return;
    }

    let src_stride = src.width() as usize * 4;
    let dst_stride = dst.width() as usize * 4;
    let row_bytes = width as usize * 4;
    let src_raw = src.as_raw();
    let dst_raw: &mut [u8] = dst;

    for r in 0..height as usize {
        let s = (sy as usize + r) * src_stride + sx as usize * 4;
        let d = (dy as usize + r) * dst_stride + dx as usize * 4;
        dst_raw[d..d + row_bytes].copy_from_slice(&src_raw[s..s + row_bytes]);
    }
}
