//! Canvas placement math
//!
//! Pure functions from input dimensions to placement rectangles. Nothing here
//! touches pixels or codecs.

use crate::error::{ImageGenError, Result};

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Where one (resized) input lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Slot {
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Canvas size plus one slot per input, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub canvas: Size,
    pub slots: Vec<Slot>,
}

/// Height share of the primary image in the primary-strip layout, in tenths.
const PRIMARY_TENTHS: u32 = 7;
/// Height share of the secondary strip (also the uniform-row target), in tenths.
const STRIP_TENTHS: u32 = 3;
/// Uniform-row target height when the canvas is too short for the strip share.
const MIN_ROW_HEIGHT: u32 = 256;

/// `floor(value * num / den)`, at least 1.
fn scale(value: u32, num: u32, den: u32) -> u32 {
    ((value as u64 * num as u64 / den as u64) as u32).max(1)
}

/// Scale `size` down (never up) so it fits in `bounds`, keeping aspect ratio.
pub fn fit_within(size: Size, bounds: Size) -> Size {
    if size.width == 0 || size.height == 0 {
        return size;
    }
    // ratio = min(bw / w, bh / h), kept as an exact fraction
    let width_limited = bounds.width as u64 * size.height as u64
        <= bounds.height as u64 * size.width as u64;
    let (num, den) = if width_limited {
        (bounds.width, size.width)
    } else {
        (bounds.height, size.height)
    };
    if num < den {
        Size::new(scale(size.width, num, den), scale(size.height, num, den))
    } else {
        size
    }
}

/// Primary on top, secondaries in an equal-width strip beneath it.
///
/// Slot 0 is the primary. With no secondaries the canvas is just the primary
/// fitted to the full box.
pub fn primary_strip(
    primary: Size,
    secondaries: &[Size],
    max_width: u32,
    max_height: u32,
) -> Placement {
    if secondaries.is_empty() {
        let fitted = fit_within(primary, Size::new(max_width, max_height));
        return Placement {
            canvas: fitted,
            slots: vec![Slot {
                x: 0,
                y: 0,
                width: fitted.width,
                height: fitted.height,
            }],
        };
    }

    let main_height = max_height * PRIMARY_TENTHS / 10;
    let strip_height = max_height * STRIP_TENTHS / 10;

    let main = fit_within(primary, Size::new(max_width, main_height));
    let mut slots = Vec::with_capacity(secondaries.len() + 1);
    slots.push(Slot {
        x: max_width.saturating_sub(main.width) / 2,
        y: 0,
        width: main.width,
        height: main.height,
    });

    let cell_width = max_width / secondaries.len() as u32;
    for (i, secondary) in secondaries.iter().enumerate() {
        let fitted = fit_within(*secondary, Size::new(cell_width, strip_height));
        let cell_x = cell_width * i as u32;
        slots.push(Slot {
            x: cell_x + cell_width.saturating_sub(fitted.width) / 2,
            y: main.height + strip_height.saturating_sub(fitted.height) / 2,
            width: fitted.width,
            height: fitted.height,
        });
    }

    Placement {
        canvas: Size::new(max_width, main.height + strip_height),
        slots,
    }
}

/// All images side by side at a common (scaled-down) height.
pub fn uniform_row(images: &[Size], max_width: u32, max_height: u32) -> Result<Placement> {
    if images.is_empty() {
        return Err(ImageGenError::validation("no images to compose"));
    }

    let mut target = max_height * STRIP_TENTHS / 10;
    if target == 0 {
        target = max_height.min(MIN_ROW_HEIGHT);
    }

    let mut sizes: Vec<Size> = images
        .iter()
        .map(|image| {
            if image.height == 0 {
                return *image;
            }
            if target < image.height {
                Size::new(scale(image.width, target, image.height), target)
            } else {
                *image
            }
        })
        .collect();

    let total: u64 = sizes.iter().map(|s| s.width as u64).sum();
    if total > max_width as u64 {
        let total = u32::try_from(total).unwrap_or(u32::MAX);
        for size in &mut sizes {
            *size = Size::new(
                scale(size.width, max_width, total),
                scale(size.height, max_width, total),
            );
        }
    }

    let height = sizes.iter().map(|s| s.height).max().unwrap_or(0);
    let mut x = 0;
    let slots = sizes
        .iter()
        .map(|size| {
            let slot = Slot {
                x,
                y: (height - size.height) / 2,
                width: size.width,
                height: size.height,
            };
            x += size.width;
            slot
        })
        .collect();

    Ok(Placement {
        canvas: Size::new(x, height),
        slots,
    })
}
