//! Reference-image compositor
//!
//! Fetches the images named by a [`CompositionSpec`], places them with the
//! [`layout`](super::layout) functions and encodes the canvas as PNG.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use super::fetcher::ImageFetcher;
use super::layout::{self, Placement, Size};
use super::run_blocking;
use super::storage::StaticRoot;
use crate::error::{ImageGenError, Result};
use crate::types::{ComposedImage, CompositionSpec, Layout};
use crate::utils::cancel::CancelHandle;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Clone)]
pub struct ImageCompositor {
    fetcher: ImageFetcher,
}

impl ImageCompositor {
    pub fn new(fetcher: ImageFetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &ImageFetcher {
        &self.fetcher
    }

    /// Build the composite described by `spec`.
    pub async fn compose(
        &self,
        spec: &CompositionSpec,
        cancel: &CancelHandle,
    ) -> Result<ComposedImage> {
        let (images, placement) = match spec.layout {
            Layout::PrimaryStrip => {
                let primary_ref = spec.primary.as_deref().ok_or_else(|| {
                    ImageGenError::validation("primary-strip composition requires a primary image")
                })?;
                let primary = self.fetcher.fetch(primary_ref, cancel).await?;
                let secondaries = self.fetch_each(&spec.secondaries, cancel).await?;

                let sizes: Vec<Size> = secondaries.iter().map(size_of).collect();
                let placement = layout::primary_strip(
                    size_of(&primary),
                    &sizes,
                    spec.canvas_max_width,
                    spec.canvas_max_height,
                );
                let mut images = Vec::with_capacity(secondaries.len() + 1);
                images.push(primary);
                images.extend(secondaries);
                (images, placement)
            }
            Layout::UniformRow => {
                let references: Vec<String> = spec
                    .primary
                    .iter()
                    .chain(&spec.secondaries)
                    .cloned()
                    .collect();
                if references.is_empty() {
                    return Err(ImageGenError::validation("no images provided for composition"));
                }
                let images = self.fetch_each(&references, cancel).await?;
                if images.is_empty() {
                    return Err(ImageGenError::validation(
                        "all images failed to load for composition",
                    ));
                }
                let sizes: Vec<Size> = images.iter().map(size_of).collect();
                let placement =
                    layout::uniform_row(&sizes, spec.canvas_max_width, spec.canvas_max_height)?;
                (images, placement)
            }
        };

        run_blocking(move || render(&images, &placement)).await
    }

    /// Compose and write `<root>/images/composed_<uuid>.png`; returns its
    /// `/static/...` reference.
    pub async fn compose_and_save(
        &self,
        spec: &CompositionSpec,
        store: &StaticRoot,
        cancel: &CancelHandle,
    ) -> Result<String> {
        let composed = self.compose(spec, cancel).await?;
        let filename = format!("composed_{}.png", uuid::Uuid::new_v4().simple());
        store.save_image(&filename, &composed.bytes).await
    }

    /// Fetch every reference in order, dropping the ones that fail.
    async fn fetch_each(
        &self,
        references: &[String],
        cancel: &CancelHandle,
    ) -> Result<Vec<DynamicImage>> {
        let mut images = Vec::with_capacity(references.len());
        for reference in references {
            match self.fetcher.fetch(reference, cancel).await {
                Ok(image) => images.push(image),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        target: "pixelrelay::compose",
                        reference = %reference,
                        err = %e,
                        "skipping image that failed to load"
                    );
                }
            }
        }
        Ok(images)
    }
}

fn size_of(image: &DynamicImage) -> Size {
    Size::new(image.width(), image.height())
}

/// Paint `images` into their slots on a white canvas and encode it as PNG.
fn render(images: &[DynamicImage], placement: &Placement) -> Result<ComposedImage> {
    let mut canvas = RgbImage::from_pixel(
        placement.canvas.width,
        placement.canvas.height,
        BACKGROUND,
    );

    for (image, slot) in images.iter().zip(&placement.slots) {
        let rgb = image.to_rgb8();
        let resized = if rgb.dimensions() == (slot.width, slot.height) {
            rgb
        } else {
            imageops::resize(&rgb, slot.width, slot.height, FilterType::Lanczos3)
        };
        imageops::overlay(&mut canvas, &resized, slot.x as i64, slot.y as i64);
    }

    let mut bytes = Cursor::new(Vec::new());
    canvas.write_to(&mut bytes, ImageFormat::Png)?;

    Ok(ComposedImage {
        bytes: bytes.into_inner(),
        width: placement.canvas.width,
        height: placement.canvas.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::layout::Slot;

    #[tokio::test]
    async fn uniform_row_places_primary_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = StaticRoot::new(dir.path());
        let encode = |color: [u8; 3]| {
            let mut out = Cursor::new(Vec::new());
            RgbImage::from_pixel(10, 10, Rgb(color))
                .write_to(&mut out, ImageFormat::Png)
                .unwrap();
            out.into_inner()
        };
        let red = store.save_image("red.png", &encode([255, 0, 0])).await.unwrap();
        let blue = store.save_image("blue.png", &encode([0, 0, 255])).await.unwrap();

        let mut spec = CompositionSpec::uniform_row(vec![blue]);
        spec.primary = Some(red);
        let compositor = ImageCompositor::new(ImageFetcher::new(reqwest::Client::new(), store));
        let composed = compositor.compose(&spec, &CancelHandle::new()).await.unwrap();

        assert_eq!((composed.width, composed.height), (20, 10));
        let decoded = image::load_from_memory(&composed.bytes).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(2, 5), &Rgb([255, 0, 0]));
        assert_eq!(decoded.get_pixel(17, 5), &Rgb([0, 0, 255]));
    }

    #[test]
    fn render_paints_on_white() {
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])));
        let placement = Placement {
            canvas: Size::new(10, 4),
            slots: vec![Slot {
                x: 0,
                y: 0,
                width: 2,
                height: 2,
            }],
        };
        let composed = render(&[red], &placement).unwrap();
        assert_eq!((composed.width, composed.height), (10, 4));

        let decoded = image::load_from_memory(&composed.bytes).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(decoded.get_pixel(9, 3), &BACKGROUND);
    }
}
