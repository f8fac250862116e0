use image::{imageops, RgbImage};
use ndarray::Array4;

/// Channel ordering the model expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TensorLayout {
    /// [1, height, width, 3], as exported from TensorFlow
    #[default]
    Nhwc,
    /// [1, 3, height, width]
    Nchw,
}

/// Preprocessor for converting camera frames to classifier input tensors
pub struct Preprocessor {
    image_size: u32,
    layout: TensorLayout,
}

impl Preprocessor {
    pub fn new(image_size: u32, layout: TensorLayout) -> Self {
        Self { image_size, layout }
    }

    /// Preprocess an RGB frame into a normalized tensor
    ///
    /// Steps:
    /// 1. Crop the largest centered square
    /// 2. Resize to `image_size` x `image_size`
    /// 3. Flip horizontally when `mirrored`
    /// 4. Scale channels to [-1, 1]
    pub fn preprocess(&self, image: &RgbImage, mirrored: bool) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let square = Self::center_square(image);
        let resized = if square.dimensions() != (self.image_size, self.image_size) {
            imageops::resize(
                &square,
                self.image_size,
                self.image_size,
                imageops::FilterType::Triangle,
            )
        } else {
            square
        };
        let oriented = if mirrored {
            imageops::flip_horizontal(&resized)
        } else {
            resized
        };

        let size = self.image_size as usize;
        let mut tensor = match self.layout {
            TensorLayout::Nhwc => Array4::<f32>::zeros((1, size, size, 3)),
            TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, size, size)),
        };

        for (x, y, pixel) in oriented.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let value = pixel[c] as f32 / 127.5 - 1.0;
                match self.layout {
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
                }
            }
        }

        tensor
    }

    fn center_square(image: &RgbImage) -> RgbImage {
        let (width, height) = image.dimensions();
        let side = width.min(height);
        if width == height {
            return image.clone();
        }
        imageops::crop_imm(image, (width - side) / 2, (height - side) / 2, side, side).to_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Left half black, right half white
    fn split_frame(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn nhwc_shape_and_range() {
        let pre = Preprocessor::new(8, TensorLayout::Nhwc);
        let tensor = pre.preprocess(&split_frame(32, 16), false);

        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);
        assert!(tensor.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert_eq!(tensor[[0, 4, 0, 0]], -1.0);
        assert_eq!(tensor[[0, 4, 7, 0]], 1.0);
    }

    #[test]
    fn mirroring_swaps_sides() {
        let pre = Preprocessor::new(8, TensorLayout::Nchw);
        let tensor = pre.preprocess(&split_frame(8, 8), true);

        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
        assert_eq!(tensor[[0, 1, 3, 0]], 1.0);
        assert_eq!(tensor[[0, 1, 3, 7]], -1.0);
    }
}
