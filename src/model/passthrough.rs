//! Identity classifier for inputs that already are response maps.

use crate::image::{ImageView, OwnedImage, ResponseMap};
use crate::model::{ClassifierError, TileClassifier};

/// Uses tile intensities directly as the response (`u8` -> `f32`, unscaled).
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughClassifier;

impl TileClassifier for PassthroughClassifier {
    fn classify(&self, tile: ImageView<'_, u8>) -> Result<ResponseMap, ClassifierError> {
        Ok(OwnedImage::from_view(tile)?.to_response())
    }
}

#[cfg(test)]
mod tests {
    use super::PassthroughClassifier;
    use crate::image::ImageView;
    use crate::model::TileClassifier;

    #[test]
    fn response_is_not_rescaled() {
        let data = [0u8, 1, 200, 255];
        let tile = ImageView::from_slice(&data, 2, 2).unwrap();
        let response = PassthroughClassifier.classify(tile).unwrap();
        assert_eq!(response.data(), &[0.0, 1.0, 200.0, 255.0]);
        assert_eq!((response.width(), response.height()), (2, 2));
    }
}
