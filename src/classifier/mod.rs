mod onnx;
mod preprocess;
mod source;

pub use onnx::OnnxClassifier;
pub use preprocess::TensorLayout;
pub use source::{ModelSource, DEFAULT_MODEL_BASE};

use image::RgbImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("malformed model: {0}")]
    Malformed(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Probability assigned to one class
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_name: String,
    pub probability: f32,
}

/// Full per-class output of one inference, in model class order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionSet {
    predictions: Vec<Prediction>,
}

impl PredictionSet {
    /// Pair raw model output with class labels.
    ///
    /// One probability per label is required; values are clamped to [0, 1].
    pub fn from_probabilities(labels: &[String], probabilities: &[f32]) -> Result<Self, ModelError> {
        if labels.len() != probabilities.len() {
            return Err(ModelError::Malformed(format!(
                "model produced {} scores for {} classes",
                probabilities.len(),
                labels.len()
            )));
        }

        let predictions = labels
            .iter()
            .zip(probabilities)
            .map(|(label, &p)| Prediction {
                class_name: label.clone(),
                probability: if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) },
            })
            .collect();

        Ok(Self { predictions })
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Prediction> {
        self.predictions.iter()
    }
}

impl From<Vec<Prediction>> for PredictionSet {
    fn from(predictions: Vec<Prediction>) -> Self {
        Self { predictions }
    }
}

/// Trait for image classification models
pub trait ImageClassifier {
    /// Number of classes every prediction covers
    fn total_classes(&self) -> usize;

    /// Classify a frame
    ///
    /// `mirrored` must be set when the frame is shown flipped to the user,
    /// so the model sees the same orientation.
    fn predict(&mut self, frame: &RgbImage, mirrored: bool) -> Result<PredictionSet, ModelError>;
}

/// Trait for loading a classifier from its hosted resources
pub trait ModelLoader {
    fn load(&self, source: &ModelSource) -> Result<Box<dyn ImageClassifier>, ModelError>;
}

/// Loads ONNX exports with the given input layout
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxLoader {
    layout: TensorLayout,
}

impl OnnxLoader {
    pub fn new(layout: TensorLayout) -> Self {
        Self { layout }
    }
}

impl ModelLoader for OnnxLoader {
    fn load(&self, source: &ModelSource) -> Result<Box<dyn ImageClassifier>, ModelError> {
        let model = OnnxClassifier::from_source(source, self.layout)?;
        Ok(Box::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prediction_set_follows_label_order() {
        let set = PredictionSet::from_probabilities(&labels(&["Cat", "Dog"]), &[0.92, 0.08]).unwrap();
        assert_eq!(set.len(), 2);
        let names: Vec<_> = set.iter().map(|p| p.class_name.as_str()).collect();
        assert_eq!(names, ["Cat", "Dog"]);
    }

    #[test]
    fn length_mismatch_is_malformed() {
        let result = PredictionSet::from_probabilities(&labels(&["Cat", "Dog"]), &[1.0]);
        assert!(matches!(result, Err(ModelError::Malformed(_))));
    }

    #[test]
    fn probabilities_are_clamped() {
        let set =
            PredictionSet::from_probabilities(&labels(&["a", "b", "c"]), &[1.5, -0.1, f32::NAN])
                .unwrap();
        let probs: Vec<f32> = set.iter().map(|p| p.probability).collect();
        assert_eq!(probs, [1.0, 0.0, 0.0]);
    }
}
