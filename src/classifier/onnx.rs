use super::preprocess::{Preprocessor, TensorLayout};
use super::source::{fetch, ModelMetadata, ModelSource};
use super::{ImageClassifier, ModelError, PredictionSet};
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::fmt::Display;

/// Image classifier backed by an ONNX export of a Teachable Machine model
///
/// The graph takes one image tensor and returns one softmax score per label
/// listed in the metadata.
pub struct OnnxClassifier {
    session: Session,
    preprocessor: Preprocessor,
    labels: Vec<String>,
}

fn malformed<E: Display>(err: E) -> ModelError {
    ModelError::Malformed(err.to_string())
}

fn inference<E: Display>(err: E) -> ModelError {
    ModelError::Inference(err.to_string())
}

impl OnnxClassifier {
    /// Fetch metadata and graph, then build the inference session
    pub fn from_source(source: &ModelSource, layout: TensorLayout) -> Result<Self, ModelError> {
        tracing::info!("Loading model metadata from {}", source.metadata_url);
        let metadata = ModelMetadata::parse(&fetch(&source.metadata_url)?)?;

        tracing::info!("Loading model from {}", source.model_url);
        let model_bytes = fetch(&source.model_url)?;

        let session = Session::builder()
            .map_err(malformed)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(malformed)?
            .with_intra_threads(4)
            .map_err(malformed)?
            .commit_from_memory(&model_bytes)
            .map_err(malformed)?;

        tracing::info!(
            "Model {} loaded: {} classes, {}px input",
            metadata.model_name.as_deref().unwrap_or("<unnamed>"),
            metadata.labels.len(),
            metadata.image_size
        );

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(metadata.image_size, layout),
            labels: metadata.labels,
        })
    }
}

impl ImageClassifier for OnnxClassifier {
    fn total_classes(&self) -> usize {
        self.labels.len()
    }

    fn predict(&mut self, frame: &RgbImage, mirrored: bool) -> Result<PredictionSet, ModelError> {
        let _span = tracing::debug_span!("onnx_predict").entered();

        let input = self.preprocessor.preprocess(frame, mirrored);
        let tensor = Tensor::from_array(input).map_err(inference)?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(inference)?;
        drop(_infer_span);

        let (_, scores) = outputs[0].try_extract_tensor::<f32>().map_err(inference)?;
        PredictionSet::from_probabilities(&self.labels, scores)
    }
}
