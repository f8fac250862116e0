mod commands;
mod console;

pub use commands::{spawn_command_reader, Command};
pub use console::ConsolePresenter;

use crate::capture::CameraDevice;
use crate::classifier::{Prediction, PredictionSet};

/// Predictions at or below this probability are not shown
pub const DISPLAY_THRESHOLD: f32 = 0.8;

/// Trait for whatever shows loop output to the user
pub trait PredictionSink {
    /// Camera choices, available once permission has been granted
    fn show_camera_options(&mut self, options: &[CameraDevice]);

    /// Output of one inference cycle
    fn show_predictions(&mut self, predictions: &PredictionSet);

    /// No session is active any more
    fn clear(&mut self);
}

/// Predictions strictly above `threshold`, in class order
pub fn visible_predictions(
    predictions: &PredictionSet,
    threshold: f32,
) -> impl Iterator<Item = &Prediction> {
    predictions.iter().filter(move |p| p.probability > threshold)
}

pub fn format_prediction(prediction: &Prediction) -> String {
    format!(
        "{} — {:.2}%",
        prediction.class_name,
        prediction.probability * 100.0
    )
}

pub fn display_lines(predictions: &PredictionSet, threshold: f32) -> Vec<String> {
    visible_predictions(predictions, threshold)
        .map(format_prediction)
        .collect()
}
