use super::{display_lines, PredictionSink};
use crate::capture::CameraDevice;
use crate::classifier::PredictionSet;
use std::io::{self, Stdout, Write};

/// Prints camera options and confident predictions to a terminal
///
/// Output is only written when it changes, so a steady scene does not
/// flood the terminal at refresh rate.
pub struct ConsolePresenter<W: Write = Stdout> {
    threshold: f32,
    shown_lines: Vec<String>,
    shown_options: Vec<String>,
    out: W,
}

impl ConsolePresenter {
    pub fn new(threshold: f32) -> Self {
        Self::with_writer(threshold, io::stdout())
    }
}

impl<W: Write> ConsolePresenter<W> {
    pub fn with_writer(threshold: f32, out: W) -> Self {
        Self {
            threshold,
            shown_lines: Vec::new(),
            shown_options: Vec::new(),
            out,
        }
    }

    fn write_lines(&mut self, lines: &[String]) {
        let result = lines
            .iter()
            .try_for_each(|line| writeln!(self.out, "{}", line))
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            tracing::warn!("Failed to write to console: {}", e);
        }
    }
}

impl<W: Write> PredictionSink for ConsolePresenter<W> {
    fn show_camera_options(&mut self, options: &[CameraDevice]) {
        let labels: Vec<String> = options.iter().map(|d| d.label.clone()).collect();
        if labels == self.shown_options {
            return;
        }

        if labels.is_empty() {
            tracing::info!("No camera options available");
        } else {
            let mut out = vec!["Cameras:".to_string()];
            out.extend(labels.iter().map(|label| format!("  {}", label)));
            self.write_lines(&out);
        }
        self.shown_options = labels;
    }

    fn show_predictions(&mut self, predictions: &PredictionSet) {
        let lines = display_lines(predictions, self.threshold);
        if lines == self.shown_lines {
            return;
        }

        let out: Vec<String> = if lines.is_empty() {
            // otherwise the last confident line would look current
            vec![format!("Prediction: none above {:.0}%", self.threshold * 100.0)]
        } else {
            lines.iter().map(|line| format!("Prediction: {}", line)).collect()
        };
        self.write_lines(&out);
        self.shown_lines = lines;
    }

    fn clear(&mut self) {
        self.shown_lines.clear();
    }
}
