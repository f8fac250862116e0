use super::ModelError;
use serde::Deserialize;
use std::io::Read;

/// Versioned location the classifier is published to
pub const DEFAULT_MODEL_BASE: &str = "https://teachablemachine.withgoogle.com/models/imWRuzxjk/";

const MODEL_FILE: &str = "model.onnx";
const METADATA_FILE: &str = "metadata.json";

/// Upper bound on a downloaded model
const MAX_DOWNLOAD_BYTES: u64 = 256 * 1024 * 1024;

/// Where the model graph and its class metadata live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    pub model_url: String,
    pub metadata_url: String,
}

impl ModelSource {
    pub fn new(model_url: impl Into<String>, metadata_url: impl Into<String>) -> Self {
        Self {
            model_url: model_url.into(),
            metadata_url: metadata_url.into(),
        }
    }

    /// Both resources side by side under a URL or directory
    pub fn from_base(base: &str) -> Self {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{}/", base)
        };
        Self::new(format!("{}{}", base, MODEL_FILE), format!("{}{}", base, METADATA_FILE))
    }
}

/// Class metadata published next to the model
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub labels: Vec<String>,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    #[serde(default)]
    pub model_name: Option<String>,
}

fn default_image_size() -> u32 {
    224
}

impl ModelMetadata {
    pub fn parse(bytes: &[u8]) -> Result<Self, ModelError> {
        let metadata: ModelMetadata = serde_json::from_slice(bytes)
            .map_err(|e| ModelError::Malformed(format!("invalid metadata: {}", e)))?;

        if metadata.labels.is_empty() {
            return Err(ModelError::Malformed("metadata lists no labels".to_string()));
        }
        if metadata.image_size == 0 {
            return Err(ModelError::Malformed("metadata image size is zero".to_string()));
        }
        Ok(metadata)
    }
}

/// Read a resource over HTTP(S) or from the local filesystem
pub fn fetch(location: &str) -> Result<Vec<u8>, ModelError> {
    let _span = tracing::debug_span!("fetch", location).entered();

    let bytes = if location.starts_with("http://") || location.starts_with("https://") {
        let response = ureq::get(location).call().map_err(|e| ModelError::Network {
            url: location.to_string(),
            reason: e.to_string(),
        })?;
        read_limited(response.into_reader(), MAX_DOWNLOAD_BYTES, location)?
    } else {
        let file = std::fs::File::open(location).map_err(|e| ModelError::Network {
            url: location.to_string(),
            reason: e.to_string(),
        })?;
        read_limited(file, MAX_DOWNLOAD_BYTES, location)?
    };

    tracing::debug!("Read {} bytes", bytes.len());
    Ok(bytes)
}

/// Read everything from `reader`, failing rather than truncating past `limit`
fn read_limited(reader: impl Read, limit: u64, location: &str) -> Result<Vec<u8>, ModelError> {
    let network_error = |reason: String| ModelError::Network {
        url: location.to_string(),
        reason,
    };

    let mut bytes = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| network_error(e.to_string()))?;

    if bytes.len() as u64 > limit {
        return Err(network_error(format!("resource exceeds the {} byte limit", limit)));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_gets_trailing_slash() {
        let source = ModelSource::from_base("https://models.example/cats");
        assert_eq!(source.model_url, "https://models.example/cats/model.onnx");
        assert_eq!(source.metadata_url, "https://models.example/cats/metadata.json");
        assert_eq!(
            ModelSource::from_base("models/").metadata_url,
            "models/metadata.json"
        );
    }

    #[test]
    fn metadata_reads_labels_and_size() {
        let json = br#"{
            "tfjsVersion": "1.3.1",
            "modelName": "tm-my-image-model",
            "labels": ["Cat", "Dog"],
            "imageSize": 224
        }"#;
        let metadata = ModelMetadata::parse(json).unwrap();
        assert_eq!(metadata.labels, ["Cat", "Dog"]);
        assert_eq!(metadata.image_size, 224);
        assert_eq!(metadata.model_name.as_deref(), Some("tm-my-image-model"));
    }

    #[test]
    fn metadata_defaults_image_size() {
        let metadata = ModelMetadata::parse(br#"{"labels": ["a"]}"#).unwrap();
        assert_eq!(metadata.image_size, 224);
    }

    #[test]
    fn bad_metadata_is_malformed() {
        assert!(matches!(ModelMetadata::parse(b"not json"), Err(ModelError::Malformed(_))));
        assert!(matches!(
            ModelMetadata::parse(br#"{"labels": []}"#),
            Err(ModelError::Malformed(_))
        ));
    }

    #[test]
    fn oversized_resource_is_rejected() {
        let result = read_limited(std::io::Cursor::new(vec![0u8; 17]), 16, "big.onnx");
        match result {
            Err(ModelError::Network { url, reason }) => {
                assert_eq!(url, "big.onnx");
                assert!(reason.contains("exceeds"));
            }
            other => panic!("expected network error, got {:?}", other),
        }

        let exact = read_limited(std::io::Cursor::new(vec![7u8; 16]), 16, "fits.onnx").unwrap();
        assert_eq!(exact.len(), 16);
    }

    #[test]
    fn missing_file_is_network_error() {
        let result = fetch("/nonexistent/camclassify/metadata.json");
        assert!(matches!(result, Err(ModelError::Network { .. })));
    }
}
