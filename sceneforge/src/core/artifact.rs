//! Generated artifacts and their wire representations.
//!
//! Everything here is request-scoped: artifacts are created during one run,
//! referenced by downstream stages of the same run, and dropped with it.
//! Serde renames keep the serialized shape compatible with the camelCase
//! JSON the existing clients already parse.

use crate::core::ObjectId;
use crate::errors::PayloadError;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// A binary image payload plus its MIME type.
///
/// Serialized as base64 text; the remote services exchange the same bytes
/// as `data:` URIs, so conversions both ways are provided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    /// Raw image bytes.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// MIME type of `data`.
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

fn default_mime_type() -> String {
    "image/png".to_string()
}

impl ImagePayload {
    /// Creates a payload with an explicit MIME type.
    #[must_use]
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Creates a PNG payload.
    #[must_use]
    pub fn png(data: Vec<u8>) -> Self {
        Self::new(data, "image/png")
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Encodes the payload as a `data:` URI.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    /// Decodes a payload from a `data:` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self, PayloadError> {
        let rest = uri.strip_prefix("data:").ok_or(PayloadError::NotADataUri)?;
        let (mime_type, encoded) = rest
            .split_once(";base64,")
            .ok_or(PayloadError::NotADataUri)?;
        let data = STANDARD.decode(encoded)?;
        Ok(Self::new(data, mime_type))
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// One generation prompt for one identified object. Immutable after
/// analysis produces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPrompt {
    /// Simple identifier for the object ("dog", "lamp").
    pub object_name: String,
    /// Full descriptive prompt handed to the image model.
    pub prompt: String,
}

/// The structured result of analyzing one photo.
///
/// The field shape matches the JSON contract the analysis model is asked to
/// produce, so responses deserialize straight into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneAnalysis {
    /// One or two sentences describing the original photo.
    pub scene_overview: String,
    /// Names of the identified subjects.
    #[serde(default)]
    pub identified_objects: Vec<String>,
    /// One generation prompt per identified subject, in a stable order that
    /// downstream identity assignment relies on.
    #[serde(default)]
    pub generation_prompts: Vec<GenerationPrompt>,
}

/// A generated still image for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Correlation key shared with this object's prompt and mesh.
    pub id: ObjectId,
    /// The object's name from analysis.
    pub object_name: String,
    /// The generated image.
    pub image: ImagePayload,
    /// The prompt that produced it.
    pub prompt: String,
}

/// A generated 3D-printable mesh for one object.
///
/// Depends on exactly one [`GeneratedImage`] with the same id; the source
/// image rides along so a viewer can show both without a second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMesh {
    /// Correlation key shared with this object's prompt and image.
    pub id: ObjectId,
    /// The object's name from analysis.
    pub object_name: String,
    /// Location of the mesh asset.
    pub mesh_url: String,
    /// The image the mesh was generated from.
    pub image: ImagePayload,
}

/// A caption suggestion for a captured photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Short, catchy hook (6-7 words).
    pub fun_hook: String,
    /// Longer description (2-4 sentences).
    pub detailed_description: String,
    /// Whether the model flagged this as the most interesting option.
    pub is_recommended: bool,
}
