//! The translation run payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::fingerprint::{fingerprint, Fingerprint};

/// One source/target pair, optionally with a reference translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub src: String,
    pub tgt: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Segment {
    pub fn new(src: impl Into<String>, tgt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            tgt: tgt.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// A machine-translation evaluation run, delivered as a single unit.
///
/// The JSON shape matches the evaluation service's ingestion schema, so a run
/// file produced by an evaluation pipeline deserializes directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub namespace_name: String,
    pub dataset_name: String,
    pub dataset_source_lang: String,
    pub dataset_target_lang: String,
    pub segments: Vec<Segment>,
    /// Client-side submission id. Not part of the fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Free-form run configuration (model name, decoding params, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

/// A run that cannot be submitted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRun {
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
    #[error("run has no segments")]
    NoSegments,
}

impl Run {
    pub fn new(
        namespace_name: impl Into<String>,
        dataset_name: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        segments: Vec<Segment>,
    ) -> Self {
        Self {
            namespace_name: namespace_name.into(),
            dataset_name: dataset_name.into(),
            dataset_source_lang: source_lang.into(),
            dataset_target_lang: target_lang.into(),
            segments,
            uuid: None,
            config: Map::new(),
        }
    }

    /// Content fingerprint of this run.
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(self)
    }

    /// Copy of this run carrying `uuid`, unless it already has one.
    pub fn with_uuid_if_missing(&self, uuid: &str) -> Run {
        let mut run = self.clone();
        if run.uuid.is_none() {
            run.uuid = Some(uuid.to_string());
        }
        run
    }

    /// Check the fields the service routes on before any delivery is attempted.
    pub fn validate(&self) -> Result<(), InvalidRun> {
        let required = [
            ("namespace_name", &self.namespace_name),
            ("dataset_name", &self.dataset_name),
            ("dataset_source_lang", &self.dataset_source_lang),
            ("dataset_target_lang", &self.dataset_target_lang),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(InvalidRun::EmptyField(name));
            }
        }
        if self.segments.is_empty() {
            return Err(InvalidRun::NoSegments);
        }
        Ok(())
    }
}
