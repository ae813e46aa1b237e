//! SpimData (BigDataViewer XML) dataset descriptor.
//!
//! Only the parts the importer needs are read: ordered view setups, ordered
//! timepoints and the view-registration table. The descriptor is treated as
//! immutable for the duration of an import.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::error::ImportError;
use crate::transform::{AffineTransform3D, TransformProvider};

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// One acquisition geometry of the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSetup {
    /// Setup id, as referenced by the registration table
    pub id: u32,

    /// Optional human-readable name
    pub name: Option<String>,

    /// Angle attribute id, when the setup declares one
    pub angle: Option<String>,
}

impl ViewSetup {
    /// Label used when listing setups: the angle if present, else the id.
    pub fn label(&self) -> String {
        match &self.angle {
            Some(angle) => format!("angle {}", angle),
            None => format!("angle {}", self.id),
        }
    }
}

/// Errors raised while loading a dataset descriptor.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Cannot read dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed dataset XML: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Invalid dataset content: {0}")]
    Invalid(String),
}

/// Parsed dataset descriptor.
#[derive(Debug, Clone, Default)]
pub struct SpimDataset {
    setups: Vec<ViewSetup>,
    timepoints: Vec<i64>,
    registrations: BTreeMap<(i64, u32), AffineTransform3D>,
}

// ============================================================================
// XML MAPPING
// ============================================================================

#[derive(Debug, Deserialize)]
struct XmlSpimData {
    #[serde(rename = "SequenceDescription")]
    sequence: XmlSequenceDescription,

    #[serde(rename = "ViewRegistrations", default)]
    registrations: Option<XmlViewRegistrations>,
}

#[derive(Debug, Deserialize)]
struct XmlSequenceDescription {
    #[serde(rename = "ViewSetups")]
    view_setups: XmlViewSetups,

    #[serde(rename = "Timepoints")]
    timepoints: XmlTimepoints,
}

#[derive(Debug, Deserialize)]
struct XmlViewSetups {
    #[serde(rename = "ViewSetup", default)]
    setups: Vec<XmlViewSetup>,
}

#[derive(Debug, Deserialize)]
struct XmlViewSetup {
    id: String,

    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    attributes: Option<XmlSetupAttributes>,
}

#[derive(Debug, Deserialize)]
struct XmlSetupAttributes {
    #[serde(default)]
    angle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlTimepoints {
    #[serde(rename = "@type", default)]
    kind: Option<String>,

    #[serde(default)]
    first: Option<String>,

    #[serde(default)]
    last: Option<String>,

    #[serde(default)]
    integerpattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlViewRegistrations {
    #[serde(rename = "ViewRegistration", default)]
    entries: Vec<XmlViewRegistration>,
}

#[derive(Debug, Deserialize)]
struct XmlViewRegistration {
    #[serde(rename = "@timepoint")]
    timepoint: String,

    #[serde(rename = "@setup")]
    setup: String,

    #[serde(rename = "ViewTransform", default)]
    transforms: Vec<XmlViewTransform>,
}

#[derive(Debug, Deserialize)]
struct XmlViewTransform {
    #[serde(default)]
    affine: Option<String>,
}

// ============================================================================
// LOADING
// ============================================================================

impl SpimDataset {
    /// Load a descriptor from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_xml(&text)
    }

    /// Parse a descriptor from XML text.
    pub fn from_xml(text: &str) -> Result<Self, DatasetError> {
        let raw: XmlSpimData = quick_xml::de::from_str(text)?;

        let mut setups = Vec::with_capacity(raw.sequence.view_setups.setups.len());
        for setup in raw.sequence.view_setups.setups {
            let id = parse_integer(&setup.id, "ViewSetup id")?;
            let id = u32::try_from(id)
                .map_err(|_| DatasetError::Invalid(format!("ViewSetup id {} out of range", id)))?;
            setups.push(ViewSetup {
                id,
                name: setup.name.map(|n| n.trim().to_string()),
                angle: setup
                    .attributes
                    .and_then(|a| a.angle)
                    .map(|a| a.trim().to_string()),
            });
        }

        let timepoints = parse_timepoints(&raw.sequence.timepoints)?;

        let mut registrations = BTreeMap::new();
        for entry in raw.registrations.map(|r| r.entries).unwrap_or_default() {
            let timepoint = parse_integer(&entry.timepoint, "ViewRegistration timepoint")?;
            let setup = parse_integer(&entry.setup, "ViewRegistration setup")?;
            let setup = u32::try_from(setup)
                .map_err(|_| DatasetError::Invalid(format!("setup {} out of range", setup)))?;

            // First listed transform is applied last.
            let mut model = AffineTransform3D::identity();
            for transform in &entry.transforms {
                let values = transform.affine.as_deref().ok_or_else(|| {
                    DatasetError::Invalid(format!(
                        "ViewTransform without affine for timepoint {} setup {}",
                        timepoint, setup
                    ))
                })?;
                model = model.concatenate(&parse_affine(values)?);
            }
            registrations.insert((timepoint, setup), model);
        }

        Ok(Self {
            setups,
            timepoints,
            registrations,
        })
    }

    /// Programmatic constructor, mostly for tests and embedding.
    pub fn from_parts(
        setups: Vec<ViewSetup>,
        timepoints: Vec<i64>,
        registrations: BTreeMap<(i64, u32), AffineTransform3D>,
    ) -> Self {
        Self {
            setups,
            timepoints,
            registrations,
        }
    }

    /// View setups in document order.
    pub fn view_setups(&self) -> &[ViewSetup] {
        &self.setups
    }

    /// Timepoint ids in sequence order; frame `t` is `timepoints()[t]`.
    pub fn timepoints(&self) -> &[i64] {
        &self.timepoints
    }

    /// Registration for a timepoint id and setup, if present.
    pub fn registration(&self, timepoint: i64, setup: u32) -> Option<&AffineTransform3D> {
        self.registrations.get(&(timepoint, setup))
    }
}

impl TransformProvider for SpimDataset {
    fn num_frames(&self) -> usize {
        self.timepoints.len()
    }

    fn transform_for(&self, view_setup_id: u32, frame: usize) -> Result<AffineTransform3D, ImportError> {
        self.timepoints
            .get(frame)
            .and_then(|&tp| self.registration(tp, view_setup_id))
            .copied()
            .ok_or(ImportError::MissingRegistration {
                view_setup: view_setup_id,
                frame,
            })
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn parse_integer(text: &str, what: &str) -> Result<i64, DatasetError> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| DatasetError::Invalid(format!("{} is not an integer: {:?}", what, text)))
}

fn parse_affine(text: &str) -> Result<AffineTransform3D, DatasetError> {
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|v| v.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| DatasetError::Invalid(format!("bad affine value: {}", e)))?;
    AffineTransform3D::from_row_major(&values).ok_or_else(|| {
        DatasetError::Invalid(format!("affine needs 12 finite values, got {}", values.len()))
    })
}

fn parse_timepoints(raw: &XmlTimepoints) -> Result<Vec<i64>, DatasetError> {
    match raw.kind.as_deref().unwrap_or("range") {
        "range" => {
            let first = raw
                .first
                .as_deref()
                .ok_or_else(|| DatasetError::Invalid("range Timepoints without <first>".into()))?;
            let last = raw
                .last
                .as_deref()
                .ok_or_else(|| DatasetError::Invalid("range Timepoints without <last>".into()))?;
            let first = parse_integer(first, "first timepoint")?;
            let last = parse_integer(last, "last timepoint")?;
            let mut values = Vec::new();
            push_span(&mut values, first, last, 1)?;
            Ok(values)
        }
        "list" | "pattern" => {
            let pattern = raw.integerpattern.as_deref().ok_or_else(|| {
                DatasetError::Invalid("Timepoints without <integerpattern>".into())
            })?;
            parse_integer_pattern(pattern)
        }
        other => Err(DatasetError::Invalid(format!("unknown Timepoints type {:?}", other))),
    }
}

/// Upper bound on the number of timepoints a descriptor may declare.
pub const MAX_TIMEPOINTS: usize = 1_000_000;

/// Append `from, from + step, ..` up to `to` inclusive, within [`MAX_TIMEPOINTS`].
fn push_span(values: &mut Vec<i64>, from: i64, to: i64, step: i64) -> Result<(), DatasetError> {
    if from > to {
        return Ok(());
    }
    let count = (i128::from(to) - i128::from(from)) / i128::from(step) + 1;
    if count > (MAX_TIMEPOINTS - values.len()) as i128 {
        return Err(DatasetError::Invalid(format!(
            "timepoints {}..={} exceed the limit of {}",
            from, to, MAX_TIMEPOINTS
        )));
    }
    let mut v = Some(from);
    while let Some(value) = v.filter(|&value| value <= to) {
        values.push(value);
        v = value.checked_add(step);
    }
    Ok(())
}

/// Parse `0, 2, 5-9, 10-20:5` into an ordered list of integers.
pub fn parse_integer_pattern(pattern: &str) -> Result<Vec<i64>, DatasetError> {
    let mut values = Vec::new();
    for token in pattern.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (span, step) = match token.split_once(':') {
            Some((span, step)) => (span, parse_integer(step, "pattern step")?),
            None => (token, 1),
        };
        if step <= 0 || span.is_empty() {
            return Err(DatasetError::Invalid(format!("bad pattern token {:?}", token)));
        }
        // A leading '-' belongs to the first number, not the range separator.
        let separator = span
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '-')
            .map(|(i, _)| i);
        match separator {
            Some(split) => {
                let from = parse_integer(&span[..split], "pattern start")?;
                let to = parse_integer(&span[split + 1..], "pattern end")?;
                push_span(&mut values, from, to, step)?;
            }
            None => {
                let value = parse_integer(span, "pattern value")?;
                push_span(&mut values, value, value, 1)?;
            }
        }
    }
    Ok(values)
}
