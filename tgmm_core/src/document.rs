//! Frame document parsing.
//!
//! TGMM writes one XML document per timepoint. Each Gaussian of the mixture
//! is a `<GaussianMixtureModel …/>` element whose fields are attributes;
//! vectors and matrices are whitespace-separated numbers:
//!
//! ```text
//! <document>
//!   <GaussianMixtureModel id="0" lineage="0" parent="-1" splitScore="3"
//!       nu="128" m="10.5 22.1 14" W="0.02 0 0 0 0.02 0 0 0 0.05" />
//! </document>
//! ```
//!
//! Only `id`, `m`, `W`, `nu`, `parent` and `splitScore` are read; the other
//! attributes TGMM emits (`lineage`, `scale`, `beta`, priors, …) are ignored.

use nalgebra::{Matrix3, Vector3};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{ImportError, ImportWarning};

/// TGMM's own output naming.
pub const DEFAULT_PATTERN: &str = "GMEMfinalResult_frame%04d.xml";

/// Element holding one Gaussian record.
pub const RECORD_ELEMENT: &str = "GaussianMixtureModel";

/// Smallest eigenvalue ratio (min/max) accepted for a precision matrix.
const MIN_CONDITION: f64 = 1e-12;

// ============================================================================
// GAUSSIAN RECORD
// ============================================================================

/// One raw Gaussian, in view-local pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianRecord {
    /// Identifier, unique within its frame
    pub local_id: i64,

    /// Mean μ
    pub mean: Vector3<f64>,

    /// Precision matrix W (inverse covariance), symmetrized
    pub precision: Matrix3<f64>,

    /// Degrees of freedom ν
    pub nu: f64,

    /// Local id of the parent in the previous frame
    pub parent: Option<i64>,

    /// Division score, when TGMM reported one
    pub split_score: Option<f64>,
}

/// Records of one frame plus the record-level warnings met while reading it.
#[derive(Debug, Clone, Default)]
pub struct FrameDocument {
    pub records: Vec<GaussianRecord>,
    pub warnings: Vec<ImportWarning>,
}

// ============================================================================
// FILE NAME PATTERN
// ============================================================================

/// printf-style file name pattern with a single integer substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePattern {
    prefix: String,
    suffix: String,
    width: usize,
    zero_pad: bool,
}

impl Default for FramePattern {
    fn default() -> Self {
        Self {
            prefix: "GMEMfinalResult_frame".to_string(),
            suffix: ".xml".to_string(),
            width: 4,
            zero_pad: true,
        }
    }
}

impl FramePattern {
    /// Parse a pattern such as `GMEMfinalResult_frame%04d.xml`.
    ///
    /// `%%` is a literal percent sign. Exactly one `%d`, `%Nd` or `%0Nd`
    /// must be present.
    pub fn parse(pattern: &str) -> Result<Self, ImportError> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut conversion: Option<(usize, bool)> = None;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                if conversion.is_some() {
                    suffix.push(c);
                } else {
                    prefix.push(c);
                }
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                if conversion.is_some() {
                    suffix.push('%');
                } else {
                    prefix.push('%');
                }
                continue;
            }

            let zero_pad = chars.peek() == Some(&'0');
            if zero_pad {
                chars.next();
            }
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            if chars.next() != Some('d') {
                return Err(ImportError::invalid_config(format!(
                    "pattern {:?}: only integer substitutions (%d, %0Nd) are supported",
                    pattern
                )));
            }
            if conversion.is_some() {
                return Err(ImportError::invalid_config(format!(
                    "pattern {:?} has more than one substitution",
                    pattern
                )));
            }
            let width = if digits.is_empty() {
                0
            } else {
                digits.parse::<usize>().map_err(|e| {
                    ImportError::invalid_config(format!("pattern {:?}: bad width: {}", pattern, e))
                })?
            };
            conversion = Some((width, zero_pad));
        }

        let (width, zero_pad) = conversion.ok_or_else(|| {
            ImportError::invalid_config(format!("pattern {:?} has no integer substitution", pattern))
        })?;
        Ok(Self {
            prefix,
            suffix,
            width,
            zero_pad,
        })
    }

    /// File name for a frame.
    pub fn file_name(&self, frame: usize) -> String {
        if self.zero_pad {
            format!("{}{:0width$}{}", self.prefix, frame, self.suffix, width = self.width)
        } else {
            format!("{}{:width$}{}", self.prefix, frame, self.suffix, width = self.width)
        }
    }

    /// Full path of a frame's document inside `folder`.
    pub fn path_in(&self, folder: &Path, frame: usize) -> PathBuf {
        folder.join(self.file_name(frame))
    }
}

// ============================================================================
// PARSER
// ============================================================================

/// Read and parse one frame document.
///
/// A document that cannot be read or is not well-formed XML yields a single
/// [`ImportWarning::ParseError`] and contributes nothing. Problems confined
/// to one record are collected in [`FrameDocument::warnings`] and only that
/// record is skipped.
pub fn parse_frame_document(path: &Path, frame: usize) -> Result<FrameDocument, ImportWarning> {
    let text = std::fs::read_to_string(path).map_err(|e| ImportWarning::ParseError {
        path: path.to_path_buf(),
        position: 0,
        message: e.to_string(),
    })?;
    parse_frame_str(&text, path, frame)
}

/// Parse a frame document already held in memory. `path` is used for
/// reporting only.
pub fn parse_frame_str(text: &str, path: &Path, frame: usize) -> Result<FrameDocument, ImportWarning> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut document = FrameDocument::default();
    let mut seen_ids = HashSet::new();

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element))
                if element.name().as_ref() == RECORD_ELEMENT.as_bytes() =>
            {
                let record = match parse_record(&element) {
                    Ok(record) => record,
                    Err(message) => {
                        document.warnings.push(ImportWarning::ParseError {
                            path: path.to_path_buf(),
                            position,
                            message,
                        });
                        continue;
                    }
                };

                if !seen_ids.insert(record.local_id) {
                    document.warnings.push(ImportWarning::ParseError {
                        path: path.to_path_buf(),
                        position,
                        message: format!("duplicate id {}", record.local_id),
                    });
                    continue;
                }

                if let Some(reason) = precision_defect(&record.precision, record.nu) {
                    document.warnings.push(ImportWarning::DegenerateRecord {
                        frame,
                        local_id: record.local_id,
                        reason,
                    });
                    continue;
                }

                document.records.push(record);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ImportWarning::ParseError {
                    path: path.to_path_buf(),
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(document)
}

/// Why a precision matrix and ν cannot describe a Gaussian, if they can't.
pub fn precision_defect(precision: &Matrix3<f64>, nu: f64) -> Option<String> {
    if !(nu.is_finite() && nu > 0.0) {
        return Some(format!("nu must be positive, got {}", nu));
    }
    if precision.iter().any(|v| !v.is_finite()) {
        return Some("W has non-finite entries".to_string());
    }

    let eigenvalues = precision.symmetric_eigenvalues();
    let max = eigenvalues.max();
    let min = eigenvalues.min();
    if max <= 0.0 || min <= max * MIN_CONDITION {
        return Some(format!(
            "W is not positive-definite (eigenvalues {:.3e}, {:.3e}, {:.3e})",
            eigenvalues[0], eigenvalues[1], eigenvalues[2]
        ));
    }
    None
}

fn parse_record(element: &BytesStart<'_>) -> Result<GaussianRecord, String> {
    let mut local_id = None;
    let mut mean = None;
    let mut precision = None;
    let mut nu = None;
    let mut parent = None;
    let mut split_score = None;

    for attr in element.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute: {}", e))?;
        let key = attr.key.as_ref();
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad attribute value: {}", e))?;

        match key {
            b"id" => {
                let id = parse_int(&value, "id")?;
                if id < 0 {
                    return Err(format!("negative id {}", id));
                }
                local_id = Some(id);
            }
            b"m" => {
                let v = parse_floats::<3>(&value, "m")?;
                mean = Some(Vector3::new(v[0], v[1], v[2]));
            }
            b"W" => {
                let v = parse_floats::<9>(&value, "W")?;
                let w = Matrix3::from_row_slice(&v);
                precision = Some((w + w.transpose()) * 0.5);
            }
            b"nu" => nu = Some(parse_float(&value, "nu")?),
            b"parent" => {
                let p = parse_int(&value, "parent")?;
                parent = (p >= 0).then_some(p);
            }
            b"splitScore" => split_score = Some(parse_float(&value, "splitScore")?),
            _ => {}
        }
    }

    Ok(GaussianRecord {
        local_id: local_id.ok_or("missing field id")?,
        mean: mean.ok_or("missing field m")?,
        precision: precision.ok_or("missing field W")?,
        nu: nu.ok_or("missing field nu")?,
        parent,
        split_score,
    })
}

fn numbers(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
}

fn parse_float(text: &str, field: &str) -> Result<f64, String> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| format!("field {} is not a number: {:?}", field, text))
}

fn parse_int(text: &str, field: &str) -> Result<i64, String> {
    let text = text.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Ok(v);
    }
    // Some writers emit integral values as "12.0".
    match text.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(v as i64),
        _ => Err(format!("field {} is not an integer: {:?}", field, text)),
    }
}

fn parse_floats<const N: usize>(text: &str, field: &str) -> Result<[f64; N], String> {
    let mut out = [0.0; N];
    let mut count = 0;
    for token in numbers(text) {
        if count == N {
            return Err(format!("field {} has more than {} values", field, N));
        }
        out[count] = parse_float(token, field)?;
        count += 1;
    }
    if count != N {
        return Err(format!("field {} needs {} values, got {}", field, N, count));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> FrameDocument {
        parse_frame_str(text, Path::new("frame.xml"), 0).unwrap()
    }

    #[test]
    fn test_pattern_default_and_width() {
        let pattern = FramePattern::parse(DEFAULT_PATTERN).unwrap();
        assert_eq!(pattern, FramePattern::default());
        assert_eq!(pattern.file_name(7), "GMEMfinalResult_frame0007.xml");
        assert_eq!(pattern.file_name(12345), "GMEMfinalResult_frame12345.xml");

        let plain = FramePattern::parse("t%d.xml").unwrap();
        assert_eq!(plain.file_name(42), "t42.xml");

        let literal = FramePattern::parse("100%%_%03d.xml").unwrap();
        assert_eq!(literal.file_name(5), "100%_005.xml");
    }

    #[test]
    fn test_pattern_rejects_bad_substitutions() {
        assert!(FramePattern::parse("frame.xml").is_err());
        assert!(FramePattern::parse("%d_%d.xml").is_err());
        assert!(FramePattern::parse("%s.xml").is_err());
    }

    #[test]
    fn test_parse_records() {
        let doc = parse(
            r#"<?xml version="1.0"?>
<document>
<GaussianMixtureModel id="0" lineage="0" parent="-1" splitScore="3" scale="1 1 1"
  nu="4" beta="4" alpha="10" m="10 20 30" W="1 0 0 0 1 0 0 0 1" nuPrior="4">
</GaussianMixtureModel>
<GaussianMixtureModel id="1" parent="5" nu="2.5" m="1.5 2.5 3.5" W="2 0 0 0 2 0 0 0 2"/>
</document>"#,
        );
        assert!(doc.warnings.is_empty(), "{:?}", doc.warnings);
        assert_eq!(doc.records.len(), 2);

        let first = &doc.records[0];
        assert_eq!(first.local_id, 0);
        assert_eq!(first.parent, None);
        assert_eq!(first.split_score, Some(3.0));
        assert_eq!(first.mean, Vector3::new(10.0, 20.0, 30.0));
        assert_eq!(first.precision, Matrix3::identity());

        let second = &doc.records[1];
        assert_eq!(second.parent, Some(5));
        assert_eq!(second.split_score, None);
        assert_eq!(second.nu, 2.5);
    }

    #[test]
    fn test_missing_field_skips_record() {
        let doc = parse(
            r#"<document>
<GaussianMixtureModel id="0" nu="4" m="1 2 3"/>
<GaussianMixtureModel id="1" nu="4" m="1 2 3" W="1 0 0 0 1 0 0 0 1"/>
</document>"#,
        );
        assert_eq!(doc.records.len(), 1);
        assert_eq!(doc.warnings.len(), 1);
        match &doc.warnings[0] {
            ImportWarning::ParseError { message, position, .. } => {
                assert!(message.contains("W"));
                assert!(*position > 0);
            }
            other => panic!("expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_arity_and_duplicates() {
        let doc = parse(
            r#"<document>
<GaussianMixtureModel id="0" nu="4" m="1 2" W="1 0 0 0 1 0 0 0 1"/>
<GaussianMixtureModel id="1" nu="4" m="1 2 3" W="1 0 0 0 1 0 0 0 1"/>
<GaussianMixtureModel id="1" nu="4" m="4 5 6" W="1 0 0 0 1 0 0 0 1"/>
</document>"#,
        );
        assert_eq!(doc.records.len(), 1);
        assert_eq!(doc.records[0].mean, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(doc.warnings.len(), 2);
    }

    #[test]
    fn test_degenerate_precision() {
        let doc = parse(
            r#"<document>
<GaussianMixtureModel id="3" nu="4" m="1 2 3" W="1 0 0 0 1 0 0 0 0"/>
<GaussianMixtureModel id="4" nu="0" m="1 2 3" W="1 0 0 0 1 0 0 0 1"/>
</document>"#,
        );
        assert!(doc.records.is_empty());
        assert_eq!(doc.warnings.len(), 2);
        assert!(matches!(
            doc.warnings[0],
            ImportWarning::DegenerateRecord { local_id: 3, frame: 0, .. }
        ));
    }

    #[test]
    fn test_empty_document() {
        let doc = parse("<document></document>");
        assert!(doc.records.is_empty());
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_malformed_document() {
        let result = parse_frame_str(
            "<document><GaussianMixtureModel id=\"0\"></document>",
            Path::new("broken.xml"),
            2,
        );
        match result {
            Err(ImportWarning::ParseError { path, .. }) => {
                assert_eq!(path, PathBuf::from("broken.xml"));
            }
            other => panic!("expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_formatting_variance() {
        let doc = parse(
            "<document><GaussianMixtureModel id=\"2.0\" parent=\" 1 \" nu=\"4\" \
             m=\"  1,2 , 3 \" W=\"1 0 0\n0 1 0\n0 0 1 \"/></document>",
        );
        assert!(doc.warnings.is_empty(), "{:?}", doc.warnings);
        assert_eq!(doc.records[0].local_id, 2);
        assert_eq!(doc.records[0].parent, Some(1));
    }
}
