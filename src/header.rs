//! MetaIO header parsing
//!
//! A MetaIO header is line-oriented `Key = Value` text. A fixed set of keys
//! carries whitespace-separated numbers; every other key is kept as an opaque
//! string. [`MetaHeader`] is the loosely-typed mapping, [`VolumeDescriptor`]
//! the validated view needed to decode the companion raw file.

use crate::error::HeaderError;
use crate::types::{ByteOrder, ElementType};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Keys whose values are parsed as sequences of numbers
pub const NUMERIC_KEYS: [&str; 6] = [
    "CenterOfRotation",
    "DimSize",
    "NDims",
    "ElementSpacing",
    "Offset",
    "TransformMatrix",
];

/// Keys that must be present to build a [`VolumeDescriptor`]
pub const REQUIRED_KEYS: [&str; 4] = ["DimSize", "ElementSpacing", "ElementType", "ElementDataFile"];

const BYTE_ORDER_KEYS: [&str; 2] = ["BinaryDataByteOrderMSB", "ElementByteOrderMSB"];

/// Value of a single header field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeaderValue {
    Text(String),
    Numbers(Vec<f64>),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            HeaderValue::Numbers(_) => None,
        }
    }

    pub fn as_numbers(&self) -> Option<&[f64]> {
        match self {
            HeaderValue::Numbers(n) => Some(n),
            HeaderValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderField {
    pub key: String,
    pub value: HeaderValue,
}

/// Parsed header fields in first-insertion order; a repeated key keeps its
/// original position and takes the last value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaHeader {
    fields: Vec<HeaderField>,
}

impl MetaHeader {
    /// Parse header text into fields
    pub fn parse(text: &str) -> Result<Self, HeaderError> {
        let mut header = MetaHeader::default();

        for (index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = split_line(line).ok_or_else(|| HeaderError::MalformedLine {
                line: index,
                content: raw_line.to_string(),
            })?;

            let value = if NUMERIC_KEYS.contains(&key) {
                HeaderValue::Numbers(parse_numbers(key, value)?)
            } else {
                HeaderValue::Text(value.to_string())
            };

            header.insert(key, value);
        }

        debug!(fields = header.len(), "parsed MetaIO header");
        Ok(header)
    }

    /// Insert a field, replacing the value of an existing key in place
    pub fn insert(&mut self, key: impl Into<String>, value: HeaderValue) {
        let key = key.into();
        if let Some(field) = self.fields.iter_mut().find(|f| f.key == key) {
            warn!(key = %key, "duplicate header key, last value wins");
            field.value = value;
        } else {
            self.fields.push(HeaderField { key, value });
        }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_str)
    }

    pub fn get_numbers(&self, key: &str) -> Option<&[f64]> {
        self.get(key).and_then(HeaderValue::as_numbers)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn require(&self, key: &str) -> Result<&HeaderValue, HeaderError> {
        self.get(key)
            .ok_or_else(|| HeaderError::MissingKey(key.to_string()))
    }

    fn flag(&self, key: &str) -> bool {
        self.get_str(key)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
    }
}

/// Split a trimmed line on its single `=` separator
fn split_line(line: &str) -> Option<(&str, &str)> {
    if line.matches('=').count() != 1 {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

fn parse_numbers(key: &str, value: &str) -> Result<Vec<f64>, HeaderError> {
    value
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| HeaderError::InvalidNumber {
                key: key.to_string(),
                token: token.to_string(),
            })
        })
        .collect()
}

/// Validated description of a 3D MetaIO volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDescriptor {
    /// Extents along X, Y, Z
    pub dim_size: [usize; 3],
    /// Physical size of one voxel along X, Y, Z
    pub element_spacing: [f64; 3],
    pub element_type: ElementType,
    /// Raw data path, relative to the header's own location
    pub element_data_file: String,
    pub byte_order: ByteOrder,
    pub offset: [f64; 3],
    pub center_of_rotation: [f64; 3],
    /// Row-major 3x3 direction matrix
    pub transform_matrix: [f64; 9],
}

impl VolumeDescriptor {
    /// Build a descriptor from parsed header fields
    pub fn from_header(header: &MetaHeader) -> Result<Self, HeaderError> {
        for key in REQUIRED_KEYS {
            header.require(key)?;
        }

        if let Some(ndims) = header.get_numbers("NDims") {
            if ndims != [3.0] {
                return Err(HeaderError::InvalidDimensions {
                    key: "NDims".to_string(),
                    reason: format!("expected 3, got {:?}", ndims),
                });
            }
        }

        if header.flag("CompressedData") {
            return Err(HeaderError::CompressedDataUnsupported);
        }

        let dim_size = parse_dim_size(header)?;
        let element_spacing = parse_spacing(header)?;

        let element_type_name = text_field(header, "ElementType")?;
        let element_type = ElementType::from_metaio(element_type_name)
            .ok_or_else(|| HeaderError::UnsupportedElementType(element_type_name.to_string()))?;

        if checked_byte_len(dim_size, element_type).is_none() {
            return Err(HeaderError::InvalidDimensions {
                key: "DimSize".to_string(),
                reason: format!("{:?} {} elements overflow the addressable size", dim_size, element_type),
            });
        }

        let element_data_file = text_field(header, "ElementDataFile")?.to_string();

        let byte_order = if BYTE_ORDER_KEYS.iter().any(|key| header.flag(key)) {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };

        let descriptor = Self {
            dim_size,
            element_spacing,
            element_type,
            element_data_file,
            byte_order,
            offset: optional_array(header, "Offset").unwrap_or([0.0; 3]),
            center_of_rotation: optional_array(header, "CenterOfRotation").unwrap_or([0.0; 3]),
            transform_matrix: optional_array(header, "TransformMatrix")
                .unwrap_or([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
        };

        debug!(
            dims = ?descriptor.dim_size,
            spacing = ?descriptor.element_spacing,
            element_type = %descriptor.element_type,
            data_file = %descriptor.element_data_file,
            "volume descriptor"
        );

        Ok(descriptor)
    }

    /// Number of voxels declared by `DimSize`, `None` on overflow
    pub fn element_count(&self) -> Option<usize> {
        checked_element_count(self.dim_size)
    }

    /// Expected length in bytes of the raw data file, `None` on overflow
    pub fn byte_len(&self) -> Option<usize> {
        checked_byte_len(self.dim_size, self.element_type)
    }

    pub fn is_empty(&self) -> bool {
        self.dim_size.contains(&0)
    }

    /// Physical size of one grid step after applying a uniform scale
    pub fn scaled_spacing(&self, scale_factor: f64) -> [f64; 3] {
        self.element_spacing.map(|s| s * scale_factor)
    }
}

/// Parse MetaIO header text into a [`VolumeDescriptor`]
pub fn parse(text: &str) -> Result<VolumeDescriptor, HeaderError> {
    let header = MetaHeader::parse(text)?;
    VolumeDescriptor::from_header(&header)
}

fn text_field<'a>(header: &'a MetaHeader, key: &str) -> Result<&'a str, HeaderError> {
    header
        .get_str(key)
        .ok_or_else(|| HeaderError::MissingKey(key.to_string()))
}

fn three_numbers(header: &MetaHeader, key: &str) -> Result<[f64; 3], HeaderError> {
    let numbers = header
        .get_numbers(key)
        .ok_or_else(|| HeaderError::MissingKey(key.to_string()))?;
    <[f64; 3]>::try_from(numbers).map_err(|_| HeaderError::InvalidDimensions {
        key: key.to_string(),
        reason: format!("expected 3 components, got {}", numbers.len()),
    })
}

fn checked_element_count(dim_size: [usize; 3]) -> Option<usize> {
    dim_size.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

fn checked_byte_len(dim_size: [usize; 3], element_type: ElementType) -> Option<usize> {
    checked_element_count(dim_size)?.checked_mul(element_type.size_in_bytes())
}

fn parse_dim_size(header: &MetaHeader) -> Result<[usize; 3], HeaderError> {
    let dims = three_numbers(header, "DimSize")?;
    let mut out = [0usize; 3];
    for (slot, &value) in out.iter_mut().zip(dims.iter()) {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value >= usize::MAX as f64 {
            return Err(HeaderError::InvalidDimensions {
                key: "DimSize".to_string(),
                reason: format!("{} is not a representable non-negative integer", value),
            });
        }
        *slot = value as usize;
    }
    Ok(out)
}

fn parse_spacing(header: &MetaHeader) -> Result<[f64; 3], HeaderError> {
    let spacing = three_numbers(header, "ElementSpacing")?;
    if let Some(bad) = spacing.iter().find(|s| !s.is_finite() || **s <= 0.0) {
        return Err(HeaderError::InvalidDimensions {
            key: "ElementSpacing".to_string(),
            reason: format!("{} is not a positive spacing", bad),
        });
    }
    Ok(spacing)
}

/// Informational geometry; ignored when its arity does not fit a 3D volume
fn optional_array<const N: usize>(header: &MetaHeader, key: &str) -> Option<[f64; N]> {
    let numbers = header.get_numbers(key)?;
    match <[f64; N]>::try_from(numbers) {
        Ok(array) => Some(array),
        Err(_) => {
            warn!(key, components = numbers.len(), "ignoring header field with unexpected arity");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "NDims = 3\n\
        DimSize = 2 2 1\n\
        ElementSpacing = 1 1 1\n\
        ElementType = MET_UCHAR\n\
        ElementDataFile = d.raw\n";

    #[test]
    fn test_parse_header_fields() {
        let header = MetaHeader::parse(HEADER).unwrap();
        assert_eq!(header.len(), 5);
        assert_eq!(header.get_numbers("DimSize"), Some(&[2.0, 2.0, 1.0][..]));
        assert_eq!(header.get_str("ElementType"), Some("MET_UCHAR"));
        assert_eq!(header.get_str("DimSize"), None);

        let keys: Vec<_> = header.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["NDims", "DimSize", "ElementSpacing", "ElementType", "ElementDataFile"]
        );
    }

    #[test]
    fn test_parse_descriptor() {
        let descriptor = parse(HEADER).unwrap();
        assert_eq!(descriptor.dim_size, [2, 2, 1]);
        assert_eq!(descriptor.element_spacing, [1.0, 1.0, 1.0]);
        assert_eq!(descriptor.element_type, ElementType::UnsignedByte8);
        assert_eq!(descriptor.element_data_file, "d.raw");
        assert_eq!(descriptor.byte_order, ByteOrder::LittleEndian);
        assert_eq!(descriptor.element_count(), Some(4));
        assert_eq!(descriptor.byte_len(), Some(4));
        assert_eq!(descriptor.offset, [0.0; 3]);
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(parse(HEADER).unwrap(), parse(HEADER).unwrap());
    }

    #[test]
    fn test_whitespace_and_blank_lines() {
        let text = "\r\n  DimSize=4 5 6  \r\n\nElementSpacing =0.5 0.5 2\nElementType= MET_FLOAT\nElementDataFile = vol.raw\r\n";
        let descriptor = parse(text).unwrap();
        assert_eq!(descriptor.dim_size, [4, 5, 6]);
        assert_eq!(descriptor.element_spacing, [0.5, 0.5, 2.0]);
        assert_eq!(descriptor.element_type, ElementType::Float32);
    }

    #[test]
    fn test_malformed_line() {
        let err = parse("ElementType MET_UCHAR").unwrap_err();
        assert_eq!(
            err,
            HeaderError::MalformedLine {
                line: 0,
                content: "ElementType MET_UCHAR".to_string()
            }
        );

        let err = MetaHeader::parse("NDims = 3\n\nA = b = c").unwrap_err();
        assert!(matches!(err, HeaderError::MalformedLine { line: 2, .. }));

        let err = MetaHeader::parse("= value").unwrap_err();
        assert!(matches!(err, HeaderError::MalformedLine { line: 0, .. }));
    }

    #[test]
    fn test_invalid_number() {
        let err = MetaHeader::parse("DimSize = 2 two 1").unwrap_err();
        assert_eq!(
            err,
            HeaderError::InvalidNumber {
                key: "DimSize".to_string(),
                token: "two".to_string()
            }
        );
    }

    #[test]
    fn test_missing_keys() {
        let err = parse("DimSize = 1 1 1\nElementSpacing = 1 1 1\nElementType = MET_UCHAR").unwrap_err();
        assert_eq!(err, HeaderError::MissingKey("ElementDataFile".to_string()));

        let err = parse("ElementType = MET_UCHAR").unwrap_err();
        assert_eq!(err, HeaderError::MissingKey("DimSize".to_string()));
    }

    #[test]
    fn test_unsupported_element_type() {
        let text = HEADER.replace("MET_UCHAR", "MET_SHORT");
        assert_eq!(
            parse(&text).unwrap_err(),
            HeaderError::UnsupportedElementType("MET_SHORT".to_string())
        );
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let text = format!("{HEADER}DimSize = 3 3 3\n");
        let header = MetaHeader::parse(&text).unwrap();
        assert_eq!(header.len(), 5);
        assert_eq!(header.iter().nth(1).unwrap().key, "DimSize");
        assert_eq!(VolumeDescriptor::from_header(&header).unwrap().dim_size, [3, 3, 3]);
    }

    #[test]
    fn test_invalid_dimensions() {
        let two_d = HEADER.replace("DimSize = 2 2 1", "DimSize = 2 2");
        assert!(matches!(
            parse(&two_d),
            Err(HeaderError::InvalidDimensions { ref key, .. }) if key == "DimSize"
        ));

        let fractional = HEADER.replace("DimSize = 2 2 1", "DimSize = 2 2.5 1");
        assert!(matches!(parse(&fractional), Err(HeaderError::InvalidDimensions { .. })));

        let ndims = HEADER.replace("NDims = 3", "NDims = 2");
        assert!(matches!(
            parse(&ndims),
            Err(HeaderError::InvalidDimensions { ref key, .. }) if key == "NDims"
        ));

        let spacing = HEADER.replace("ElementSpacing = 1 1 1", "ElementSpacing = 1 0 1");
        assert!(matches!(
            parse(&spacing),
            Err(HeaderError::InvalidDimensions { ref key, .. }) if key == "ElementSpacing"
        ));
    }

    #[test]
    fn test_oversized_extents_are_rejected() {
        let huge = HEADER.replace("DimSize = 2 2 1", "DimSize = 4294967296 4294967296 4294967296");
        assert!(matches!(
            parse(&huge),
            Err(HeaderError::InvalidDimensions { ref key, .. }) if key == "DimSize"
        ));

        // Fits as an element count but not once multiplied by the element width
        let quarter = (usize::MAX / 4 + 1).to_string();
        let wide = HEADER
            .replace("DimSize = 2 2 1", &format!("DimSize = {quarter} 1 1"))
            .replace("MET_UCHAR", "MET_FLOAT");
        assert!(matches!(parse(&wide), Err(HeaderError::InvalidDimensions { .. })));

        let saturating = HEADER.replace("DimSize = 2 2 1", "DimSize = 1e30 1 1");
        assert!(matches!(parse(&saturating), Err(HeaderError::InvalidDimensions { .. })));

        let mut descriptor = parse(HEADER).unwrap();
        descriptor.dim_size = [usize::MAX, 2, 1];
        assert_eq!(descriptor.element_count(), None);
        assert_eq!(descriptor.byte_len(), None);
    }

    #[test]
    fn test_zero_extent_is_accepted_by_parser() {
        let text = HEADER.replace("DimSize = 2 2 1", "DimSize = 2 0 1");
        let descriptor = parse(&text).unwrap();
        assert!(descriptor.is_empty());
    }

    #[test]
    fn test_byte_order_and_compression_flags() {
        let big = format!("{HEADER}BinaryDataByteOrderMSB = True\n");
        assert_eq!(parse(&big).unwrap().byte_order, ByteOrder::BigEndian);

        let little = format!("{HEADER}ElementByteOrderMSB = False\n");
        assert_eq!(parse(&little).unwrap().byte_order, ByteOrder::LittleEndian);

        let compressed = format!("{HEADER}CompressedData = True\n");
        assert_eq!(parse(&compressed).unwrap_err(), HeaderError::CompressedDataUnsupported);
    }

    #[test]
    fn test_optional_geometry() {
        let text = format!(
            "{HEADER}Offset = -1 2.5 3\nCenterOfRotation = 0 0 0 0\nTransformMatrix = 0 1 0 1 0 0 0 0 1\n"
        );
        let descriptor = parse(&text).unwrap();
        assert_eq!(descriptor.offset, [-1.0, 2.5, 3.0]);
        // Wrong arity falls back to the default
        assert_eq!(descriptor.center_of_rotation, [0.0; 3]);
        assert_eq!(descriptor.transform_matrix[1], 1.0);
    }
}
