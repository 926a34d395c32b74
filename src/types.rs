//! Core data types for MetaIO volumes and point samples

use crate::error::{Result, SampleError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element types supported by the raw data decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// Unsigned 8-bit integer (`MET_UCHAR`)
    UnsignedByte8,
    /// Unsigned 32-bit integer (`MET_UINT`)
    UnsignedInt32,
    /// 32-bit IEEE floating point (`MET_FLOAT`)
    Float32,
}

impl ElementType {
    /// Map a MetaIO `ElementType` token to an element type
    pub fn from_metaio(name: &str) -> Option<Self> {
        match name {
            "MET_UCHAR" => Some(ElementType::UnsignedByte8),
            "MET_UINT" => Some(ElementType::UnsignedInt32),
            "MET_FLOAT" => Some(ElementType::Float32),
            _ => None,
        }
    }

    /// The MetaIO token for this element type
    pub fn metaio_name(&self) -> &'static str {
        match self {
            ElementType::UnsignedByte8 => "MET_UCHAR",
            ElementType::UnsignedInt32 => "MET_UINT",
            ElementType::Float32 => "MET_FLOAT",
        }
    }

    /// Size in bytes of one element
    pub fn size_in_bytes(&self) -> usize {
        match self {
            ElementType::UnsignedByte8 => 1,
            ElementType::UnsignedInt32 | ElementType::Float32 => 4,
        }
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, ElementType::Float32)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metaio_name())
    }
}

/// Byte order of the raw data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

/// One emitted point: physical position and RGB color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub position: [f64; 3],
    pub color: [f64; 3],
}

impl Sample {
    /// Red channel, which carries the normalized intensity
    pub fn intensity(&self) -> f64 {
        self.color[0]
    }
}

/// Value range used for intensity normalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Map a value into the range, `0` when the range is degenerate.
    /// Values outside the range are not clamped.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 {
            0.0
        } else {
            (value - self.min) / span
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }
}

/// Options controlling how a volume is turned into points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOptions {
    /// Keep every n-th cell in linear scan order
    pub downsample_step: usize,
    /// Uniform factor applied on top of the element spacing
    pub scale_factor: f64,
    /// Values less than or equal to this are dropped
    pub filter_min: f64,
    /// Partition the z-range across rayon workers
    pub parallel: bool,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            downsample_step: 1000,
            scale_factor: 0.01,
            filter_min: 0.0,
            parallel: false,
        }
    }
}

impl SamplingOptions {
    /// Create options with every field given explicitly
    pub fn new(downsample_step: usize, scale_factor: f64, filter_min: f64) -> Self {
        Self {
            downsample_step,
            scale_factor,
            filter_min,
            parallel: false,
        }
    }

    pub fn with_downsample_step(mut self, step: usize) -> Self {
        self.downsample_step = step;
        self
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_filter_min(mut self, filter_min: f64) -> Self {
        self.filter_min = filter_min;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> std::result::Result<(), SampleError> {
        if self.downsample_step == 0 {
            return Err(SampleError::InvalidOptions(
                "downsample_step must be at least 1".to_string(),
            ));
        }
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(SampleError::InvalidOptions(format!(
                "scale_factor must be a positive finite number, got {}",
                self.scale_factor
            )));
        }
        if self.filter_min.is_nan() {
            return Err(SampleError::InvalidOptions(
                "filter_min must not be NaN".to_string(),
            ));
        }
        Ok(())
    }
}
