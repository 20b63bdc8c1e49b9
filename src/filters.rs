//! Filter request resolution.
//!
//! A batch request carries its filters as loosely-typed `name → parameter`
//! pairs (query-string style). This module turns them into a validated,
//! immutable [`FilterPipeline`] exactly once per batch, before any image work
//! starts. Every worker of the batch then shares the pipeline read-only.
//!
//! ## Supported filters
//!
//! | Key | Parameter | Range |
//! |---|---|---|
//! | `resize` | `<w>x<h>` | each side 0–4000 (0 = keep aspect) |
//! | `crop_to_size` | `<w>x<h>` | each side 0–4000 |
//! | `rotate` | degrees, counter-clockwise | −360–360 |
//! | `brightness_increase` / `brightness_decrease` | percent | 0–100 |
//! | `contrast_increase` / `contrast_decrease` | percent | 0–100 |
//! | `saturation_increase` / `saturation_decrease` | percent | 0–200 |
//! | `gaussian_blur` | sigma | 0.1–50 |
//! | `pixelate` | block size | 0–50 |
//! | `grayscale` | ignored | — |
//! | `invert` | ignored | — |
//!
//! ## Resolution rules
//!
//! - Unknown keys are skipped, so clients can send extra query parameters.
//! - A recognized key with a bad parameter fails the whole request.
//! - `*_decrease` is the same operation as `*_increase` with the sign flipped.
//!   When both are present they collapse into one adjustment of
//!   `increase - decrease`.
//! - The pipeline runs in a fixed canonical order (the [`FilterKind`] order:
//!   geometry, then colour, then blur/pixelate, then grayscale and invert),
//!   independent of the order the parameters arrived in.

use crate::imaging::calculations::{crop_dimensions, resize_dimensions, rotated_dimensions};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const MAX_IMAGE_WIDTH: u32 = 4000;
pub const MAX_IMAGE_HEIGHT: u32 = 4000;
pub const MAX_PIXELATE_SIZE: u32 = 50;
pub const MAX_BRIGHTNESS: f32 = 100.0;
pub const MAX_CONTRAST: f32 = 100.0;
pub const MAX_SATURATION: f32 = 200.0;
pub const MIN_BLUR_SIGMA: f32 = 0.1;
pub const MAX_BLUR_SIGMA: f32 = 50.0;
pub const MAX_ROTATION: f32 = 360.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("no valid filters specified")]
    NoFilters,
    #[error("filter '{filter}': {violation}")]
    Invalid { filter: String, violation: Violation },
}

impl ValidationError {
    fn invalid(filter: &str, violation: Violation) -> Self {
        Self::Invalid {
            filter: filter.to_string(),
            violation,
        }
    }
}

/// The specific constraint a filter parameter broke.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Violation {
    #[error("{param} parameter is required")]
    Missing { param: &'static str },
    #[error("invalid {param}: must be an integer")]
    NotAnInteger { param: &'static str },
    #[error("invalid {param}: must be a number")]
    NotANumber { param: &'static str },
    #[error("{param} must be positive")]
    Negative { param: &'static str },
    #[error("{param} must be between {min:.1} and {max:.1}")]
    OutOfRange {
        param: &'static str,
        min: f32,
        max: f32,
    },
    #[error("{param} too large (max {max})")]
    TooLarge { param: &'static str, max: u32 },
    #[error("dimensions must be in format 'widthxheight'")]
    MalformedDimensions,
    #[error("dimensions too large (max {max_width}x{max_height})")]
    DimensionsTooLarge { max_width: u32, max_height: u32 },
    #[error("unsupported filter")]
    Unsupported,
}

/// The closed set of operations, in canonical application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKind {
    Resize,
    CropToSize,
    Rotate,
    Brightness,
    Contrast,
    Saturation,
    GaussianBlur,
    Pixelate,
    Grayscale,
    Invert,
}

impl FilterKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Resize => "resize",
            Self::CropToSize => "crop_to_size",
            Self::Rotate => "rotate",
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturation => "saturation",
            Self::GaussianBlur => "gaussian_blur",
            Self::Pixelate => "pixelate",
            Self::Grayscale => "grayscale",
            Self::Invert => "invert",
        }
    }
}

/// Sign a request key applies to its magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Increase,
    Decrease,
}

/// Every accepted request key, the operation it maps to, and its direction.
const SUPPORTED_KEYS: &[(&str, FilterKind, Direction)] = &[
    ("resize", FilterKind::Resize, Direction::Increase),
    ("crop_to_size", FilterKind::CropToSize, Direction::Increase),
    ("rotate", FilterKind::Rotate, Direction::Increase),
    ("brightness_increase", FilterKind::Brightness, Direction::Increase),
    ("brightness_decrease", FilterKind::Brightness, Direction::Decrease),
    ("contrast_increase", FilterKind::Contrast, Direction::Increase),
    ("contrast_decrease", FilterKind::Contrast, Direction::Decrease),
    ("saturation_increase", FilterKind::Saturation, Direction::Increase),
    ("saturation_decrease", FilterKind::Saturation, Direction::Decrease),
    ("gaussian_blur", FilterKind::GaussianBlur, Direction::Increase),
    ("pixelate", FilterKind::Pixelate, Direction::Increase),
    ("grayscale", FilterKind::Grayscale, Direction::Increase),
    ("invert", FilterKind::Invert, Direction::Increase),
];

/// Request keys accepted by [`resolve`], in canonical order.
pub fn supported_filters() -> impl Iterator<Item = &'static str> {
    SUPPORTED_KEYS.iter().map(|(key, _, _)| *key)
}

fn lookup(key: &str) -> Option<(FilterKind, Direction)> {
    SUPPORTED_KEYS
        .iter()
        .find(|(name, _, _)| *name == key)
        .map(|(_, kind, direction)| (*kind, *direction))
}

/// A validated, parameter-bound operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedFilter {
    Resize { width: u32, height: u32 },
    CropToSize { width: u32, height: u32 },
    /// Counter-clockwise, in degrees.
    Rotate { degrees: f32 },
    /// Signed percent of full scale.
    BrightnessAdjust { percent: f32 },
    ContrastAdjust { percent: f32 },
    SaturationAdjust { percent: f32 },
    GaussianBlur { sigma: f32 },
    Pixelate { size: u32 },
    Grayscale,
    Invert,
}

impl ResolvedFilter {
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::Resize { .. } => FilterKind::Resize,
            Self::CropToSize { .. } => FilterKind::CropToSize,
            Self::Rotate { .. } => FilterKind::Rotate,
            Self::BrightnessAdjust { .. } => FilterKind::Brightness,
            Self::ContrastAdjust { .. } => FilterKind::Contrast,
            Self::SaturationAdjust { .. } => FilterKind::Saturation,
            Self::GaussianBlur { .. } => FilterKind::GaussianBlur,
            Self::Pixelate { .. } => FilterKind::Pixelate,
            Self::Grayscale => FilterKind::Grayscale,
            Self::Invert => FilterKind::Invert,
        }
    }

    /// Canvas size after this filter runs on a canvas of `bounds`.
    pub fn output_bounds(&self, bounds: (u32, u32)) -> (u32, u32) {
        match *self {
            Self::Resize { width, height } => resize_dimensions(bounds, (width, height)),
            Self::CropToSize { width, height } => crop_dimensions(bounds, (width, height)),
            Self::Rotate { degrees } => rotated_dimensions(bounds, degrees),
            _ => bounds,
        }
    }

    /// Merge a second request for the same colour adjustment.
    fn combine(self, other: ResolvedFilter) -> ResolvedFilter {
        match (self, other) {
            (Self::BrightnessAdjust { percent: a }, Self::BrightnessAdjust { percent: b }) => {
                Self::BrightnessAdjust { percent: a + b }
            }
            (Self::ContrastAdjust { percent: a }, Self::ContrastAdjust { percent: b }) => {
                Self::ContrastAdjust { percent: a + b }
            }
            (Self::SaturationAdjust { percent: a }, Self::SaturationAdjust { percent: b }) => {
                Self::SaturationAdjust { percent: a + b }
            }
            (_, later) => later,
        }
    }
}

impl fmt::Display for ResolvedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.kind().name();
        match self {
            Self::Resize { width, height } | Self::CropToSize { width, height } => {
                write!(f, "{name}({width}x{height})")
            }
            Self::Rotate { degrees } => write!(f, "{name}({degrees}°)"),
            Self::BrightnessAdjust { percent }
            | Self::ContrastAdjust { percent }
            | Self::SaturationAdjust { percent } => write!(f, "{name}({percent:+}%)"),
            Self::GaussianBlur { sigma } => write!(f, "{name}({sigma})"),
            Self::Pixelate { size } => write!(f, "{name}({size})"),
            Self::Grayscale | Self::Invert => f.write_str(name),
        }
    }
}

/// A non-empty, ordered list of filters applied to every item of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPipeline {
    filters: Vec<ResolvedFilter>,
}

impl FilterPipeline {
    pub fn new(filters: Vec<ResolvedFilter>) -> Result<Self, ValidationError> {
        if filters.is_empty() {
            return Err(ValidationError::NoFilters);
        }
        Ok(Self { filters })
    }

    pub fn filters(&self) -> &[ResolvedFilter] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Output canvas size, composing each filter's bounds change in order.
    pub fn output_bounds(&self, bounds: (u32, u32)) -> (u32, u32) {
        self.filters
            .iter()
            .fold(bounds, |acc, filter| filter.output_bounds(acc))
    }
}

impl fmt::Display for FilterPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.filters.iter().map(|x| x.to_string()).collect();
        f.write_str(&parts.join(" → "))
    }
}

/// Resolve request parameters into a pipeline.
///
/// Repeated keys keep the last value. See the [module docs](self) for the
/// full rules.
pub fn resolve<I, K, V>(params: I) -> Result<FilterPipeline, ValidationError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    // Sorted by key so the first reported error is stable across runs
    let recognized: BTreeMap<String, String> = params
        .into_iter()
        .filter(|(key, _)| lookup(key.as_ref()).is_some())
        .map(|(key, value)| (key.as_ref().to_string(), value.as_ref().to_string()))
        .collect();

    let mut by_kind: BTreeMap<FilterKind, ResolvedFilter> = BTreeMap::new();
    for (key, value) in &recognized {
        let filter = parse_filter(key, value)?;
        by_kind
            .entry(filter.kind())
            .and_modify(|existing| *existing = existing.combine(filter))
            .or_insert(filter);
    }

    FilterPipeline::new(by_kind.into_values().collect())
}

/// Validate one `name → parameter` pair.
///
/// Unlike [`resolve`], an unknown name is an error here.
pub fn parse_filter(name: &str, param: &str) -> Result<ResolvedFilter, ValidationError> {
    let (kind, direction) =
        lookup(name).ok_or_else(|| ValidationError::invalid(name, Violation::Unsupported))?;
    let signed = |value: f32| match direction {
        Direction::Increase => value,
        Direction::Decrease => -value,
    };
    let fail = |violation| ValidationError::invalid(name, violation);

    let filter = match kind {
        FilterKind::Resize => {
            let (width, height) = parse_dimensions(param).map_err(fail)?;
            ResolvedFilter::Resize { width, height }
        }
        FilterKind::CropToSize => {
            let (width, height) = parse_dimensions(param).map_err(fail)?;
            ResolvedFilter::CropToSize { width, height }
        }
        FilterKind::Rotate => {
            let degrees =
                parse_float(param, "rotation angle", -MAX_ROTATION, MAX_ROTATION).map_err(fail)?;
            ResolvedFilter::Rotate { degrees }
        }
        FilterKind::Brightness => {
            let value = parse_float(param, "brightness", 0.0, MAX_BRIGHTNESS).map_err(fail)?;
            ResolvedFilter::BrightnessAdjust {
                percent: signed(value),
            }
        }
        FilterKind::Contrast => {
            let value = parse_float(param, "contrast", 0.0, MAX_CONTRAST).map_err(fail)?;
            ResolvedFilter::ContrastAdjust {
                percent: signed(value),
            }
        }
        FilterKind::Saturation => {
            let value = parse_float(param, "saturation", 0.0, MAX_SATURATION).map_err(fail)?;
            ResolvedFilter::SaturationAdjust {
                percent: signed(value),
            }
        }
        FilterKind::GaussianBlur => {
            let sigma = parse_float(param, "blur radius", MIN_BLUR_SIGMA, MAX_BLUR_SIGMA)
                .map_err(fail)?;
            ResolvedFilter::GaussianBlur { sigma }
        }
        FilterKind::Pixelate => {
            let size = parse_int(param, "pixelate size").map_err(fail)?;
            if size > MAX_PIXELATE_SIZE {
                return Err(fail(Violation::TooLarge {
                    param: "pixelate size",
                    max: MAX_PIXELATE_SIZE,
                }));
            }
            ResolvedFilter::Pixelate { size }
        }
        FilterKind::Grayscale => ResolvedFilter::Grayscale,
        FilterKind::Invert => ResolvedFilter::Invert,
    };
    Ok(filter)
}

fn parse_int(raw: &str, param: &'static str) -> Result<u32, Violation> {
    if raw.is_empty() {
        return Err(Violation::Missing { param });
    }
    let value: i64 = raw
        .parse()
        .map_err(|_| Violation::NotAnInteger { param })?;
    if value < 0 {
        return Err(Violation::Negative { param });
    }
    u32::try_from(value).map_err(|_| Violation::TooLarge {
        param,
        max: u32::MAX,
    })
}

fn parse_float(raw: &str, param: &'static str, min: f32, max: f32) -> Result<f32, Violation> {
    if raw.is_empty() {
        return Err(Violation::Missing { param });
    }
    let value: f32 = raw.parse().map_err(|_| Violation::NotANumber { param })?;
    // Infinities fall through to the range check below
    if value.is_nan() {
        return Err(Violation::NotANumber { param });
    }
    if value < min || value > max {
        return Err(Violation::OutOfRange { param, min, max });
    }
    Ok(value)
}

fn parse_dimensions(raw: &str) -> Result<(u32, u32), Violation> {
    if raw.is_empty() {
        return Err(Violation::Missing {
            param: "dimensions",
        });
    }
    let parts: Vec<&str> = raw.split('x').collect();
    let [width, height] = parts.as_slice() else {
        return Err(Violation::MalformedDimensions);
    };
    let width = parse_int(width, "width")?;
    let height = parse_int(height, "height")?;
    if width > MAX_IMAGE_WIDTH || height > MAX_IMAGE_HEIGHT {
        return Err(Violation::DimensionsTooLarge {
            max_width: MAX_IMAGE_WIDTH,
            max_height: MAX_IMAGE_HEIGHT,
        });
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn violation(result: Result<FilterPipeline, ValidationError>) -> (String, Violation) {
        match result {
            Err(ValidationError::Invalid { filter, violation }) => (filter, violation),
            other => panic!("expected invalid filter, got {other:?}"),
        }
    }

    // =========================================================================
    // Empty / unknown input
    // =========================================================================

    #[test]
    fn empty_request_has_no_filters() {
        let result = resolve(params(&[]));
        assert_eq!(result, Err(ValidationError::NoFilters));
        assert_eq!(
            ValidationError::NoFilters.to_string(),
            "no valid filters specified"
        );
    }

    #[test]
    fn unknown_keys_only_has_no_filters() {
        assert_eq!(
            resolve(params(&[("unknown", "x")])),
            Err(ValidationError::NoFilters)
        );
    }

    #[test]
    fn unknown_keys_are_skipped_next_to_valid_ones() {
        let pipeline = resolve(params(&[("page", "2"), ("grayscale", "")])).unwrap();
        assert_eq!(pipeline.filters(), &[ResolvedFilter::Grayscale]);
    }

    // =========================================================================
    // Dimensions
    // =========================================================================

    #[test]
    fn resize_valid_dimensions() {
        let pipeline = resolve(params(&[("resize", "800x600")])).unwrap();
        assert_eq!(
            pipeline.filters(),
            &[ResolvedFilter::Resize {
                width: 800,
                height: 600
            }]
        );
    }

    #[test]
    fn resize_without_separator_is_malformed() {
        let (filter, v) = violation(resolve(params(&[("resize", "800")])));
        assert_eq!(filter, "resize");
        assert_eq!(v, Violation::MalformedDimensions);
    }

    #[test]
    fn resize_with_two_separators_is_malformed() {
        let (_, v) = violation(resolve(params(&[("resize", "8x6x4")])));
        assert_eq!(v, Violation::MalformedDimensions);
    }

    #[test]
    fn resize_over_maximum() {
        let (_, v) = violation(resolve(params(&[("resize", "5000x100")])));
        assert_eq!(
            v,
            Violation::DimensionsTooLarge {
                max_width: 4000,
                max_height: 4000
            }
        );
    }

    #[test]
    fn resize_at_maximum_is_accepted() {
        assert!(resolve(params(&[("resize", "4000x4000")])).is_ok());
    }

    #[test]
    fn crop_missing_height() {
        let (filter, v) = violation(resolve(params(&[("crop_to_size", "300x")])));
        assert_eq!(filter, "crop_to_size");
        assert_eq!(v, Violation::Missing { param: "height" });
    }

    #[test]
    fn crop_negative_width() {
        let (_, v) = violation(resolve(params(&[("crop_to_size", "-3x10")])));
        assert_eq!(v, Violation::Negative { param: "width" });
    }

    #[test]
    fn crop_non_numeric_side() {
        let (_, v) = violation(resolve(params(&[("crop_to_size", "abcx10")])));
        assert_eq!(v, Violation::NotAnInteger { param: "width" });
    }

    #[test]
    fn dimensions_missing_entirely() {
        let (_, v) = violation(resolve(params(&[("resize", "")])));
        assert_eq!(
            v,
            Violation::Missing {
                param: "dimensions"
            }
        );
    }

    // =========================================================================
    // Integer and float ranges
    // =========================================================================

    #[test]
    fn pixelate_at_limit_is_accepted() {
        let pipeline = resolve(params(&[("pixelate", "50")])).unwrap();
        assert_eq!(pipeline.filters(), &[ResolvedFilter::Pixelate { size: 50 }]);
    }

    #[test]
    fn pixelate_over_limit_is_rejected() {
        let (filter, v) = violation(resolve(params(&[("pixelate", "51")])));
        assert_eq!(filter, "pixelate");
        assert_eq!(
            v,
            Violation::TooLarge {
                param: "pixelate size",
                max: 50
            }
        );
    }

    #[test]
    fn blur_below_minimum_is_out_of_range() {
        let (_, v) = violation(resolve(params(&[("gaussian_blur", "0.05")])));
        assert_eq!(
            v,
            Violation::OutOfRange {
                param: "blur radius",
                min: 0.1,
                max: 50.0
            }
        );
    }

    #[test]
    fn rotation_range_is_inclusive() {
        assert!(resolve(params(&[("rotate", "-360")])).is_ok());
        assert!(resolve(params(&[("rotate", "360")])).is_ok());
        assert!(resolve(params(&[("rotate", "360.5")])).is_err());
    }

    #[test]
    fn saturation_allows_up_to_200() {
        assert!(resolve(params(&[("saturation_increase", "200")])).is_ok());
        assert!(resolve(params(&[("saturation_increase", "200.1")])).is_err());
    }

    #[test]
    fn non_numeric_float_is_rejected() {
        let (_, v) = violation(resolve(params(&[("brightness_increase", "bright")])));
        assert_eq!(v, Violation::NotANumber { param: "brightness" });
    }

    #[test]
    fn nan_is_not_a_number() {
        let (_, v) = violation(resolve(params(&[("contrast_increase", "NaN")])));
        assert_eq!(v, Violation::NotANumber { param: "contrast" });
    }

    #[test]
    fn infinity_is_out_of_range() {
        let (_, v) = violation(resolve(params(&[("rotate", "inf")])));
        assert_eq!(
            v,
            Violation::OutOfRange {
                param: "rotation angle",
                min: -MAX_ROTATION,
                max: MAX_ROTATION,
            }
        );
        let (_, v) = violation(resolve(params(&[("gaussian_blur", "-inf")])));
        assert!(matches!(v, Violation::OutOfRange { .. }));
    }

    #[test]
    fn missing_float_parameter() {
        let (_, v) = violation(resolve(params(&[("rotate", "")])));
        assert_eq!(
            v,
            Violation::Missing {
                param: "rotation angle"
            }
        );
    }

    #[test]
    fn one_bad_filter_fails_the_whole_request() {
        let result = resolve(params(&[("grayscale", ""), ("pixelate", "99")]));
        assert!(matches!(result, Err(ValidationError::Invalid { .. })));
    }

    #[test]
    fn error_message_names_filter_and_constraint() {
        let err = resolve(params(&[("pixelate", "51")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "filter 'pixelate': pixelate size too large (max 50)"
        );
    }

    // =========================================================================
    // Increase / decrease encoding
    // =========================================================================

    #[test]
    fn decrease_negates_magnitude() {
        let pipeline = resolve(params(&[("brightness_decrease", "25")])).unwrap();
        assert_eq!(
            pipeline.filters(),
            &[ResolvedFilter::BrightnessAdjust { percent: -25.0 }]
        );
    }

    #[test]
    fn increase_and_decrease_collapse_into_one_adjustment() {
        let pipeline = resolve(params(&[
            ("contrast_increase", "30"),
            ("contrast_decrease", "10"),
        ]))
        .unwrap();
        assert_eq!(
            pipeline.filters(),
            &[ResolvedFilter::ContrastAdjust { percent: 20.0 }]
        );
    }

    #[test]
    fn decrease_validated_before_collapse() {
        let result = resolve(params(&[
            ("saturation_increase", "50"),
            ("saturation_decrease", "500"),
        ]));
        let (filter, _) = violation(result);
        assert_eq!(filter, "saturation_decrease");
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn one_filter_per_recognized_key() {
        let pipeline = resolve(params(&[
            ("invert", ""),
            ("resize", "100x100"),
            ("gaussian_blur", "2"),
            ("rotate", "90"),
        ]))
        .unwrap();
        assert_eq!(pipeline.len(), 4);
    }

    #[test]
    fn pipeline_uses_canonical_order() {
        let pipeline = resolve(params(&[
            ("invert", ""),
            ("gaussian_blur", "2"),
            ("brightness_increase", "10"),
            ("crop_to_size", "50x50"),
            ("resize", "100x100"),
        ]))
        .unwrap();
        let kinds: Vec<FilterKind> = pipeline.filters().iter().map(|f| f.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                FilterKind::Resize,
                FilterKind::CropToSize,
                FilterKind::Brightness,
                FilterKind::GaussianBlur,
                FilterKind::Invert,
            ]
        );
    }

    #[test]
    fn order_independent_of_input_order() {
        let a = resolve(params(&[("rotate", "45"), ("resize", "10x10")])).unwrap();
        let b = resolve(params(&[("resize", "10x10"), ("rotate", "45")])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_key_keeps_last_value() {
        let pipeline = resolve(params(&[("pixelate", "4"), ("pixelate", "8")])).unwrap();
        assert_eq!(pipeline.filters(), &[ResolvedFilter::Pixelate { size: 8 }]);
    }

    // =========================================================================
    // Pipeline helpers
    // =========================================================================

    #[test]
    fn empty_pipeline_is_invalid() {
        assert_eq!(FilterPipeline::new(vec![]), Err(ValidationError::NoFilters));
    }

    #[test]
    fn output_bounds_compose_in_order() {
        let pipeline = resolve(params(&[
            ("resize", "1000x0"),
            ("crop_to_size", "400x400"),
            ("rotate", "90"),
        ]))
        .unwrap();
        // 2000x1000 → resize 1000x500 → crop 400x400 → rotate 400x400
        assert_eq!(pipeline.output_bounds((2000, 1000)), (400, 400));

        let pipeline = resolve(params(&[("crop_to_size", "300x100"), ("rotate", "-90")])).unwrap();
        assert_eq!(pipeline.output_bounds((2000, 1000)), (100, 300));
    }

    #[test]
    fn parse_filter_rejects_unknown_name() {
        assert_eq!(
            parse_filter("sepia", "1"),
            Err(ValidationError::Invalid {
                filter: "sepia".into(),
                violation: Violation::Unsupported
            })
        );
    }

    #[test]
    fn supported_filters_lists_every_key() {
        let keys: Vec<&str> = supported_filters().collect();
        assert_eq!(keys.len(), 13);
        assert!(keys.contains(&"saturation_decrease"));
    }

    #[test]
    fn pipeline_display() {
        let pipeline = resolve(params(&[("resize", "800x600"), ("grayscale", "")])).unwrap();
        assert_eq!(pipeline.to_string(), "resize(800x600) → grayscale");
    }
}
