use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::complex::Complex;
use crate::error::{CoreError, ViewStateParseError};

/// The visible region of the complex plane plus the iteration cap.
///
/// A `ViewState` is a plain value: every mutation is a method returning a
/// new state, so a copy captured by an in-flight render never changes
/// underneath it. The output raster size is not part of the state; it is
/// passed in wherever pixel coordinates are involved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewState {
    /// Real part of the view center.
    pub center_x: f64,
    /// Imaginary part of the view center.
    pub center_y: f64,
    /// Complex-plane units per pixel.
    pub scale: f64,
    pub max_iterations: u32,
}

/// Deserialization goes through the same validation as [`ViewState::new`].
impl<'de> Deserialize<'de> for ViewState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            center_x: f64,
            center_y: f64,
            scale: f64,
            max_iterations: u32,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.center_x, raw.center_y, raw.scale, raw.max_iterations)
            .map_err(serde::de::Error::custom)
    }
}

impl ViewState {
    pub const DEFAULT_CENTER_X: f64 = -0.5;
    pub const DEFAULT_CENTER_Y: f64 = 0.0;
    /// Imaginary-axis span shown by the default view.
    pub const DEFAULT_SPAN: f64 = 3.0;
    pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;

    pub fn new(center_x: f64, center_y: f64, scale: f64, max_iterations: u32) -> crate::Result<Self> {
        if !center_x.is_finite() || !center_y.is_finite() {
            return Err(CoreError::InvalidOrigin {
                re: center_x,
                im: center_y,
            });
        }
        if scale <= 0.0 || !scale.is_finite() {
            return Err(CoreError::InvalidScale(scale));
        }
        if max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(max_iterations));
        }
        Ok(Self {
            center_x,
            center_y,
            scale,
            max_iterations,
        })
    }

    /// Default view: the whole set, three plane units tall.
    pub fn default_for_height(height: u32) -> Self {
        Self {
            center_x: Self::DEFAULT_CENTER_X,
            center_y: Self::DEFAULT_CENTER_Y,
            scale: Self::DEFAULT_SPAN / height.max(1) as f64,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Parse the serialized form, or return `fallback`.
    ///
    /// A missing or malformed query is never fatal.
    pub fn load_or(query: Option<&str>, fallback: Self) -> Self {
        match query.map(Self::from_query) {
            Some(Ok(state)) => {
                debug!(query = %state, "Loaded view state");
                state
            }
            Some(Err(e)) => {
                warn!("Ignoring malformed view state ({e}); using default view");
                fallback
            }
            None => fallback,
        }
    }

    pub fn center(&self) -> Complex {
        Complex::new(self.center_x, self.center_y)
    }

    /// Complex-plane coordinate of the top-left pixel of a `width`×`height` raster.
    pub fn origin(&self, width: u32, height: u32) -> Complex {
        Complex::new(
            self.center_x - self.scale * (width as f64 / 2.0),
            self.center_y - self.scale * (height as f64 / 2.0),
        )
    }

    /// Map (possibly fractional) pixel coordinates to the complex plane.
    pub fn pixel_to_complex(&self, px: f64, py: f64, width: u32, height: u32) -> Complex {
        self.origin(width, height) + Complex::new(px, py) * self.scale
    }

    /// Move the view center by a pixel offset.
    pub fn shifted(self, dx: f64, dy: f64) -> Self {
        Self {
            center_x: self.center_x + dx * self.scale,
            center_y: self.center_y + dy * self.scale,
            ..self
        }
    }

    /// Drag the image by a pixel delta: content follows the pointer, so
    /// the center moves the opposite way.
    pub fn panned(self, dx: f64, dy: f64) -> Self {
        self.shifted(-dx, -dy)
    }

    /// Zoom by `factor` (> 1 zooms in) keeping the plane point under the
    /// pixel anchor `(px, py)` fixed.
    pub fn zoomed_at(self, px: f64, py: f64, width: u32, height: u32, factor: f64) -> Self {
        if factor <= 0.0 || !factor.is_finite() {
            return self;
        }
        let offset = Complex::new(px - width as f64 / 2.0, py - height as f64 / 2.0);
        let anchor = self.center() + offset * self.scale;
        let scale = self.scale / factor;
        let center = anchor - offset * scale;
        Self {
            center_x: center.re,
            center_y: center.im,
            scale,
            ..self
        }
    }

    /// Scale the iteration cap by `factor`, rounding, with a floor of 1.
    pub fn with_iterations_scaled(self, factor: f64) -> Self {
        let scaled = (self.max_iterations as f64 * factor).round();
        let max_iterations = if scaled >= u32::MAX as f64 {
            u32::MAX
        } else {
            (scaled as u32).max(1)
        };
        Self {
            max_iterations,
            ..self
        }
    }

    /// Serialize as `cx=..&cy=..&pp=..&it=..`.
    ///
    /// `f64`'s `Display` prints the shortest string that parses back to the
    /// same value, so the round trip is exact.
    pub fn to_query(&self) -> String {
        format!(
            "cx={}&cy={}&pp={}&it={}",
            self.center_x, self.center_y, self.scale, self.max_iterations
        )
    }

    /// Parse the query-string form produced by [`to_query`](Self::to_query).
    ///
    /// Accepts a bare query, a leading `?`, or a full URL; unknown keys are
    /// ignored and the first occurrence of a key wins. Any missing or
    /// non-numeric field fails the whole parse.
    pub fn from_query(input: &str) -> Result<Self, ViewStateParseError> {
        let query = match input.split_once('?') {
            Some((_, q)) => q,
            None => input,
        };
        let query = query.split('#').next().unwrap_or_default();

        let lookup = |key: &'static str| -> Result<&str, ViewStateParseError> {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.trim())
                .ok_or(ViewStateParseError::MissingField(key))
        };

        let center_x = parse_finite("cx", lookup("cx")?)?;
        let center_y = parse_finite("cy", lookup("cy")?)?;
        let scale = parse_finite("pp", lookup("pp")?)?;
        if scale <= 0.0 {
            return Err(ViewStateParseError::OutOfRange {
                field: "pp",
                value: scale.to_string(),
            });
        }

        let raw_it = lookup("it")?;
        let max_iterations: u32 = raw_it.parse().map_err(|_| ViewStateParseError::InvalidNumber {
            field: "it",
            value: raw_it.to_string(),
        })?;
        if max_iterations < 1 {
            return Err(ViewStateParseError::OutOfRange {
                field: "it",
                value: raw_it.to_string(),
            });
        }

        Ok(Self {
            center_x,
            center_y,
            scale,
            max_iterations,
        })
    }
}

fn parse_finite(field: &'static str, raw: &str) -> Result<f64, ViewStateParseError> {
    let value: f64 = raw.parse().map_err(|_| ViewStateParseError::InvalidNumber {
        field,
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(ViewStateParseError::OutOfRange {
            field,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}

impl FromStr for ViewState {
    type Err = ViewStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_query(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    fn state() -> ViewState {
        ViewState::new(-0.743643887037151, 0.13182590420533, 1.5e-9, 4321).unwrap()
    }

    #[test]
    fn default_view() {
        let vp = ViewState::default_for_height(600);
        assert!((vp.center_x - (-0.5)).abs() < EPSILON);
        assert!(vp.center_y.abs() < EPSILON);
        assert!((vp.scale - 3.0 / 600.0).abs() < EPSILON);
        assert_eq!(vp.max_iterations, 1000);
    }

    #[test]
    fn query_round_trip_is_exact() {
        let samples = [
            state(),
            ViewState::default_for_height(500),
            ViewState::new(1e-300, -123456.789, 7.0e-17, 1).unwrap(),
            ViewState::new(0.1 + 0.2, -0.0, 1.0 / 3.0, u32::MAX).unwrap(),
        ];
        for s in samples {
            let parsed = ViewState::from_query(&s.to_query()).unwrap();
            assert_eq!(parsed, s, "round trip of {s}");
        }
    }

    #[test]
    fn parse_accepts_url_and_extra_keys() {
        let url = format!("https://example.test/fractal?theme=dark&{}#frag", state());
        assert_eq!(ViewState::from_query(&url).unwrap(), state());
        assert_eq!(format!("?{}", state()).parse::<ViewState>().unwrap(), state());
    }

    #[test]
    fn missing_field_fails_whole_parse() {
        assert_eq!(
            ViewState::from_query("cx=0&cy=0&pp=0.01"),
            Err(ViewStateParseError::MissingField("it"))
        );
        assert_eq!(
            ViewState::from_query(""),
            Err(ViewStateParseError::MissingField("cx"))
        );
    }

    #[test]
    fn non_numeric_field_fails_whole_parse() {
        assert!(matches!(
            ViewState::from_query("cx=abc&cy=0&pp=0.01&it=10"),
            Err(ViewStateParseError::InvalidNumber { field: "cx", .. })
        ));
        assert!(matches!(
            ViewState::from_query("cx=0&cy=0&pp=0.01&it=1.5"),
            Err(ViewStateParseError::InvalidNumber { field: "it", .. })
        ));
    }

    #[test]
    fn out_of_range_fields_rejected() {
        for q in [
            "cx=0&cy=0&pp=0&it=10",
            "cx=0&cy=0&pp=-1&it=10",
            "cx=NaN&cy=0&pp=0.01&it=10",
            "cx=0&cy=inf&pp=0.01&it=10",
            "cx=0&cy=0&pp=0.01&it=0",
        ] {
            assert!(
                matches!(
                    ViewState::from_query(q),
                    Err(ViewStateParseError::OutOfRange { .. })
                ),
                "{q} should be out of range"
            );
        }
    }

    #[test]
    fn load_or_substitutes_fallback() {
        let default = ViewState::default_for_height(300);
        let fallback = ViewState::load_or(Some("cx=1&cy=2"), default);
        assert_eq!(fallback, default);

        let none = ViewState::load_or(None, default);
        assert_eq!(none, default);

        let loaded = ViewState::load_or(Some(&state().to_query()), default);
        assert_eq!(loaded, state());
    }

    #[test]
    fn origin_is_top_left() {
        let s = ViewState::new(0.0, 0.0, 0.5, 10).unwrap();
        let o = s.origin(100, 40);
        assert!((o.re - (-25.0)).abs() < EPSILON);
        assert!((o.im - (-10.0)).abs() < EPSILON);
        let center = s.pixel_to_complex(50.0, 20.0, 100, 40);
        assert!(center.re.abs() < EPSILON && center.im.abs() < EPSILON);
    }

    #[test]
    fn zoom_at_center_halves_scale() {
        let s = ViewState::new(-0.5, 0.25, 0.01, 100).unwrap();
        let z = s.zoomed_at(400.0, 300.0, 800, 600, 2.0);
        assert!((z.scale - 0.005).abs() < EPSILON);
        assert!((z.center_x - (-0.5)).abs() < EPSILON);
        assert!((z.center_y - 0.25).abs() < EPSILON);
        assert_eq!(z.max_iterations, 100);
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let s = ViewState::new(-0.5, 0.0, 0.01, 100).unwrap();
        let (px, py, w, h) = (120.0, 470.0, 800, 600);
        let before = s.pixel_to_complex(px, py, w, h);
        for factor in [2.0, 1.2, 1.0 / 1.2, 10.0] {
            let after = s.zoomed_at(px, py, w, h, factor).pixel_to_complex(px, py, w, h);
            assert!((before.re - after.re).abs() < 1e-9);
            assert!((before.im - after.im).abs() < 1e-9);
        }
    }

    #[test]
    fn invalid_zoom_factor_is_ignored() {
        let s = state();
        assert_eq!(s.zoomed_at(1.0, 1.0, 10, 10, 0.0), s);
        assert_eq!(s.zoomed_at(1.0, 1.0, 10, 10, f64::NAN), s);
    }

    #[test]
    fn pan_moves_center_against_drag() {
        let s = ViewState::new(0.0, 0.0, 0.5, 10).unwrap();
        let p = s.panned(10.0, -4.0);
        assert!((p.center_x - (-5.0)).abs() < EPSILON);
        assert!((p.center_y - 2.0).abs() < EPSILON);
        assert_eq!(p.scale, s.scale);
    }

    #[test]
    fn iteration_scaling_rounds_with_floor() {
        let s = ViewState::new(0.0, 0.0, 1.0, 1000).unwrap();
        assert_eq!(s.with_iterations_scaled(1.5).max_iterations, 1500);
        assert_eq!(s.with_iterations_scaled(1.0 / 1.5).max_iterations, 667);

        let one = ViewState::new(0.0, 0.0, 1.0, 1).unwrap();
        assert_eq!(one.with_iterations_scaled(1.0 / 1.5).max_iterations, 1);
        assert_eq!(one.with_iterations_scaled(1.5).max_iterations, 2);
    }

    #[test]
    fn invalid_state_rejected() {
        assert!(ViewState::new(0.0, 0.0, 0.0, 10).is_err());
        assert!(ViewState::new(0.0, 0.0, -1.0, 10).is_err());
        assert!(ViewState::new(0.0, 0.0, 1.0, 0).is_err());
        assert!(ViewState::new(f64::NAN, 0.0, 1.0, 10).is_err());
    }

    #[test]
    fn serde_validates_on_load() {
        let json = serde_json::to_string(&state()).unwrap();
        let back: ViewState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state());

        let bad = r#"{"center_x":0.0,"center_y":0.0,"scale":-1.0,"max_iterations":5}"#;
        assert!(serde_json::from_str::<ViewState>(bad).is_err());
    }

    #[test]
    fn parse_error_converts_into_core_error() {
        let err: CoreError = "cx=1&cy=2&pp=3".parse::<ViewState>().unwrap_err().into();
        assert!(matches!(
            err,
            CoreError::ViewStateParse(ViewStateParseError::MissingField("it"))
        ));
    }
}
