//! Viewport limits and their resolution from render events.
//!
//! A render event is normalised into a [ViewportEvent] as soon as it enters the pipeline, so
//! nothing downstream inspects the partially populated payload.

use serde_json::Value;

/// Raw relayout payload emitted by the heatmap view after a zoom, pan, reset or autosize.
pub type RelayoutData = serde_json::Map<String, Value>;

const X_MIN: &str = "xaxis.range[0]";
const X_MAX: &str = "xaxis.range[1]";
const Y_MIN: &str = "yaxis.range[0]";
const Y_MAX: &str = "yaxis.range[1]";

/// A numeric interval `[min, max]` on one axis.
///
/// Nothing enforces `min < max`, or that either bound is finite. Bounds compare by bit pattern,
/// so a range with a NaN bound equals itself.
#[derive(Clone, Copy, Debug)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl PartialEq for Range {
    fn eq(&self, other: &Self) -> bool {
        self.min.to_bits() == other.min.to_bits() && self.max.to_bits() == other.max.to_bits()
    }
}

impl Eq for Range {}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Width of the interval. Negative for an inverted range.
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Whether values can be placed into regular bins of this range.
    pub fn is_proper(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }
}

/// The spatial window: one [Range] per spatial axis.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Limits {
    pub x: Range,
    pub y: Range,
}

impl Limits {
    pub fn new(x: Range, y: Range) -> Self {
        Self { x, y }
    }

    /// The limits as `[[x_min, x_max], [y_min, y_max]]`.
    pub fn to_array(&self) -> [[f64; 2]; 2] {
        [[self.x.min, self.x.max], [self.y.min, self.y.max]]
    }
}

/// A render event after normalisation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewportEvent {
    /// No user zoom applies. The default limits are used.
    NoOverride,
    /// The user zoomed or panned to these limits.
    Override(Limits),
}

impl ViewportEvent {
    /// Normalise an optional relayout payload.
    ///
    /// The payload is an override only when all four axis range keys are present and numeric.
    /// Anything else, such as an autosize event, is treated as no override.
    pub fn from_relayout(relayout: Option<&RelayoutData>) -> Self {
        let Some(data) = relayout else {
            return Self::NoOverride;
        };
        let field = |key: &str| data.get(key).and_then(Value::as_f64);
        match (field(X_MIN), field(X_MAX), field(Y_MIN), field(Y_MAX)) {
            (Some(x_min), Some(x_max), Some(y_min), Some(y_max)) => Self::Override(Limits::new(
                Range::new(x_min, x_max),
                Range::new(y_min, y_max),
            )),
            _ => Self::NoOverride,
        }
    }
}

/// Resolve the active limits for an event.
///
/// User limits are used verbatim, even when inverted or outside the default.
pub fn resolve(event: &ViewportEvent, default: &Limits) -> Limits {
    match event {
        ViewportEvent::NoOverride => *default,
        ViewportEvent::Override(limits) => *limits,
    }
}
