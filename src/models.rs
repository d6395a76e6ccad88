//! Data types and associated functions and methods

use crate::chart::Figure;
use crate::derived;
use crate::labels;
use crate::limits::RelayoutData;
use crate::pipeline::Update;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum_macros::{Display, IntoStaticStr};
use validator::Validate;

/// Highest month selector value accepted from clients.
pub const MAX_MONTH: u8 = 12;

/// Categorical month filter.
///
/// 0 selects every record. 1 to 12 select records whose zero-based month index is one less than
/// the value. Any other value selects nothing.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MonthFilter(pub u8);

impl MonthFilter {
    pub const ALL: Self = Self(0);

    pub fn is_all(&self) -> bool {
        self.0 == 0
    }

    /// Whether a record with this pickup timestamp passes the filter.
    #[inline]
    pub fn matches(&self, timestamp: i64) -> bool {
        self.is_all()
            || derived::month_index(timestamp).map_or(false, |index| index + 1 == self.0)
    }

    /// Display label, `"All"` or a month abbreviation.
    pub fn label(&self) -> Option<&'static str> {
        labels::month(self.0)
    }
}

/// Bar chart y-axis scale
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    Hash,
    IntoStaticStr,
    PartialEq,
    Serialize,
)]
pub enum ScaleMode {
    #[default]
    Linear,
    Log,
}

impl ScaleMode {
    /// Axis type understood by the chart renderer.
    pub fn axis_type(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Log => "log",
        }
    }
}

/// Request data for a pipeline update
#[derive(Debug, Default, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateRequest {
    /// Month selector value
    #[serde(default)]
    #[validate(range(max = 12, message = "month must be between 0 and 12"))]
    pub month: u8,
    /// Relayout payload from the last heatmap render
    #[serde(default)]
    pub relayout_data: Option<RelayoutData>,
    /// Bar chart y-axis scale
    #[serde(default)]
    pub yaxis_type: ScaleMode,
}

impl UpdateRequest {
    pub fn filter(&self) -> MonthFilter {
        MonthFilter(self.month)
    }
}

/// An option of a selection control
#[derive(Debug, PartialEq, Serialize)]
pub struct SelectOption<V> {
    pub label: &'static str,
    pub value: V,
}

/// Options for the month and scale controls
#[derive(Debug, PartialEq, Serialize)]
pub struct OptionsResponse {
    pub months: Vec<SelectOption<u8>>,
    pub scales: Vec<SelectOption<ScaleMode>>,
}

impl OptionsResponse {
    pub fn new() -> Self {
        let months = (0..=MAX_MONTH)
            .zip(labels::MONTHS)
            .map(|(value, label)| SelectOption { label, value })
            .collect();
        let scales = [ScaleMode::Linear, ScaleMode::Log]
            .into_iter()
            .map(|value| SelectOption {
                label: value.into(),
                value,
            })
            .collect();
        Self { months, scales }
    }
}

impl Default for OptionsResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Response containing both chart specifications
#[derive(Debug, PartialEq, Serialize)]
pub struct FiguresResponse {
    /// Sequence number of the update that produced the figures
    pub sequence: u64,
    pub heatmap: Arc<Figure>,
    pub bar: Arc<Figure>,
}

impl From<Update> for FiguresResponse {
    fn from(update: Update) -> Self {
        Self {
            sequence: update.sequence.get(),
            heatmap: update.heatmap,
            bar: update.bar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::timestamp;

    use serde_json::json;
    use serde_test::{assert_de_tokens, assert_de_tokens_error, assert_tokens, Token};

    #[test]
    fn month_filter_all() {
        assert!(MonthFilter::ALL.is_all());
        assert!(MonthFilter::ALL.matches(timestamp(2015, 3, 1, 0)));
        assert!(MonthFilter::ALL.matches(i64::MAX));
        assert_eq!(Some("All"), MonthFilter::ALL.label());
    }

    #[test]
    fn month_filter_selects_one_month() {
        let january = MonthFilter(1);
        assert!(!january.is_all());
        assert!(january.matches(timestamp(2015, 1, 31, 23)));
        assert!(!january.matches(timestamp(2015, 2, 1, 0)));
        assert_eq!(Some("Jan"), january.label());
        let december = MonthFilter(12);
        assert!(december.matches(timestamp(2015, 12, 1, 0)));
        assert!(!december.matches(timestamp(2015, 11, 30, 0)));
    }

    #[test]
    fn month_filter_out_of_range() {
        let filter = MonthFilter(13);
        assert!(!filter.matches(timestamp(2015, 1, 1, 0)));
        assert!(!filter.matches(timestamp(2015, 12, 1, 0)));
        assert_eq!(None, filter.label());
        assert!(!MonthFilter(1).matches(i64::MAX));
    }

    #[test]
    fn month_filter_tokens() {
        assert_tokens(&MonthFilter(3), &[Token::U8(3)]);
    }

    #[test]
    fn scale_mode_tokens() {
        assert_tokens(
            &ScaleMode::Log,
            &[Token::UnitVariant {
                name: "ScaleMode",
                variant: "Log",
            }],
        );
        assert_eq!("Linear", ScaleMode::Linear.to_string());
        assert_eq!("log", ScaleMode::Log.axis_type());
        assert_eq!(ScaleMode::Linear, ScaleMode::default());
    }

    #[test]
    fn test_required_fields() {
        let request = UpdateRequest::default();
        assert_de_tokens(
            &request,
            &[
                Token::Struct {
                    name: "UpdateRequest",
                    len: 0,
                },
                Token::StructEnd,
            ],
        );
        request.validate().unwrap();
        assert_eq!(MonthFilter::ALL, request.filter());
    }

    #[test]
    fn test_optional_fields() {
        let mut relayout_data = RelayoutData::new();
        relayout_data.insert("autosize".to_string(), json!(true));
        let request = UpdateRequest {
            month: 4,
            relayout_data: Some(relayout_data),
            yaxis_type: ScaleMode::Log,
        };
        assert_de_tokens(
            &request,
            &[
                Token::Struct {
                    name: "UpdateRequest",
                    len: 3,
                },
                Token::Str("month"),
                Token::U8(4),
                Token::Str("relayout_data"),
                Token::Some,
                Token::Map { len: Some(1) },
                Token::Str("autosize"),
                Token::Bool(true),
                Token::MapEnd,
                Token::Str("yaxis_type"),
                Token::Enum { name: "ScaleMode" },
                Token::Str("Log"),
                Token::Unit,
                Token::StructEnd,
            ],
        );
        request.validate().unwrap();
        assert_eq!(MonthFilter(4), request.filter());
    }

    #[test]
    fn test_null_relayout_data() {
        let request: UpdateRequest =
            serde_json::from_value(json!({"month": 0, "relayout_data": null})).unwrap();
        assert_eq!(None, request.relayout_data);
    }

    #[test]
    fn test_invalid_yaxis_type() {
        assert_de_tokens_error::<UpdateRequest>(
            &[
                Token::Struct {
                    name: "UpdateRequest",
                    len: 1,
                },
                Token::Str("yaxis_type"),
                Token::Enum { name: "ScaleMode" },
                Token::Str("Sqrt"),
            ],
            "unknown variant `Sqrt`, expected `Linear` or `Log`",
        )
    }

    #[test]
    fn test_unknown_field() {
        assert_de_tokens_error::<UpdateRequest>(
            &[
                Token::Struct {
                    name: "UpdateRequest",
                    len: 1,
                },
                Token::Str("foo"),
                Token::StructEnd,
            ],
            "unknown field `foo`, expected one of `month`, `relayout_data`, `yaxis_type`",
        )
    }

    #[test]
    #[should_panic(expected = "month must be between 0 and 12")]
    fn test_invalid_month() {
        let request = UpdateRequest {
            month: 13,
            ..Default::default()
        };
        request.validate().unwrap()
    }

    #[test]
    fn options() {
        let options = OptionsResponse::new();
        assert_eq!(13, options.months.len());
        assert_eq!(
            SelectOption {
                label: "All",
                value: 0
            },
            options.months[0]
        );
        assert_eq!(
            SelectOption {
                label: "Dec",
                value: 12
            },
            options.months[12]
        );
        assert_eq!(
            json!({"label": "Log", "value": "Log"}),
            serde_json::to_value(&options.scales[1]).unwrap()
        );
    }
}
