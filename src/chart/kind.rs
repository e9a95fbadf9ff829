//! Chart type tags and their payload shapes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Chart type tag, as sent by clients in `chart_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Sequence,
    Line,
    Bar,
    Sequences,
    Lines,
    Bars,
    Scatter,
    Area,
    Areas,
    Pie,
    Radar,
    Surface,
    Text,
}

impl ChartType {
    /// All supported chart types
    pub const ALL: [ChartType; 13] = [
        ChartType::Sequence,
        ChartType::Line,
        ChartType::Bar,
        ChartType::Sequences,
        ChartType::Lines,
        ChartType::Bars,
        ChartType::Scatter,
        ChartType::Area,
        ChartType::Areas,
        ChartType::Pie,
        ChartType::Radar,
        ChartType::Surface,
        ChartType::Text,
    ];

    /// Wire tag for this chart type
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Sequence => "sequence",
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Sequences => "sequences",
            ChartType::Lines => "lines",
            ChartType::Bars => "bars",
            ChartType::Scatter => "scatter",
            ChartType::Area => "area",
            ChartType::Areas => "areas",
            ChartType::Pie => "pie",
            ChartType::Radar => "radar",
            ChartType::Surface => "surface",
            ChartType::Text => "text",
        }
    }

    /// Shape the `value` field must have for this chart type
    pub fn shape(&self) -> PayloadShape {
        match self {
            ChartType::Sequence | ChartType::Line | ChartType::Bar => PayloadShape::Number,
            ChartType::Sequences | ChartType::Lines | ChartType::Bars => PayloadShape::Map,
            ChartType::Scatter => PayloadShape::Coordinate,
            ChartType::Area | ChartType::Pie => PayloadShape::Dimension,
            ChartType::Areas | ChartType::Radar => PayloadShape::Dimensions,
            ChartType::Surface => PayloadShape::Surface,
            ChartType::Text => PayloadShape::Text,
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown chart tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chart type: {0}")]
pub struct UnknownChartType(pub String);

impl FromStr for ChartType {
    type Err = UnknownChartType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChartType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownChartType(s.to_string()))
    }
}

/// Shape contract for the `value` field of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// A single number
    Number,
    /// An object of series name to number
    Map,
    /// `[x, y]`, both numbers
    Coordinate,
    /// `[labels, values]` of equal length
    Dimension,
    /// `[labels, series, values]` where `series` and `values` have equal length
    Dimensions,
    /// `[axis(3), shape(2), points(rows * cols)]`
    Surface,
    /// A string
    Text,
}

impl PayloadShape {
    /// Example of an accepted payload, used in validation log lines
    pub fn expected_form(&self) -> &'static str {
        match self {
            PayloadShape::Number => "{id:xxx, timestamp:xxx, value:some_number}",
            PayloadShape::Map => "{id:xxx, timestamp:xxx, value:{A:some_number, B:some_number}}",
            PayloadShape::Coordinate => "{id:xxx, timestamp:xxx, value:[some_number, some_number]}",
            PayloadShape::Dimension => "{id:xxx, timestamp:xxx, value:[[A, B, C], [1, 2, 3]]}",
            PayloadShape::Dimensions => {
                "{id:xxx, timestamp:xxx, value:[[A, B, C], [label_1, label_2], [[1, 2, 3],[4, 5, 6]]]}"
            }
            PayloadShape::Surface => {
                "{id:xxx, timestamp:xxx, value:[[X, Y, Z], [rows, cols], [[x1, y1, z1], ...]]}"
            }
            PayloadShape::Text => "{id:xxx, timestamp:xxx, value:some_string}",
        }
    }
}
