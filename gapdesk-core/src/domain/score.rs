//! The common result shape returned by every analyzer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which tier of the data resolver supplied an analyzer's inputs.
///
/// Ordered from best to worst, so the tag of a result assembled from several
/// lookups is the `max` of its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataSource {
    Primary,
    Fallback,
    Proxy,
}

impl DataSource {
    /// True for the two live feed tiers.
    pub fn is_live(self) -> bool {
        !matches!(self, DataSource::Proxy)
    }

    pub fn worst(self, other: DataSource) -> DataSource {
        self.max(other)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Primary => write!(f, "Primary"),
            DataSource::Fallback => write!(f, "Fallback"),
            DataSource::Proxy => write!(f, "Proxy"),
        }
    }
}

/// One named contribution to an analyzer's total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsComponent {
    pub name: String,
    pub points: f64,
    pub reason: String,
}

/// Scored output of a single analyzer.
///
/// Components are only added through [`AnalyzerResult::push`] /
/// [`AnalyzerResult::with_component`], which keeps `total_points` equal to the
/// sum of component points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerResult {
    components: Vec<PointsComponent>,
    total_points: f64,
    data_source: DataSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl AnalyzerResult {
    pub fn new(data_source: DataSource) -> Self {
        Self {
            components: Vec::new(),
            total_points: 0.0,
            data_source,
            error: None,
        }
    }

    pub fn push(&mut self, name: impl Into<String>, points: f64, reason: impl Into<String>) {
        self.components.push(PointsComponent {
            name: name.into(),
            points,
            reason: reason.into(),
        });
        self.total_points = self.components.iter().map(|c| c.points).sum();
    }

    pub fn with_component(
        mut self,
        name: impl Into<String>,
        points: f64,
        reason: impl Into<String>,
    ) -> Self {
        self.push(name, points, reason);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn components(&self) -> &[PointsComponent] {
        &self.components
    }

    pub fn component(&self, name: &str) -> Option<&PointsComponent> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Points of the named component, 0.0 when absent.
    pub fn points_of(&self, name: &str) -> f64 {
        self.component(name).map_or(0.0, |c| c.points)
    }

    pub fn total_points(&self) -> f64 {
        self.total_points
    }

    pub fn data_source(&self) -> DataSource {
        self.data_source
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn bullish_part(&self) -> f64 {
        self.total_points.max(0.0)
    }

    pub fn bearish_part(&self) -> f64 {
        (-self.total_points).max(0.0)
    }
}
