//! Step identifiers, step status and overall pipeline status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// A named stage of the pipeline.
///
/// Variants are declared in pipeline order, and `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    /// Query classification (optional).
    Classification,
    /// Retrieval of hits.
    Search,
    /// Answer generation.
    Generation,
    /// Confidence scoring (optional).
    Confidence,
    /// Follow-up question generation (optional).
    Followup,
}

impl StepId {
    /// Every step, in declared order.
    pub const ALL: [Self; 5] = [
        Self::Classification,
        Self::Search,
        Self::Generation,
        Self::Confidence,
        Self::Followup,
    ];

    /// Returns true if the step may be left out of a run.
    #[must_use]
    pub fn is_optional(self) -> bool {
        !matches!(self, Self::Search | Self::Generation)
    }

    /// Returns the wire name of the step.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Search => "search",
            Self::Generation => "generation",
            Self::Confidence => "confidence",
            Self::Followup => "followup",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownStep(s.to_string()))
    }
}

/// The steps enabled for one run.
///
/// Search and generation are always members. Iteration follows declared order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<StepId>", into = "Vec<StepId>")]
pub struct EnabledSteps(BTreeSet<StepId>);

impl EnabledSteps {
    /// Creates a set from the given steps, adding the mandatory ones.
    pub fn new(steps: impl IntoIterator<Item = StepId>) -> Self {
        let mut set: BTreeSet<StepId> = steps.into_iter().collect();
        set.insert(StepId::Search);
        set.insert(StepId::Generation);
        Self(set)
    }

    /// Only the mandatory steps.
    #[must_use]
    pub fn required() -> Self {
        Self::new([])
    }

    /// Every step.
    #[must_use]
    pub fn all() -> Self {
        Self::new(StepId::ALL)
    }

    /// Returns true if the step is enabled.
    #[must_use]
    pub fn contains(&self, step: StepId) -> bool {
        self.0.contains(&step)
    }

    /// Iterates enabled steps in declared order.
    pub fn iter(&self) -> impl Iterator<Item = StepId> + '_ {
        self.0.iter().copied()
    }

    /// Returns the number of enabled steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; search and generation are always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The step a run starts with.
    #[must_use]
    pub fn first(&self) -> StepId {
        if self.contains(StepId::Classification) {
            StepId::Classification
        } else {
            StepId::Search
        }
    }
}

impl Default for EnabledSteps {
    fn default() -> Self {
        Self::required()
    }
}

impl From<Vec<StepId>> for EnabledSteps {
    fn from(steps: Vec<StepId>) -> Self {
        Self::new(steps)
    }
}

impl From<EnabledSteps> for Vec<StepId> {
    fn from(steps: EnabledSteps) -> Self {
        steps.0.into_iter().collect()
    }
}

impl FromIterator<StepId> for EnabledSteps {
    fn from_iter<I: IntoIterator<Item = StepId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl FromStr for EnabledSteps {
    type Err = ConfigError;

    /// Parses a comma-separated list such as `"classification,search,generation"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<StepId>, _>>()
            .map(Self::new)
    }
}

/// The execution status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Enabled but not started.
    #[default]
    Pending,
    /// Started and possibly receiving updates.
    Running,
    /// Finished with its final data.
    Complete,
    /// Failed. The reducer never assigns this itself; an overall error leaves
    /// steps frozen in whatever status they had.
    Error,
}

impl StepStatus {
    /// Returns true if the step can no longer change within the run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The status of the pipeline as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// No run has started since the last reset.
    #[default]
    Idle,
    /// A run is in progress.
    Running,
    /// The last run finished.
    Complete,
    /// The last run failed.
    Error,
}

impl OverallStatus {
    /// Returns true once a run has finished, successfully or not.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Returns true if a new run may start from this status.
    #[must_use]
    pub fn can_start(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}
