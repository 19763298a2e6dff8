//! Compatibility resolution against a host application version.
//!
//! All `version_range` conditions on a pack are folded into a single
//! [`CompatibilityRequirement`]: the tightest lower bound and the tightest
//! upper bound win. A candidate version is then checked against that one
//! merged range.
//!
//! Resolution is fail-closed. A condition of an unknown type, or a bound
//! that does not parse, makes every candidate incompatible with a reason
//! naming the problem.
//!
//! # Example
//!
//! ```
//! use contentpack_core::*;
//!
//! let conditions = vec![
//!     CompatibilityCondition::version_range(Some("1.0.0"), None, "core features"),
//!     CompatibilityCondition::version_range(Some("2.0.0"), Some("3.0.0"), "timeline module"),
//! ];
//! let requirement = CompatibilityRequirement::from_conditions(&conditions);
//! assert_eq!(requirement.min_version, Some(SemanticVersion::new(2, 0, 0)));
//! assert_eq!(requirement.max_version, Some(SemanticVersion::new(3, 0, 0)));
//!
//! assert!(requirement.evaluate("v2.5.0").compatible);
//! assert!(!requirement.evaluate("1.5.0").compatible);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CompatibilityCondition, ConditionKind, SemanticVersion};

/// The intersection of every condition declared by a pack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRequirement {
    pub min_version: Option<SemanticVersion>,
    pub max_version: Option<SemanticVersion>,
    /// Declared reasons in declaration order.
    pub reasons: Vec<String>,
    /// Conditions that could not be honored (unknown type, bad bound).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
}

/// Outcome of checking one candidate version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compatibility {
    pub compatible: bool,
    /// Empty when compatible.
    pub reasons: Vec<String>,
}

impl Compatibility {
    fn compatible() -> Self {
        Self {
            compatible: true,
            reasons: Vec::new(),
        }
    }

    fn incompatible(reasons: Vec<String>) -> Self {
        Self {
            compatible: false,
            reasons,
        }
    }
}

impl CompatibilityRequirement {
    /// Folds conditions into one requirement.
    pub fn from_conditions(conditions: &[CompatibilityCondition]) -> Self {
        let mut requirement = Self::default();

        for condition in conditions {
            match &condition.kind {
                ConditionKind::VersionRange => {
                    if let Some(raw) = &condition.min_version {
                        match SemanticVersion::parse(raw) {
                            Ok(min) => {
                                requirement.min_version =
                                    Some(requirement.min_version.map_or(min, |cur| cur.max(min)));
                            }
                            Err(err) => requirement
                                .problems
                                .push(format!("Invalid version in compatibility condition: {err}")),
                        }
                    }
                    if let Some(raw) = &condition.max_version {
                        match SemanticVersion::parse(raw) {
                            Ok(max) => {
                                requirement.max_version =
                                    Some(requirement.max_version.map_or(max, |cur| cur.min(max)));
                            }
                            Err(err) => requirement
                                .problems
                                .push(format!("Invalid version in compatibility condition: {err}")),
                        }
                    }
                    requirement.reasons.push(condition.reason_text().to_string());
                }
                ConditionKind::Unknown(kind) => {
                    requirement
                        .problems
                        .push(format!("Unknown compatibility condition type: {kind}"));
                    requirement.reasons.push(condition.reason_text().to_string());
                }
            }
        }

        requirement
    }

    /// Displayable form of the merged range.
    pub fn range(&self) -> VersionRange {
        VersionRange {
            min: self.min_version,
            max: self.max_version,
        }
    }

    /// Checks `candidate` against the merged range.
    ///
    /// The candidate is always parsed first, so a malformed version is
    /// rejected even for a pack with no conditions.
    pub fn evaluate(&self, candidate: &str) -> Compatibility {
        let version = match SemanticVersion::parse(candidate) {
            Ok(version) => version,
            Err(err) => {
                return Compatibility::incompatible(vec![format!("Invalid version format: {err}")]);
            }
        };

        if !self.problems.is_empty() {
            return Compatibility::incompatible(self.problems.clone());
        }

        if let Some(min) = self.min_version {
            if version < min {
                return Compatibility::incompatible(vec![format!(
                    "Version {candidate} is below minimum required {min} (requires {})",
                    self.range()
                )]);
            }
        }

        if let Some(max) = self.max_version {
            if version > max {
                return Compatibility::incompatible(vec![format!(
                    "Version {candidate} is above maximum supported {max} (requires {})",
                    self.range()
                )]);
            }
        }

        Compatibility::compatible()
    }
}

/// A possibly open-ended version range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub min: Option<SemanticVersion>,
    pub max: Option<SemanticVersion>,
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "{min}..{max}"),
            (Some(min), None) => write!(f, ">= {min}"),
            (None, Some(max)) => write!(f, "<= {max}"),
            (None, None) => f.write_str("any version"),
        }
    }
}

/// Checks declared conditions against a candidate version.
///
/// # Examples
///
/// ```
/// use contentpack_core::*;
///
/// let conditions = [CompatibilityCondition::version_range(Some("1.2.0"), None, "r")];
/// assert!(is_compatible(&conditions, "1.2.0").compatible);
///
/// let verdict = is_compatible(&conditions, "1.1.9");
/// assert!(!verdict.compatible);
/// assert!(verdict.reasons[0].contains("1.2.0"));
///
/// assert!(is_compatible(&[], "9.9.9").compatible);
/// ```
pub fn is_compatible(conditions: &[CompatibilityCondition], candidate: &str) -> Compatibility {
    CompatibilityRequirement::from_conditions(conditions).evaluate(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(min: Option<&str>, max: Option<&str>, reason: &str) -> CompatibilityCondition {
        CompatibilityCondition::version_range(min, max, reason)
    }

    #[test]
    fn test_no_conditions_is_universally_compatible() {
        for candidate in ["0.0.0", "1.0.0", "v42.1.7"] {
            let verdict = is_compatible(&[], candidate);
            assert!(verdict.compatible);
            assert!(verdict.reasons.is_empty());
        }
    }

    #[test]
    fn test_min_bound_is_inclusive() {
        let conditions = [range(Some("1.2.0"), None, "needs 1.2")];
        assert!(is_compatible(&conditions, "1.2.0").compatible);
        assert!(is_compatible(&conditions, "v1.2.0").compatible);

        let verdict = is_compatible(&conditions, "1.1.9");
        assert!(!verdict.compatible);
        assert_eq!(verdict.reasons.len(), 1);
        assert!(verdict.reasons[0].contains("1.2.0"));
        assert!(verdict.reasons[0].contains("1.1.9"));
        assert!(verdict.reasons[0].contains(">= 1.2.0"));
    }

    #[test]
    fn test_max_bound_is_inclusive() {
        let conditions = [range(Some("1.0.0"), Some("2.0.0"), "r")];
        assert!(is_compatible(&conditions, "2.0.0").compatible);

        let verdict = is_compatible(&conditions, "2.0.1");
        assert!(!verdict.compatible);
        assert!(verdict.reasons[0].contains("1.0.0..2.0.0"));
        assert!(verdict.reasons[0].contains("2.0.1"));
    }

    #[test]
    fn test_merge_takes_tightest_bounds_and_keeps_reason_order() {
        let conditions = [
            range(Some("1.0.0"), None, "first"),
            range(Some("2.0.0"), Some("3.0.0"), "second"),
        ];
        let requirement = CompatibilityRequirement::from_conditions(&conditions);
        assert_eq!(requirement.min_version, Some(SemanticVersion::new(2, 0, 0)));
        assert_eq!(requirement.max_version, Some(SemanticVersion::new(3, 0, 0)));
        assert_eq!(requirement.reasons, vec!["first", "second"]);
    }

    #[test]
    fn test_merge_is_order_independent_for_bounds() {
        let a = range(Some("1.5.0"), Some("4.0.0"), "a");
        let b = range(Some("1.0.0"), Some("3.0.0"), "b");
        let ab = CompatibilityRequirement::from_conditions(&[a.clone(), b.clone()]);
        let ba = CompatibilityRequirement::from_conditions(&[b, a]);
        assert_eq!(ab.range(), ba.range());
        assert_eq!(ab.min_version, Some(SemanticVersion::new(1, 5, 0)));
        assert_eq!(ab.max_version, Some(SemanticVersion::new(3, 0, 0)));
    }

    #[test]
    fn test_unknown_condition_type_fails_closed() {
        let conditions = [CompatibilityCondition {
            kind: ConditionKind::Unknown("feature_flag".to_string()),
            min_version: None,
            max_version: None,
            reason: None,
        }];
        let verdict = is_compatible(&conditions, "1.0.0");
        assert!(!verdict.compatible);
        assert_eq!(
            verdict.reasons,
            vec!["Unknown compatibility condition type: feature_flag"]
        );
    }

    #[test]
    fn test_unknown_condition_reason_keeps_declaration_order() {
        let conditions = [
            range(Some("1.0.0"), None, "first"),
            CompatibilityCondition {
                kind: ConditionKind::Unknown("feature_flag".to_string()),
                min_version: None,
                max_version: None,
                reason: Some("needs flags".to_string()),
            },
            range(None, Some("3.0.0"), "last"),
        ];
        let requirement = CompatibilityRequirement::from_conditions(&conditions);
        assert_eq!(requirement.reasons, vec!["first", "needs flags", "last"]);
        assert_eq!(requirement.problems.len(), 1);
    }

    #[test]
    fn test_invalid_declared_bound_is_reported_not_coerced() {
        let conditions = [range(Some("1.0"), None, "r")];
        let requirement = CompatibilityRequirement::from_conditions(&conditions);
        assert_eq!(requirement.min_version, None);
        assert_eq!(requirement.problems.len(), 1);

        let verdict = requirement.evaluate("5.0.0");
        assert!(!verdict.compatible);
        assert!(verdict.reasons[0].starts_with("Invalid version in compatibility condition"));
    }

    #[test]
    fn test_invalid_candidate_is_incompatible() {
        let verdict = is_compatible(&[], "latest");
        assert!(!verdict.compatible);
        assert!(verdict.reasons[0].starts_with("Invalid version format:"));
    }

    #[test]
    fn test_disjoint_conditions_are_unsatisfiable() {
        let conditions = [
            range(Some("3.0.0"), None, "new api"),
            range(None, Some("2.0.0"), "old api"),
        ];
        let requirement = CompatibilityRequirement::from_conditions(&conditions);
        assert!(!requirement.evaluate("2.5.0").compatible);
        assert!(!requirement.evaluate("1.0.0").compatible);
        assert!(!requirement.evaluate("3.0.0").compatible);
    }

    #[test]
    fn test_range_display() {
        let only_max = CompatibilityRequirement::from_conditions(&[range(None, Some("2.0.0"), "r")]);
        assert_eq!(only_max.range().to_string(), "<= 2.0.0");
        assert_eq!(CompatibilityRequirement::default().range().to_string(), "any version");
    }
}
