//! Choosing which host application releases to test against.
//!
//! Input is a locally supplied release list; fetching it is left to the
//! caller.

use serde::{Deserialize, Serialize};

use crate::SemanticVersion;

/// Number of releases kept when neither `all` nor `limit` says otherwise.
pub const DEFAULT_VERSION_LIMIT: usize = 5;

/// One release as listed by a release feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
}

impl Release {
    pub fn stable(tag: impl Into<String>) -> Self {
        Self {
            tag_name: tag.into(),
            draft: false,
            prerelease: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCriteria {
    /// Oldest release to keep. Ignored when `all` is set.
    pub min_version: Option<SemanticVersion>,
    /// Only this tag, matched with or without a leading `v`.
    pub specific: Option<String>,
    pub include_prereleases: bool,
    /// Keep every matching release instead of the newest `limit`.
    pub all: bool,
    pub limit: usize,
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self {
            min_version: None,
            specific: None,
            include_prereleases: false,
            all: false,
            limit: DEFAULT_VERSION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRelease {
    pub tag: String,
    pub reason: String,
}

/// The versions document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSelection {
    /// Newest first.
    pub versions: Vec<String>,
    /// Newest non-draft, non-prerelease tag that parses.
    #[serde(default)]
    pub latest_stable: Option<String>,
    #[serde(default)]
    pub skipped: Vec<SkippedRelease>,
}

/// Filters and orders `releases`.
///
/// Drafts are dropped, as are pre-releases unless included. Tags that do
/// not parse are recorded in `skipped` with the reason. The rest are sorted
/// newest first and cut to `limit` unless `all` is set.
///
/// # Examples
///
/// ```
/// use contentpack_core::*;
///
/// let releases = vec![
///     Release::stable("v1.0.0"),
///     Release::stable("v1.2.0"),
///     Release { tag_name: "v2.0.0".into(), draft: true, prerelease: false },
///     Release::stable("nightly"),
/// ];
/// let selection = select_versions(&releases, &SelectionCriteria::default());
/// assert_eq!(selection.versions, ["v1.2.0", "v1.0.0"]);
/// assert_eq!(selection.latest_stable.as_deref(), Some("v1.2.0"));
/// assert_eq!(selection.skipped[0].tag, "nightly");
/// ```
pub fn select_versions(releases: &[Release], criteria: &SelectionCriteria) -> VersionSelection {
    let latest_stable = releases
        .iter()
        .filter(|r| !r.draft && !r.prerelease)
        .filter_map(|r| SemanticVersion::parse(&r.tag_name).ok().map(|v| (v, r)))
        .max_by_key(|(v, _)| *v)
        .map(|(_, r)| r.tag_name.clone());

    if let Some(wanted) = &criteria.specific {
        let bare = wanted.strip_prefix('v').unwrap_or(wanted);
        let versions = releases
            .iter()
            .find(|r| r.tag_name == bare || r.tag_name.strip_prefix('v') == Some(bare))
            .map(|r| vec![r.tag_name.clone()])
            .unwrap_or_default();
        if versions.is_empty() {
            tracing::warn!(version = %wanted, "requested version not found among releases");
        }
        return VersionSelection {
            versions,
            latest_stable,
            skipped: Vec::new(),
        };
    }

    let min_version = if criteria.all { None } else { criteria.min_version };
    let mut skipped = Vec::new();
    let mut kept: Vec<(SemanticVersion, &Release)> = Vec::new();

    for release in releases {
        if release.draft {
            continue;
        }
        if release.prerelease && !criteria.include_prereleases {
            continue;
        }
        match SemanticVersion::parse(&release.tag_name) {
            Ok(version) => {
                if min_version.is_some_and(|min| version < min) {
                    continue;
                }
                kept.push((version, release));
            }
            Err(err) => {
                tracing::warn!(tag = %release.tag_name, "skipping invalid version tag");
                skipped.push(SkippedRelease {
                    tag: release.tag_name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    kept.sort_by(|a, b| b.0.cmp(&a.0));
    if !criteria.all {
        kept.truncate(criteria.limit);
    }

    VersionSelection {
        versions: kept.into_iter().map(|(_, r)| r.tag_name.clone()).collect(),
        latest_stable,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(tag: &str, draft: bool, prerelease: bool) -> Release {
        Release {
            tag_name: tag.to_string(),
            draft,
            prerelease,
        }
    }

    fn tags(items: &[&str]) -> Vec<Release> {
        items.iter().map(|t| Release::stable(*t)).collect()
    }

    #[test]
    fn test_keeps_newest_five_by_default() {
        let releases = tags(&["v1.0.0", "v1.1.0", "v1.2.0", "v1.3.0", "v1.4.0", "v1.5.0", "v0.9.0"]);
        let selection = select_versions(&releases, &SelectionCriteria::default());
        assert_eq!(selection.versions, ["v1.5.0", "v1.4.0", "v1.3.0", "v1.2.0", "v1.1.0"]);
    }

    #[test]
    fn test_all_ignores_limit_and_min_version() {
        let releases = tags(&["v1.0.0", "v1.1.0", "v1.2.0", "v1.3.0", "v1.4.0", "v1.5.0", "v0.9.0"]);
        let criteria = SelectionCriteria {
            all: true,
            min_version: Some(SemanticVersion::new(1, 2, 0)),
            ..SelectionCriteria::default()
        };
        assert_eq!(select_versions(&releases, &criteria).versions.len(), 7);
    }

    #[test]
    fn test_min_version_filter() {
        let releases = tags(&["1.0.0", "1.2.0", "2.0.0"]);
        let criteria = SelectionCriteria {
            min_version: Some(SemanticVersion::new(1, 2, 0)),
            ..SelectionCriteria::default()
        };
        assert_eq!(select_versions(&releases, &criteria).versions, ["2.0.0", "1.2.0"]);
    }

    #[test]
    fn test_drafts_and_prereleases() {
        let releases = vec![
            release("v1.0.0", false, false),
            release("v1.1.0", true, false),
            release("v1.2.0", false, true),
        ];
        let default = select_versions(&releases, &SelectionCriteria::default());
        assert_eq!(default.versions, ["v1.0.0"]);
        assert_eq!(default.latest_stable.as_deref(), Some("v1.0.0"));

        let with_pre = SelectionCriteria {
            include_prereleases: true,
            ..SelectionCriteria::default()
        };
        assert_eq!(select_versions(&releases, &with_pre).versions, ["v1.2.0", "v1.0.0"]);
    }

    #[test]
    fn test_prerelease_tag_with_suffix_is_skipped_as_invalid() {
        let releases = vec![release("v2.0.0-rc1", false, true)];
        let criteria = SelectionCriteria {
            include_prereleases: true,
            ..SelectionCriteria::default()
        };
        let selection = select_versions(&releases, &criteria);
        assert!(selection.versions.is_empty());
        assert_eq!(selection.skipped[0].tag, "v2.0.0-rc1");
    }

    #[test]
    fn test_specific_matches_with_or_without_prefix() {
        let releases = tags(&["v1.0.0", "1.1.0"]);
        let pick = |s: &str| {
            select_versions(
                &releases,
                &SelectionCriteria {
                    specific: Some(s.to_string()),
                    ..SelectionCriteria::default()
                },
            )
            .versions
        };
        assert_eq!(pick("1.0.0"), ["v1.0.0"]);
        assert_eq!(pick("v1.0.0"), ["v1.0.0"]);
        assert_eq!(pick("v1.1.0"), ["1.1.0"]);
        assert!(pick("3.0.0").is_empty());
    }

    #[test]
    fn test_document_shape() {
        let selection = select_versions(&tags(&["v1.0.0"]), &SelectionCriteria::default());
        let doc = serde_json::to_value(&selection).unwrap();
        assert_eq!(doc["versions"][0], "v1.0.0");
        assert_eq!(doc["latest_stable"], "v1.0.0");

        let minimal: VersionSelection = serde_json::from_str(r#"{"versions": ["1.0.0"]}"#).unwrap();
        assert_eq!(minimal.versions, ["1.0.0"]);
    }
}
