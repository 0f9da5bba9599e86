//! WCAG criteria catalog and the subtractive applicability resolver.
//!
//! Turns a testing-scope declaration (which content categories were covered)
//! and a target conformance level into the concrete set of applicable
//! success criteria. The algorithm is subtractive: omitted or unset
//! categories never add criteria, and a criterion claimed by any tested
//! category is never removed on behalf of an untested one.
//!
//! The per-category lists only contain criteria that are exclusively about
//! that category. General criteria (keyboard access, text alternatives,
//! contrast, ...) appear in no category list and therefore always survive
//! scope subtraction.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// WCAG conformance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    A,
    AA,
    AAA,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::A => write!(f, "A"),
            Level::AA => write!(f, "AA"),
            Level::AAA => write!(f, "AAA"),
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Level::A),
            "AA" => Ok(Level::AA),
            "AAA" => Ok(Level::AAA),
            other => Err(format!("unknown conformance level: {other}")),
        }
    }
}

/// A single WCAG success criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Criterion {
    /// Criterion number, e.g. "1.4.3"
    pub number: &'static str,
    /// Criterion name, e.g. "Contrast (Minimum)"
    pub name: &'static str,
    /// Conformance level the criterion belongs to
    pub level: Level,
}

/// Content categories a testing scope can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Forms,
    Video,
    Audio,
    Zoom,
    Timeouts,
    Multilingual,
    Orientation,
    MotionActuation,
    DragDrop,
    LiveMultimedia,
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            ContentCategory::Forms => "forms",
            ContentCategory::Video => "video",
            ContentCategory::Audio => "audio",
            ContentCategory::Zoom => "zoom",
            ContentCategory::Timeouts => "timeouts",
            ContentCategory::Multilingual => "multilingual",
            ContentCategory::Orientation => "orientation",
            ContentCategory::MotionActuation => "motion_actuation",
            ContentCategory::DragDrop => "drag_drop",
            ContentCategory::LiveMultimedia => "live_multimedia",
        };
        write!(f, "{key}")
    }
}

impl FromStr for ContentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "forms" => Ok(ContentCategory::Forms),
            "video" => Ok(ContentCategory::Video),
            "audio" => Ok(ContentCategory::Audio),
            "zoom" => Ok(ContentCategory::Zoom),
            "timeouts" => Ok(ContentCategory::Timeouts),
            "multilingual" => Ok(ContentCategory::Multilingual),
            "orientation" => Ok(ContentCategory::Orientation),
            "motion_actuation" => Ok(ContentCategory::MotionActuation),
            "drag_drop" => Ok(ContentCategory::DragDrop),
            "live_multimedia" => Ok(ContentCategory::LiveMultimedia),
            other => Err(format!("unknown content category: {other}")),
        }
    }
}

impl ContentCategory {
    /// All known categories, in declaration order.
    pub const ALL: [ContentCategory; 10] = [
        ContentCategory::Forms,
        ContentCategory::Video,
        ContentCategory::Audio,
        ContentCategory::Zoom,
        ContentCategory::Timeouts,
        ContentCategory::Multilingual,
        ContentCategory::Orientation,
        ContentCategory::MotionActuation,
        ContentCategory::DragDrop,
        ContentCategory::LiveMultimedia,
    ];

    /// Criteria that are exclusively about this category.
    ///
    /// A criterion may appear under more than one category (e.g. 1.2.1 is
    /// both audio and video content); it is removed only when no tested
    /// category claims it.
    pub fn criteria(self) -> &'static [&'static str] {
        match self {
            ContentCategory::Forms => {
                &["1.3.5", "3.3.1", "3.3.2", "3.3.3", "3.3.4", "3.3.5", "3.3.6"]
            }
            ContentCategory::Video => {
                &["1.2.1", "1.2.2", "1.2.3", "1.2.5", "1.2.6", "1.2.7", "1.2.8"]
            }
            ContentCategory::Audio => &["1.2.1", "1.4.2", "1.4.7"],
            ContentCategory::Zoom => &["1.4.4", "1.4.10"],
            ContentCategory::Timeouts => &["2.2.1", "2.2.3", "2.2.5", "2.2.6"],
            ContentCategory::Multilingual => &["3.1.2"],
            ContentCategory::Orientation => &["1.3.4"],
            ContentCategory::MotionActuation => &["2.5.4"],
            ContentCategory::DragDrop => &["2.5.1"],
            ContentCategory::LiveMultimedia => &["1.2.4", "1.2.9"],
        }
    }
}

/// A testing-scope declaration: which content categories were tested.
///
/// Categories absent from the map are neither kept nor removed by them;
/// only an explicit `false` subtracts and only an explicit `true` protects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestingScope(pub BTreeMap<ContentCategory, bool>);

impl TestingScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a category as tested (`true`) or untested (`false`).
    pub fn set(mut self, category: ContentCategory, tested: bool) -> Self {
        self.0.insert(category, tested);
        self
    }

    fn categories_where(&self, tested: bool) -> impl Iterator<Item = ContentCategory> + '_ {
        self.0
            .iter()
            .filter(move |(_, t)| **t == tested)
            .map(|(c, _)| *c)
    }
}

/// The full WCAG 2.1 success criteria catalog.
pub static CATALOG: &[Criterion] = &[
    Criterion { number: "1.1.1", name: "Non-text Content", level: Level::A },
    Criterion { number: "1.2.1", name: "Audio-only and Video-only (Prerecorded)", level: Level::A },
    Criterion { number: "1.2.2", name: "Captions (Prerecorded)", level: Level::A },
    Criterion { number: "1.2.3", name: "Audio Description or Media Alternative (Prerecorded)", level: Level::A },
    Criterion { number: "1.2.4", name: "Captions (Live)", level: Level::AA },
    Criterion { number: "1.2.5", name: "Audio Description (Prerecorded)", level: Level::AA },
    Criterion { number: "1.2.6", name: "Sign Language (Prerecorded)", level: Level::AAA },
    Criterion { number: "1.2.7", name: "Extended Audio Description (Prerecorded)", level: Level::AAA },
    Criterion { number: "1.2.8", name: "Media Alternative (Prerecorded)", level: Level::AAA },
    Criterion { number: "1.2.9", name: "Audio-only (Live)", level: Level::AAA },
    Criterion { number: "1.3.1", name: "Info and Relationships", level: Level::A },
    Criterion { number: "1.3.2", name: "Meaningful Sequence", level: Level::A },
    Criterion { number: "1.3.3", name: "Sensory Characteristics", level: Level::A },
    Criterion { number: "1.3.4", name: "Orientation", level: Level::AA },
    Criterion { number: "1.3.5", name: "Identify Input Purpose", level: Level::AA },
    Criterion { number: "1.3.6", name: "Identify Purpose", level: Level::AAA },
    Criterion { number: "1.4.1", name: "Use of Color", level: Level::A },
    Criterion { number: "1.4.2", name: "Audio Control", level: Level::A },
    Criterion { number: "1.4.3", name: "Contrast (Minimum)", level: Level::AA },
    Criterion { number: "1.4.4", name: "Resize Text", level: Level::AA },
    Criterion { number: "1.4.5", name: "Images of Text", level: Level::AA },
    Criterion { number: "1.4.6", name: "Contrast (Enhanced)", level: Level::AAA },
    Criterion { number: "1.4.7", name: "Low or No Background Audio", level: Level::AAA },
    Criterion { number: "1.4.8", name: "Visual Presentation", level: Level::AAA },
    Criterion { number: "1.4.9", name: "Images of Text (No Exception)", level: Level::AAA },
    Criterion { number: "1.4.10", name: "Reflow", level: Level::AA },
    Criterion { number: "1.4.11", name: "Non-text Contrast", level: Level::AA },
    Criterion { number: "1.4.12", name: "Text Spacing", level: Level::AA },
    Criterion { number: "1.4.13", name: "Content on Hover or Focus", level: Level::AA },
    Criterion { number: "2.1.1", name: "Keyboard", level: Level::A },
    Criterion { number: "2.1.2", name: "No Keyboard Trap", level: Level::A },
    Criterion { number: "2.1.3", name: "Keyboard (No Exception)", level: Level::AAA },
    Criterion { number: "2.1.4", name: "Character Key Shortcuts", level: Level::A },
    Criterion { number: "2.2.1", name: "Timing Adjustable", level: Level::A },
    Criterion { number: "2.2.2", name: "Pause, Stop, Hide", level: Level::A },
    Criterion { number: "2.2.3", name: "No Timing", level: Level::AAA },
    Criterion { number: "2.2.4", name: "Interruptions", level: Level::AAA },
    Criterion { number: "2.2.5", name: "Re-authenticating", level: Level::AAA },
    Criterion { number: "2.2.6", name: "Timeouts", level: Level::AAA },
    Criterion { number: "2.3.1", name: "Three Flashes or Below Threshold", level: Level::A },
    Criterion { number: "2.3.2", name: "Three Flashes", level: Level::AAA },
    Criterion { number: "2.3.3", name: "Animation from Interactions", level: Level::AAA },
    Criterion { number: "2.4.1", name: "Bypass Blocks", level: Level::A },
    Criterion { number: "2.4.2", name: "Page Titled", level: Level::A },
    Criterion { number: "2.4.3", name: "Focus Order", level: Level::A },
    Criterion { number: "2.4.4", name: "Link Purpose (In Context)", level: Level::A },
    Criterion { number: "2.4.5", name: "Multiple Ways", level: Level::AA },
    Criterion { number: "2.4.6", name: "Headings and Labels", level: Level::AA },
    Criterion { number: "2.4.7", name: "Focus Visible", level: Level::AA },
    Criterion { number: "2.4.8", name: "Location", level: Level::AAA },
    Criterion { number: "2.4.9", name: "Link Purpose (Link Only)", level: Level::AAA },
    Criterion { number: "2.4.10", name: "Section Headings", level: Level::AAA },
    Criterion { number: "2.5.1", name: "Pointer Gestures", level: Level::A },
    Criterion { number: "2.5.2", name: "Pointer Cancellation", level: Level::A },
    Criterion { number: "2.5.3", name: "Label in Name", level: Level::A },
    Criterion { number: "2.5.4", name: "Motion Actuation", level: Level::A },
    Criterion { number: "2.5.5", name: "Target Size", level: Level::AAA },
    Criterion { number: "2.5.6", name: "Concurrent Input Mechanisms", level: Level::AAA },
    Criterion { number: "3.1.1", name: "Language of Page", level: Level::A },
    Criterion { number: "3.1.2", name: "Language of Parts", level: Level::AA },
    Criterion { number: "3.1.3", name: "Unusual Words", level: Level::AAA },
    Criterion { number: "3.1.4", name: "Abbreviations", level: Level::AAA },
    Criterion { number: "3.1.5", name: "Reading Level", level: Level::AAA },
    Criterion { number: "3.1.6", name: "Pronunciation", level: Level::AAA },
    Criterion { number: "3.2.1", name: "On Focus", level: Level::A },
    Criterion { number: "3.2.2", name: "On Input", level: Level::A },
    Criterion { number: "3.2.3", name: "Consistent Navigation", level: Level::AA },
    Criterion { number: "3.2.4", name: "Consistent Identification", level: Level::AA },
    Criterion { number: "3.2.5", name: "Change on Request", level: Level::AAA },
    Criterion { number: "3.3.1", name: "Error Identification", level: Level::A },
    Criterion { number: "3.3.2", name: "Labels or Instructions", level: Level::A },
    Criterion { number: "3.3.3", name: "Error Suggestion", level: Level::AA },
    Criterion { number: "3.3.4", name: "Error Prevention (Legal, Financial, Data)", level: Level::AA },
    Criterion { number: "3.3.5", name: "Help", level: Level::AAA },
    Criterion { number: "3.3.6", name: "Error Prevention (All)", level: Level::AAA },
];

static BY_NUMBER: Lazy<HashMap<&'static str, &'static Criterion>> =
    Lazy::new(|| CATALOG.iter().map(|c| (c.number, c)).collect());

/// Look up a criterion by number.
pub fn criterion(number: &str) -> Option<&'static Criterion> {
    BY_NUMBER.get(number).copied()
}

/// Resolve the applicable criteria for a testing scope at a target level.
///
/// 1. Start from every criterion at or below `level`.
/// 2. Union the category lists of all tested categories (`to_keep`).
/// 3. Union the category lists of all untested categories (`to_remove`).
/// 4. Remove `to_remove - to_keep`: a criterion claimed by any tested
///    category always survives.
///
/// Results come back in catalog order.
pub fn applicable_criteria(scope: &TestingScope, level: Level) -> Vec<&'static Criterion> {
    let to_keep: BTreeSet<&str> = scope
        .categories_where(true)
        .flat_map(|c| c.criteria().iter().copied())
        .collect();
    let to_remove: BTreeSet<&str> = scope
        .categories_where(false)
        .flat_map(|c| c.criteria().iter().copied())
        .collect();

    let actually_remove: BTreeSet<&str> = to_remove.difference(&to_keep).copied().collect();

    CATALOG
        .iter()
        .filter(|c| c.level <= level)
        .filter(|c| !actually_remove.contains(c.number))
        .collect()
}

/// Compliance counters derived from an applicable set and reported issues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCounts {
    /// Criteria applicable under the declared scope
    pub applicable: u32,
    /// Applicable criteria with no reported issue
    pub passed: u32,
    /// Applicable criteria matched by a reported issue
    pub failed: u32,
}

/// Compute compliance counters: passed = applicable - failed, where failed
/// is inferred by matching issue-reported WCAG numbers against the
/// applicable set. Numbers outside the applicable set are ignored.
pub fn compliance_counts(applicable: &[&'static Criterion], reported: &[String]) -> ComplianceCounts {
    let applicable_numbers: BTreeSet<&str> = applicable.iter().map(|c| c.number).collect();
    let failed: BTreeSet<&str> = reported
        .iter()
        .filter_map(|r| {
            let n = normalize_ref(r);
            applicable_numbers.get(n.as_str()).copied()
        })
        .collect();

    ComplianceCounts {
        applicable: applicable_numbers.len() as u32,
        passed: (applicable_numbers.len() - failed.len()) as u32,
        failed: failed.len() as u32,
    }
}

/// Normalize an issue-reported WCAG reference to a bare criterion number.
/// Accepts forms like "1.4.3", "WCAG 1.4.3", "wcag1.4.3".
fn normalize_ref(reference: &str) -> String {
    let trimmed = reference.trim();
    let lower = trimmed.to_lowercase();
    let stripped = lower.strip_prefix("wcag").unwrap_or(&lower);
    stripped.trim().trim_start_matches(':').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbers(criteria: &[&'static Criterion]) -> Vec<&'static str> {
        criteria.iter().map(|c| c.number).collect()
    }

    #[test]
    fn test_catalog_levels() {
        let a = CATALOG.iter().filter(|c| c.level == Level::A).count();
        let aa = CATALOG.iter().filter(|c| c.level == Level::AA).count();
        let aaa = CATALOG.iter().filter(|c| c.level == Level::AAA).count();
        assert_eq!((a, aa, aaa), (30, 20, 28));
    }

    #[test]
    fn test_empty_scope_keeps_everything_at_level() {
        let scope = TestingScope::new();
        let resolved = applicable_criteria(&scope, Level::AA);
        assert_eq!(resolved.len(), 50);
        assert!(resolved.iter().all(|c| c.level <= Level::AA));
    }

    #[test]
    fn test_subtraction_forms_tested_video_untested() {
        let scope = TestingScope::new()
            .set(ContentCategory::Forms, true)
            .set(ContentCategory::Video, false);
        let resolved = numbers(&applicable_criteria(&scope, Level::AA));

        // Forms-only criteria survive
        for kept in ["3.3.1", "3.3.2", "3.3.3", "3.3.4", "1.3.5"] {
            assert!(resolved.contains(&kept), "{kept} should be applicable");
        }
        // Video-only criteria are subtracted
        for removed in ["1.2.2", "1.2.3", "1.2.5"] {
            assert!(!resolved.contains(&removed), "{removed} should be removed");
        }
        // General criteria stay untouched
        for general in ["1.1.1", "2.1.1", "1.4.3", "4.1.2"] {
            assert!(resolved.contains(&general), "{general} should be applicable");
        }
    }

    #[test]
    fn test_keep_wins_over_remove() {
        // 1.2.1 is claimed by both audio and video; an untested video must
        // not subtract it while audio is tested.
        let scope = TestingScope::new()
            .set(ContentCategory::Audio, true)
            .set(ContentCategory::Video, false);
        let resolved = numbers(&applicable_criteria(&scope, Level::AA));
        assert!(resolved.contains(&"1.2.1"));
        // Video-only criteria still go
        assert!(!resolved.contains(&"1.2.2"));
    }

    #[test]
    fn test_omitted_categories_never_add() {
        // Declaring every category untested at level A must still leave the
        // general criteria, and adding unrelated tested categories must not
        // grow the set beyond the level filter.
        let mut scope = TestingScope::new();
        for category in ContentCategory::ALL {
            scope = scope.set(category, false);
        }
        let all_untested = applicable_criteria(&scope, Level::A).len();
        let empty = applicable_criteria(&TestingScope::new(), Level::A).len();
        assert!(all_untested < empty);
    }

    #[test]
    fn test_level_filtering() {
        let scope = TestingScope::new();
        let a = applicable_criteria(&scope, Level::A);
        assert_eq!(a.len(), 30);
        assert!(a.iter().all(|c| c.level == Level::A));
        let aaa = applicable_criteria(&scope, Level::AAA);
        assert_eq!(aaa.len(), CATALOG.len());
    }

    #[test]
    fn test_compliance_counts() {
        let scope = TestingScope::new();
        let applicable = applicable_criteria(&scope, Level::AA);
        let reported = vec![
            "1.4.3".to_string(),
            "WCAG 1.1.1".to_string(),
            "1.4.3".to_string(),  // duplicate, counted once
            "1.2.6".to_string(),  // AAA, outside the applicable set
            "9.9.9".to_string(),  // unknown, ignored
        ];
        let counts = compliance_counts(&applicable, &reported);
        assert_eq!(counts.applicable, 50);
        assert_eq!(counts.failed, 2);
        assert_eq!(counts.passed, 48);
    }

    #[test]
    fn test_criterion_lookup() {
        let c = criterion("1.4.3").unwrap();
        assert_eq!(c.name, "Contrast (Minimum)");
        assert_eq!(c.level, Level::AA);
        assert!(criterion("0.0.0").is_none());
    }

    #[test]
    fn test_category_lists_contain_only_known_numbers() {
        for category in ContentCategory::ALL {
            for number in category.criteria() {
                assert!(criterion(number).is_some(), "{number} missing from catalog");
            }
        }
    }
}
