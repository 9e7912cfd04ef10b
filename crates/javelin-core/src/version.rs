//! Version identifiers and ranges for Maven-style artifacts.
//!
//! Versions come in two shapes: a structured *number* of up to four numeric
//! segments with an optional qualifier (`1.2.3.4-beta2`), and an opaque
//! *generic* string for anything that fails the number grammar. Qualified
//! versions sort below their unqualified release except for `sp`:
//! `alpha` < `beta` < `milestone` < `rc`/`cr` < `snapshot` < `""` < `sp`.

use std::cmp::Ordering;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A parsed version identifier.
#[derive(Debug, Clone)]
pub enum Version {
    /// Structured version number with comparable segments.
    Number(VersionNumber),
    /// Opaque version string that does not follow the number grammar.
    Generic(String),
    /// Sentinel comparing below any real version.
    Unknown,
}

/// A structured version number `major[.minor[.revision[.patch]]][-qualifier]`.
///
/// Absent trailing segments compare as 0 but are not printed back.
#[derive(Debug, Clone)]
pub struct VersionNumber {
    pub major: u64,
    pub minor: Option<u64>,
    pub revision: Option<u64>,
    pub patch: Option<u64>,
    pub qualifier: Option<String>,
}

/// Qualifier for snapshot versions.
pub const SNAPSHOT_QUALIFIER: &str = "SNAPSHOT";

impl Version {
    /// Parse a version string.
    ///
    /// Strings matching `digit+ ('.' digit+){0,3} ('-' qualifier)?` become
    /// structured numbers; anything else becomes a generic version. Empty or
    /// blank input yields [`Version::Unknown`].
    pub fn parse(version: &str) -> Self {
        let trimmed = version.trim();
        if trimmed.is_empty() {
            return Version::Unknown;
        }
        match VersionNumber::parse(trimmed) {
            Some(number) => Version::Number(number),
            None => Version::Generic(trimmed.to_string()),
        }
    }

    /// Replace (or set) the qualifier, keeping the numeric segments.
    ///
    /// For generic versions the qualifier is appended after a dash; the
    /// unknown sentinel stays unknown.
    pub fn with_qualifier(&self, qualifier: &str) -> Version {
        match self {
            Version::Number(n) => Version::Number(VersionNumber {
                qualifier: Some(qualifier.to_string()),
                ..n.clone()
            }),
            Version::Generic(s) => Version::Generic(format!("{s}-{qualifier}")),
            Version::Unknown => Version::Unknown,
        }
    }

    /// The version without its qualifier.
    pub fn base_version(&self) -> Version {
        match self {
            Version::Number(n) => Version::Number(VersionNumber {
                qualifier: None,
                ..n.clone()
            }),
            other => other.clone(),
        }
    }

    /// Whether this is a snapshot version: the qualifier equals `SNAPSHOT`
    /// case-insensitively or follows the timestamped form
    /// `yyyyMMdd.HHmmss-buildNumber`.
    pub fn is_snapshot(&self) -> bool {
        match self {
            Version::Number(n) => match &n.qualifier {
                Some(q) => {
                    q.eq_ignore_ascii_case(SNAPSHOT_QUALIFIER) || is_timestamped_build(q)
                }
                None => false,
            },
            Version::Generic(s) => s.to_ascii_uppercase().ends_with("-SNAPSHOT"),
            Version::Unknown => false,
        }
    }

    /// The qualifier, when this is a structured version that has one.
    pub fn qualifier(&self) -> Option<&str> {
        match self {
            Version::Number(n) => n.qualifier.as_deref(),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Version::Unknown)
    }
}

impl VersionNumber {
    fn parse(version: &str) -> Option<VersionNumber> {
        let (numbers, qualifier) = match version.split_once('-') {
            Some((head, tail)) if !tail.is_empty() => (head, Some(tail.to_string())),
            Some(_) => return None,
            None => (version, None),
        };

        let mut segments = Vec::new();
        for part in numbers.split('.') {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            segments.push(part.parse::<u64>().ok()?);
        }
        if segments.is_empty() || segments.len() > 4 {
            return None;
        }

        Some(VersionNumber {
            major: segments[0],
            minor: segments.get(1).copied(),
            revision: segments.get(2).copied(),
            patch: segments.get(3).copied(),
            qualifier,
        })
    }

    fn numeric_key(&self) -> [u64; 4] {
        [
            self.major,
            self.minor.unwrap_or(0),
            self.revision.unwrap_or(0),
            self.patch.unwrap_or(0),
        ]
    }
}

/// Matches the timestamped snapshot build qualifier `20240615.143022-42`.
fn is_timestamped_build(qualifier: &str) -> bool {
    let Some((stamp, build)) = qualifier.rsplit_once('-') else {
        return false;
    };
    let Some((date, time)) = stamp.split_once('.') else {
        return false;
    };
    !date.is_empty()
        && !time.is_empty()
        && !build.is_empty()
        && date.bytes().all(|b| b.is_ascii_digit())
        && time.bytes().all(|b| b.is_ascii_digit())
        && build.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Number(n) => {
                write!(f, "{}", n.major)?;
                for segment in [n.minor, n.revision, n.patch]
                    .into_iter()
                    .take_while(Option::is_some)
                    .flatten()
                {
                    write!(f, ".{segment}")?;
                }
                if let Some(ref q) = n.qualifier {
                    write!(f, "-{q}")?;
                }
                Ok(())
            }
            Version::Generic(s) => f.write_str(s),
            Version::Unknown => f.write_str(""),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Version::Unknown, Version::Unknown) => Ordering::Equal,
            (Version::Unknown, _) => Ordering::Less,
            (_, Version::Unknown) => Ordering::Greater,
            (Version::Generic(a), Version::Generic(b)) => a.cmp(b),
            (Version::Generic(_), Version::Number(_)) => Ordering::Less,
            (Version::Number(_), Version::Generic(_)) => Ordering::Greater,
            (Version::Number(a), Version::Number(b)) => {
                let ord = a.numeric_key().cmp(&b.numeric_key());
                if ord != Ordering::Equal {
                    return ord;
                }
                compare_qualifiers(a.qualifier.as_deref(), b.qualifier.as_deref())
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// Well-known qualifiers in ranking order. Unknown qualifiers slot between
/// `snapshot` and the unqualified release and compare lexicographically.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
enum QualifierRank {
    Alpha,
    Beta,
    Milestone,
    Rc,
    Snapshot,
    Other(String),
    Release,
    Sp,
}

fn classify_qualifier(qualifier: Option<&str>) -> (QualifierRank, u64) {
    let Some(q) = qualifier else {
        return (QualifierRank::Release, 0);
    };
    let lower = q.to_ascii_lowercase();
    let trailing_digits = lower
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let (stem, digits) = lower.split_at(lower.len() - trailing_digits);
    let number = digits.parse::<u64>().unwrap_or(0);
    let rank = match stem {
        "alpha" => QualifierRank::Alpha,
        "beta" => QualifierRank::Beta,
        "milestone" => QualifierRank::Milestone,
        "rc" | "cr" => QualifierRank::Rc,
        "snapshot" => QualifierRank::Snapshot,
        "sp" => QualifierRank::Sp,
        _ => QualifierRank::Other(lower.clone()),
    };
    (rank, number)
}

fn compare_qualifiers(a: Option<&str>, b: Option<&str>) -> Ordering {
    let (rank_a, num_a) = classify_qualifier(a);
    let (rank_b, num_b) = classify_qualifier(b);
    rank_a.cmp(&rank_b).then(num_a.cmp(&num_b))
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.trim().is_empty() {
            return Err(D::Error::custom("empty version string"));
        }
        Ok(Version::parse(&s))
    }
}

/// A Maven version range: a union of bracketed intervals.
///
/// Supports `[1.0,2.0]`, `(1.0,2.0)`, half-open mixes, the singleton
/// `[1.0]`, unbounded ends (`[1.0,]`, `(,2.0)`) and comma-separated unions
/// such as `[1.0,2.0),(3.0,4.0]`.
#[derive(Debug, Clone)]
pub struct VersionRange {
    intervals: Vec<VersionInterval>,
}

#[derive(Debug, Clone)]
struct VersionInterval {
    lower: Option<RangeBound>,
    upper: Option<RangeBound>,
}

#[derive(Debug, Clone)]
struct RangeBound {
    version: Version,
    inclusive: bool,
}

impl VersionRange {
    /// Parse a Maven version range expression.
    ///
    /// Returns `None` for bare versions and malformed bracket expressions.
    pub fn parse(spec: &str) -> Option<VersionRange> {
        let s = spec.trim();
        if !s.starts_with('[') && !s.starts_with('(') {
            return None;
        }

        let mut intervals = Vec::new();
        let mut rest = s;
        loop {
            let close = rest.find([']', ')'])?;
            let group = &rest[..=close];
            intervals.push(VersionInterval::parse(group)?);
            rest = rest[close + 1..].trim_start();
            if rest.is_empty() {
                break;
            }
            rest = rest.strip_prefix(',')?.trim_start();
            if !rest.starts_with('[') && !rest.starts_with('(') {
                return None;
            }
        }

        Some(VersionRange { intervals })
    }

    /// Check whether a version is selected by this range.
    pub fn contains(&self, version: &Version) -> bool {
        self.intervals.iter().any(|i| i.contains(version))
    }

    /// The highest candidate selected by this range, if any.
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        candidates
            .into_iter()
            .filter(|v| self.contains(v))
            .max()
            .cloned()
    }
}

impl VersionInterval {
    fn parse(group: &str) -> Option<VersionInterval> {
        let open_inclusive = group.starts_with('[');
        let close_inclusive = group.ends_with(']');
        let inner = &group[1..group.len() - 1];

        if let Some((lower, upper)) = inner.split_once(',') {
            let lower = lower.trim();
            let upper = upper.trim();
            Some(VersionInterval {
                lower: (!lower.is_empty()).then(|| RangeBound {
                    version: Version::parse(lower),
                    inclusive: open_inclusive,
                }),
                upper: (!upper.is_empty()).then(|| RangeBound {
                    version: Version::parse(upper),
                    inclusive: close_inclusive,
                }),
            })
        } else {
            // Singleton: [1.0] selects exactly 1.0
            let inner = inner.trim();
            if inner.is_empty() || !open_inclusive || !close_inclusive {
                return None;
            }
            let v = Version::parse(inner);
            Some(VersionInterval {
                lower: Some(RangeBound {
                    version: v.clone(),
                    inclusive: true,
                }),
                upper: Some(RangeBound {
                    version: v,
                    inclusive: true,
                }),
            })
        }
    }

    fn contains(&self, version: &Version) -> bool {
        if let Some(ref lower) = self.lower {
            let cmp = version.cmp(&lower.version);
            if lower.inclusive {
                if cmp == Ordering::Less {
                    return false;
                }
            } else if cmp != Ordering::Greater {
                return false;
            }
        }
        if let Some(ref upper) = self.upper {
            let cmp = version.cmp(&upper.version);
            if upper.inclusive {
                if cmp == Ordering::Greater {
                    return false;
                }
            } else if cmp != Ordering::Less {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_structured() {
        let v = Version::parse("1.2.3.4-beta2");
        let Version::Number(ref n) = v else {
            panic!("expected a structured version");
        };
        assert_eq!(n.major, 1);
        assert_eq!(n.minor, Some(2));
        assert_eq!(n.revision, Some(3));
        assert_eq!(n.patch, Some(4));
        assert_eq!(n.qualifier.as_deref(), Some("beta2"));
    }

    #[test]
    fn parse_generic() {
        assert!(matches!(Version::parse("1.2.3.4.5"), Version::Generic(_)));
        assert!(matches!(Version::parse("not-a-version"), Version::Generic(_)));
        assert!(matches!(Version::parse("1.x"), Version::Generic(_)));
    }

    #[test]
    fn parse_blank_is_unknown() {
        assert!(Version::parse("").is_unknown());
        assert!(Version::parse("   ").is_unknown());
    }

    #[test]
    fn display_round_trip() {
        for s in ["1", "1.0", "1.0.1", "1.0.0.7", "2.1-SNAPSHOT", "1.0-rc1"] {
            assert_eq!(Version::parse(s).to_string(), s);
        }
    }

    #[test]
    fn basic_ordering() {
        let order = ["1.0", "1.0.1", "1.1", "1.1.1", "2.0"];
        for pair in order.windows(2) {
            assert!(
                Version::parse(pair[0]) < Version::parse(pair[1]),
                "{} should sort before {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn qualifier_ordering() {
        let order = ["1.0-alpha", "1.0-beta", "1.0-rc1", "1.0", "1.0-sp1"];
        for pair in order.windows(2) {
            assert!(
                Version::parse(pair[0]) < Version::parse(pair[1]),
                "{} should sort before {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn snapshot_before_release() {
        assert!(Version::parse("1.0-SNAPSHOT") < Version::parse("1.0"));
    }

    #[test]
    fn qualifier_digits_as_secondary_key() {
        assert!(Version::parse("1.0-rc1") < Version::parse("1.0-rc2"));
        assert!(Version::parse("1.0-rc") < Version::parse("1.0-rc1"));
        assert!(Version::parse("1.0-rc2") < Version::parse("1.0-rc10"));
    }

    #[test]
    fn unknown_qualifiers_lexicographic() {
        assert!(Version::parse("1.0-aardvark") < Version::parse("1.0-zebra"));
        assert!(Version::parse("1.0-jre") < Version::parse("1.0"));
    }

    #[test]
    fn cr_equals_rc() {
        assert_eq!(Version::parse("1.0-cr1"), Version::parse("1.0-RC1"));
    }

    #[test]
    fn trailing_zeros_equal() {
        assert_eq!(Version::parse("1.0"), Version::parse("1.0.0"));
        assert_eq!(Version::parse("1"), Version::parse("1.0.0.0"));
    }

    #[test]
    fn unknown_below_everything() {
        assert!(Version::Unknown < Version::parse("0"));
        assert!(Version::Unknown < Version::parse("anything"));
    }

    #[test]
    fn generic_below_structured() {
        assert!(Version::parse("zzz") < Version::parse("0.0.1"));
        assert!(Version::parse("abc") < Version::parse("abd"));
    }

    #[test]
    fn with_qualifier_and_base() {
        let v = Version::parse("1.0");
        let snap = v.with_qualifier(SNAPSHOT_QUALIFIER);
        assert_eq!(snap.to_string(), "1.0-SNAPSHOT");
        assert!(snap.is_snapshot());
        assert_eq!(snap.base_version(), v);
    }

    #[test]
    fn timestamped_snapshot() {
        let v = Version::parse("1.0-20240615.143022-42");
        assert!(v.is_snapshot());
        assert!(!Version::parse("1.0-20240615").is_snapshot());
        assert!(!Version::parse("1.0-beta-1").is_snapshot());
    }

    #[test]
    fn range_inclusive() {
        let range = VersionRange::parse("[1.0,2.0]").unwrap();
        assert!(range.contains(&Version::parse("1.0")));
        assert!(range.contains(&Version::parse("1.5")));
        assert!(range.contains(&Version::parse("2.0")));
        assert!(!range.contains(&Version::parse("0.9")));
        assert!(!range.contains(&Version::parse("2.1")));
    }

    #[test]
    fn range_exclusive_upper() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.contains(&Version::parse("1.9.9")));
        assert!(!range.contains(&Version::parse("2.0")));
    }

    #[test]
    fn range_open_lower() {
        let range = VersionRange::parse("(,2.0)").unwrap();
        assert!(range.contains(&Version::parse("1.0")));
        assert!(!range.contains(&Version::parse("2.0")));
    }

    #[test]
    fn range_singleton() {
        let range = VersionRange::parse("[1.5]").unwrap();
        assert!(range.contains(&Version::parse("1.5")));
        assert!(!range.contains(&Version::parse("1.4")));
        assert!(!range.contains(&Version::parse("1.6")));
    }

    #[test]
    fn range_union() {
        let range = VersionRange::parse("[1.0,2.0),(3.0,4.0]").unwrap();
        assert!(range.contains(&Version::parse("1.5")));
        assert!(!range.contains(&Version::parse("2.5")));
        assert!(range.contains(&Version::parse("3.5")));
        assert!(!range.contains(&Version::parse("3.0")));
        assert!(range.contains(&Version::parse("4.0")));
    }

    #[test]
    fn range_best_match() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        let candidates = ["0.9", "1.0", "1.5", "1.9", "2.0"]
            .map(|s| Version::parse(s))
            .to_vec();
        assert_eq!(
            range.best_match(candidates.iter()),
            Some(Version::parse("1.9"))
        );
    }

    #[test]
    fn bare_version_not_a_range() {
        assert!(VersionRange::parse("1.0").is_none());
    }

    #[test]
    fn malformed_range_rejected() {
        assert!(VersionRange::parse("[1.0").is_none());
        assert!(VersionRange::parse("[1.0,2.0) junk").is_none());
        assert!(VersionRange::parse("(1.0)").is_none());
    }
}
