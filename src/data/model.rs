use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Outlier bounds
// ---------------------------------------------------------------------------

/// Lower bound of the physically meaningful FRET range.
pub const FRET_LOWER_BOUND: f64 = -0.5;

/// Upper bound of the physically meaningful FRET range.
pub const FRET_UPPER_BOUND: f64 = 1.5;

// ---------------------------------------------------------------------------
// CellValue – a single cell in a generic table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring common Pandas dtypes.
/// Used as a key in `BTreeMap` / `BTreeSet` downstream so it must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn rank(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl std::hash::Hash for CellValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => f.to_bits().hash(state),
            CellValue::Bool(b) => b.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => write!(f, ""),
        }
    }
}

impl CellValue {
    /// Guess the type of a text cell the way a CSV reader would.
    pub fn guess(s: &str) -> CellValue {
        let s = s.trim();
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        if s == "true" || s == "false" {
            return CellValue::Bool(s == "true");
        }
        CellValue::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// GenericTable – named columns, dynamically typed rows
// ---------------------------------------------------------------------------

/// A rectangular table of dynamically typed cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericTable {
    pub columns: Vec<String>,
    /// Every row has exactly `columns.len()` cells.
    pub rows: Vec<Vec<CellValue>>,
}

impl GenericTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }
}

// ---------------------------------------------------------------------------
// FretSource
// ---------------------------------------------------------------------------

/// Which FRET column of a trajectory a filter or statistic reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FretSource {
    #[default]
    Raw,
    Idealized,
}

impl FromStr for FretSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(FretSource::Raw),
            "idealized" => Ok(FretSource::Idealized),
            other => Err(format!(
                "invalid FRET source '{other}', expected \"raw\" or \"idealized\""
            )),
        }
    }
}

impl fmt::Display for FretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FretSource::Raw => write!(f, "raw"),
            FretSource::Idealized => write!(f, "idealized"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trajectories
// ---------------------------------------------------------------------------

/// One observed frame of one molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryFrame {
    #[serde(rename = "frames")]
    pub frame: u64,
    pub donor: f64,
    pub acceptor: f64,
    #[serde(rename = "FRET")]
    pub fret: f64,
    #[serde(rename = "idealized FRET")]
    pub idealized_fret: f64,
    #[serde(rename = "treatment_name")]
    pub treatment: String,
    /// Stem of the `.dat` file the frame was read from. Empty for tables
    /// compiled without molecule ids.
    #[serde(default)]
    pub molecule: String,
}

impl TrajectoryFrame {
    pub fn value(&self, source: FretSource) -> f64 {
        match source {
            FretSource::Raw => self.fret,
            FretSource::Idealized => self.idealized_fret,
        }
    }

    /// Cell lookup used by the viewer's selection filters.
    pub fn key(&self, column: &str) -> Option<CellValue> {
        match column {
            "treatment" => Some(CellValue::String(self.treatment.clone())),
            "molecule" => Some(CellValue::String(self.molecule.clone())),
            _ => None,
        }
    }
}

/// Columns of [`TrajectoryFrame`] that can be used for grouping.
pub const TRAJECTORY_KEY_COLUMNS: [&str; 2] = ["treatment", "molecule"];

/// Compiled per-frame FRET data for one or more treatments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectoryTable {
    pub frames: Vec<TrajectoryFrame>,
}

impl TrajectoryTable {
    pub fn new(frames: Vec<TrajectoryFrame>) -> Self {
        Self { frames }
    }

    /// Concatenate tables in the given order.
    pub fn concat(tables: impl IntoIterator<Item = TrajectoryTable>) -> Self {
        Self {
            frames: tables.into_iter().flat_map(|t| t.frames).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Treatment labels in order of first appearance.
    pub fn treatments(&self) -> Vec<String> {
        first_appearance(self.frames.iter().map(|f| f.treatment.as_str()))
    }

    /// Distinct molecule ids.
    pub fn molecules(&self) -> BTreeSet<&str> {
        self.frames.iter().map(|f| f.molecule.as_str()).collect()
    }

    pub fn for_treatment<'a>(
        &'a self,
        treatment: &'a str,
    ) -> impl Iterator<Item = &'a TrajectoryFrame> + 'a {
        self.frames.iter().filter(move |f| f.treatment == treatment)
    }

    /// For each key column the sorted set of its unique values.
    pub fn unique_values(&self) -> BTreeMap<String, BTreeSet<CellValue>> {
        let mut unique: BTreeMap<String, BTreeSet<CellValue>> = BTreeMap::new();
        for frame in &self.frames {
            for col in TRAJECTORY_KEY_COLUMNS {
                if let Some(v) = frame.key(col) {
                    unique.entry(col.to_string()).or_default().insert(v);
                }
            }
        }
        unique
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// One detected state transition of a molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    #[serde(rename = "Molecule")]
    pub molecule: u64,
    #[serde(rename = "FRET before transition")]
    pub fret_before: f64,
    #[serde(rename = "FRET after transition")]
    pub fret_after: f64,
    /// Duration of the dwell preceding the transition, in frames.
    #[serde(rename = "Time")]
    pub dwell_frames: f64,
    #[serde(rename = "treatment_name")]
    pub treatment: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionTable {
    pub records: Vec<TransitionRecord>,
}

impl TransitionTable {
    pub fn new(records: Vec<TransitionRecord>) -> Self {
        Self { records }
    }

    pub fn concat(tables: impl IntoIterator<Item = TransitionTable>) -> Self {
        Self {
            records: tables.into_iter().flat_map(|t| t.records).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Treatment labels in order of first appearance.
    pub fn treatments(&self) -> Vec<String> {
        first_appearance(self.records.iter().map(|r| r.treatment.as_str()))
    }

    /// Records of one treatment as a fresh table.
    pub fn for_treatment(&self, treatment: &str) -> TransitionTable {
        TransitionTable {
            records: self
                .records
                .iter()
                .filter(|r| r.treatment == treatment)
                .cloned()
                .collect(),
        }
    }
}

/// A transition whose dwell has been converted to seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dwell {
    #[serde(rename = "Molecule")]
    pub molecule: u64,
    #[serde(rename = "FRET before transition")]
    pub fret_before: f64,
    #[serde(rename = "FRET after transition")]
    pub fret_after: f64,
    #[serde(rename = "Time")]
    pub dwell_frames: f64,
    #[serde(rename = "treatment_name")]
    pub treatment: String,
    #[serde(rename = "Time (s)")]
    pub dwell_s: f64,
}

// ---------------------------------------------------------------------------
// Transition classes
// ---------------------------------------------------------------------------

/// The four kinds of transition relative to a single FRET threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransitionClass {
    LowToLow,
    LowToHigh,
    HighToHigh,
    HighToLow,
}

impl TransitionClass {
    /// Canonical column order.
    pub const ALL: [TransitionClass; 4] = [
        TransitionClass::LowToLow,
        TransitionClass::LowToHigh,
        TransitionClass::HighToHigh,
        TransitionClass::HighToLow,
    ];

    /// Position in [`TransitionClass::ALL`].
    pub fn index(self) -> usize {
        match self {
            TransitionClass::LowToLow => 0,
            TransitionClass::LowToHigh => 1,
            TransitionClass::HighToHigh => 2,
            TransitionClass::HighToLow => 3,
        }
    }

    /// Classify a before/after pair. Values equal to the threshold are
    /// neither low nor high, so such pairs have no class.
    pub fn classify(before: f64, after: f64, threshold: f64) -> Option<TransitionClass> {
        let low = |v: f64| v < threshold;
        let high = |v: f64| v > threshold;
        match (low(before), high(before), low(after), high(after)) {
            (true, _, true, _) => Some(TransitionClass::LowToLow),
            (true, _, _, true) => Some(TransitionClass::LowToHigh),
            (_, true, _, true) => Some(TransitionClass::HighToHigh),
            (_, true, true, _) => Some(TransitionClass::HighToLow),
            _ => None,
        }
    }

    /// Column header such as `"< 0.5 to > 0.5"`.
    pub fn header(self, threshold: f64) -> String {
        let (from, to) = match self {
            TransitionClass::LowToLow => ('<', '<'),
            TransitionClass::LowToHigh => ('<', '>'),
            TransitionClass::HighToHigh => ('>', '>'),
            TransitionClass::HighToLow => ('>', '<'),
        };
        format!("{from} {threshold} to {to} {threshold}")
    }
}

fn first_appearance<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    for label in labels {
        if seen.insert(label) {
            ordered.push(label.to_string());
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_uses_strict_comparisons() {
        assert_eq!(
            TransitionClass::classify(0.2, 0.6, 0.5),
            Some(TransitionClass::LowToHigh)
        );
        assert_eq!(
            TransitionClass::classify(0.6, 0.2, 0.5),
            Some(TransitionClass::HighToLow)
        );
        assert_eq!(
            TransitionClass::classify(0.7, 0.8, 0.5),
            Some(TransitionClass::HighToHigh)
        );
        assert_eq!(
            TransitionClass::classify(0.1, 0.2, 0.5),
            Some(TransitionClass::LowToLow)
        );
        assert_eq!(TransitionClass::classify(0.5, 0.8, 0.5), None);
        assert_eq!(TransitionClass::classify(0.2, 0.5, 0.5), None);
    }

    #[test]
    fn headers_follow_threshold() {
        assert_eq!(TransitionClass::LowToHigh.header(0.5), "< 0.5 to > 0.5");
        assert_eq!(TransitionClass::HighToLow.header(0.3), "> 0.3 to < 0.3");
    }

    #[test]
    fn class_index_matches_canonical_order() {
        for (i, class) in TransitionClass::ALL.iter().enumerate() {
            assert_eq!(class.index(), i);
        }
    }

    #[test]
    fn cell_guess_and_ordering() {
        assert_eq!(CellValue::guess("3"), CellValue::Integer(3));
        assert_eq!(CellValue::guess("0.25"), CellValue::Float(0.25));
        assert_eq!(CellValue::guess(""), CellValue::Null);
        assert_eq!(CellValue::guess("true"), CellValue::Bool(true));
        assert_eq!(CellValue::guess("Native"), CellValue::String("Native".into()));
        assert!(CellValue::Null < CellValue::Integer(0));
        assert!(CellValue::Float(0.1) < CellValue::Float(0.2));
    }

    #[test]
    fn treatments_keep_first_appearance_order() {
        let frame = |t: &str| TrajectoryFrame {
            frame: 0,
            donor: 1.0,
            acceptor: 1.0,
            fret: 0.5,
            idealized_fret: 0.5,
            treatment: t.to_string(),
            molecule: "m".to_string(),
        };
        let table = TrajectoryTable::new(vec![frame("b"), frame("a"), frame("b")]);
        assert_eq!(table.treatments(), vec!["b".to_string(), "a".to_string()]);
    }
}
