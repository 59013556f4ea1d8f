//! Student records, ingest normalization, and derived classifications.
//!
//! Raw upload rows arrive as loosely typed JSON mappings (numerics may be
//! strings, placeholder text stands in for missing values). Ingest collapses
//! all of that into `StudentRecord`, where absence is always `Option::None`,
//! so downstream code never re-interprets sentinels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::completeness::is_missing_text;

/// Identifier for a student row within a dataset.
pub type StudentId = u64;

/// A numeric field that upstream parsers may deliver as number or text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    /// Coerce to a usable value. Placeholder text, unparsable text, and the
    /// legacy -1 "missing" sentinel all collapse to `None`.
    pub fn coerce(&self) -> Option<f64> {
        let value = match self {
            NumberOrText::Number(n) => Some(*n),
            NumberOrText::Text(s) => {
                if is_missing_text(Some(s)) {
                    None
                } else {
                    s.trim().replace(',', "").parse::<f64>().ok()
                }
            }
        }?;
        if value.is_finite() && value >= 0.0 {
            Some(value)
        } else {
            None
        }
    }
}

/// One row as handed over by the upload parser, before normalization.
///
/// Field aliases follow the header variations seen in real institutional
/// spreadsheets (gender/course/strand and so on).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStudentRecord {
    pub id: Option<StudentId>,
    #[serde(alias = "first_name", alias = "fname")]
    pub firstname: Option<String>,
    #[serde(alias = "last_name", alias = "surname", alias = "lname")]
    pub lastname: Option<String>,
    #[serde(alias = "gender")]
    pub sex: Option<String>,
    #[serde(alias = "course")]
    pub program: Option<String>,
    #[serde(alias = "city", alias = "town")]
    pub municipality: Option<String>,
    #[serde(alias = "family_income", alias = "household_income")]
    pub income: Option<NumberOrText>,
    #[serde(alias = "strand", alias = "SHS_type")]
    pub shs_type: Option<String>,
    #[serde(alias = "GWA", alias = "general_weighted_average")]
    pub gwa: Option<NumberOrText>,
    pub all_pass: Option<bool>,
    pub conduct_issue: Option<bool>,
}

impl RawStudentRecord {
    /// Normalize into a `StudentRecord`. `fallback_id` is used when the row
    /// carries no id of its own (fresh uploads are numbered by position).
    pub fn normalize(&self, fallback_id: StudentId) -> StudentRecord {
        StudentRecord {
            id: self.id.unwrap_or(fallback_id),
            firstname: clean_text(&self.firstname),
            lastname: clean_text(&self.lastname),
            sex: clean_text(&self.sex),
            program: clean_text(&self.program),
            municipality: clean_text(&self.municipality),
            income: self.income.as_ref().and_then(NumberOrText::coerce),
            shs_type: clean_text(&self.shs_type),
            gwa: self.gwa.as_ref().and_then(NumberOrText::coerce),
            all_pass: self.all_pass.unwrap_or(true),
            conduct_issue: self.conduct_issue.unwrap_or(false),
        }
    }
}

fn clean_text(value: &Option<String>) -> Option<String> {
    let v = value.as_deref()?;
    if is_missing_text(Some(v)) {
        None
    } else {
        Some(v.trim().to_string())
    }
}

/// A normalized student record. Missing values are `None`, never sentinels.
#[derive(Debug, Clone, Serialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub sex: Option<String>,
    pub program: Option<String>,
    pub municipality: Option<String>,
    pub income: Option<f64>,
    pub shs_type: Option<String>,
    pub gwa: Option<f64>,
    /// False when the student failed a subject this term.
    pub all_pass: bool,
    /// True when a conduct case is on file; blocks honors eligibility.
    pub conduct_issue: bool,
}

impl StudentRecord {
    pub fn honors(&self) -> Honors {
        classify_honors(self.gwa, self.all_pass, self.conduct_issue)
    }

    pub fn income_bracket(&self) -> IncomeBracket {
        classify_income(self.income)
    }

    pub fn location(&self) -> LocationCategory {
        classify_location(self.municipality.as_deref())
    }

    /// Display name with placeholders for missing parts.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.firstname.as_deref().unwrap_or("No First Name Entered"),
            self.lastname.as_deref().unwrap_or("No Last Name Entered"),
        )
    }

    /// Peso-formatted income, or a placeholder when absent.
    pub fn income_display(&self) -> String {
        match self.income {
            Some(v) => format!("\u{20b1}{}", format_thousands(v)),
            None => "No Income Entered".to_string(),
        }
    }

    pub fn gwa_display(&self) -> String {
        match self.gwa {
            Some(v) => format!("{v:.2}"),
            None => "No GWA Entered".to_string(),
        }
    }
}

fn format_thousands(value: f64) -> String {
    let whole = value.round() as i64;
    let digits = whole.abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if whole < 0 {
        format!("-{out}")
    } else {
        out
    }
}

// -------------------------
// Honors classification
// -------------------------

/// GWA-derived honors tier. GWA is on the 0-100 scale, higher is better;
/// the legacy 1.0-5.0 interpretation is intentionally not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Honors {
    WithHighestHonors,
    WithHighHonors,
    WithHonors,
    Average,
    NoGwaEntered,
}

impl fmt::Display for Honors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Honors::WithHighestHonors => "With Highest Honors",
            Honors::WithHighHonors => "With High Honors",
            Honors::WithHonors => "With Honors",
            Honors::Average => "Average",
            Honors::NoGwaEntered => "No GWA Entered",
        };
        f.write_str(label)
    }
}

/// Classify the honors tier for a GWA. A failed subject or conduct case
/// overrides the tier to Average regardless of the grade.
pub fn classify_honors(gwa: Option<f64>, all_pass: bool, conduct_issue: bool) -> Honors {
    let gwa = match gwa {
        Some(g) if g.is_finite() && g > 0.0 => g,
        _ => return Honors::NoGwaEntered,
    };

    if !all_pass || conduct_issue {
        return Honors::Average;
    }

    if (98.0..=100.0).contains(&gwa) {
        Honors::WithHighestHonors
    } else if (95.0..98.0).contains(&gwa) {
        Honors::WithHighHonors
    } else if (90.0..95.0).contains(&gwa) {
        Honors::WithHonors
    } else {
        Honors::Average
    }
}

// -------------------------
// Income classification
// -------------------------

/// Absolute peso-threshold income bracket (PIDS-style tiers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IncomeBracket {
    Poor,
    LowIncome,
    LowerMiddle,
    MiddleMiddle,
    UpperMiddle,
    UpperIncome,
    Rich,
    NoIncomeEntered,
}

impl fmt::Display for IncomeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IncomeBracket::Poor => "Poor",
            IncomeBracket::LowIncome => "Low-Income",
            IncomeBracket::LowerMiddle => "Lower-Middle",
            IncomeBracket::MiddleMiddle => "Middle-Middle",
            IncomeBracket::UpperMiddle => "Upper-Middle",
            IncomeBracket::UpperIncome => "Upper-Income",
            IncomeBracket::Rich => "Rich",
            IncomeBracket::NoIncomeEntered => "No Income Entered",
        };
        f.write_str(label)
    }
}

/// Classify monthly household income into its bracket.
pub fn classify_income(income: Option<f64>) -> IncomeBracket {
    let income = match income {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => return IncomeBracket::NoIncomeEntered,
    };

    if income < 12_030.0 {
        IncomeBracket::Poor
    } else if income < 24_060.0 {
        IncomeBracket::LowIncome
    } else if income < 48_120.0 {
        IncomeBracket::LowerMiddle
    } else if income < 84_210.0 {
        IncomeBracket::MiddleMiddle
    } else if income < 144_360.0 {
        IncomeBracket::UpperMiddle
    } else if income < 240_600.0 {
        IncomeBracket::UpperIncome
    } else {
        IncomeBracket::Rich
    }
}

// -------------------------
// Location classification
// -------------------------

/// Coarse geographic category derived from the municipality lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LocationCategory {
    Upland,
    Lowland,
    Unknown,
}

impl LocationCategory {
    /// Integer code used in the feature matrix.
    pub fn code(&self) -> f64 {
        match self {
            LocationCategory::Upland => 0.0,
            LocationCategory::Lowland => 1.0,
            LocationCategory::Unknown => -1.0,
        }
    }
}

impl fmt::Display for LocationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LocationCategory::Upland => "Upland",
            LocationCategory::Lowland => "Lowland",
            LocationCategory::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

const UPLAND_MUNICIPALITIES: &[&str] = &[
    "MAJAYJAY",
    "LUISIANA",
    "CAVINTI",
    "NAGCARLAN",
    "LILIW",
    "MAGDALENA",
    "PAETE",
    "PAKIL",
    "PANGIL",
    "SINILOAN",
    "FAMY",
    "MABITAC",
    "SANTA MARIA",
    "RIZAL",
];

const LOWLAND_MUNICIPALITIES: &[&str] = &[
    "SANTA CRUZ",
    "PILA",
    "VICTORIA",
    "CALAUAN",
    "BAY",
    "LOS BANOS",
    "CALAMBA",
    "SAN PABLO",
    "ALAMINOS",
    "SANTO TOMAS",
    "PAGSANJAN",
    "LUMBAN",
    "KALAYAAN",
    "SANTA ROSA",
    "CABUYAO",
    "BINAN",
    "SAN PEDRO",
];

/// Canonicalize a municipality name for table lookup: trim, uppercase,
/// collapse internal whitespace, and expand the STA./STO. abbreviations.
pub fn canonical_municipality(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let collapsed = upper.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(rest) = collapsed.strip_prefix("STA. ") {
        format!("SANTA {rest}")
    } else if let Some(rest) = collapsed.strip_prefix("STA ") {
        format!("SANTA {rest}")
    } else if let Some(rest) = collapsed.strip_prefix("STO. ") {
        format!("SANTO {rest}")
    } else if let Some(rest) = collapsed.strip_prefix("STO ") {
        format!("SANTO {rest}")
    } else {
        collapsed
    }
}

/// Map a municipality to Upland/Lowland via the fixed lookup table.
pub fn classify_location(municipality: Option<&str>) -> LocationCategory {
    let name = match municipality {
        Some(m) if !is_missing_text(Some(m)) => canonical_municipality(m),
        _ => return LocationCategory::Unknown,
    };

    if UPLAND_MUNICIPALITIES.contains(&name.as_str()) {
        LocationCategory::Upland
    } else if LOWLAND_MUNICIPALITIES.contains(&name.as_str()) {
        LocationCategory::Lowland
    } else {
        LocationCategory::Unknown
    }
}
