use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier of a skin profile in the reference corpus
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Integer(u64),
    Uuid(Uuid),
    String(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::String(s) => write!(f, "{}", s),
            RecordId::Uuid(u) => write!(f, "{}", u),
            RecordId::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::String(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::String(s.to_string())
    }
}

impl From<u64> for RecordId {
    fn from(i: u64) -> Self {
        RecordId::Integer(i)
    }
}

impl From<Uuid> for RecordId {
    fn from(u: Uuid) -> Self {
        RecordId::Uuid(u)
    }
}

/// Skin condition a reference profile was labelled with.
///
/// Labels outside the known set are kept verbatim in `Other` so that new
/// corpus labels never fail ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionLabel {
    Acne,
    Dryness,
    Redness,
    Hyperpigmentation,
    Rosacea,
    Oiliness,
    Wrinkles,
    Healthy,
    Other(String),
}

impl ConditionLabel {
    pub fn as_str(&self) -> &str {
        match self {
            ConditionLabel::Acne => "acne",
            ConditionLabel::Dryness => "dryness",
            ConditionLabel::Redness => "redness",
            ConditionLabel::Hyperpigmentation => "hyperpigmentation",
            ConditionLabel::Rosacea => "rosacea",
            ConditionLabel::Oiliness => "oiliness",
            ConditionLabel::Wrinkles => "wrinkles",
            ConditionLabel::Healthy => "healthy",
            ConditionLabel::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ConditionLabel::Other(_))
    }
}

impl From<String> for ConditionLabel {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "acne" => ConditionLabel::Acne,
            "dryness" | "dry" => ConditionLabel::Dryness,
            "redness" => ConditionLabel::Redness,
            "hyperpigmentation" => ConditionLabel::Hyperpigmentation,
            "rosacea" => ConditionLabel::Rosacea,
            "oiliness" | "oily" => ConditionLabel::Oiliness,
            "wrinkles" => ConditionLabel::Wrinkles,
            "healthy" => ConditionLabel::Healthy,
            _ => ConditionLabel::Other(s),
        }
    }
}

impl From<&str> for ConditionLabel {
    fn from(s: &str) -> Self {
        ConditionLabel::from(s.to_string())
    }
}

impl From<ConditionLabel> for String {
    fn from(label: ConditionLabel) -> Self {
        match label {
            ConditionLabel::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ConditionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal severity of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Map a continuous score in [0, 10] onto the ordinal scale.
    /// Out-of-range scores are clamped; NaN is treated as mild.
    pub fn from_score(score: f32) -> Self {
        let s = if score.is_nan() { 0.0 } else { score.clamp(0.0, 10.0) };
        if s < 3.5 {
            Severity::Mild
        } else if s < 7.0 {
            Severity::Moderate
        } else {
            Severity::Severe
        }
    }

    /// Moderate and severe conditions let their avoid-list override
    /// recommendations coming from other conditions.
    #[inline]
    pub fn escalates_avoidance(self) -> bool {
        self >= Severity::Moderate
    }
}

/// Skin tone on one of the two supported scales.
/// Values on different scales never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinTone {
    /// Fitzpatrick phototype I-VI
    Fitzpatrick(u8),
    /// Monk skin tone scale 1-10
    Monk(u8),
}

impl SkinTone {
    pub fn fitzpatrick(value: u8) -> Option<Self> {
        (1..=6).contains(&value).then_some(SkinTone::Fitzpatrick(value))
    }

    pub fn monk(value: u8) -> Option<Self> {
        (1..=10).contains(&value).then_some(SkinTone::Monk(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeBand {
    #[serde(rename = "under_18")]
    Under18,
    #[serde(rename = "18-24")]
    From18To24,
    #[serde(rename = "25-34")]
    From25To34,
    #[serde(rename = "35-44")]
    From35To44,
    #[serde(rename = "45-54")]
    From45To54,
    #[serde(rename = "55-64")]
    From55To64,
    #[serde(rename = "65_plus")]
    Over65,
}

impl AgeBand {
    pub fn from_age(age: u32) -> Self {
        match age {
            0..=17 => AgeBand::Under18,
            18..=24 => AgeBand::From18To24,
            25..=34 => AgeBand::From25To34,
            35..=44 => AgeBand::From35To44,
            45..=54 => AgeBand::From45To54,
            55..=64 => AgeBand::From55To64,
            _ => AgeBand::Over65,
        }
    }
}

impl FromStr for AgeBand {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim() {
            "under_18" => Ok(AgeBand::Under18),
            "18-24" => Ok(AgeBand::From18To24),
            "25-34" => Ok(AgeBand::From25To34),
            "35-44" => Ok(AgeBand::From35To44),
            "45-54" => Ok(AgeBand::From45To54),
            "55-64" => Ok(AgeBand::From55To64),
            "65_plus" => Ok(AgeBand::Over65),
            other => Err(crate::Error::InvalidArgument(format!("unknown age band '{}'", other))),
        }
    }
}

/// Demographic attributes of a profile. Every field is optional; a missing
/// field means "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicProfile {
    #[serde(default)]
    pub ethnicity: Option<String>,
    #[serde(default)]
    pub skin_type: Option<SkinTone>,
    #[serde(default)]
    pub age_band: Option<AgeBand>,
}

impl DemographicProfile {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ethnicity(mut self, ethnicity: impl Into<String>) -> Self {
        self.ethnicity = Some(ethnicity.into());
        self
    }

    #[must_use]
    pub fn with_skin_type(mut self, skin_type: SkinTone) -> Self {
        self.skin_type = Some(skin_type);
        self
    }

    #[must_use]
    pub fn with_age_band(mut self, age_band: AgeBand) -> Self {
        self.age_band = Some(age_band);
        self
    }

    /// Ethnicity with blank strings treated as unknown
    pub fn known_ethnicity(&self) -> Option<&str> {
        self.ethnicity
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.known_ethnicity().is_none() && self.skin_type.is_none() && self.age_band.is_none()
    }
}

/// A labelled reference case in the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinProfileRecord {
    pub id: RecordId,
    pub vector: Vector,
    pub condition: ConditionLabel,
    pub severity: Severity,
    #[serde(default)]
    pub demographics: DemographicProfile,
    /// Handle of the image the embedding was taken from
    #[serde(default)]
    pub source_image_ref: Option<String>,
}

impl SkinProfileRecord {
    #[must_use]
    pub fn new(
        id: impl Into<RecordId>,
        vector: Vector,
        condition: ConditionLabel,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            vector,
            condition,
            severity,
            demographics: DemographicProfile::default(),
            source_image_ref: None,
        }
    }

    #[must_use]
    pub fn with_demographics(mut self, demographics: DemographicProfile) -> Self {
        self.demographics = demographics;
        self
    }

    #[must_use]
    pub fn with_source_image(mut self, image_ref: impl Into<String>) -> Self {
        self.source_image_ref = Some(image_ref.into());
        self
    }
}

/// Everything the store keeps about a record besides its vector.
/// `sequence` is the insertion order and doubles as the arena slot.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMeta {
    pub id: RecordId,
    pub condition: ConditionLabel,
    pub severity: Severity,
    pub demographics: DemographicProfile,
    pub source_image_ref: Option<String>,
    pub sequence: u64,
}

impl RecordMeta {
    pub(crate) fn from_record(record: SkinProfileRecord, sequence: u64) -> (Self, Vector) {
        let SkinProfileRecord {
            id,
            vector,
            condition,
            severity,
            demographics,
            source_image_ref,
        } = record;
        (
            Self {
                id,
                condition,
                severity,
                demographics,
                source_image_ref,
                sequence,
            },
            vector,
        )
    }

    pub(crate) fn to_record(&self, vector: Vector) -> SkinProfileRecord {
        SkinProfileRecord {
            id: self.id.clone(),
            vector,
            condition: self.condition.clone(),
            severity: self.severity,
            demographics: self.demographics.clone(),
            source_image_ref: self.source_image_ref.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_label_parsing() {
        assert_eq!(ConditionLabel::from("Acne"), ConditionLabel::Acne);
        assert_eq!(ConditionLabel::from(" ROSACEA "), ConditionLabel::Rosacea);
        assert_eq!(
            ConditionLabel::from("eczema"),
            ConditionLabel::Other("eczema".to_string())
        );
        assert!(!ConditionLabel::from("eczema").is_known());
    }

    #[test]
    fn test_condition_label_serde_as_string() {
        let json = serde_json::to_string(&ConditionLabel::Hyperpigmentation).unwrap();
        assert_eq!(json, "\"hyperpigmentation\"");
        let parsed: ConditionLabel = serde_json::from_str("\"Dryness\"").unwrap();
        assert_eq!(parsed, ConditionLabel::Dryness);
    }

    #[test]
    fn test_severity_from_score() {
        assert_eq!(Severity::from_score(0.0), Severity::Mild);
        assert_eq!(Severity::from_score(3.4), Severity::Mild);
        assert_eq!(Severity::from_score(3.5), Severity::Moderate);
        assert_eq!(Severity::from_score(6.9), Severity::Moderate);
        assert_eq!(Severity::from_score(7.0), Severity::Severe);
        assert_eq!(Severity::from_score(42.0), Severity::Severe);
        assert_eq!(Severity::from_score(f32::NAN), Severity::Mild);
        assert!(Severity::Moderate.escalates_avoidance());
        assert!(!Severity::Mild.escalates_avoidance());
    }

    #[test]
    fn test_skin_tone_ranges() {
        assert!(SkinTone::fitzpatrick(6).is_some());
        assert!(SkinTone::fitzpatrick(7).is_none());
        assert!(SkinTone::monk(10).is_some());
        assert!(SkinTone::monk(0).is_none());
        assert_ne!(SkinTone::Fitzpatrick(3), SkinTone::Monk(3));
    }

    #[test]
    fn test_age_band() {
        assert_eq!(AgeBand::from_age(30), AgeBand::From25To34);
        assert_eq!(AgeBand::from_age(80), AgeBand::Over65);
        assert_eq!("45-54".parse::<AgeBand>().unwrap(), AgeBand::From45To54);
        assert!("adult".parse::<AgeBand>().is_err());
    }

    #[test]
    fn test_blank_ethnicity_is_unknown() {
        let profile = DemographicProfile::new().with_ethnicity("   ");
        assert!(profile.known_ethnicity().is_none());
        assert!(profile.is_empty());
    }

    #[test]
    fn test_record_deserializes_with_defaults() {
        let record: SkinProfileRecord = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "vector": [1.0, 0.0],
            "condition": "acne",
            "severity": "moderate"
        }))
        .unwrap();
        assert_eq!(record.id, RecordId::String("r1".to_string()));
        assert!(record.demographics.is_empty());
        assert_eq!(record.severity, Severity::Moderate);
    }
}
