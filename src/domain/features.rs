//! Feature schema and the mapping from raw health attributes onto it.
//!
//! The classifiers are order-sensitive: they see a bare numeric vector, so the
//! column order recorded at training time (`model_columns.json`) is the only
//! contract between the mapper and the models. The set of columns a schema may
//! name is closed and declared here as [`Feature`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::GlycoriskError;

/// Neutral body-mass index used when neither BMI nor weight/height is given.
pub const DEFAULT_BMI: f64 = 25.0;

/// Weekly drinks above which a male respondent counts as a heavy drinker.
pub const HEAVY_DRINKS_MALE: f64 = 14.0;
/// Weekly drinks above which a female respondent counts as a heavy drinker.
pub const HEAVY_DRINKS_FEMALE: f64 = 7.0;

/// Raw (non-column) input keys used for derived features.
const AGE_YEARS_KEYS: &[&str] = &["age", "age_years"];
const WEIGHT_KEYS: &[&str] = &["weight", "weight_kg"];
const HEIGHT_KEYS: &[&str] = &["height", "height_cm"];
const DRINKS_KEYS: &[&str] = &["alcohol_drinks", "weekly_drinks"];

/// Every column a trained model may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    HighBp,
    HighChol,
    CholCheck,
    Bmi,
    Smoker,
    Stroke,
    HeartDiseaseOrAttack,
    PhysActivity,
    Fruits,
    Veggies,
    HvyAlcoholConsump,
    AnyHealthcare,
    NoDocBcCost,
    GenHlth,
    MentHlth,
    PhysHlth,
    DiffWalk,
    Sex,
    Age,
}

/// Value domain of a feature, used for range checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureKind {
    /// 0 or 1.
    Flag,
    /// Whole number in an inclusive range.
    Ordinal { min: u8, max: u8 },
    /// Any finite value in `(0, max]`.
    Positive { max: f64 },
}

impl Feature {
    pub const ALL: [Feature; 19] = [
        Self::HighBp,
        Self::HighChol,
        Self::CholCheck,
        Self::Bmi,
        Self::Smoker,
        Self::Stroke,
        Self::HeartDiseaseOrAttack,
        Self::PhysActivity,
        Self::Fruits,
        Self::Veggies,
        Self::HvyAlcoholConsump,
        Self::AnyHealthcare,
        Self::NoDocBcCost,
        Self::GenHlth,
        Self::MentHlth,
        Self::PhysHlth,
        Self::DiffWalk,
        Self::Sex,
        Self::Age,
    ];

    /// Column name as recorded at training time.
    #[must_use]
    pub fn column(&self) -> &'static str {
        match self {
            Self::HighBp => "HighBP",
            Self::HighChol => "HighChol",
            Self::CholCheck => "CholCheck",
            Self::Bmi => "BMI",
            Self::Smoker => "Smoker",
            Self::Stroke => "Stroke",
            Self::HeartDiseaseOrAttack => "HeartDiseaseorAttack",
            Self::PhysActivity => "PhysActivity",
            Self::Fruits => "Fruits",
            Self::Veggies => "Veggies",
            Self::HvyAlcoholConsump => "HvyAlcoholConsump",
            Self::AnyHealthcare => "AnyHealthcare",
            Self::NoDocBcCost => "NoDocbcCost",
            Self::GenHlth => "GenHlth",
            Self::MentHlth => "MentHlth",
            Self::PhysHlth => "PhysHlth",
            Self::DiffWalk => "DiffWalk",
            Self::Sex => "Sex",
            Self::Age => "Age",
        }
    }

    #[must_use]
    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.column() == name)
    }

    /// Human-readable label for explanations and forms.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::HighBp => "High blood pressure",
            Self::HighChol => "High cholesterol",
            Self::CholCheck => "Cholesterol check in last 5 years",
            Self::Bmi => "Body-mass index",
            Self::Smoker => "Smoking history",
            Self::Stroke => "Previous stroke",
            Self::HeartDiseaseOrAttack => "Heart disease or attack",
            Self::PhysActivity => "Physical activity",
            Self::Fruits => "Daily fruit",
            Self::Veggies => "Daily vegetables",
            Self::HvyAlcoholConsump => "Heavy alcohol use",
            Self::AnyHealthcare => "Health coverage",
            Self::NoDocBcCost => "Skipped doctor due to cost",
            Self::GenHlth => "General health (1-5)",
            Self::MentHlth => "Poor mental health days",
            Self::PhysHlth => "Poor physical health days",
            Self::DiffWalk => "Difficulty walking",
            Self::Sex => "Sex",
            Self::Age => "Age group",
        }
    }

    /// Alternate input keys accepted for this feature, besides its column name.
    #[must_use]
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::HighBp => &["high_bp"],
            Self::HighChol => &["high_chol"],
            Self::CholCheck => &["chol_check"],
            Self::Bmi => &["bmi"],
            Self::Smoker => &["smoker"],
            Self::Stroke => &["stroke"],
            Self::HeartDiseaseOrAttack => &["heart_disease", "heart_disease_or_attack"],
            Self::PhysActivity => &["physical_activity", "phys_activity"],
            Self::Fruits => &["ate_fruit", "fruits"],
            Self::Veggies => &["ate_veggie", "veggies"],
            Self::HvyAlcoholConsump => &["heavy_alcohol", "hvy_alcohol_consump"],
            Self::AnyHealthcare => &["any_healthcare"],
            Self::NoDocBcCost => &["no_doc_bc_cost"],
            Self::GenHlth => &["gen_hlth", "general_health"],
            Self::MentHlth => &["bad_mental_day", "ment_hlth"],
            Self::PhysHlth => &["bad_physical_day", "phys_hlth"],
            Self::DiffWalk => &["diff_walk"],
            Self::Sex => &["sex"],
            Self::Age => &["age_bucket"],
        }
    }

    #[must_use]
    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Bmi => FeatureKind::Positive { max: 100.0 },
            Self::GenHlth => FeatureKind::Ordinal { min: 1, max: 5 },
            Self::MentHlth | Self::PhysHlth => FeatureKind::Ordinal { min: 0, max: 30 },
            Self::Age => FeatureKind::Ordinal { min: 1, max: 13 },
            _ => FeatureKind::Flag,
        }
    }

    /// Value used when the input does not mention the feature.
    #[must_use]
    pub fn neutral_default(&self) -> f64 {
        match self {
            Self::GenHlth => 3.0,
            Self::AnyHealthcare | Self::CholCheck | Self::Age => 1.0,
            Self::Bmi => DEFAULT_BMI,
            _ => 0.0,
        }
    }

    fn check(&self, value: f64) -> Result<f64, String> {
        if !value.is_finite() {
            return Err(format!("{}: value must be a finite number", self.column()));
        }
        match self.kind() {
            FeatureKind::Flag => {
                if value == 0.0 || value == 1.0 {
                    Ok(value)
                } else {
                    Err(format!("{}: must be 0 or 1 (got {value})", self.column()))
                }
            }
            FeatureKind::Ordinal { min, max } => {
                if value.fract() != 0.0 {
                    return Err(format!("{}: must be a whole number (got {value})", self.column()));
                }
                if value < f64::from(min) || value > f64::from(max) {
                    return Err(format!(
                        "{}: must be between {min} and {max} (got {value})",
                        self.column()
                    ));
                }
                Ok(value)
            }
            FeatureKind::Positive { max } => {
                if value > 0.0 && value <= max {
                    Ok(value)
                } else {
                    Err(format!("{}: must be in (0, {max}] (got {value})", self.column()))
                }
            }
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Map a raw age in years to the 13-level survey age group.
///
/// `<25 -> 1`, then five-year bins `25-29 -> 2` through `75-79 -> 12`, and
/// `80+ -> 13`. Fractional ages are truncated to whole years.
#[must_use]
pub fn age_bucket(age_years: f64) -> u8 {
    if !age_years.is_finite() || age_years < 25.0 {
        return 1;
    }
    let years = age_years.trunc() as u32;
    if years >= 80 {
        13
    } else {
        ((years - 25) / 5 + 2) as u8
    }
}

/// Body-mass index from weight (kg) and height.
///
/// Heights above 3 are taken as centimetres. Returns `None` when either value
/// is zero or negative.
#[must_use]
pub fn body_mass_index(weight_kg: f64, height: f64) -> Option<f64> {
    if weight_kg <= 0.0 || height <= 0.0 {
        return None;
    }
    let metres = if height > 3.0 { height / 100.0 } else { height };
    Some(weight_kg / (metres * metres))
}

/// Heavy-drinker flag: more than 14 drinks a week for men, more than 7 for women.
#[must_use]
pub fn heavy_alcohol(male: bool, weekly_drinks: f64) -> bool {
    if male {
        weekly_drinks > HEAVY_DRINKS_MALE
    } else {
        weekly_drinks > HEAVY_DRINKS_FEMALE
    }
}

/// Error raised when a column list cannot be used as a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("column schema is empty")]
    Empty,
    #[error("unknown column in schema: {0}")]
    UnknownColumn(String),
    #[error("duplicate column in schema: {0}")]
    DuplicateColumn(String),
}

/// Ordered list of features exactly as the models were trained on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<Feature>,
}

impl FeatureSchema {
    /// Build a schema from training-time column names.
    ///
    /// # Errors
    /// Rejects empty lists, names outside [`Feature`], and duplicates.
    pub fn from_columns<S: AsRef<str>>(names: &[S]) -> Result<Self, SchemaError> {
        if names.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let feature = Feature::from_column(name)
                .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()))?;
            if columns.contains(&feature) {
                return Err(SchemaError::DuplicateColumn(name.to_string()));
            }
            columns.push(feature);
        }
        Ok(Self { columns })
    }

    #[must_use]
    pub fn columns(&self) -> &[Feature] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn position(&self, feature: Feature) -> Option<usize> {
        self.columns.iter().position(|f| *f == feature)
    }
}

/// Numeric model input, ordered by the schema it was mapped with.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    #[must_use]
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Translates a flat attribute map into a [`FeatureVector`].
#[derive(Debug, Clone, Copy)]
pub struct FeatureMapper<'a> {
    schema: Option<&'a FeatureSchema>,
}

impl<'a> FeatureMapper<'a> {
    #[must_use]
    pub fn new(schema: Option<&'a FeatureSchema>) -> Self {
        Self { schema }
    }

    /// Map raw attributes onto the schema.
    ///
    /// Missing attributes take their neutral default. All range problems are
    /// collected and reported together.
    ///
    /// # Errors
    /// `Configuration` when no schema is loaded, `Validation` for malformed or
    /// out-of-range values.
    pub fn map(&self, input: &Map<String, Value>) -> Result<FeatureVector, GlycoriskError> {
        let schema = self.schema.ok_or_else(|| {
            GlycoriskError::Configuration("training column schema is not loaded".to_string())
        })?;

        let mut errors = Vec::new();
        let record = RawRecord { input };

        let sex = record.feature(Feature::Sex, &mut errors);
        let male = sex == Some(1.0);

        let mut values = Vec::with_capacity(schema.len());
        for feature in schema.columns() {
            let value = match feature {
                Feature::Sex => sex.unwrap_or_else(|| Feature::Sex.neutral_default()),
                Feature::Bmi => record.bmi(&mut errors),
                Feature::HvyAlcoholConsump => record.heavy_alcohol(male, &mut errors),
                Feature::Age => record.age_bucket(&mut errors),
                other => record
                    .feature(*other, &mut errors)
                    .unwrap_or_else(|| other.neutral_default()),
            };
            values.push(value);
        }

        if !errors.is_empty() {
            return Err(GlycoriskError::Validation(errors));
        }
        debug_assert_eq!(values.len(), schema.len());
        Ok(FeatureVector::from_values(values))
    }
}

/// Lookup helpers over one raw input map.
struct RawRecord<'a> {
    input: &'a Map<String, Value>,
}

impl RawRecord<'_> {
    /// First present, non-null key among `keys`, coerced to a number.
    fn number(&self, keys: &[&str], errors: &mut Vec<String>) -> Option<f64> {
        let (key, value) = keys
            .iter()
            .find_map(|k| self.input.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))?;
        match coerce(value) {
            Some(n) if n.is_finite() => Some(n),
            _ => {
                errors.push(format!("{key}: expected a number (got {value})"));
                None
            }
        }
    }

    fn feature(&self, feature: Feature, errors: &mut Vec<String>) -> Option<f64> {
        let mut keys = vec![feature.column()];
        keys.extend_from_slice(feature.aliases());
        let raw = self.number(&keys, errors)?;
        match feature.check(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                errors.push(e);
                None
            }
        }
    }

    fn non_negative(&self, keys: &[&str], errors: &mut Vec<String>) -> Option<f64> {
        let v = self.number(keys, errors)?;
        if v < 0.0 {
            errors.push(format!("{}: must not be negative (got {v})", keys[0]));
            return None;
        }
        Some(v)
    }

    fn bmi(&self, errors: &mut Vec<String>) -> f64 {
        if let Some(explicit) = self.feature(Feature::Bmi, errors) {
            return explicit;
        }
        let weight = self.non_negative(WEIGHT_KEYS, errors);
        let height = self.non_negative(HEIGHT_KEYS, errors);
        let derived = match (weight, height) {
            (Some(w), Some(h)) => body_mass_index(w, h),
            _ => None,
        };
        match derived {
            Some(bmi) => match Feature::Bmi.check(bmi) {
                Ok(v) => v,
                Err(_) => {
                    errors.push(format!("BMI derived from weight/height is implausible ({bmi:.1})"));
                    DEFAULT_BMI
                }
            },
            None => DEFAULT_BMI,
        }
    }

    fn heavy_alcohol(&self, male: bool, errors: &mut Vec<String>) -> f64 {
        if let Some(explicit) = self.feature(Feature::HvyAlcoholConsump, errors) {
            return explicit;
        }
        let drinks = self.non_negative(DRINKS_KEYS, errors).unwrap_or(0.0);
        if heavy_alcohol(male, drinks) {
            1.0
        } else {
            0.0
        }
    }

    fn age_bucket(&self, errors: &mut Vec<String>) -> f64 {
        if let Some(bucket) = self.feature(Feature::Age, errors) {
            return bucket;
        }
        match self.number(AGE_YEARS_KEYS, errors) {
            Some(years) if (0.0..=120.0).contains(&years) => f64::from(age_bucket(years)),
            Some(years) => {
                errors.push(format!("age: must be between 0 and 120 years (got {years})"));
                Feature::Age.neutral_default()
            }
            None => Feature::Age.neutral_default(),
        }
    }
}

fn coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TRAINED: [&str; 16] = [
        "HighBP",
        "HighChol",
        "Stroke",
        "DiffWalk",
        "PhysActivity",
        "GenHlth",
        "PhysHlth",
        "MentHlth",
        "Sex",
        "HeartDiseaseorAttack",
        "Smoker",
        "Fruits",
        "Veggies",
        "HvyAlcoholConsump",
        "BMI",
        "Age",
    ];

    fn schema() -> FeatureSchema {
        FeatureSchema::from_columns(&TRAINED).expect("Should build schema")
    }

    fn as_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("Should be an object")
    }

    fn value_of(schema: &FeatureSchema, v: &FeatureVector, feature: Feature) -> f64 {
        v.as_slice()[schema.position(feature).expect("Should be in schema")]
    }

    #[test]
    fn test_age_bucket_boundaries() {
        assert_eq!(age_bucket(18.0), 1);
        assert_eq!(age_bucket(24.9), 1);
        assert_eq!(age_bucket(25.0), 2);
        assert_eq!(age_bucket(29.0), 2);
        assert_eq!(age_bucket(30.0), 3);
        assert_eq!(age_bucket(62.0), 9);
        assert_eq!(age_bucket(79.0), 12);
        assert_eq!(age_bucket(80.0), 13);
        assert_eq!(age_bucket(119.0), 13);
    }

    #[test]
    fn test_age_bucket_is_monotonic_and_bounded() {
        let mut previous = 0;
        for tenth in 0..1200 {
            let bucket = age_bucket(f64::from(tenth) / 10.0);
            assert!((1..=13).contains(&bucket));
            assert!(bucket >= previous);
            previous = bucket;
        }
    }

    #[test]
    fn test_heavy_alcohol_thresholds() {
        assert!(!heavy_alcohol(true, 14.0));
        assert!(heavy_alcohol(true, 15.0));
        assert!(!heavy_alcohol(false, 7.0));
        assert!(heavy_alcohol(false, 8.0));
    }

    #[test]
    fn test_bmi_detects_centimetres() {
        let metres = body_mass_index(80.0, 1.8).expect("Should compute");
        let centimetres = body_mass_index(80.0, 180.0).expect("Should compute");
        assert!((metres - centimetres).abs() < 1e-9);
        assert!((metres - 24.691).abs() < 1e-3);
        assert!(body_mass_index(0.0, 180.0).is_none());
    }

    #[test]
    fn test_schema_rejects_unknown_and_duplicate_columns() {
        assert_eq!(
            FeatureSchema::from_columns(&["HighBP", "Income"]),
            Err(SchemaError::UnknownColumn("Income".to_string()))
        );
        assert_eq!(
            FeatureSchema::from_columns(&["HighBP", "HighBP"]),
            Err(SchemaError::DuplicateColumn("HighBP".to_string()))
        );
        assert_eq!(
            FeatureSchema::from_columns::<&str>(&[]),
            Err(SchemaError::Empty)
        );
    }

    #[test]
    fn test_vector_follows_schema_order() {
        let schema = schema();
        let mapper = FeatureMapper::new(Some(&schema));
        let vector = mapper
            .map(&as_map(json!({"HighBP": 1, "Age": 8, "BMI": 22.2, "Sex": 1})))
            .expect("Should map");

        assert_eq!(vector.len(), TRAINED.len());
        assert_eq!(vector.as_slice()[0], 1.0);
        assert!((vector.as_slice()[14] - 22.2).abs() < f64::EPSILON);
        assert_eq!(vector.as_slice()[15], 8.0);
    }

    #[test]
    fn test_missing_keys_take_neutral_defaults() {
        let schema = FeatureSchema::from_columns(&["GenHlth", "AnyHealthcare", "Age", "BMI", "Smoker"])
            .expect("Should build schema");
        let vector = FeatureMapper::new(Some(&schema))
            .map(&Map::new())
            .expect("Should map empty input");
        assert_eq!(vector.as_slice(), &[3.0, 1.0, 1.0, DEFAULT_BMI, 0.0]);
    }

    #[test]
    fn test_derived_fields_from_raw_attributes() {
        let schema = schema();
        let mapper = FeatureMapper::new(Some(&schema));
        let vector = mapper
            .map(&as_map(json!({
                "sex": 0,
                "alcohol_drinks": 9,
                "age": 62,
                "weight": 90,
                "height": 175,
                "high_bp": true,
                "bad_mental_day": "4",
                "physical_activity": null,
            })))
            .expect("Should map");

        assert_eq!(value_of(&schema, &vector, Feature::HvyAlcoholConsump), 1.0);
        assert_eq!(value_of(&schema, &vector, Feature::Age), 9.0);
        assert_eq!(value_of(&schema, &vector, Feature::HighBp), 1.0);
        assert_eq!(value_of(&schema, &vector, Feature::MentHlth), 4.0);
        assert_eq!(value_of(&schema, &vector, Feature::PhysActivity), 0.0);
        let bmi = value_of(&schema, &vector, Feature::Bmi);
        assert!((bmi - 29.387).abs() < 1e-3);
    }

    #[test]
    fn test_male_threshold_applies_to_alcohol() {
        let schema = schema();
        let mapper = FeatureMapper::new(Some(&schema));
        let vector = mapper
            .map(&as_map(json!({"sex": 1, "alcohol_drinks": 9})))
            .expect("Should map");
        assert_eq!(value_of(&schema, &vector, Feature::HvyAlcoholConsump), 0.0);
    }

    #[test]
    fn test_out_of_range_values_are_all_reported() {
        let schema = schema();
        let mapper = FeatureMapper::new(Some(&schema));
        let err = mapper
            .map(&as_map(json!({"GenHlth": 7, "high_bp": 2, "MentHlth": 31, "age": -3})))
            .expect_err("Should reject");
        match err {
            GlycoriskError::Validation(errors) => assert_eq!(errors.len(), 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let schema = schema();
        let err = FeatureMapper::new(Some(&schema))
            .map(&as_map(json!({"smoker": "sometimes"})))
            .expect_err("Should reject");
        assert!(matches!(err, GlycoriskError::Validation(_)));
    }

    #[test]
    fn test_missing_schema_is_configuration_error() {
        let err = FeatureMapper::new(None)
            .map(&Map::new())
            .expect_err("Should fail without schema");
        assert!(matches!(err, GlycoriskError::Configuration(_)));
    }
}
