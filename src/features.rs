//! Single-row feature frame handed to the classifier.
//!
//! The frame keeps the record's column names and order exactly as the
//! training data had them; classifiers validate it themselves.

use crate::types::record::CustomerRecord;
use serde::Serialize;
use std::fmt;

/// Column order of the training data
pub const COLUMNS: [&str; 17] = [
    "age",
    "job",
    "marital",
    "education",
    "default",
    "housing",
    "loan",
    "contact",
    "month",
    "day_of_week",
    "campaign",
    "pdays",
    "previous",
    "poutcome",
    "cons.price.idx",
    "cons.conf.idx",
    "euribor3m",
];

/// Cell value of a frame column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FeatureValue {
    /// Numeric view of the value, `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Int(v) => Some(*v as f64),
            FeatureValue::Float(v) => Some(*v),
            FeatureValue::Text(_) => None,
        }
    }

    /// Category label of the value, numbers rendered as text.
    pub fn as_category(&self) -> String {
        match self {
            FeatureValue::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(v) => write!(f, "{}", v),
            FeatureValue::Float(v) => write!(f, "{}", v),
            FeatureValue::Text(s) => f.write_str(s),
        }
    }
}

/// One row of named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureFrame {
    columns: Vec<(String, FeatureValue)>,
}

impl FeatureFrame {
    /// Create an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column (builder style).
    pub fn with(mut self, name: impl Into<String>, value: FeatureValue) -> Self {
        self.columns.push((name.into(), value));
        self
    }

    /// Build the frame for a customer record, columns in training order.
    pub fn from_record(record: &CustomerRecord) -> Self {
        use FeatureValue::{Float, Int, Text};

        let text = |s: &str| Text(s.to_string());

        Self::new()
            .with("age", Int(record.age as i64))
            .with("job", text(record.job.as_str()))
            .with("marital", text(record.marital.as_str()))
            .with("education", text(record.education.as_str()))
            .with("default", text(record.credit_default.as_str()))
            .with("housing", text(record.housing.as_str()))
            .with("loan", text(record.loan.as_str()))
            .with("contact", text(record.contact.as_str()))
            .with("month", text(record.month.as_str()))
            .with("day_of_week", text(record.day_of_week.as_str()))
            .with("campaign", Int(record.campaign as i64))
            .with("pdays", Int(record.pdays as i64))
            .with("previous", Int(record.previous as i64))
            .with("poutcome", text(record.poutcome.as_str()))
            .with("cons.price.idx", Float(record.cons_price_idx))
            .with("cons.conf.idx", Float(record.cons_conf_idx))
            .with("euribor3m", Float(record.euribor3m))
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Look up a column value by name.
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Iterate over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::record::Job;

    #[test]
    fn test_frame_follows_training_order() {
        let frame = FeatureFrame::from_record(&CustomerRecord::default());

        assert_eq!(frame.len(), COLUMNS.len());
        assert_eq!(frame.column_names(), COLUMNS.to_vec());
    }

    #[test]
    fn test_frame_values() {
        let record = CustomerRecord {
            age: 35,
            job: Job::Technician,
            ..CustomerRecord::default()
        };
        let frame = FeatureFrame::from_record(&record);

        assert_eq!(frame.get("age"), Some(&FeatureValue::Int(35)));
        assert_eq!(
            frame.get("job"),
            Some(&FeatureValue::Text("technician".to_string()))
        );
        assert_eq!(frame.get("euribor3m").and_then(|v| v.as_f64()), Some(4.857));
        assert!(frame.get("duration").is_none());
    }

    #[test]
    fn test_value_views() {
        assert_eq!(FeatureValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(FeatureValue::Text("x".into()).as_f64(), None);
        assert_eq!(FeatureValue::Int(3).as_category(), "3");
    }
}
