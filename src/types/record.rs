//! Customer record collected by the prediction form

use serde::{Deserialize, Serialize};

/// Declares an enumerated form field with its exact training-time spellings.
macro_rules! categorical {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every accepted value, in form order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Value as the classifier saw it during training
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} value '{}', expected one of: {}",
                        stringify!($name),
                        other,
                        $name::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
                    )),
                }
            }
        }
    };
}

categorical! {
    /// Type of job
    Job {
        Admin => "admin.",
        BlueCollar => "blue-collar",
        Entrepreneur => "entrepreneur",
        Housemaid => "housemaid",
        Management => "management",
        Retired => "retired",
        SelfEmployed => "self-employed",
        Services => "services",
        Student => "student",
        Technician => "technician",
        Unemployed => "unemployed",
        Unknown => "unknown",
    }
}

categorical! {
    /// Marital status
    Marital {
        Married => "married",
        Single => "single",
        Divorced => "divorced",
        Unknown => "unknown",
    }
}

categorical! {
    /// Highest education level
    Education {
        Basic => "basic",
        HighSchool => "high.school",
        ProfessionalCourse => "professional.course",
        UniversityDegree => "university.degree",
        Illiterate => "illiterate",
        Unknown => "unknown",
    }
}

categorical! {
    /// Three-valued answer used by the credit default, housing and loan fields
    Answer {
        No => "no",
        Yes => "yes",
        Unknown => "unknown",
    }
}

categorical! {
    /// Contact communication type
    Contact {
        Cellular => "cellular",
        Telephone => "telephone",
    }
}

categorical! {
    /// Month of the last contact
    Month {
        Jan => "jan",
        Feb => "feb",
        Mar => "mar",
        Apr => "apr",
        May => "may",
        Jun => "jun",
        Jul => "jul",
        Aug => "aug",
        Sep => "sep",
        Oct => "oct",
        Nov => "nov",
        Dec => "dec",
    }
}

categorical! {
    /// Weekday of the last contact
    DayOfWeek {
        Mon => "mon",
        Tue => "tue",
        Wed => "wed",
        Thu => "thu",
        Fri => "fri",
    }
}

categorical! {
    /// Outcome of the previous marketing campaign
    PreviousOutcome {
        Nonexistent => "nonexistent",
        Failure => "failure",
        Success => "success",
    }
}

/// Lowest age the form accepts
pub const MIN_AGE: u32 = 17;
/// Highest age the form accepts
pub const MAX_AGE: u32 = 100;

/// One customer as entered in the form.
///
/// Field names and order match the columns the classifier was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    // Profile
    pub age: u32,
    pub job: Job,
    pub marital: Marital,
    pub education: Education,
    /// Has credit in default?
    #[serde(rename = "default")]
    pub credit_default: Answer,
    /// Has housing loan?
    pub housing: Answer,
    /// Has personal loan?
    pub loan: Answer,

    // Contact & campaign
    pub contact: Contact,
    pub month: Month,
    pub day_of_week: DayOfWeek,
    /// Number of contacts performed during this campaign
    pub campaign: u32,
    /// Days since the client was last contacted by a previous campaign
    pub pdays: u32,
    /// Number of contacts performed before this campaign
    pub previous: u32,
    pub poutcome: PreviousOutcome,

    // Macro indicators
    /// Consumer price index
    #[serde(rename = "cons.price.idx")]
    pub cons_price_idx: f64,
    /// Consumer confidence index
    #[serde(rename = "cons.conf.idx")]
    pub cons_conf_idx: f64,
    /// Euribor 3 month rate
    pub euribor3m: f64,
}

impl CustomerRecord {
    /// Check the bounds the form enforces on its numeric widgets.
    pub fn check_form_bounds(&self) -> Result<(), String> {
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(format!(
                "age must be between {} and {}, got {}",
                MIN_AGE, MAX_AGE, self.age
            ));
        }
        if self.campaign < 1 {
            return Err("campaign must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for CustomerRecord {
    /// The values the form starts with.
    fn default() -> Self {
        Self {
            age: 35,
            job: Job::Admin,
            marital: Marital::Married,
            education: Education::Basic,
            credit_default: Answer::No,
            housing: Answer::No,
            loan: Answer::No,
            contact: Contact::Cellular,
            month: Month::Jan,
            day_of_week: DayOfWeek::Mon,
            campaign: 1,
            pdays: 0,
            previous: 0,
            poutcome: PreviousOutcome::Nonexistent,
            cons_price_idx: 93.994,
            cons_conf_idx: -36.4,
            euribor3m: 4.857,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_uses_training_column_names() {
        let record = CustomerRecord::default();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["default"], "no");
        assert_eq!(json["job"], "admin.");
        assert_eq!(json["cons.price.idx"], 93.994);
        assert!(json.get("credit_default").is_none());
    }

    #[test]
    fn test_record_deserialization() {
        let json = r#"{
            "age": 42, "job": "self-employed", "marital": "single",
            "education": "university.degree", "default": "unknown",
            "housing": "yes", "loan": "no", "contact": "telephone",
            "month": "may", "day_of_week": "thu", "campaign": 3,
            "pdays": 999, "previous": 0, "poutcome": "nonexistent",
            "cons.price.idx": 93.2, "cons.conf.idx": -42.0, "euribor3m": 1.3
        }"#;

        let record: CustomerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.job, Job::SelfEmployed);
        assert_eq!(record.education, Education::UniversityDegree);
        assert_eq!(record.credit_default, Answer::Unknown);
        assert_eq!(record.pdays, 999);
    }

    #[test]
    fn test_unknown_category_rejected() {
        assert!("astronaut".parse::<Job>().is_err());
        assert_eq!("high.school".parse::<Education>(), Ok(Education::HighSchool));
        assert_eq!(Job::ALL.len(), 12);
        assert_eq!(Month::ALL.len(), 12);
        assert_eq!(DayOfWeek::ALL.len(), 5);
    }

    #[test]
    fn test_form_bounds() {
        let mut record = CustomerRecord::default();
        assert!(record.check_form_bounds().is_ok());

        record.age = 16;
        assert!(record.check_form_bounds().is_err());

        record.age = 40;
        record.campaign = 0;
        assert!(record.check_form_bounds().is_err());
    }
}
