//! Output formatting for predictions.

use crate::features::FeatureFrame;
use crate::types::prediction::{Decision, PredictionResponse};
use crate::types::record::CustomerRecord;
use std::fmt::Write;

/// Width of the confidence bar in characters
const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}. Use 'text' or 'json'.")),
        }
    }
}

/// Confidence bar for a probability, clamped to [0, 1].
pub fn confidence_bar(probability: f64) -> String {
    let p = probability.clamp(0.0, 1.0);
    let filled = (p * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:>5.1}%",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled),
        p * 100.0
    )
}

/// One line per input column, in training order.
pub fn render_input_summary(record: &CustomerRecord) -> String {
    let frame = FeatureFrame::from_record(record);
    let mut out = String::new();
    let _ = writeln!(out, "INPUT SUMMARY");
    for (name, value) in frame.iter() {
        let _ = writeln!(out, "  {:<16} {}", name, value);
    }
    out
}

/// Result panel for a prediction response.
pub fn render_text(response: &PredictionResponse) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "PREDICTION RESULT");
    let _ = writeln!(out, "{}", rule);

    if response.degraded {
        let _ = writeln!(
            out,
            "WARNING: threshold not found in model artifact, using default threshold={}",
            response.threshold
        );
    }

    if let Some(error) = &response.error {
        let _ = writeln!(out, "ERROR [{}]: {}", error.kind, error.message);
    }

    match response.decision {
        Some(Decision::Yes) => {
            let _ = writeln!(out, "Prediction: YES — Subscribe Deposit");
        }
        Some(Decision::No) => {
            let _ = writeln!(out, "Prediction: NO — Not Subscribe");
        }
        None => {}
    }

    if let Some(decision) = response.decision {
        let label = match decision {
            Decision::Yes => "YES",
            Decision::No => "NO",
        };
        let _ = writeln!(out, "  Decision:          {}", label);
    }

    if let Some(p) = response.probability {
        let _ = writeln!(out, "  Probability (YES): {:.3}", p);
        let _ = writeln!(out, "  Threshold:         {:.3}", response.threshold);
        let _ = writeln!(out, "\nConfidence (YES)");
        let _ = writeln!(out, "  {}", confidence_bar(p));
    }

    let _ = writeln!(out, "{}", "-".repeat(60));
    let _ = writeln!(out, "Model: {}", response.model);
    out
}

pub fn render_json(response: &PredictionResponse) -> serde_json::Result<String> {
    serde_json::to_string_pretty(response)
}

pub fn print_prediction(
    response: &PredictionResponse,
    format: OutputFormat,
) -> serde_json::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", render_text(response)),
        OutputFormat::Json => println!("{}", render_json(response)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictError;
    use crate::models::inference::PredictionResult;
    use crate::types::prediction::ErrorBody;

    fn response(probability: Option<f64>, decision: bool, degraded: bool) -> PredictionResponse {
        PredictionResponse::success(
            None,
            &PredictionResult {
                probability,
                decision,
            },
            0.35,
            "Logistic Regression (test)".to_string(),
            degraded,
        )
    }

    #[test]
    fn test_confidence_bar_clamps() {
        assert!(confidence_bar(1.7).ends_with("100.0%"));
        assert!(confidence_bar(-0.2).ends_with("  0.0%"));
        assert_eq!(confidence_bar(0.5).matches('█').count(), BAR_WIDTH / 2);
    }

    #[test]
    fn test_text_with_probability() {
        let text = render_text(&response(Some(0.42), true, false));
        assert!(text.contains("YES — Subscribe Deposit"));
        assert!(text.contains("Probability (YES): 0.420"));
        assert!(text.contains("Confidence (YES)"));
        assert!(text.contains("Model: Logistic Regression (test)"));
        assert!(!text.contains("WARNING"));
    }

    #[test]
    fn test_text_label_only_degraded() {
        let text = render_text(&response(None, false, true));
        assert!(text.contains("NO — Not Subscribe"));
        assert!(!text.contains("Probability"));
        assert!(!text.contains("Confidence"));
        assert!(text.contains("WARNING"));
    }

    #[test]
    fn test_text_error() {
        let err = PredictError::Inference("boom".to_string());
        let response =
            PredictionResponse::failure(None, ErrorBody::from(&err), 0.5, "m".to_string(), false);
        let text = render_text(&response);
        assert!(text.contains("ERROR [inference_error]"));
        assert!(!text.contains("Prediction:"));
    }

    #[test]
    fn test_json_output() {
        let json = render_json(&response(Some(0.42), true, true)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["decision"], "yes");
        assert_eq!(value["probability"], 0.42);
        assert_eq!(value["degraded"], true);
        assert!(value["error"].is_null());
    }

    #[test]
    fn test_input_summary_lists_all_columns() {
        let summary = render_input_summary(&CustomerRecord::default());
        assert!(summary.contains("cons.price.idx"));
        assert!(summary.contains("admin."));
        assert_eq!(summary.lines().count(), 18);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
