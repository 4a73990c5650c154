//! Core data types for the Argus analysis pipeline.
//!
//! These types describe the units of work (images, prompts) and the records
//! produced for them. Field names serialize in camelCase to match the
//! checkpoint document layout consumed by dashboards.

use serde::{Deserialize, Serialize};

/// One analysis dimension applied to every image in a run (e.g. "count vehicles").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSpec {
    /// Stable identifier, unique within a prompt set
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// What the analysis is trying to establish
    pub objective: String,

    /// What the model should look for in the frame
    #[serde(alias = "looking_for")]
    pub looking_for: String,

    /// How to decide whether the image is a match
    pub criteria: String,
}

impl PromptSpec {
    /// Build the instruction text sent to the vision provider.
    ///
    /// The response shape is spelled out so the provider's JSON mode returns
    /// the fields the normalizer expects.
    pub fn instruction(&self) -> String {
        format!(
            "You are analyzing a still frame captured by a surveillance camera.\n\n\
             Objective: {objective}\n\
             Looking for: {looking_for}\n\
             Criteria: {criteria}\n\n\
             Respond with a single JSON object with these fields:\n\
             - \"match\": true if the criteria are met, otherwise false\n\
             - \"count\": number of relevant items observed (0 if none)\n\
             - \"description\": one or two sentences describing what you see\n\
             - \"details\": specifics supporting your judgement\n\
             - \"confidence\": one of \"high\", \"medium\", \"low\"\n\
             - \"additional_observations\": anything else notable (optional)",
            objective = self.objective,
            looking_for = self.looking_for,
            criteria = self.criteria,
        )
    }
}

/// One unit of input: an image in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTask {
    /// Object-store key of the image
    pub path: String,

    /// Just the filename portion of the key
    pub filename: String,

    /// Capture date folder (e.g. "2025-11-26" or "2025-11-26_chittoor")
    pub date: String,

    /// Camera category (e.g. "ANALYTICS", "FIXED", "PTZ")
    pub camera_type: String,
}

impl ImageTask {
    /// Create a task from an object key, deriving the filename from the last segment.
    pub fn new(path: impl Into<String>, date: impl Into<String>, camera_type: impl Into<String>) -> Self {
        let path = path.into();
        let filename = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            path,
            filename,
            date: date.into(),
            camera_type: camera_type.into(),
        }
    }
}

/// Model confidence in a judgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl Confidence {
    /// Parse a confidence label leniently; unknown labels map to `Low`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "medium" | "moderate" => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Output of one prompt evaluated against one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub prompt_id: String,
    pub prompt_name: String,

    /// Whether the prompt's criteria were met
    #[serde(rename = "match")]
    pub matched: bool,

    /// Always a scalar; keyed breakdowns are summed during normalization
    pub count: u64,

    pub description: String,
    pub details: String,
    pub confidence: Confidence,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_observations: Option<String>,
}

impl AnalysisResult {
    /// A negative, low-confidence result recording why the prompt could not be evaluated.
    pub fn failed(prompt: &PromptSpec, message: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt.id.clone(),
            prompt_name: prompt.name.clone(),
            matched: false,
            count: 0,
            description: "Analysis failed".to_string(),
            details: message.into(),
            confidence: Confidence::Low,
            additional_observations: None,
        }
    }
}

/// Outcome of analyzing one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Success,
    Error,
}

/// Aggregated record for one image across the whole prompt set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysisResult {
    pub filename: String,
    pub image_path: String,
    pub date: String,
    pub camera_type: String,

    /// One entry per prompt on success; empty on error
    pub results: Vec<AnalysisResult>,

    pub status: ImageStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageAnalysisResult {
    pub fn success(task: &ImageTask, results: Vec<AnalysisResult>) -> Self {
        Self {
            filename: task.filename.clone(),
            image_path: task.path.clone(),
            date: task.date.clone(),
            camera_type: task.camera_type.clone(),
            results,
            status: ImageStatus::Success,
            error: None,
        }
    }

    pub fn error(task: &ImageTask, message: impl Into<String>) -> Self {
        Self {
            filename: task.filename.clone(),
            image_path: task.path.clone(),
            date: task.date.clone(),
            camera_type: task.camera_type.clone(),
            results: Vec::new(),
            status: ImageStatus::Error,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ImageStatus::Success
    }

    /// Whether any prompt matched on this image.
    pub fn any_match(&self) -> bool {
        self.results.iter().any(|r| r.matched)
    }
}

/// Totals over a set of image results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,

    /// Images where at least one prompt matched
    #[serde(default)]
    pub matched: usize,
}

impl RunSummary {
    pub fn from_results(results: &[ImageAnalysisResult]) -> Self {
        let successful = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            matched: results.iter().filter(|r| r.any_match()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> PromptSpec {
        PromptSpec {
            id: "vehicles".to_string(),
            name: "Count vehicles".to_string(),
            objective: "Count parked vehicles".to_string(),
            looking_for: "Cars, trucks, motorcycles".to_string(),
            criteria: "Match if any vehicle is parked on the footpath".to_string(),
        }
    }

    #[test]
    fn test_image_task_filename_from_key() {
        let task = ImageTask::new("images/2025-11-26/PTZ/cam_1.jpg", "2025-11-26", "PTZ");
        assert_eq!(task.filename, "cam_1.jpg");
    }

    #[test]
    fn test_instruction_mentions_prompt_fields() {
        let text = prompt().instruction();
        assert!(text.contains("Count parked vehicles"));
        assert!(text.contains("Cars, trucks, motorcycles"));
        assert!(text.contains("\"confidence\""));
    }

    #[test]
    fn test_confidence_parse() {
        assert_eq!(Confidence::parse("HIGH"), Confidence::High);
        assert_eq!(Confidence::parse(" medium "), Confidence::Medium);
        assert_eq!(Confidence::parse("certain"), Confidence::Low);
    }

    #[test]
    fn test_analysis_result_serializes_match_key() {
        let result = AnalysisResult::failed(&prompt(), "boom");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["match"], false);
        assert_eq!(json["promptId"], "vehicles");
        assert_eq!(json["confidence"], "low");
        assert!(json.get("additionalObservations").is_none());
    }

    #[test]
    fn test_error_result_has_no_results() {
        let task = ImageTask::new("images/d/FIXED/a.jpg", "d", "FIXED");
        let result = ImageAnalysisResult::error(&task, "signing failed");
        assert_eq!(result.status, ImageStatus::Error);
        assert!(result.results.is_empty());
        assert_eq!(result.error.as_deref(), Some("signing failed"));
    }

    #[test]
    fn test_run_summary_counts() {
        let task = ImageTask::new("images/d/FIXED/a.jpg", "d", "FIXED");
        let mut hit = AnalysisResult::failed(&prompt(), "");
        hit.matched = true;
        let results = vec![
            ImageAnalysisResult::success(&task, vec![hit]),
            ImageAnalysisResult::success(&task, vec![AnalysisResult::failed(&prompt(), "x")]),
            ImageAnalysisResult::error(&task, "bad"),
        ];
        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.matched, 1);
    }
}
