//! Natural-language summaries with deterministic fallbacks.
//!
//! Every summary is built from facts that were already computed. The
//! generator only rephrases them; when it is missing or fails, the template
//! built from the same facts is returned instead.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::TextGenerator;
use crate::types::DatasetProfile;

/// Correlations at or above this magnitude are called strong.
const STRONG_CORRELATION: f64 = 0.7;

const DATASET_SYSTEM: &str = "You are a data analyst expert. Generate a concise, professional \
summary of a dataset analysis. Focus on key insights, data quality, and notable patterns. Keep it \
under 150 words and make it accessible to business users.";

const MODEL_SYSTEM: &str = "You are a machine learning expert. Generate a clear, professional \
summary of a trained ML model. Explain the model's purpose, performance, and practical \
implications in business terms. Keep it under 200 words.";

const INSIGHTS_SYSTEM: &str = "You are a senior data scientist. Provide actionable insights and \
recommendations for a machine learning project. Focus on practical next steps, potential \
improvements, and business implications.";

/// Dataset facts a summary is written from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetFacts {
    pub rows: usize,
    pub columns: usize,
    pub missing_values: usize,
    pub duplicate_rows: usize,
    /// Share of non-missing cells, 0.0 - 1.0.
    pub completeness: f64,
    pub correlations: usize,
    pub strong_correlations: usize,
    pub numerical_columns: usize,
    pub categorical_columns: usize,
}

impl DatasetFacts {
    pub fn from_profile(profile: &DatasetProfile) -> Self {
        let info = &profile.dataset_info;
        Self {
            rows: info.rows,
            columns: info.columns,
            missing_values: info.missing_values_total,
            duplicate_rows: info.duplicate_rows,
            completeness: profile.data_quality.completeness_ratio,
            correlations: profile.correlations.len(),
            strong_correlations: profile
                .correlations
                .values()
                .filter(|r| r.abs() > STRONG_CORRELATION)
                .count(),
            numerical_columns: info.numerical_columns,
            categorical_columns: info.categorical_columns,
        }
    }

    fn missing_share(&self) -> f64 {
        let cells = self.rows * self.columns;
        if cells == 0 {
            0.0
        } else {
            self.missing_values as f64 / cells as f64 * 100.0
        }
    }
}

/// Trained-model facts a summary is written from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFacts {
    /// Algorithm token, e.g. `random_forest`.
    pub algorithm: String,
    pub problem_type: String,
    pub target_column: String,
    pub feature_count: usize,
    pub dataset_rows: usize,
    pub completeness: f64,
    /// Headline metrics, already formatted (`Accuracy: 91.0%, F1-Score: 0.905`).
    pub metrics: Option<String>,
}

/// Structured advice about a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInsights {
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub business_applications: Vec<String>,
    pub next_steps: Vec<String>,
}

/// `random_forest` -> `Random Forest`.
pub fn display_algorithm(token: &str) -> String {
    token
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn quality_label(completeness: f64) -> &'static str {
    if completeness > 0.9 {
        "high"
    } else if completeness > 0.7 {
        "moderate"
    } else {
        "low"
    }
}

pub fn fallback_dataset_summary(facts: &DatasetFacts) -> String {
    format!(
        "Dataset contains {} rows and {} columns with {} data quality ({:.1}% complete). \
         The dataset has {} numerical and {} categorical features. \
         {} missing values and {} duplicate rows were identified. \
         {} feature correlations were detected, including {} strong correlations.",
        facts.rows,
        facts.columns,
        quality_label(facts.completeness),
        facts.completeness * 100.0,
        facts.numerical_columns,
        facts.categorical_columns,
        facts.missing_values,
        facts.duplicate_rows,
        facts.correlations,
        facts.strong_correlations,
    )
}

pub fn fallback_model_summary(facts: &ModelFacts) -> String {
    let performance = facts
        .metrics
        .as_deref()
        .unwrap_or("performance metrics are available in the detailed results");
    format!(
        "This {} model was trained for {} to predict '{}' using {} features from {} training samples. \
         The model achieved {}. \
         This model can be used to make predictions on new data with similar characteristics.",
        display_algorithm(&facts.algorithm),
        facts.problem_type,
        facts.target_column,
        facts.feature_count,
        facts.dataset_rows,
        performance,
    )
}

pub fn fallback_insights(facts: &ModelFacts) -> ProjectInsights {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
    ProjectInsights {
        insights: vec![
            format!(
                "Model trained on {} samples with {:.1}% data completeness",
                facts.dataset_rows,
                facts.completeness * 100.0
            ),
            format!(
                "Using {} features for {} with {}",
                facts.feature_count, facts.problem_type, facts.algorithm
            ),
        ],
        recommendations: strings(&[
            "Validate model performance on new data",
            "Monitor prediction accuracy over time",
            "Consider feature engineering for improvement",
        ]),
        business_applications: strings(&[
            "Automated decision support",
            "Risk assessment and prediction",
            "Process optimization",
        ]),
        next_steps: strings(&[
            "Deploy model for testing",
            "Set up monitoring and alerts",
            "Collect feedback for model improvement",
        ]),
    }
}

fn dataset_prompt(facts: &DatasetFacts) -> String {
    format!(
        "Analyze this dataset and provide a summary:\n\n\
         Dataset Statistics:\n\
         - Rows: {}\n- Columns: {}\n- Missing values: {} ({:.1}% of total)\n\
         - Duplicate rows: {}\n- Data completeness: {:.1}%\n\n\
         Column Types:\n- Numerical columns: {}\n- Categorical columns: {}\n\n\
         Correlations:\n- Total correlations found: {}\n- Strong correlations (>0.7): {}\n\n\
         Please provide a professional summary highlighting the dataset's characteristics, \
         quality, and any notable patterns.",
        facts.rows,
        facts.columns,
        facts.missing_values,
        facts.missing_share(),
        facts.duplicate_rows,
        facts.completeness * 100.0,
        facts.numerical_columns,
        facts.categorical_columns,
        facts.correlations,
        facts.strong_correlations,
    )
}

fn model_prompt(facts: &ModelFacts) -> String {
    format!(
        "Summarize this machine learning model:\n\n\
         Model Details:\n- Algorithm: {}\n- Problem Type: {}\n- Target Variable: {}\n\
         - Features Used: {}\n\n\
         Dataset:\n- Training Data: {} rows\n- Data Quality: {:.1}% complete\n\n\
         Performance:\n{}\n\n\
         Please provide a professional summary explaining what this model does, how well it \
         performs, and what insights it provides for business decision-making.",
        display_algorithm(&facts.algorithm),
        facts.problem_type,
        facts.target_column,
        facts.feature_count,
        facts.dataset_rows,
        facts.completeness * 100.0,
        facts.metrics.as_deref().unwrap_or("Metrics not available"),
    )
}

fn insights_prompt(facts: &ModelFacts) -> String {
    format!(
        "Analyze this ML project and provide insights:\n\n\
         Dataset: {} rows, {:.1}% complete\n\
         Model: {} for {} using {} features\n\
         Performance: {}\n\n\
         Provide:\n1. Key insights about the data and model\n\
         2. Specific recommendations for improvement\n3. Potential business applications\n\
         4. Next steps for deployment\n\n\
         Format as JSON with keys: insights, recommendations, business_applications, next_steps",
        facts.dataset_rows,
        facts.completeness * 100.0,
        facts.algorithm,
        facts.problem_type,
        facts.feature_count,
        facts.metrics.as_deref().unwrap_or("not available"),
    )
}

/// Produces summaries through an optional generator, always falling back
/// to the templates.
#[derive(Clone, Default)]
pub struct Summarizer {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("generator", &self.generator.as_ref().map(|g| g.name().to_string()))
            .finish()
    }
}

impl Summarizer {
    /// Template-only summaries.
    pub fn offline() -> Self {
        Self { generator: None }
    }

    pub fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    fn try_generate(&self, system: &str, prompt: &str, max_tokens: u32) -> Option<String> {
        let generator = self.generator.as_ref()?;
        match generator.generate(system, prompt, max_tokens) {
            Ok(text) => {
                debug!("Summary generated by {}", generator.name());
                Some(text)
            }
            Err(e) => {
                warn!("{} failed, using template summary: {}", generator.name(), e);
                None
            }
        }
    }

    pub fn dataset_summary(&self, profile: &DatasetProfile) -> String {
        let facts = DatasetFacts::from_profile(profile);
        self.try_generate(DATASET_SYSTEM, &dataset_prompt(&facts), 500)
            .unwrap_or_else(|| fallback_dataset_summary(&facts))
    }

    pub fn model_summary(&self, facts: &ModelFacts) -> String {
        self.try_generate(MODEL_SYSTEM, &model_prompt(facts), 300)
            .unwrap_or_else(|| fallback_model_summary(facts))
    }

    /// Generated insights must be JSON with the four expected keys; plain
    /// prose is kept as a single insight.
    pub fn insights(&self, facts: &ModelFacts) -> ProjectInsights {
        let Some(text) = self.try_generate(INSIGHTS_SYSTEM, &insights_prompt(facts), 400) else {
            return fallback_insights(facts);
        };
        serde_json::from_str(&text).unwrap_or_else(|_| ProjectInsights {
            insights: vec![text],
            recommendations: vec!["Review LLM response format".to_string()],
            business_applications: vec!["Consult with domain experts".to_string()],
            next_steps: vec!["Validate model performance".to_string()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Failing;

    impl TextGenerator for Failing {
        fn generate(&self, _: &str, _: &str, _: u32) -> anyhow::Result<String> {
            Err(anyhow!("timeout"))
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    struct Canned(&'static str);

    impl TextGenerator for Canned {
        fn generate(&self, _: &str, _: &str, _: u32) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
        fn name(&self) -> &str {
            "canned"
        }
    }

    fn model_facts() -> ModelFacts {
        ModelFacts {
            algorithm: "random_forest".to_string(),
            problem_type: "classification".to_string(),
            target_column: "churn".to_string(),
            feature_count: 7,
            dataset_rows: 1200,
            completeness: 0.95,
            metrics: Some("Accuracy: 91.0%, F1-Score: 0.905".to_string()),
        }
    }

    #[test]
    fn test_quality_labels() {
        assert_eq!(quality_label(0.95), "high");
        assert_eq!(quality_label(0.9), "moderate");
        assert_eq!(quality_label(0.5), "low");
    }

    #[test]
    fn test_display_algorithm() {
        assert_eq!(display_algorithm("random_forest"), "Random Forest");
        assert_eq!(display_algorithm("xgboost"), "Xgboost");
    }

    #[test]
    fn test_failing_generator_falls_back_to_template() {
        let summarizer = Summarizer::with_generator(Arc::new(Failing));
        let facts = model_facts();
        assert_eq!(summarizer.model_summary(&facts), fallback_model_summary(&facts));
        assert_eq!(summarizer.insights(&facts), fallback_insights(&facts));
    }

    #[test]
    fn test_generated_text_is_used() {
        let summarizer = Summarizer::with_generator(Arc::new(Canned("Great model.")));
        assert_eq!(summarizer.model_summary(&model_facts()), "Great model.");
    }

    #[test]
    fn test_prose_insights_are_wrapped() {
        let summarizer = Summarizer::with_generator(Arc::new(Canned("Looks fine.")));
        let insights = summarizer.insights(&model_facts());
        assert_eq!(insights.insights, vec!["Looks fine."]);
        assert_eq!(insights.next_steps.len(), 1);
    }

    #[test]
    fn test_model_template_mentions_metrics() {
        let text = fallback_model_summary(&model_facts());
        assert!(text.starts_with("This Random Forest model was trained for classification"));
        assert!(text.contains("Accuracy: 91.0%"));
    }
}
