//! Brand configuration: one YAML file per brand.
//!
//! A brand file carries the per-stage model settings, retrieval limits and
//! the voice and formatting rules every stage reads. Files are checked for
//! all required sections before typed deserialization, so a broken brand is
//! reported with every missing path at once.

use crate::ConfigError;
use brandforge_core::search::{SearchDepth, SearchType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A brand's full configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandConfig {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    pub positioning: String,

    /// Brand-level fallback for the run's quality threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_threshold: Option<f64>,

    #[serde(default)]
    pub context_specific_points: Vec<String>,

    #[serde(default)]
    pub content_generation_rules: Vec<String>,

    #[serde(default)]
    pub factual_accuracy: Vec<String>,

    pub voice: VoiceConfig,

    pub formatting_rules: FormattingRules,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_guidelines: Option<CtaGuidelines>,

    pub models: BrandModels,

    pub retrieval: RetrievalConfig,

    /// Reference posts for few-shot templates
    #[serde(default)]
    pub examples: Vec<String>,
}

fn default_version() -> String {
    "1.0".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub tone: String,
    pub style_guidelines: Vec<String>,
    pub banned_terms: Vec<String>,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormattingRules {
    pub post_requirements: Vec<String>,
    pub long_post_requirements: Vec<String>,
    pub blog_post_requirements: Vec<String>,
    pub newsletter_requirements: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CtaGuidelines {
    #[serde(default)]
    pub principle: String,
    #[serde(default)]
    pub options: Vec<CtaOption>,
    #[serde(default)]
    pub instruction: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CtaOption {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub when: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub example: String,
}

/// Model selection per stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandModels {
    pub content_planning: StageModelConfig,
    pub content_generation: StageModelConfig,
    pub content_optimization: StageModelConfig,
    pub content_evaluation: EvaluatorModelConfig,
    pub search_optimization: ModelSettings,
    pub vectorization: VectorizationConfig,
}

/// Sampling settings without a base instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Sampling settings plus the stage's base instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageModelConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_message: String,
}

impl StageModelConfig {
    pub fn settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// How drafts are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPattern {
    /// Critique over the existing conversation, no rubric injected.
    Reflection,
    /// Critique against a rubric built from this brand.
    EvaluatorOptimizer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorModelConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_message: String,
    pub pattern: EvaluationPattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizationConfig {
    pub model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunk_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub rag: RagSettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSettings {
    pub max_results: usize,
    pub max_distance: f32,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "brand_content".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    pub max_results: usize,
    pub search_depth: SearchDepth,
    pub search_type: SearchType,
}

// ── Validation ────────────────────────────────────────────────────────────

const REQUIRED_SECTIONS: [&str; 6] = [
    "name",
    "positioning",
    "models",
    "voice",
    "formatting_rules",
    "retrieval",
];

const STAGE_FIELDS: [&str; 4] = ["model", "temperature", "max_tokens", "system_message"];

const REQUIRED_FIELDS: &[(&str, &[&str])] = &[
    ("models.content_planning", &STAGE_FIELDS),
    ("models.content_generation", &STAGE_FIELDS),
    ("models.content_optimization", &STAGE_FIELDS),
    (
        "models.content_evaluation",
        &["model", "temperature", "max_tokens", "system_message", "pattern"],
    ),
    ("models.search_optimization", &["model", "temperature", "max_tokens"]),
    (
        "models.vectorization",
        &["model", "chunk_size", "chunk_overlap", "chunk_threshold"],
    ),
    ("retrieval.rag", &["max_results", "max_distance"]),
    ("retrieval.search", &["max_results", "search_depth", "search_type"]),
    ("voice", &["tone", "style_guidelines", "banned_terms", "values"]),
    (
        "formatting_rules",
        &[
            "post_requirements",
            "long_post_requirements",
            "blog_post_requirements",
            "newsletter_requirements",
        ],
    ),
];

fn lookup<'a>(doc: &'a serde_yaml::Value, path: &str) -> Option<&'a serde_yaml::Value> {
    path.split('.')
        .try_fold(doc, |node, key| node.get(key))
        .filter(|v| !v.is_null())
}

/// Check a raw brand document for every required section and field.
pub fn validate_brand_document(doc: &serde_yaml::Value) -> Result<(), ConfigError> {
    let mut missing: Vec<String> = REQUIRED_SECTIONS
        .iter()
        .filter(|s| lookup(doc, s).is_none())
        .map(|s| s.to_string())
        .collect();

    for (section, fields) in REQUIRED_FIELDS {
        // A missing parent section is already reported once.
        let parent = section.split('.').next().unwrap_or(section);
        if lookup(doc, parent).is_none() {
            continue;
        }
        if lookup(doc, section).is_none() {
            missing.push(section.to_string());
            continue;
        }
        for field in fields.iter() {
            let path = format!("{section}.{field}");
            if lookup(doc, &path).is_none() {
                missing.push(path);
            }
        }
    }

    if !missing.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "brand configuration is missing required fields: {}",
            missing.join(", ")
        )));
    }

    if lookup(doc, "voice.banned_terms").is_some_and(|v| !v.is_sequence()) {
        return Err(ConfigError::ValidationError(
            "voice.banned_terms must be a list".into(),
        ));
    }

    if let Some(pattern) = lookup(doc, "models.content_evaluation.pattern") {
        let valid = matches!(pattern.as_str(), Some("reflection" | "evaluator_optimizer"));
        if !valid {
            return Err(ConfigError::ValidationError(format!(
                "models.content_evaluation.pattern must be 'reflection' or 'evaluator_optimizer', got {pattern:?}"
            )));
        }
    }

    Ok(())
}

impl BrandConfig {
    /// Parse and validate a brand document.
    pub fn from_yaml_str(content: &str, source: &Path) -> Result<Self, ConfigError> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })?;
        validate_brand_document(&doc)?;

        let brand: Self = serde_yaml::from_value(doc).map_err(|e| ConfigError::ParseError {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        brand.validate()?;
        Ok(brand)
    }

    /// Load and validate a brand file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&content, path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.quality_threshold {
            if !(0.0..=10.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "quality_threshold must be between 0 and 10, got {t}"
                )));
            }
        }
        if self.retrieval.rag.max_distance < 0.0 {
            return Err(ConfigError::ValidationError(
                "retrieval.rag.max_distance must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// The brand key used for metadata filters and prompt headers.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

fn is_brand_file(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        )
}

/// Sorted brand names (file stems) available in `dir`.
pub fn list_available_brands(dir: &Path) -> Result<Vec<String>, ConfigError> {
    if !dir.is_dir() {
        tracing::info!("Brand directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::ReadError {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_brand_file(p))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

fn brand_path(dir: &Path, name: &str) -> Option<PathBuf> {
    ["yaml", "yml"]
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|p| p.is_file())
}

/// Load brand `name` from `dir`.
pub fn load_brand(dir: &Path, name: &str) -> Result<BrandConfig, ConfigError> {
    let key = name.trim().to_lowercase();
    let path = brand_path(dir, &key).ok_or_else(|| ConfigError::BrandNotFound {
        name: name.to_string(),
        dir: dir.to_path_buf(),
    })?;
    tracing::debug!(brand = %key, path = %path.display(), "Loading brand configuration");
    BrandConfig::load_from(&path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_BRAND: &str = r#"
name: Acme
positioning: Security that gets out of the way
quality_threshold: 7.5
context_specific_points:
  - Acme Gateway ships with zero trust defaults
content_generation_rules:
  - Lead with a concrete problem
factual_accuracy:
  - Never invent statistics
voice:
  tone: Confident, plain-spoken
  style_guidelines:
    - Short paragraphs
  banned_terms:
    - synergy
    - game-changer
  values:
    - clarity
formatting_rules:
  post_requirements:
    - Under 200 words
  long_post_requirements:
    - 400 to 600 words
  blog_post_requirements:
    - Use H2 headings
  newsletter_requirements:
    - Open with a greeting
cta_guidelines:
  principle: Invite, never push
  options:
    - type: question
      when: Opinion pieces
      format: One open question
      example: How does your team handle this?
  instruction: One CTA at most
models:
  content_planning:
    model: openai/gpt-4o-mini
    temperature: 0.2
    max_tokens: 400
    system_message: You plan content research.
  content_generation:
    model: openai/gpt-4o
    temperature: 0.7
    max_tokens: 1200
    system_message: You write for Acme.
  content_optimization:
    model: openai/gpt-4o
    temperature: 0.5
    max_tokens: 1200
    system_message: You revise drafts for Acme using critique feedback.
  content_evaluation:
    model: openai/gpt-4o-mini
    temperature: 0.3
    max_tokens: 1200
    system_message: "Score strictly. Banned terms:\n{banned_terms}"
    pattern: evaluator_optimizer
  search_optimization:
    model: openai/gpt-4o-mini
    temperature: 0.0
    max_tokens: 120
  vectorization:
    model: text-embedding-3-small
    chunk_size: 800
    chunk_overlap: 100
    chunk_threshold: 0.5
retrieval:
  rag:
    max_results: 3
    max_distance: 0.5
  search:
    max_results: 5
    search_depth: advanced
    search_type: technical
examples:
  - Zero trust is a habit, not a product.
"#;

    pub(crate) fn sample_brand() -> BrandConfig {
        BrandConfig::from_yaml_str(SAMPLE_BRAND, Path::new("acme.yaml")).unwrap()
    }

    #[test]
    fn parses_sample_brand() {
        let brand = sample_brand();
        assert_eq!(brand.name, "Acme");
        assert_eq!(brand.key(), "acme");
        assert_eq!(brand.version, "1.0");
        assert_eq!(brand.quality_threshold, Some(7.5));
        assert_eq!(
            brand.models.content_evaluation.pattern,
            EvaluationPattern::EvaluatorOptimizer
        );
        assert_eq!(brand.retrieval.search.search_type, SearchType::Technical);
        assert_eq!(brand.retrieval.rag.collection, "brand_content");
        assert_eq!(brand.cta_guidelines.unwrap().options[0].kind, "question");
    }

    #[test]
    fn reports_every_missing_field() {
        let doc = SAMPLE_BRAND
            .replace("  values:\n    - clarity\n", "")
            .replace("    chunk_threshold: 0.5\n", "");
        let err = BrandConfig::from_yaml_str(&doc, Path::new("acme.yaml")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("voice.values"), "{msg}");
        assert!(msg.contains("models.vectorization.chunk_threshold"), "{msg}");
    }

    #[test]
    fn missing_section_reported_once() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str("name: X\npositioning: Y\nvoice: {}\n").unwrap();
        let err = validate_brand_document(&doc).unwrap_err().to_string();
        assert!(err.contains("models"));
        assert!(err.contains("retrieval"));
        assert!(err.contains("voice.tone"));
        assert!(!err.contains("models.content_planning"));
    }

    #[test]
    fn rejects_unknown_pattern() {
        let doc = SAMPLE_BRAND.replace("pattern: evaluator_optimizer", "pattern: vibes");
        let err = BrandConfig::from_yaml_str(&doc, Path::new("acme.yaml")).unwrap_err();
        assert!(err.to_string().contains("pattern"));
    }

    #[test]
    fn rejects_scalar_banned_terms() {
        let doc = SAMPLE_BRAND.replace(
            "  banned_terms:\n    - synergy\n    - game-changer\n",
            "  banned_terms: synergy\n",
        );
        let err = BrandConfig::from_yaml_str(&doc, Path::new("acme.yaml")).unwrap_err();
        assert!(err.to_string().contains("banned_terms"));
    }

    #[test]
    fn list_and_load_brands_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zeta.yaml"), SAMPLE_BRAND).unwrap();
        std::fs::write(dir.path().join("acme.yml"), SAMPLE_BRAND).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let names = list_available_brands(dir.path()).unwrap();
        assert_eq!(names, vec!["acme", "zeta"]);

        let brand = load_brand(dir.path(), "ACME").unwrap();
        assert_eq!(brand.name, "Acme");

        let err = load_brand(dir.path(), "globex").unwrap_err();
        assert!(matches!(err, ConfigError::BrandNotFound { .. }));
    }

    #[test]
    fn missing_brand_dir_lists_nothing() {
        let names = list_available_brands(Path::new("/nonexistent/brands")).unwrap();
        assert!(names.is_empty());
    }
}
