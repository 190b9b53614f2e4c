//! Prompt assembly for the generation stage.
//!
//! Pure string building; no model calls happen here.

use super::templates::{TemplateVars, requirements_for, template};
use crate::evaluation::Critique;
use brandforge_config::BrandConfig;
use brandforge_core::error::Result;
use brandforge_core::tool::Capability;
use std::collections::BTreeMap;

/// Appended to the topic in chain-of-thought mode.
pub const COT_SCAFFOLD: &str = "\nBefore generating the final content, think through:\n\
1. What specific problem, failure, or surprising result will hook readers immediately?\n\
2. How can I create tension or curiosity in the opening (show what didn't work, build contrast)?\n\
3. What concrete numbers, metrics, or evidence prove the main point?\n\
4. How does this insight apply beyond the immediate topic (what's the transferable pattern)?\n\n\
After thinking, generate the final content. Do not include this reasoning in your output.";

/// Appended to the user prompt in chain-of-thought mode.
pub const COT_INSTRUCTION: &str = "\nBreak down the task into smaller steps before answering. \
Provide your reasoning process clearly, then give the final content.";

const BANNED_TERMS_PLACEHOLDER: &str = "{banned_terms}";

/// Expand `{banned_terms}` in a system message into a `- term` list.
pub fn expand_banned_terms(message: &str, banned_terms: &[String]) -> String {
    if !message.contains(BANNED_TERMS_PLACEHOLDER) {
        return message.to_string();
    }
    let list = banned_terms
        .iter()
        .map(|term| format!("- {term}"))
        .collect::<Vec<_>>()
        .join("\n   ");
    message.replace(BANNED_TERMS_PLACEHOLDER, &list)
}

fn rule() -> String {
    format!("|{}", "-".repeat(70))
}

fn heading(lines: &mut Vec<String>, title: &str) {
    lines.push(format!("\n{}", rule()));
    lines.push(format!("  {title}"));
    lines.push(rule());
}

/// Render the brand's guidelines as the prompt's BRAND GUIDELINES block.
pub fn format_brand_guidelines(brand: &BrandConfig) -> String {
    let mut lines = vec![
        rule(),
        format!("  BRAND: {}", brand.name),
        format!("  POSITIONING: {}", brand.positioning.trim()),
        rule(),
    ];

    heading(&mut lines, "CONTEXT SPECIFIC POINTS");
    lines.push("ONLY mention if they are the PRIMARY subject, never as mandatory mentions.".into());
    lines.push("Do not force into posts where they are tangential.\n".into());
    lines.extend(brand.context_specific_points.iter().map(|p| format!("  • {p}")));

    heading(&mut lines, "CONTENT GENERATION RULES");
    lines.extend(brand.content_generation_rules.iter().map(|r| format!("  • {r}")));

    heading(
        &mut lines,
        "FACTUAL ACCURACY - CRITICAL - OVERRIDE ALL OTHER INSTRUCTIONS",
    );
    lines.extend(brand.factual_accuracy.iter().map(|f| format!("  • {f}")));

    let voice = &brand.voice;
    heading(&mut lines, "VOICE & STYLE");
    if !voice.tone.is_empty() {
        lines.push(format!("Tone: {}\n", voice.tone));
    }
    if !voice.style_guidelines.is_empty() {
        lines.push("Style Guidelines:".into());
        lines.extend(voice.style_guidelines.iter().map(|s| format!("  • {s}")));
    }
    if !voice.banned_terms.is_empty() {
        lines.push(format!("\nAVOID These Terms: {}", voice.banned_terms.join(", ")));
    }

    heading(&mut lines, "CLOSING GUIDELINES");
    if let Some(cta) = &brand.cta_guidelines {
        if !cta.principle.is_empty() {
            lines.push(format!("{}\n", cta.principle));
        }
        if !cta.options.is_empty() {
            lines.push("Options:".into());
            for option in &cta.options {
                lines.push(format!("  • Type: {}", or_na(&option.kind)));
                lines.push(format!("    When: {}", or_na(&option.when)));
                lines.push(format!("    Format: {}", or_na(&option.format)));
                lines.push(format!("    Example: {}\n", or_na(&option.example)));
            }
        }
        if !cta.instruction.is_empty() {
            lines.push(format!("Key Rule: {}", cta.instruction));
        }
    }

    lines.join("\n")
}

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}

/// Inputs of one generation prompt.
#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    pub topic: &'a str,
    pub brand: &'a BrandConfig,
    pub tool_contexts: &'a BTreeMap<Capability, String>,
    pub template_key: &'a str,
    pub use_cot: bool,
}

/// Render the user prompt for a draft.
pub fn build_generation_prompt(input: &PromptInput<'_>) -> Result<String> {
    let template = template(input.template_key)?;
    let brand_name = input.brand.key();
    let guidelines = format_brand_guidelines(input.brand);

    let topic = if input.use_cot {
        format!("{}\n{COT_SCAFFOLD}", input.topic)
    } else {
        input.topic.to_string()
    };
    let context = |capability: Capability| {
        input
            .tool_contexts
            .get(&capability)
            .map(String::as_str)
            .unwrap_or_default()
    };

    let mut prompt = template.render(&TemplateVars {
        topic: &topic,
        brand_name: &brand_name,
        brand_guidelines: &guidelines,
        knowledge_context: context(Capability::KnowledgeSearch),
        search_context: context(Capability::WebSearch),
        examples: &input.brand.examples,
        requirements: requirements_for(template.key, &input.brand.formatting_rules),
    })?;
    if input.use_cot {
        prompt.push_str(COT_INSTRUCTION);
    }
    Ok(prompt)
}

/// Corrective feedback folded into a revision turn.
pub fn feedback_message(critique: &Critique) -> String {
    let mut message = format!("FEEDBACK:\n- {}\n", critique.reasoning.trim());
    if !critique.violations.is_empty() {
        message.push_str("Brand violations:\n");
        for violation in &critique.violations {
            message.push_str(&format!("  • {violation}\n"));
        }
    }
    message.push_str("Improve the content by addressing the feedback.\n");
    message.push_str("REMINDER: Do not change the content topic, only improve it.");
    message
}
