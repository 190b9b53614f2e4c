//! Prompt templates, keyed by name.
//!
//! Every template shares one layout: an intro, ruled sections (topic,
//! reference posts, brand guidelines, context, requirements), then a closing
//! label the model continues from.

use brandforge_config::FormattingRules;
use brandforge_core::error::{Error, Result};
use std::fmt;

const RULE_WIDTH: usize = 70;

/// Which formatting requirements a template is held to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFamily {
    LongPost,
    BlogPost,
    Post,
    Newsletter,
}

impl ContentFamily {
    /// Family of a template key or content type, matched by name fragment.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.to_ascii_uppercase();
        if key.contains("LONG_POST") {
            Some(Self::LongPost)
        } else if key.contains("BLOG_POST") {
            Some(Self::BlogPost)
        } else if key.contains("NEWSLETTER") {
            Some(Self::Newsletter)
        } else if key.contains("POST") {
            Some(Self::Post)
        } else {
            None
        }
    }

    pub fn requirements<'a>(&self, rules: &'a FormattingRules) -> &'a [String] {
        match self {
            Self::LongPost => &rules.long_post_requirements,
            Self::BlogPost => &rules.blog_post_requirements,
            Self::Post => &rules.post_requirements,
            Self::Newsletter => &rules.newsletter_requirements,
        }
    }
}

/// Requirements for `key`, empty when no family matches.
pub fn requirements_for<'a>(key: &str, rules: &'a FormattingRules) -> &'a [String] {
    ContentFamily::from_key(key)
        .map(|family| family.requirements(rules))
        .unwrap_or(&[])
}

/// How a template treats reference posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePosts {
    /// No section.
    None,
    /// Section rendered when the brand has examples.
    Optional,
    /// Rendering fails without examples.
    Required,
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars<'a> {
    pub topic: &'a str,
    pub brand_name: &'a str,
    pub brand_guidelines: &'a str,
    pub knowledge_context: &'a str,
    pub search_context: &'a str,
    pub examples: &'a [String],
    pub requirements: &'a [String],
}

#[derive(Debug)]
pub struct PromptTemplate {
    pub key: &'static str,
    /// First line; `{brand_name}` is substituted.
    intro: &'static str,
    /// Lines under the intro.
    directions: &'static [&'static str],
    references: ReferencePosts,
    /// Repeat the directions after the requirements.
    repeat_directions: bool,
    /// Line between the final rule and the label.
    outro: Option<&'static str>,
    label: &'static str,
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key)
    }
}

const LINKEDIN_DIRECTIONS: &[&str] = &[
    "- Don't make the post a list of bullet points, add brand personality to it and make it flow.",
    "- Ensure you follow ALL brand guidelines and style below.",
];

pub static TEMPLATES: [PromptTemplate; 8] = [
    PromptTemplate {
        key: "LINKEDIN_POST_ZERO_SHOT",
        intro: "Generate a LinkedIn post about the following topic for {brand_name}.",
        directions: LINKEDIN_DIRECTIONS,
        references: ReferencePosts::None,
        repeat_directions: false,
        outro: None,
        label: "Post:",
    },
    PromptTemplate {
        key: "LINKEDIN_POST_FEW_SHOT",
        intro: "Generate a LinkedIn post about the following topic for {brand_name}.",
        directions: &[],
        references: ReferencePosts::Required,
        repeat_directions: false,
        outro: None,
        label: "Post:",
    },
    PromptTemplate {
        key: "LINKEDIN_LONG_POST_ZERO_SHOT",
        intro: "Generate a long-form LinkedIn post about the following topic for {brand_name}.",
        directions: LINKEDIN_DIRECTIONS,
        references: ReferencePosts::None,
        repeat_directions: false,
        outro: None,
        label: "Post:",
    },
    PromptTemplate {
        key: "LINKEDIN_LONG_POST_FEW_SHOT",
        intro: "Generate a long-form LinkedIn post about the following topic for {brand_name}.",
        directions: LINKEDIN_DIRECTIONS,
        references: ReferencePosts::Required,
        repeat_directions: true,
        outro: None,
        label: "Post:",
    },
    PromptTemplate {
        key: "BLOG_POST",
        intro: "Generate a blog post about the following topic for {brand_name}.",
        directions: &[
            "- Follow ALL brand guidelines below.",
            "- Output in Markdown format with proper heading hierarchy.",
        ],
        references: ReferencePosts::Optional,
        repeat_directions: false,
        outro: None,
        label: "Article:",
    },
    PromptTemplate {
        key: "NEWSLETTER",
        intro: "Generate a Newsletter issue about the following topic for {brand_name}.",
        directions: &["", "This will be sent to subscribers and published on LinkedIn profile."],
        references: ReferencePosts::None,
        repeat_directions: false,
        outro: Some("Generate a newsletter issue following ALL brand guidelines above."),
        label: "Newsletter:",
    },
    PromptTemplate {
        key: "FACEBOOK_POST_ZERO_SHOT",
        intro: "Generate a Facebook post about the following topic for {brand_name}.",
        directions: &[],
        references: ReferencePosts::None,
        repeat_directions: false,
        outro: None,
        label: "Post:",
    },
    PromptTemplate {
        key: "FACEBOOK_POST_FEW_SHOT",
        intro: "Generate a Facebook post about the following topic for {brand_name}.",
        directions: &[],
        references: ReferencePosts::Required,
        repeat_directions: false,
        outro: None,
        label: "Post:",
    },
];

/// Look up a template by key (case-insensitive).
pub fn template(key: &str) -> Result<&'static PromptTemplate> {
    TEMPLATES
        .iter()
        .find(|t| t.key.eq_ignore_ascii_case(key.trim()))
        .ok_or_else(|| {
            Error::configuration(format!(
                "Unknown template '{key}'. Available: {}",
                template_keys().join(", ")
            ))
        })
}

pub fn template_keys() -> Vec<&'static str> {
    TEMPLATES.iter().map(|t| t.key).collect()
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn push_section(out: &mut String, title: &str, body: &str) {
    let rule = rule();
    out.push_str(&format!("{rule}\n{title}:\n{rule}\n{body}\n\n"));
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn reference_posts(examples: &[String]) -> String {
    examples
        .iter()
        .enumerate()
        .map(|(i, example)| format!("Example {}:\n{}", i + 1, example.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl PromptTemplate {
    pub fn family(&self) -> Option<ContentFamily> {
        ContentFamily::from_key(self.key)
    }

    pub fn references(&self) -> ReferencePosts {
        self.references
    }

    pub fn requires_examples(&self) -> bool {
        self.references == ReferencePosts::Required
    }

    pub fn render(&self, vars: &TemplateVars<'_>) -> Result<String> {
        if self.requires_examples() && vars.examples.is_empty() {
            return Err(Error::configuration(format!(
                "Template {} needs reference posts, but the brand defines no examples",
                self.key
            )));
        }

        let mut out = self.intro.replace("{brand_name}", vars.brand_name);
        for line in self.directions {
            out.push('\n');
            out.push_str(line);
        }
        out.push_str("\n\n");

        push_section(&mut out, "TOPIC", vars.topic);
        let with_references = match self.references {
            ReferencePosts::None => false,
            ReferencePosts::Optional => !vars.examples.is_empty(),
            ReferencePosts::Required => true,
        };
        if with_references {
            push_section(&mut out, "REFERENCE POSTS", &reference_posts(vars.examples));
        }
        push_section(&mut out, "BRAND GUIDELINES", vars.brand_guidelines);
        push_section(
            &mut out,
            "CONTEXT",
            &format!("{}\n{}", vars.knowledge_context, vars.search_context),
        );
        push_section(&mut out, "REQUIREMENTS", &bullet_list(vars.requirements));

        out.push_str(&rule());
        out.push('\n');
        if self.repeat_directions {
            for line in self.directions {
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push('\n');
        if let Some(outro) = self.outro {
            out.push_str(outro);
            out.push_str("\n\n");
        }
        out.push_str(self.label);
        Ok(out)
    }
}
