//! `brandforge templates`: list the prompt templates.

use brandforge_agent::generation::{ReferencePosts, TEMPLATES};

pub fn run() {
    println!("{:<32} {:<12} Reference posts", "Template", "Family");
    for template in &TEMPLATES {
        let family = template
            .family()
            .map_or_else(|| "-".to_string(), |f| format!("{f:?}"));
        let references = match template.references() {
            ReferencePosts::None => "none",
            ReferencePosts::Optional => "when the brand has examples",
            ReferencePosts::Required => "required",
        };
        println!("{:<32} {:<12} {references}", template.key, family);
    }
}
