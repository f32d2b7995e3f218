//! Specification markdown: section helpers and the templated fallback document.

use chrono::{DateTime, Local};

use crate::domain::{ComponentKind, Feature, UiComponent, UserScenario};

/// Section headings every specification document carries, in order
pub const SPEC_SECTIONS: [&str; 6] = [
    "1. System Overview",
    "2. Main Features",
    "3. User Scenarios",
    "4. UI/UX Requirements",
    "5. Technical Requirements",
    "6. Quality Requirements",
];

/// Content between `## Heading` and the next `##` or end of document.
pub fn extract_section(content: &str, heading: &str) -> Option<String> {
    let target = format!("## {}", heading);
    let start = content.lines().position(|line| line.trim_end() == target)?;
    let body: Vec<&str> = content
        .lines()
        .skip(start + 1)
        .take_while(|line| !line.starts_with("## "))
        .collect();
    Some(body.join("\n").trim().to_string())
}

/// All `##` headings in document order
pub fn list_sections(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.strip_prefix("## "))
        .map(|h| h.trim().to_string())
        .collect()
}

/// A generated document is usable when it has a title and at least one section
pub fn looks_like_spec(content: &str) -> bool {
    content.lines().any(|l| l.starts_with("# ")) && !list_sections(content).is_empty()
}

/// Features inferred from page structure alone
pub fn heuristic_features(components: &[UiComponent]) -> Vec<Feature> {
    use crate::domain::Priority;

    let mut features = Vec::new();
    let has = |kind| components.iter().any(|c| c.kind == kind);

    if has(ComponentKind::Form) {
        features.push(Feature {
            name: "Form input".to_string(),
            description: "User-submitted data through page forms".to_string(),
            category: "data".to_string(),
            priority: Priority::High,
        });
    }
    if has(ComponentKind::Navigation) || has(ComponentKind::Link) {
        features.push(Feature {
            name: "Navigation".to_string(),
            description: "Moving between pages of the application".to_string(),
            category: "ui".to_string(),
            priority: Priority::Medium,
        });
    }
    if has(ComponentKind::Table) {
        features.push(Feature {
            name: "Tabular data display".to_string(),
            description: "Structured data rendered in tables".to_string(),
            category: "data".to_string(),
            priority: Priority::Medium,
        });
    }
    if features.is_empty() {
        features.push(Feature {
            name: "Basic page".to_string(),
            description: "Basic behavior of the web application".to_string(),
            category: "other".to_string(),
            priority: Priority::High,
        });
    }
    features
}

pub fn default_scenarios() -> Vec<UserScenario> {
    vec![UserScenario {
        scenario: "Basic usage".to_string(),
        steps: vec!["Open the site".to_string(), "Perform a basic operation".to_string()],
        expected_outcome: "The application responds normally".to_string(),
    }]
}

/// Render the templated specification used when no LLM is available
pub fn render_fallback_spec(
    url: &str,
    title: Option<&str>,
    components: &[UiComponent],
    features: &[Feature],
    scenarios: &[UserScenario],
    at: &DateTime<Local>,
) -> String {
    let mut doc = String::from("# Functional Specification\n\n");

    doc.push_str(&format!("## {}\n", SPEC_SECTIONS[0]));
    doc.push_str(&format!("Target URL: {}\n", url));
    if let Some(title) = title {
        doc.push_str(&format!("Page title: {}\n", title));
    }
    doc.push_str(&format!("Extracted at: {}\n\n", at.format("%Y-%m-%d %H:%M:%S")));

    doc.push_str(&format!("## {}\n", SPEC_SECTIONS[1]));
    for f in features {
        doc.push_str(&format!("- {}: {}\n", f.name, f.description));
    }
    doc.push('\n');

    doc.push_str(&format!("## {}\n", SPEC_SECTIONS[2]));
    for s in scenarios {
        doc.push_str(&format!("- {}: {} -> {}\n", s.scenario, s.steps.join(", "), s.expected_outcome));
    }
    doc.push('\n');

    doc.push_str(&format!("## {}\n", SPEC_SECTIONS[3]));
    if components.is_empty() {
        doc.push_str("- Standard web user interface\n");
    }
    for c in components {
        doc.push_str(&format!("- {:?}: {} ({})\n", c.kind, c.label, c.count));
    }
    doc.push('\n');

    doc.push_str(&format!("## {}\n- Web browser support\n\n", SPEC_SECTIONS[4]));
    doc.push_str(&format!(
        "## {}\n- Stable operation\n- Acceptable response time\n",
        SPEC_SECTIONS[5]
    ));
    doc
}
