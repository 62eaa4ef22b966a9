//! Embedded documentation-bundle templates.
//!
//! Templates are baked into the binary so scaffolding needs no external
//! files. Placeholders use `{Title Case}` markers; unknown markers are
//! left intact so template prose with literal braces survives rendering.

pub const TEMPLATE_SNAPSHOT: &str = include_str!("../../templates/snapshot.md");
pub const TEMPLATE_CONSTRAINTS: &str = include_str!("../../templates/constraints.md");
pub const TEMPLATE_DECISIONS: &str = include_str!("../../templates/decisions.md");
pub const TEMPLATE_DEBT: &str = include_str!("../../templates/debt.md");
pub const TEMPLATE_ADR: &str = include_str!("../../templates/adr.md");

pub fn get_template(name: &str) -> Option<&'static str> {
    match name {
        "snapshot" => Some(TEMPLATE_SNAPSHOT),
        "constraints" => Some(TEMPLATE_CONSTRAINTS),
        "decisions" => Some(TEMPLATE_DECISIONS),
        "debt" => Some(TEMPLATE_DEBT),
        "adr" => Some(TEMPLATE_ADR),
        _ => None,
    }
}

pub fn list_templates() -> Vec<&'static str> {
    vec!["snapshot", "constraints", "decisions", "debt", "adr"]
}

/// Substitute `{Placeholder}` markers; pairs are (marker, value).
pub fn render_template(template: &str, variables: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in variables {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_present() {
        for name in list_templates() {
            assert!(get_template(name).is_some(), "missing template {}", name);
        }
        assert!(get_template("nope").is_none());
    }

    #[test]
    fn test_render_substitutes_known_markers() {
        let out = render_template("# {System Name}\n", &[("System Name", "Audio")]);
        assert_eq!(out, "# Audio\n");
    }

    #[test]
    fn test_render_leaves_unknown_markers() {
        let out = render_template("{System Name} / {Other}", &[("System Name", "Audio")]);
        assert_eq!(out, "Audio / {Other}");
    }
}
