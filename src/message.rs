//! Bot message rendering.
//!
//! The configured template is rendered against the branch and the matched
//! environments. An empty template is always an error, so a misconfigured bot
//! never posts a blank comment.

use serde::Serialize;

use crate::template::{Template, TemplateError};

/// Everything a message template can refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BotMessageData {
    pub template: String,
    pub branch: String,
    pub auto_release_environments: Vec<String>,
}

/// Parses a template for use as a bot message.
pub fn compile(template: &str) -> Result<Template, TemplateError> {
    if template.is_empty() {
        return Err(TemplateError::Empty);
    }
    Template::parse(template)
}

/// Checks a template at configuration time, before any webhook arrives.
pub fn validate(template: &str) -> Result<(), TemplateError> {
    compile(template).map(|_| ())
}

/// Renders `data.template` against `data`.
pub fn render(data: &BotMessageData) -> Result<String, TemplateError> {
    compile(&data.template)?.render(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(template: &str, branch: &str, envs: &[&str]) -> BotMessageData {
        BotMessageData {
            template: template.to_string(),
            branch: branch.to_string(),
            auto_release_environments: envs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn empty_template_is_rejected() {
        assert_eq!(render(&data("", "master", &["dev"])), Err(TemplateError::Empty));
        assert_eq!(validate(""), Err(TemplateError::Empty));
    }

    #[test]
    fn renders_the_documented_example() {
        let msg = render(&data(
            "'{{.Branch}}' will auto-release to: {{range .AutoReleaseEnvironments}}\n {{.}}{{end}}",
            "master",
            &["dev"],
        ))
        .unwrap();
        assert_eq!(msg, "'master' will auto-release to: \n dev");
    }

    #[test]
    fn no_environments_renders_header_only() {
        let msg = render(&data(
            "'{{.Branch}}' will auto-release to: {{range .AutoReleaseEnvironments}}\n {{.}}{{end}}",
            "feature",
            &[],
        ))
        .unwrap();
        assert_eq!(msg, "'feature' will auto-release to: ");
    }

    #[test]
    fn unbalanced_block_fails_without_output() {
        let result = render(&data(
            "{{range .AutoReleaseEnvironments}}\n {{.}}",
            "master",
            &["dev"],
        ));
        assert!(matches!(result, Err(TemplateError::Parse { .. })));
        assert!(validate("{{range .AutoReleaseEnvironments}}").is_err());
    }

    #[test]
    fn undefined_field_fails_at_render() {
        let result = render(&data("{{.Environment}}", "master", &[]));
        assert!(matches!(result, Err(TemplateError::Exec { .. })));
    }

    #[test]
    fn string_helpers_are_available() {
        let msg = render(&data(
            r#"{{if contains .Branch "release/"}}{{replaceAll .Branch "release/" "v"}}{{end}}"#,
            "release/1.4",
            &[],
        ))
        .unwrap();
        assert_eq!(msg, "v1.4");
    }

    #[test]
    fn template_field_is_exposed() {
        let msg = render(&data("{{len .Template}}", "master", &[])).unwrap();
        assert_eq!(msg, "17");
    }

    #[test]
    fn root_variable_and_printf_templates_validate_and_render() {
        let template = r#"{{range $i, $env := .AutoReleaseEnvironments}}{{printf "%d. %s <- %s" $i $env $.Branch}}
{{end}}"#;
        assert_eq!(validate(template), Ok(()));
        assert_eq!(
            validate("{{range .AutoReleaseEnvironments}}{{$.Branch}}{{end}}"),
            Ok(())
        );
        let msg = render(&data(template, "master", &["dev", "prod"])).unwrap();
        assert_eq!(msg, "0. dev <- master\n1. prod <- master\n");
    }
}
