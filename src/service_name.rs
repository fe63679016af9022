//! Repository name to service name resolution.
//!
//! Repositories are usually named after the service they deploy, decorated with
//! an organisation prefix and/or a `-service` suffix. An explicit override table
//! covers repositories that don't follow the convention.

use std::collections::HashMap;

use crate::types::ServiceName;

/// Suffix stripped from repository names.
const SERVICE_SUFFIX: &str = "-service";

/// Organisation prefix stripped from repository names.
const ORG_PREFIX: &str = "lunar-way-";

/// Resolves a repository name to the release-manager service name.
///
/// An entry in `overrides` wins and is returned verbatim. Otherwise one trailing
/// `-service` is stripped, then one leading `lunar-way-`; either strip may be a
/// no-op.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use auto_release_bot::service_name::resolve;
///
/// let overrides = HashMap::from([("legacy-api".to_string(), "api".to_string())]);
///
/// assert_eq!(resolve("lunar-way-billing-service", &overrides).as_str(), "billing");
/// assert_eq!(resolve("legacy-api", &overrides).as_str(), "api");
/// ```
pub fn resolve(repo_name: &str, overrides: &HashMap<String, String>) -> ServiceName {
    if let Some(service) = overrides.get(repo_name) {
        return ServiceName::new(service.clone());
    }

    let trimmed = repo_name.strip_suffix(SERVICE_SUFFIX).unwrap_or(repo_name);
    let trimmed = trimmed.strip_prefix(ORG_PREFIX).unwrap_or(trimmed);
    ServiceName::new(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn no_overrides() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn strips_suffix() {
        assert_eq!(resolve("foo-service", &no_overrides()).as_str(), "foo");
    }

    #[test]
    fn strips_prefix() {
        assert_eq!(resolve("lunar-way-foo", &no_overrides()).as_str(), "foo");
    }

    #[test]
    fn strips_both() {
        assert_eq!(
            resolve("lunar-way-foo-service", &no_overrides()).as_str(),
            "foo"
        );
    }

    #[test]
    fn plain_name_unchanged() {
        assert_eq!(resolve("foo", &no_overrides()).as_str(), "foo");
    }

    #[test]
    fn suffix_is_stripped_before_prefix() {
        // Once "-service" is gone, the remaining "lunar-way" has no trailing
        // dash, so the prefix no longer matches.
        assert_eq!(
            resolve("lunar-way-service", &no_overrides()).as_str(),
            "lunar-way"
        );
    }

    #[test]
    fn strips_only_one_occurrence() {
        assert_eq!(
            resolve("foo-service-service", &no_overrides()).as_str(),
            "foo-service"
        );
        assert_eq!(
            resolve("lunar-way-lunar-way-foo", &no_overrides()).as_str(),
            "lunar-way-foo"
        );
    }

    #[test]
    fn override_is_returned_verbatim() {
        let overrides = HashMap::from([(
            "lunar-way-foo-service".to_string(),
            "lunar-way-bar-service".to_string(),
        )]);
        assert_eq!(
            resolve("lunar-way-foo-service", &overrides).as_str(),
            "lunar-way-bar-service"
        );
    }

    fn arb_base() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,15}"
    }

    proptest! {
        #[test]
        fn overrides_always_win(repo in "[a-z][a-z0-9-]{0,30}", mapped in "[a-zA-Z0-9_-]{0,30}") {
            let overrides = HashMap::from([(repo.clone(), mapped.clone())]);
            prop_assert_eq!(resolve(&repo, &overrides).0, mapped);
        }

        #[test]
        fn conventional_names_resolve_to_base(
            base in arb_base(),
            prefixed: bool,
            suffixed: bool,
        ) {
            let mut repo = base.clone();
            if prefixed {
                repo = format!("{ORG_PREFIX}{repo}");
            }
            if suffixed {
                repo = format!("{repo}{SERVICE_SUFFIX}");
            }
            prop_assert_eq!(resolve(&repo, &no_overrides()).0, base);
        }

        #[test]
        fn idempotent_for_conventional_names(
            base in arb_base(),
            prefixed: bool,
            suffixed: bool,
        ) {
            let mut repo = base;
            if prefixed {
                repo = format!("{ORG_PREFIX}{repo}");
            }
            if suffixed {
                repo = format!("{repo}{SERVICE_SUFFIX}");
            }
            let once = resolve(&repo, &no_overrides());
            let twice = resolve(once.as_str(), &no_overrides());
            prop_assert_eq!(once, twice);
        }
    }
}
