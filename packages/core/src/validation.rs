//! Boundary validation for caller-supplied input.
//!
//! The engine never calls these itself; they run before `submit`/`create`.

use url::Url;

use crate::error::WatchError;
use crate::target::{MAX_CHECK_INTERVAL_MINUTES, MIN_CHECK_INTERVAL_MINUTES, NewTarget};

/// Accept absolute http(s) URLs with a host.
pub fn validate_url(raw: &str) -> Result<Url, WatchError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| WatchError::Validation(format!("invalid URL '{raw}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(WatchError::Validation(format!(
            "unsupported URL scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(WatchError::Validation(format!("URL '{raw}' has no host")));
    }

    Ok(url)
}

pub fn validate_check_interval(minutes: u32) -> Result<u32, WatchError> {
    if !(MIN_CHECK_INTERVAL_MINUTES..=MAX_CHECK_INTERVAL_MINUTES).contains(&minutes) {
        return Err(WatchError::Validation(format!(
            "check interval must be between {MIN_CHECK_INTERVAL_MINUTES} and \
             {MAX_CHECK_INTERVAL_MINUTES} minutes, got {minutes}"
        )));
    }
    Ok(minutes)
}

/// Trim selectors and reject an empty or blank list.
pub fn validate_selectors(selectors: &[String]) -> Result<Vec<String>, WatchError> {
    if selectors.is_empty() {
        return Err(WatchError::Validation("at least one selector is required".into()));
    }

    let mut cleaned = Vec::with_capacity(selectors.len());
    for selector in selectors {
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Err(WatchError::Validation("selectors must not be blank".into()));
        }
        if !cleaned.iter().any(|s: &String| s == trimmed) {
            cleaned.push(trimmed.to_string());
        }
    }
    Ok(cleaned)
}

/// Validate and sanitize a target registration.
pub fn validate_new_target(mut target: NewTarget) -> Result<NewTarget, WatchError> {
    target.url = validate_url(&target.url)?.to_string();
    target.check_interval_minutes = validate_check_interval(target.check_interval_minutes)?;
    target.selectors = validate_selectors(&target.selectors)?;

    target.name = target.name.trim().to_string();
    if target.name.is_empty() {
        return Err(WatchError::Validation("target name is required".into()));
    }
    if let Some(webhook) = &target.notifications.webhook {
        validate_url(webhook)?;
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls() {
        assert!(validate_url("https://example.com/page").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn interval_bounds() {
        assert!(validate_check_interval(4).is_err());
        assert!(validate_check_interval(5).is_ok());
        assert!(validate_check_interval(1440).is_ok());
        assert!(validate_check_interval(1441).is_err());
    }

    #[test]
    fn selectors_are_trimmed_and_deduplicated() -> Result<(), WatchError> {
        let cleaned = validate_selectors(&[" h1 ".into(), "h1".into(), ".price".into()])?;
        assert_eq!(cleaned, vec!["h1".to_string(), ".price".to_string()]);
        assert!(validate_selectors(&[]).is_err());
        assert!(validate_selectors(&["  ".into()]).is_err());
        Ok(())
    }

    #[test]
    fn new_target_is_sanitized() -> Result<(), WatchError> {
        let target = NewTarget::new(" https://example.com ", " Shop ", "me", vec![" h1".into()])
            .with_interval(30);
        let target = validate_new_target(target)?;
        assert_eq!(target.url, "https://example.com/");
        assert_eq!(target.name, "Shop");
        assert_eq!(target.selectors, vec!["h1".to_string()]);

        let bad = NewTarget::new("https://example.com", "x", "me", vec!["h1".into()]).with_interval(1);
        assert!(matches!(validate_new_target(bad), Err(WatchError::Validation(_))));
        Ok(())
    }
}
