use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;
use crate::Result;

/// MySQL user names are limited to 32 characters.
pub const MAX_DB_NAME_LEN: usize = 32;

/// GitLab shortens `CI_COMMIT_REF_SLUG` to 63 bytes.
pub const MAX_REF_SLUG_LEN: usize = 63;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap());

/// Database (and database user) name for a refslug: every run of
/// non-alphanumeric characters becomes `_`, truncated to 32 characters.
pub fn db_name(refslug: &str) -> String {
    let mut name = NON_ALPHANUMERIC.replace_all(refslug, "_").into_owned();
    // Only ASCII survives the replacement, so byte truncation is safe.
    name.truncate(MAX_DB_NAME_LEN);
    log::debug!("A string of {} becomes {}", refslug, name);
    name
}

/// Branch name to refslug, the way GitLab derives `CI_COMMIT_REF_SLUG`:
/// lowercased, everything except `0-9a-z` replaced with `-`, no leading or
/// trailing `-`, at most 63 bytes.
pub fn ref_slug(branch: &str) -> String {
    let mut out = String::with_capacity(branch.len());
    for ch in branch.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_lowercase() || lower.is_ascii_digit() {
            out.push(lower);
        } else {
            out.push('-');
        }
    }

    out.truncate(MAX_REF_SLUG_LEN);
    out.trim_matches('-').to_string()
}

/// Reject refslugs that would escape or collapse the virtual host root.
pub fn validate_refslug(refslug: &str) -> Result<()> {
    if refslug.trim().is_empty() {
        return Err(Error::validation_missing_argument(vec![
            "refslug".to_string()
        ]));
    }

    if refslug == "." || refslug == ".." {
        return Err(Error::validation_invalid_argument(
            "refslug",
            "refslug cannot be a relative directory",
            Some(refslug.to_string()),
        ));
    }

    if refslug
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || c == '/' || c == '\\')
    {
        return Err(Error::validation_invalid_argument(
            "refslug",
            "refslug contains invalid characters",
            Some(refslug.to_string()),
        ));
    }

    Ok(())
}
