use std::collections::BTreeSet;

use tracing::debug;

use crate::metadata::is_store_file;

/// Extension policy applied after the built-in exclusions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExtensionRule {
    /// Every extension is accepted.
    #[default]
    All,
    /// Only these (lowercased) extensions are accepted.
    Include(BTreeSet<String>),
    /// These (lowercased) extensions are rejected.
    Exclude(BTreeSet<String>),
}

/// Decides from the filename alone whether a file is a backup candidate.
///
/// Rules, first match wins:
/// 1. the store's own database and reserved-prefix files are rejected;
/// 2. hidden files (leading `.`) are rejected;
/// 3. the extension rule decides, comparing the text after the last `.`
///    case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InclusionFilter {
    rule: ExtensionRule,
}

impl InclusionFilter {
    /// Accept everything that is not hidden or store bookkeeping.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn include_only<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rule: ExtensionRule::Include(normalize_extensions(extensions)),
        }
    }

    pub fn exclude<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rule: ExtensionRule::Exclude(normalize_extensions(extensions)),
        }
    }

    pub fn rule(&self) -> &ExtensionRule {
        &self.rule
    }

    pub fn should_include(&self, filename: &str) -> bool {
        if is_store_file(filename) {
            debug!(filename, "Excluding metadata store file");
            return false;
        }
        if filename.starts_with('.') {
            debug!(filename, "Excluding hidden file");
            return false;
        }
        let extension = extension_of(filename).map(str::to_ascii_lowercase);
        let included = match &self.rule {
            ExtensionRule::All => true,
            ExtensionRule::Include(list) => extension.is_some_and(|ext| list.contains(&ext)),
            ExtensionRule::Exclude(list) => !extension.is_some_and(|ext| list.contains(&ext)),
        };
        debug!(filename, included, "Applied extension rule");
        included
    }
}

/// Normalize user-supplied extensions: trim, drop a leading `.`, lowercase, skip empties.
pub fn normalize_extensions<I, S>(extensions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn extension_of(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext)
}
