use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Why a file was not uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Rejected by the inclusion filter.
    Filter,
    /// Unchanged since its last successful upload.
    Metadata,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filter => "file-filter",
            Self::Metadata => "local-metadata",
        }
    }
}

/// Category of a per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transport failed; metadata was left untouched.
    Upload,
    /// The metadata database could not be opened, read or written.
    Storage,
    /// The file could not be stat'ed.
    Stat,
    /// The filename cannot be used as a metadata key.
    UnsupportedName,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload_error",
            Self::Storage => "storage_error",
            Self::Stat => "stat_error",
            Self::UnsupportedName => "unsupported_name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Everything recorded about one file during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOutcome {
    pub included: bool,
    pub excluded: Option<ExclusionReason>,
    pub error: Option<FileError>,
    /// Set when the file no longer matched its captured fingerprint after upload.
    pub changed_during_upload: bool,
}

/// Counters and per-file log for one backup run. Never persisted.
#[derive(Debug, Default, Clone)]
pub struct RunStatistics {
    pub included_count: usize,
    pub excluded_count: usize,
    pub error_count: usize,
    outcomes: BTreeMap<(PathBuf, String), FileOutcome>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_included(&mut self, directory: &Path, filename: &str) {
        self.entry(directory, filename).included = true;
        self.included_count += 1;
    }

    pub fn add_excluded(&mut self, directory: &Path, filename: &str, reason: ExclusionReason) {
        self.entry(directory, filename).excluded = Some(reason);
        self.excluded_count += 1;
    }

    pub fn add_error(
        &mut self,
        directory: &Path,
        filename: &str,
        kind: ErrorKind,
        message: impl Into<String>,
    ) {
        self.entry(directory, filename).error = Some(FileError {
            kind,
            message: message.into(),
        });
        self.error_count += 1;
    }

    pub fn mark_changed_during_upload(&mut self, directory: &Path, filename: &str) {
        self.entry(directory, filename).changed_during_upload = true;
    }

    pub fn outcome(&self, directory: &Path, filename: &str) -> Option<&FileOutcome> {
        self.outcomes
            .get(&(directory.to_path_buf(), filename.to_string()))
    }

    /// Iterate over every file seen during the run, ordered by directory then filename.
    pub fn outcomes(&self) -> impl Iterator<Item = (&Path, &str, &FileOutcome)> {
        self.outcomes
            .iter()
            .map(|((dir, name), outcome)| (dir.as_path(), name.as_str(), outcome))
    }

    /// Split the log into included and excluded `(directory, filename)` pairs.
    pub fn processed(&self) -> (Vec<(PathBuf, String)>, Vec<(PathBuf, String)>) {
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        for (dir, name, outcome) in self.outcomes() {
            let pair = (dir.to_path_buf(), name.to_string());
            if outcome.included {
                included.push(pair);
            } else if outcome.excluded.is_some() {
                excluded.push(pair);
            }
        }
        (included, excluded)
    }

    pub fn errored(&self) -> Vec<(PathBuf, String, FileError)> {
        self.outcomes()
            .filter_map(|(dir, name, outcome)| {
                outcome
                    .error
                    .clone()
                    .map(|error| (dir.to_path_buf(), name.to_string(), error))
            })
            .collect()
    }

    pub fn changed_during_upload(&self) -> Vec<(PathBuf, String)> {
        self.outcomes()
            .filter(|(_, _, outcome)| outcome.changed_during_upload)
            .map(|(dir, name, _)| (dir.to_path_buf(), name.to_string()))
            .collect()
    }

    /// Merge another run's results, e.g. from a background worker.
    pub fn merge(&mut self, other: RunStatistics) {
        self.included_count += other.included_count;
        self.excluded_count += other.excluded_count;
        self.error_count += other.error_count;
        self.outcomes.extend(other.outcomes);
    }

    /// Text report of the run: included, excluded, errored and drifted files.
    pub fn render_summary(&self) -> String {
        let (included, excluded) = self.processed();
        let mut lines = vec![format!("{} included file(s):", included.len())];
        lines.extend(
            included
                .iter()
                .map(|(dir, name)| format!(" + {}", dir.join(name).display())),
        );
        lines.push(format!("{} excluded file(s):", excluded.len()));
        lines.extend(
            excluded
                .iter()
                .map(|(dir, name)| format!(" - {}", dir.join(name).display())),
        );
        let errored = self.errored();
        if !errored.is_empty() {
            lines.push(format!("{} file(s) with errors:", errored.len()));
            lines.extend(errored.iter().map(|(dir, name, error)| {
                format!(
                    " ! {} [{}] {}",
                    dir.join(name).display(),
                    error.kind.as_str(),
                    error.message.lines().next().unwrap_or_default()
                )
            }));
        }
        let changed = self.changed_during_upload();
        if !changed.is_empty() {
            lines.push(format!("{} file(s) changed while uploading:", changed.len()));
            lines.extend(
                changed
                    .iter()
                    .map(|(dir, name)| format!(" ~ {}", dir.join(name).display())),
            );
        }
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    fn entry(&mut self, directory: &Path, filename: &str) -> &mut FileOutcome {
        self.outcomes
            .entry((directory.to_path_buf(), filename.to_string()))
            .or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_follow_outcomes() {
        let dir = Path::new("/data");
        let mut stats = RunStatistics::new();
        stats.add_included(dir, "a.txt");
        stats.add_excluded(dir, ".hidden", ExclusionReason::Filter);
        stats.add_excluded(dir, "c.txt", ExclusionReason::Metadata);
        stats.add_included(dir, "b.txt");
        stats.add_error(dir, "b.txt", ErrorKind::Upload, "boom");
        stats.mark_changed_during_upload(dir, "a.txt");

        assert_eq!(stats.included_count, 2);
        assert_eq!(stats.excluded_count, 2);
        assert_eq!(stats.error_count, 1);
        let b = stats.outcome(dir, "b.txt").unwrap();
        assert!(b.included);
        assert_eq!(b.error.as_ref().unwrap().kind, ErrorKind::Upload);
        assert!(stats.outcome(dir, "a.txt").unwrap().changed_during_upload);
        assert_eq!(
            stats.outcome(dir, "c.txt").unwrap().excluded,
            Some(ExclusionReason::Metadata)
        );
    }

    #[test]
    fn processed_splits_sorted_lists() {
        let dir = Path::new("/data");
        let mut stats = RunStatistics::new();
        stats.add_included(dir, "b.txt");
        stats.add_included(dir, "a.txt");
        stats.add_excluded(dir, "c.txt", ExclusionReason::Metadata);
        let (included, excluded) = stats.processed();
        assert_eq!(
            included,
            vec![
                (PathBuf::from("/data"), "a.txt".to_string()),
                (PathBuf::from("/data"), "b.txt".to_string()),
            ]
        );
        assert_eq!(excluded, vec![(PathBuf::from("/data"), "c.txt".to_string())]);
    }

    #[test]
    fn summary_lists_every_section() {
        let dir = Path::new("/data");
        let mut stats = RunStatistics::new();
        stats.add_included(dir, "a.txt");
        stats.add_excluded(dir, "c.txt", ExclusionReason::Metadata);
        stats.add_included(dir, "b.txt");
        stats.add_error(dir, "b.txt", ErrorKind::Upload, "network down\ncaused by: dns");
        stats.mark_changed_during_upload(dir, "a.txt");

        let summary = stats.render_summary();
        assert!(summary.contains("2 included file(s):"));
        assert!(summary.contains(" + /data/a.txt"));
        assert!(summary.contains("1 excluded file(s):"));
        assert!(summary.contains(" - /data/c.txt"));
        assert!(summary.contains(" ! /data/b.txt [upload_error] network down\n"));
        assert!(summary.contains(" ~ /data/a.txt"));
    }

    #[test]
    fn merge_adds_counters() {
        let mut first = RunStatistics::new();
        first.add_included(Path::new("/one"), "a.txt");
        let mut second = RunStatistics::new();
        second.add_excluded(Path::new("/two"), "b.txt", ExclusionReason::Filter);
        first.merge(second);
        assert_eq!(first.included_count, 1);
        assert_eq!(first.excluded_count, 1);
        assert_eq!(first.outcomes().count(), 2);
    }
}
