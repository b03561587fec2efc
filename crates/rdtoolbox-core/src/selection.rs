//! File-selection policies applied to a torrent awaiting selection.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::model::{FileSelection, TorrentFile};

/// How files are picked once a torrent's file list is known.
#[derive(Debug, Clone, Default)]
pub enum SelectionPolicy {
    /// Select every file.
    #[default]
    All,
    /// Select only the largest file (lowest id on ties).
    Largest,
    /// Select files whose path or file name matches any pattern.
    Glob {
        /// Source patterns, kept for display.
        patterns: Vec<String>,
        /// Compiled matcher.
        set: GlobSet,
    },
}

impl SelectionPolicy {
    /// Compile a glob policy.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn glob<I, S>(patterns: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            builder.add(Glob::new(pattern)?);
        }
        let set = builder.build()?;
        Ok(Self::Glob { patterns, set })
    }

    /// Short label for logs and summaries.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Largest => "largest".to_string(),
            Self::Glob { patterns, .. } => format!("glob({})", patterns.join(", ")),
        }
    }

    /// Resolve the policy against a file list.
    #[must_use]
    pub fn resolve(&self, files: &[TorrentFile]) -> FileSelection {
        match self {
            Self::All => FileSelection::All,
            Self::Largest => {
                let largest = files
                    .iter()
                    .max_by(|a, b| a.byte_size.cmp(&b.byte_size).then(b.id.cmp(&a.id)));
                FileSelection::Ids(largest.map(|file| file.id).into_iter().collect())
            }
            Self::Glob { set, .. } => FileSelection::Ids(
                files
                    .iter()
                    .filter(|file| matches_path(set, &file.path))
                    .map(|file| file.id)
                    .collect(),
            ),
        }
    }
}

fn matches_path(set: &GlobSet, path: &str) -> bool {
    let trimmed = path.trim_start_matches('/');
    let file_name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    set.is_match(trimmed) || set.is_match(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: u64, path: &str, byte_size: u64) -> TorrentFile {
        TorrentFile {
            id,
            path: path.to_string(),
            byte_size,
            selected: false,
        }
    }

    fn sample() -> Vec<TorrentFile> {
        vec![
            file(1, "/Show/episode1.mkv", 700),
            file(2, "/Show/sample.mkv", 20),
            file(3, "/Show/readme.nfo", 1),
            file(4, "/Show/episode2.mkv", 700),
        ]
    }

    #[test]
    fn all_selects_everything() {
        assert_eq!(SelectionPolicy::All.resolve(&sample()), FileSelection::All);
    }

    #[test]
    fn largest_prefers_lowest_id_on_ties() {
        assert_eq!(
            SelectionPolicy::Largest.resolve(&sample()),
            FileSelection::Ids(vec![1])
        );
        assert!(SelectionPolicy::Largest.resolve(&[]).is_empty());
    }

    #[test]
    fn glob_matches_paths_and_file_names() {
        let policy = SelectionPolicy::glob(["episode*.mkv"]).expect("valid glob");
        assert_eq!(policy.resolve(&sample()), FileSelection::Ids(vec![1, 4]));

        let policy = SelectionPolicy::glob(["Show/*.nfo"]).expect("valid glob");
        assert_eq!(policy.resolve(&sample()), FileSelection::Ids(vec![3]));
    }

    #[test]
    fn glob_without_matches_is_empty() {
        let policy = SelectionPolicy::glob(["*.iso"]).expect("valid glob");
        assert!(policy.resolve(&sample()).is_empty());
        assert_eq!(policy.describe(), "glob(*.iso)");
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(SelectionPolicy::glob(["[unclosed"]).is_err());
    }
}
