use crate::config::NamingConfig;
use crate::metadata::SourceFile;
use crate::naming::{candidate_file_name, date_tree_subpath, format_timestamp};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedDestination {
    pub path: PathBuf,
    pub counter: usize,
    pub skipped: bool,
}

#[derive(Debug, Clone)]
pub struct DestinationPlanner {
    output_root: PathBuf,
    naming: NamingConfig,
    committed: HashSet<PathBuf>,
}

impl DestinationPlanner {
    pub fn new(output_root: &Path, naming: NamingConfig) -> Self {
        Self {
            output_root: output_root.to_path_buf(),
            naming,
            committed: HashSet::new(),
        }
    }

    pub fn target_dir(&self, taken_at: &NaiveDateTime) -> PathBuf {
        if self.naming.create_tree {
            self.output_root.join(date_tree_subpath(taken_at))
        } else {
            self.output_root.clone()
        }
    }

    // `taken_at` already carries the offset. Nothing is reserved until commit.
    pub fn plan(&self, file: &SourceFile, taken_at: &NaiveDateTime) -> PlannedDestination {
        let base = self.naming.base_name_for(file);
        let stamp = format_timestamp(taken_at);
        let dir = self.target_dir(taken_at);

        let mut counter = 0usize;
        let mut candidate = dir.join(candidate_file_name(
            &base,
            &stamp,
            counter,
            &self.naming.extension,
        ));
        while !self.is_available(&candidate) {
            counter += 1;
            candidate = dir.join(candidate_file_name(
                &base,
                &stamp,
                counter,
                &self.naming.extension,
            ));
        }

        PlannedDestination {
            path: candidate,
            counter,
            skipped: counter > 0 && self.naming.skip_duplicates,
        }
    }

    pub fn commit(&mut self, path: &Path) {
        self.committed.insert(path.to_path_buf());
    }

    fn is_available(&self, candidate: &Path) -> bool {
        !self.committed.contains(candidate) && !candidate.exists()
    }
}
