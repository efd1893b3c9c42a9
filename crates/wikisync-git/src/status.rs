use serde::{Deserialize, Serialize};

/// One path reported by `git status --porcelain=v1 -z`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Index status code (first column)
    pub index: char,
    /// Working tree status code (second column)
    pub worktree: char,
    pub path: String,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.index == '?' && self.worktree == '?'
    }

    pub fn is_deleted(&self) -> bool {
        self.index == 'D' || self.worktree == 'D'
    }

    pub fn is_renamed(&self) -> bool {
        self.index == 'R' || self.index == 'C'
    }
}

/// Status of the git working directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitStatus {
    pub entries: Vec<StatusEntry>,
}

impl GitStatus {
    /// Parse NUL-separated porcelain v1 output.
    ///
    /// Renames and copies carry the original path as an extra field, which
    /// is skipped so each entry reports the destination path.
    pub fn parse_porcelain(output: &str) -> Self {
        let mut entries = Vec::new();
        let mut fields = output.split('\0').filter(|f| !f.is_empty());

        while let Some(field) = fields.next() {
            let mut chars = field.chars();
            let (Some(index), Some(worktree), Some(' ')) = (chars.next(), chars.next(), chars.next())
            else {
                continue;
            };

            let entry = StatusEntry {
                index,
                worktree,
                path: chars.as_str().to_string(),
            };
            if entry.is_renamed() {
                fields.next();
            }
            entries.push(entry);
        }

        Self { entries }
    }

    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.entries.len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }
}
