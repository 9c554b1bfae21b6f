//! Discovery of recorded sessions on disk.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::file_source::FileReplaySource;
use super::filename::{FileKind, SessionFileName, SessionKey};
use super::metadata::MetadataSource;
use super::prompt::{choose_session, SessionPrompt};
use crate::error::{ReplayError, ReplayResult};

/// CSV and JSON files a complete session holds, one of each per stream.
pub const SESSION_STREAM_COUNT: usize = 4;

/// Every file found for one (date, time, session) fingerprint.
#[derive(Debug, Clone)]
pub struct SessionGroup {
    pub key: SessionKey,
    /// Containing directory and parsed name of each file.
    pub files: Vec<(PathBuf, SessionFileName)>,
}

impl SessionGroup {
    /// Stream types present, sorted and deduplicated.
    pub fn streams(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|(_, name)| name.stream.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// `YYYY-MM-DD HH:MM:SS <session> [ACC, EEG, ...]`
    pub fn label(&self) -> String {
        format!("{} [{}]", self.key.label(), self.streams().join(", "))
    }

    fn count(&self, kind: FileKind) -> usize {
        self.files.iter().filter(|(_, name)| name.kind == kind).count()
    }
}

/// The loaded files of one chosen session.
#[derive(Debug, Clone)]
pub struct SessionFiles {
    pub label: String,
    pub replay: BTreeMap<String, FileReplaySource>,
    pub metadata: BTreeMap<String, MetadataSource>,
}

/// Groups the session files found under a directory tree.
#[derive(Debug)]
pub struct StreamCollector {
    root: PathBuf,
    groups: Vec<SessionGroup>,
}

impl StreamCollector {
    /// Walk `root` recursively and group every session file by fingerprint.
    pub fn scan(root: impl AsRef<Path>) -> ReplayResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ReplayError::InvalidPath(root.to_path_buf()));
        }

        let mut grouped: BTreeMap<SessionKey, Vec<(PathBuf, SessionFileName)>> = BTreeMap::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type()?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Some(name) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(SessionFileName::parse)
                else {
                    continue;
                };
                debug!("Found {} in {}", name.filename, dir.display());
                grouped.entry(name.key.clone()).or_default().push((dir.clone(), name));
            }
        }

        let groups = grouped
            .into_iter()
            .map(|(key, mut files)| {
                files.sort_by(|a, b| a.1.filename.cmp(&b.1.filename));
                SessionGroup { key, files }
            })
            .collect::<Vec<_>>();
        info!("Found {} recorded session(s) under {}", groups.len(), root.display());

        Ok(Self {
            root: root.to_path_buf(),
            groups,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sessions ordered by date, time and name.
    pub fn groups(&self) -> &[SessionGroup] {
        &self.groups
    }

    pub fn labels(&self) -> Vec<String> {
        self.groups.iter().map(SessionGroup::label).collect()
    }

    /// Load the group at `index`, which must hold exactly one CSV and one
    /// JSON file for each of its streams.
    pub fn select(&self, index: usize) -> ReplayResult<SessionFiles> {
        let group = self.groups.get(index).ok_or(ReplayError::InvalidSelection {
            index,
            available: self.groups.len(),
        })?;

        let csv = group.count(FileKind::Csv);
        let json = group.count(FileKind::Json);
        if csv != SESSION_STREAM_COUNT || json != SESSION_STREAM_COUNT {
            return Err(ReplayError::InsufficientFiles {
                csv,
                json,
                required: SESSION_STREAM_COUNT,
            });
        }

        let mut replay = BTreeMap::new();
        let mut metadata = BTreeMap::new();
        for (dir, name) in &group.files {
            let duplicate = match name.kind {
                FileKind::Csv => replay
                    .insert(
                        name.stream.clone(),
                        FileReplaySource::new(dir, &name.filename, &name.stream)?,
                    )
                    .is_some(),
                FileKind::Json => metadata
                    .insert(
                        name.stream.clone(),
                        MetadataSource::new(dir, &name.filename, &name.stream)?,
                    )
                    .is_some(),
            };
            if duplicate {
                return Err(ReplayError::DuplicateStream(name.stream.clone()));
            }
        }

        let label = group.label();
        info!("Selected session {}", label);
        Ok(SessionFiles {
            label,
            replay,
            metadata,
        })
    }

    /// Pick a session, asking `prompt` only when there is more than one.
    pub fn collect(&self, prompt: &mut dyn SessionPrompt, attempts: u32) -> ReplayResult<SessionFiles> {
        let index = match self.groups.len() {
            0 => return Err(ReplayError::NoSessions(self.root.clone())),
            1 => 0,
            _ => choose_session(prompt, &self.labels(), attempts)?,
        };
        self.select(index)
    }
}
