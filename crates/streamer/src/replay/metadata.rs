use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::filename::{validate_session_file, FileKind, SessionFileName};
use crate::error::{ReplayError, ReplayResult};

/// The JSON metadata recorded next to one stream's CSV. Read once.
#[derive(Debug, Clone)]
pub struct MetadataSource {
    file: PathBuf,
    name: SessionFileName,
    metadata: Map<String, Value>,
}

impl MetadataSource {
    pub fn new(path: impl AsRef<Path>, filename: &str, stream_type: &str) -> ReplayResult<Self> {
        let (file, name) = validate_session_file(path.as_ref(), filename, stream_type, FileKind::Json)?;
        let value: Value = serde_json::from_reader(BufReader::new(File::open(&file)?))?;
        let metadata = match value {
            Value::Object(map) if !map.is_empty() => map,
            _ => return Err(ReplayError::EmptyData(file)),
        };
        Ok(Self { file, name, metadata })
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    pub fn stream_type(&self) -> &str {
        &self.name.stream
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACC_META: &str = "190101-120000_sessionA_ACC1.json";

    fn metadata_with(contents: &str) -> ReplayResult<MetadataSource> {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ACC_META), contents).unwrap();
        MetadataSource::new(dir.path(), ACC_META, "ACC")
    }

    #[test]
    fn test_reads_object() {
        let meta = metadata_with(r#"{ "nominal_srate": 52, "units": "g" }"#).unwrap();
        assert_eq!(meta.stream_type(), "ACC");
        assert_eq!(meta.get("units"), Some(&Value::from("g")));
        assert_eq!(meta.metadata().len(), 2);
    }

    #[test]
    fn test_empty_or_non_object_rejected() {
        assert!(matches!(metadata_with("{}"), Err(ReplayError::EmptyData(_))));
        assert!(matches!(metadata_with("[1, 2]"), Err(ReplayError::EmptyData(_))));
        assert!(matches!(metadata_with("not json"), Err(ReplayError::Json(_))));
    }

    #[test]
    fn test_csv_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = MetadataSource::new(dir.path(), "190101-120000_sessionA_ACC1.csv", "ACC").unwrap_err();
        assert!(matches!(err, ReplayError::WrongFileType { expected: "json", .. }));
    }
}
