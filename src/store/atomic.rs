//! Atomic JSON file writes: temp file + `sync_all` + `rename`, built on
//! `tokio::fs` and generic over any `Serialize`/`DeserializeOwned` type so
//! every artifact kind shares one read/write path instead of per-record-kind
//! copies.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;

pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let dir = path.parent().ok_or_else(|| Error::integrity(path, "path has no parent directory"))?;
    tokio::fs::create_dir_all(dir).await.map_err(|e| Error::io(dir, e))?;

    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::ValidationError(format!("failed to serialize {}: {e}", path.display())))?;

    let temp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("json")
    ));

    tokio::fs::write(&temp_path, &json).await.map_err(|e| Error::io(&temp_path, e))?;
    tokio::fs::rename(&temp_path, path).await.map_err(|e| Error::io(path, e))?;
    Ok(())
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, Error> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| Error::integrity(path, format!("corrupt JSON: {e}")))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[tokio::test]
    async fn round_trips_through_a_temp_file_rename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sample.json");
        write_json(&path, &Sample { value: 7 }).await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        let read: Option<Sample> = read_json(&path).await.unwrap();
        assert_eq!(read, Some(Sample { value: 7 }));
    }

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let read: Option<Sample> = read_json(&path).await.unwrap();
        assert_eq!(read, None);
    }
}
