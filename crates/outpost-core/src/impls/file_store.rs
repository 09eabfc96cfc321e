//! FileStore - ディレクトリ内の `<key>.json` に保存する DurableStore
//!
//! # 原子的書き込み
//! 1. 同じディレクトリに一時ファイルを `create_new` で作る
//! 2. 書き込み + `sync_all`
//! 3. `rename` で置き換え、親ディレクトリも sync
//!
//! 途中でプロセスが落ちても、前回のスロットか今回のスロットのどちらかが残ります。

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::snapshot::{self, CURRENT_VERSION, Decoded};
use crate::domain::{QueueItem, StoreError};
use crate::ports::DurableStore;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// スロットのファイルパス。key はファイル名として安全な文字だけ許可
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::Unavailable(format!(
                "storage key {key:?} is not a valid file name"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl DurableStore for FileStore {
    fn load(&self, key: &str) -> Result<Decoded, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => snapshot::decode(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Decoded {
                version: CURRENT_VERSION,
                items: Vec::new(),
            }),
            // not UTF-8: the bytes are there but unusable
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                Err(StoreError::Corrupt(err.to_string()))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    fn save(&self, key: &str, items: &[QueueItem]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let raw = snapshot::encode(items)?;
        fs::create_dir_all(&self.dir)?;
        atomic_write(&self.dir, &path, &raw)?;
        Ok(())
    }
}

fn atomic_write(dir: &Path, path: &Path, content: &str) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("queue");
    let tmp_path = dir.join(format!(
        ".{}.outpost.tmp.{}",
        file_name,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let write_result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Ok(parent_dir) = fs::File::open(dir) {
            let _ = parent_dir.sync_all();
        }
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    write_result
}
