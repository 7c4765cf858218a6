use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use uuid::Uuid;

use super::ObjectStore;
use crate::error::{SimError, SimResult};

/// A local directory laid out as `<root>/<category>/<day>.csv`.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl ObjectStore for FsStore {
    fn list(&self, prefix: &str) -> SimResult<Vec<String>> {
        // "inscription/2024-" lists directory "inscription", files starting "2024-".
        let (dir, file_prefix) = match prefix.rfind('/') {
            Some(i) => (&prefix[..=i], &prefix[i + 1..]),
            None => ("", prefix),
        };
        let entries = match fs::read_dir(self.root.join(dir)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            // Dot-files are in-flight temporaries.
            if file_name.starts_with('.') || !file_name.starts_with(file_prefix) {
                continue;
            }
            names.push(format!("{dir}{file_name}"));
        }
        names.sort();
        Ok(names)
    }

    fn get(&self, name: &str) -> SimResult<String> {
        Ok(fs::read_to_string(self.path_of(name))?)
    }

    fn exists(&self, name: &str) -> SimResult<bool> {
        Ok(self.path_of(name).is_file())
    }

    fn put(&self, name: &str, body: &str, overwrite: bool) -> SimResult<()> {
        let dest = self.path_of(name);
        let parent = dest.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&parent)?;

        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(body.as_bytes())?;
            file.sync_all()?;
        }

        let published = if overwrite {
            fs::rename(&tmp, &dest)
        } else {
            // hard_link refuses to replace an existing file.
            fs::hard_link(&tmp, &dest).and_then(|()| fs::remove_file(&tmp))
        };

        match published {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                if e.kind() == ErrorKind::AlreadyExists {
                    Err(SimError::WriteConflict {
                        name: name.to_string(),
                    })
                } else {
                    Err(e.into())
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("fs:{}", self.root.display())
    }
}
