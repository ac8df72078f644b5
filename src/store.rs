//! Key-file storage. Stores and returns opaque bytes by name; it neither encrypts nor parses.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// KeyStore is the only persistence the Identity Agent needs.
pub trait KeyStore {
    fn save(&self, identifier: &str, bytes: &[u8]) -> io::Result<()>;
    fn load(&self, identifier: &str) -> io::Result<Vec<u8>>;
    /// remove deletes an entry; removing an absent entry is not an error.
    /// Only used to roll back a half-written keypair.
    fn remove(&self, identifier: &str) -> io::Result<()>;
}

/// FileKeyStore keeps one file per identifier inside a directory.
#[derive(Clone, Debug)]
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, identifier: &str) -> io::Result<PathBuf> {
        // identifiers are plain names, never paths
        if identifier.is_empty()
            || identifier.contains(['/', '\\'])
            || identifier == "."
            || identifier == ".."
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "key identifier must be a plain file name",
            ));
        }
        Ok(self.dir.join(identifier))
    }
}

impl KeyStore for FileKeyStore {
    fn save(&self, identifier: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(identifier)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, bytes)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn load(&self, identifier: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.path_for(identifier)?)
    }

    fn remove(&self, identifier: &str) -> io::Result<()> {
        match std::fs::remove_file(self.path_for(identifier)?) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result,
        }
    }
}

/// MemoryKeyStore is a process-local store, handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyStore for MemoryKeyStore {
    fn save(&self, identifier: &str, bytes: &[u8]) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(identifier.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, identifier: &str) -> io::Result<Vec<u8>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(identifier)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such key entry"))
    }

    fn remove(&self, identifier: &str) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(identifier);
        Ok(())
    }
}

/* ------------------------------------------------------------------------- */

// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path().join("keys"));
        store.save("client_private.key", b"blob").unwrap();
        assert_eq!(store.load("client_private.key").unwrap(), b"blob");
        // overwriting is allowed
        store.save("client_private.key", b"newer").unwrap();
        assert_eq!(store.load("client_private.key").unwrap(), b"newer");
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        store.save("id.key", b"blob").unwrap();
        let mode = std::fs::metadata(dir.path().join("id.key")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn file_store_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        for bad in ["", "..", "../escape", "nested/name"] {
            let err = store.save(bad, b"blob").unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn missing_entries_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        assert_eq!(store.load("absent").unwrap_err().kind(), io::ErrorKind::NotFound);
        let memory = MemoryKeyStore::new();
        assert_eq!(memory.load("absent").unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        store.save("id.key", b"blob").unwrap();
        store.remove("id.key").unwrap();
        assert_eq!(store.load("id.key").unwrap_err().kind(), io::ErrorKind::NotFound);
        store.remove("id.key").unwrap();

        let memory = MemoryKeyStore::new();
        memory.save("id.key", b"blob").unwrap();
        memory.remove("id.key").unwrap();
        memory.remove("id.key").unwrap();
        assert!(memory.is_empty());
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryKeyStore::new();
        assert!(store.is_empty());
        store.save("a", b"1").unwrap();
        store.save("b", b"2").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.load("a").unwrap(), b"1");
    }
}
