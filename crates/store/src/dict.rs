//! # Context Dictionary Store
//!
//! Namespaced, first-write-wins key/value files used to deduplicate the
//! heavyweight context events refer to (host/user, repository identity,
//! working directory). Events carry only the short [`Fingerprint`] key.
//!
//! ## File Format
//!
//! `dict/<namespace>.json` is one pretty-printed JSON object mapping
//! fingerprint to payload, keys sorted, newline-terminated. A missing or
//! empty file reads as an empty map.
//!
//! ## Payloads
//!
//! The payload type is fixed per namespace ([`DictValue`]). Object payloads
//! keep fields they do not know about, so data written by a newer tool
//! survives a rewrite by an older one.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::StoreConfig;
use crate::errors::{StoreError, StoreResult};
use crate::fs::replace_file;
use crate::id::Fingerprint;
use crate::json;
use crate::lock::{LockManager, LockTarget};

/// Dictionary namespaces, one file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Env,
    Repos,
    Dirs,
}

impl Namespace {
    pub fn file_stem(&self) -> &'static str {
        match self {
            Namespace::Env => "env",
            Namespace::Repos => "repos",
            Namespace::Dirs => "dirs",
        }
    }
}

/// Host the event was recorded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvInfo {
    pub host: String,
    pub os: String,
    pub arch: String,
    pub user: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnvInfo {
    pub fn new(
        host: impl Into<String>,
        os: impl Into<String>,
        arch: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            os: os.into(),
            arch: arch.into(),
            user: user.into(),
            extra: Map::new(),
        }
    }

    /// Canonical dedup input: host followed by user.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&format!("{}{}", self.host, self.user))
    }
}

/// Repository identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub name: String,
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RepoInfo {
    pub fn new(name: impl Into<String>, root: impl Into<String>, remote: Option<String>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            remote: remote.filter(|remote| !remote.is_empty()),
            extra: Map::new(),
        }
    }

    /// Canonical dedup input: the remote URL when known, else the root path,
    /// so clones of one remote share a key.
    pub fn fingerprint(&self) -> Fingerprint {
        match self.remote.as_deref() {
            Some(remote) if !remote.is_empty() => Fingerprint::of(remote),
            _ => Fingerprint::of(&self.root),
        }
    }
}

/// Payload stored under a fingerprint; the variant decides the namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictValue {
    Env(EnvInfo),
    Repo(RepoInfo),
    Dir(String),
}

impl DictValue {
    pub fn namespace(&self) -> Namespace {
        match self {
            DictValue::Env(_) => Namespace::Env,
            DictValue::Repo(_) => Namespace::Repos,
            DictValue::Dir(_) => Namespace::Dirs,
        }
    }

    /// Key this value is normally stored under.
    pub fn fingerprint(&self) -> Fingerprint {
        match self {
            DictValue::Env(env) => env.fingerprint(),
            DictValue::Repo(repo) => repo.fingerprint(),
            DictValue::Dir(path) => Fingerprint::of(path),
        }
    }

    fn to_json(&self) -> Result<Value, serde_json::Error> {
        match self {
            DictValue::Env(env) => serde_json::to_value(env),
            DictValue::Repo(repo) => serde_json::to_value(repo),
            DictValue::Dir(path) => Ok(Value::String(path.clone())),
        }
    }

    fn from_json(namespace: Namespace, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match namespace {
            Namespace::Env => DictValue::Env(serde_json::from_value(value)?),
            Namespace::Repos => DictValue::Repo(serde_json::from_value(value)?),
            Namespace::Dirs => DictValue::Dir(serde_json::from_value(value)?),
        })
    }
}

/// Decoded contents of one namespace file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    namespace: Namespace,
    entries: BTreeMap<Fingerprint, DictValue>,
}

impl Dictionary {
    pub fn empty(namespace: Namespace) -> Self {
        Self {
            namespace,
            entries: BTreeMap::new(),
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn get(&self, key: &Fingerprint) -> Option<&DictValue> {
        self.entries.get(key)
    }

    pub fn env(&self, key: &Fingerprint) -> Option<&EnvInfo> {
        match self.entries.get(key) {
            Some(DictValue::Env(env)) => Some(env),
            _ => None,
        }
    }

    pub fn repo(&self, key: &Fingerprint) -> Option<&RepoInfo> {
        match self.entries.get(key) {
            Some(DictValue::Repo(repo)) => Some(repo),
            _ => None,
        }
    }

    pub fn dir(&self, key: &Fingerprint) -> Option<&str> {
        match self.entries.get(key) {
            Some(DictValue::Dir(path)) => Some(path.as_str()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type RawDict = BTreeMap<String, Value>;

/// Reads and writes the namespace files under `<root>/dict/`.
#[derive(Debug, Clone)]
pub struct DictStore {
    config: StoreConfig,
    locks: LockManager,
}

impl DictStore {
    pub fn new(config: StoreConfig, locks: LockManager) -> Self {
        Self { config, locks }
    }

    pub fn path(&self, namespace: Namespace) -> PathBuf {
        self.config
            .dict_dir()
            .join(format!("{}.json", namespace.file_stem()))
    }

    /// Inserts `key -> value` into the value's namespace unless `key` is
    /// already present. Returns `true` when the entry was written.
    ///
    /// An existing key is never overwritten, whatever its payload.
    pub fn save_if_absent(&self, key: &Fingerprint, value: &DictValue) -> StoreResult<bool> {
        let namespace = value.namespace();
        let path = self.path(namespace);
        let _lock = self.locks.exclusive(LockTarget::Dict(namespace))?;

        let mut raw = self.read_raw(namespace)?;
        if raw.contains_key(key.as_str()) {
            debug!(namespace = namespace.file_stem(), %key, "dictionary key already present");
            return Ok(false);
        }

        let encoded = value.to_json().map_err(|source| StoreError::Encode {
            what: "dictionary value",
            source,
        })?;
        raw.insert(key.as_str().to_string(), encoded);

        let buffer = json::to_document(&raw, "dictionary file")?;
        replace_file(&path, &buffer)?;

        debug!(namespace = namespace.file_stem(), %key, "dictionary entry added");
        Ok(true)
    }

    /// Decodes the whole namespace under a shared lock.
    pub fn load(&self, namespace: Namespace) -> StoreResult<Dictionary> {
        let _lock = self.locks.shared(LockTarget::Dict(namespace))?;
        let raw = self.read_raw(namespace)?;
        let path = self.path(namespace);

        let mut entries = BTreeMap::new();
        for (key, value) in raw {
            let decoded = DictValue::from_json(namespace, value)
                .map_err(|err| StoreError::decode(path.clone(), None, err))?;
            entries.insert(Fingerprint::from(key), decoded);
        }

        Ok(Dictionary { namespace, entries })
    }

    /// Caller holds the namespace lock.
    fn read_raw(&self, namespace: Namespace) -> StoreResult<RawDict> {
        let path = self.path(namespace);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(RawDict::new()),
            Err(err) => return Err(StoreError::io(Some(path), "read dictionary file", err)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(RawDict::new());
        }

        serde_json::from_slice(&bytes).map_err(|err| StoreError::decode(path, None, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, DictStore) {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path());
        config.prepare().unwrap();
        let locks = LockManager::new(&config);
        (dir, DictStore::new(config, locks))
    }

    #[test]
    fn missing_and_empty_files_load_as_empty() {
        let (_dir, store) = store();
        assert!(store.load(Namespace::Env).unwrap().is_empty());

        std::fs::write(store.path(Namespace::Env), "").unwrap();
        assert!(store.load(Namespace::Env).unwrap().is_empty());
    }

    #[test]
    fn first_write_wins() {
        let (_dir, store) = store();
        let key = Fingerprint::from("aaaa1111");
        let first = DictValue::Dir("/home/me/project".to_string());
        let second = DictValue::Dir("/somewhere/else".to_string());

        assert!(store.save_if_absent(&key, &first).unwrap());
        let before = std::fs::read(store.path(Namespace::Dirs)).unwrap();

        assert!(!store.save_if_absent(&key, &second).unwrap());
        let after = std::fs::read(store.path(Namespace::Dirs)).unwrap();
        assert_eq!(before, after);

        let dirs = store.load(Namespace::Dirs).unwrap();
        assert_eq!(dirs.dir(&key), Some("/home/me/project"));
    }

    #[test]
    fn file_is_pretty_sorted_and_newline_terminated() {
        let (_dir, store) = store();
        store
            .save_if_absent(&"bbbb".into(), &DictValue::Dir("/b".to_string()))
            .unwrap();
        store
            .save_if_absent(&"aaaa".into(), &DictValue::Dir("/a".to_string()))
            .unwrap();

        let text = std::fs::read_to_string(store.path(Namespace::Dirs)).unwrap();
        assert_eq!(text, "{\n  \"aaaa\": \"/a\",\n  \"bbbb\": \"/b\"\n}\n");
    }

    #[test]
    fn typed_payloads_roundtrip_per_namespace() {
        let (_dir, store) = store();
        let env = EnvInfo::new("laptop", "linux", "x86_64", "me");
        let repo = RepoInfo::new(
            "wips",
            "/home/me/wips",
            Some("git@example.com:me/wips.git".to_string()),
        );

        store
            .save_if_absent(&env.fingerprint(), &DictValue::Env(env.clone()))
            .unwrap();
        store
            .save_if_absent(&repo.fingerprint(), &DictValue::Repo(repo.clone()))
            .unwrap();

        let envs = store.load(Namespace::Env).unwrap();
        assert_eq!(envs.env(&env.fingerprint()), Some(&env));
        let repos = store.load(Namespace::Repos).unwrap();
        assert_eq!(repos.repo(&repo.fingerprint()), Some(&repo));
        assert_eq!(
            repo.fingerprint(),
            Fingerprint::of("git@example.com:me/wips.git")
        );
    }

    #[test]
    fn unknown_fields_survive_rewrite() {
        let (_dir, store) = store();
        std::fs::write(
            store.path(Namespace::Repos),
            serde_json::to_string_pretty(&json!({
                "11111111": {"name": "old", "root": "/old", "stars": 3}
            }))
            .unwrap(),
        )
        .unwrap();

        let repo = RepoInfo::new("new", "/new", None);
        store
            .save_if_absent(&repo.fingerprint(), &DictValue::Repo(repo))
            .unwrap();

        let repos = store.load(Namespace::Repos).unwrap();
        let old = repos.repo(&"11111111".into()).unwrap();
        assert_eq!(old.extra.get("stars"), Some(&json!(3)));
        assert_eq!(repos.len(), 2);
    }

    #[test]
    fn corrupt_file_is_a_decode_error_and_left_alone() {
        let (_dir, store) = store();
        let path = store.path(Namespace::Env);
        std::fs::write(&path, "{ not json").unwrap();

        let err = store.load(Namespace::Env).unwrap_err();
        assert_eq!(err.error_code(), "E_DECODE");

        let env = EnvInfo::new("h", "linux", "x86_64", "u");
        let err = store
            .save_if_absent(&env.fingerprint(), &DictValue::Env(env))
            .unwrap_err();
        assert_eq!(err.error_code(), "E_DECODE");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");

        // other namespaces keep working
        store
            .save_if_absent(&"cccc".into(), &DictValue::Dir("/c".to_string()))
            .unwrap();
    }

    #[test]
    fn wrong_payload_shape_fails_load() {
        let (_dir, store) = store();
        std::fs::write(store.path(Namespace::Dirs), r#"{"aaaa": {"not": "a path"}}"#).unwrap();
        let err = store.load(Namespace::Dirs).unwrap_err();
        assert!(matches!(err, StoreError::Decode { line: None, .. }));
    }
}
