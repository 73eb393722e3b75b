use std::{
    collections::BTreeMap,
    fmt, fs,
    io::{ErrorKind as IoErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use aes_gcm::Aes256Gcm;
use cask_core::{call_site, merge_and_check, propagate, CallSite, Reporter, ResultRecord, StoreError};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use crate::{
    cipher,
    key_provider::KeyMaterial,
    paths::{self, FolderResolver},
};

/// Field name to secret value.
pub type FieldMap = Map<String, Value>;
/// Section name to field map; the whole store.
pub type Sections = BTreeMap<String, FieldMap>;

/// When a mutation is written to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Persist {
    /// Rewrite the encrypted file before returning.
    #[default]
    Immediately,
    /// Only change memory; a later `save` writes the batch.
    Deferred,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Replace an existing section instead of failing.
    pub overwrite: bool,
    pub persist: Persist,
}

/// Named credential sections kept in memory and mirrored to one AES-GCM encrypted file.
///
/// Every operation holds the store lock for its whole duration, including the
/// file rewrite, so concurrent callers in one process are fully serialized.
/// Other processes touching the same file are not coordinated with.
pub struct CredentialStore {
    path: PathBuf,
    key_id: String,
    cipher: Aes256Gcm,
    sections: Mutex<Sections>,
    reporter: Reporter,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .field("key_id", &self.key_id)
            .field("reporter", &self.reporter)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Build a store backed by `path` and load whatever it holds.
    ///
    /// The store is always returned in `contents`; a non-OK status means the
    /// initial load failed and the store starts empty.
    pub fn open(
        path: impl Into<PathBuf>,
        key: &KeyMaterial,
        reporter: Reporter,
    ) -> ResultRecord<CredentialStore> {
        let store = Self {
            path: path.into(),
            key_id: key.id.clone(),
            cipher: cipher::build_cipher(key),
            sections: Mutex::new(Sections::new()),
            reporter,
        };
        debug!(path = ?store.path, key_id = %store.key_id, "opening credential store");

        let mut record = ResultRecord::new();
        propagate(store.load(), &mut record);
        record.contents = Some(store);
        record
    }

    /// Open the store at its home-based default location.
    pub fn open_default(
        resolver: &dyn FolderResolver,
        key: &KeyMaterial,
        reporter: Reporter,
    ) -> ResultRecord<CredentialStore> {
        match paths::default_store_path(resolver) {
            Ok(path) => Self::open(path, key, reporter),
            Err(err) => {
                let mut record = ResultRecord::new();
                record_failure(&reporter, &mut record, err, call_site!("open_default"));
                record
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Create or (with `overwrite`) replace a section.
    #[instrument(skip_all, fields(section = %section, store = %self.reporter.name()))]
    pub fn add(&self, section: &str, field_map: &Value, options: AddOptions) -> ResultRecord {
        let mut record = ResultRecord::new();
        let mut sections = self.lock();

        if sections.contains_key(section) && !options.overwrite {
            self.fail(
                &mut record,
                StoreError::DuplicateSection {
                    section: section.to_string(),
                },
                call_site!("add"),
            );
            return record;
        }

        let replaced = self.replace_section(&mut sections, section, field_map, options.persist);
        merge_and_check(replaced, &mut record, true);
        record
    }

    /// Replace an existing section wholesale. Fields missing from `field_map` are dropped.
    #[instrument(skip_all, fields(section = %section, store = %self.reporter.name()))]
    pub fn modify(&self, section: &str, field_map: &Value, persist: Persist) -> ResultRecord {
        let mut record = ResultRecord::new();
        let mut sections = self.lock();

        if !sections.contains_key(section) {
            self.fail(&mut record, not_found(section), call_site!("modify"));
            return record;
        }

        let replaced = self.replace_section(&mut sections, section, field_map, persist);
        merge_and_check(replaced, &mut record, true);
        record
    }

    #[instrument(skip_all, fields(section = %section, store = %self.reporter.name()))]
    pub fn delete(&self, section: &str, persist: Persist) -> ResultRecord {
        let mut record = ResultRecord::new();
        let mut sections = self.lock();

        let Some(previous) = sections.remove(section) else {
            self.fail(&mut record, not_found(section), call_site!("delete"));
            return record;
        };

        if persist == Persist::Immediately {
            if let Err(err) = self.write_file(&sections) {
                sections.insert(section.to_string(), previous);
                self.fail(&mut record, err, call_site!("delete"));
                return record;
            }
        }
        debug!("section removed");
        record
    }

    /// Copy of a section's fields.
    #[instrument(skip_all, fields(section = %section, store = %self.reporter.name()))]
    pub fn get(&self, section: &str) -> ResultRecord<FieldMap> {
        let mut record = ResultRecord::new();
        let sections = self.lock();

        match sections.get(section) {
            Some(fields) => record.contents = Some(fields.clone()),
            None => self.fail(&mut record, not_found(section), call_site!("get")),
        }
        record
    }

    /// Snapshot of the section names, sorted.
    pub fn list_sections(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn contains(&self, section: &str) -> bool {
        self.lock().contains_key(section)
    }

    /// Rewrite the encrypted file from the current in-memory state.
    #[instrument(skip_all, fields(store = %self.reporter.name()))]
    pub fn save(&self) -> ResultRecord {
        let mut record = ResultRecord::new();
        let sections = self.lock();

        if let Err(err) = self.write_file(&sections) {
            self.fail(&mut record, err, call_site!("save"));
        }
        record
    }

    /// Discard memory and reload from disk. A missing or empty file means no data.
    ///
    /// On failure the store is left empty, never partially populated.
    #[instrument(skip_all, fields(store = %self.reporter.name()))]
    pub fn load(&self) -> ResultRecord {
        let mut record = ResultRecord::new();
        let mut sections = self.lock();
        sections.clear();

        match self.read_file() {
            Ok(Some(loaded)) => {
                debug!(sections = loaded.len(), "credential file loaded");
                *sections = loaded;
            }
            Ok(None) => debug!("no existing credential data"),
            Err(err) => self.fail(&mut record, err, call_site!("load")),
        }
        record
    }

    fn lock(&self) -> MutexGuard<'_, Sections> {
        self.sections.lock().unwrap_or_else(|poisoned| {
            warn!(store = %self.reporter.name(), "recovering credential lock after a panic");
            self.sections.clear_poison();
            poisoned.into_inner()
        })
    }

    /// Install `field_map` as `section`, persisting if asked. Memory is rolled
    /// back when the write fails.
    fn replace_section(
        &self,
        sections: &mut Sections,
        section: &str,
        field_map: &Value,
        persist: Persist,
    ) -> ResultRecord {
        let mut record = ResultRecord::new();
        let mut processed = self.process_fields(field_map);
        let fields = processed.contents.take().unwrap_or_default();
        if !propagate(processed, &mut record) {
            return record;
        }

        let previous = sections.insert(section.to_string(), fields);
        if persist == Persist::Immediately {
            if let Err(err) = self.write_file(sections) {
                match previous {
                    Some(previous) => sections.insert(section.to_string(), previous),
                    None => sections.remove(section),
                };
                self.fail(&mut record, err, call_site!("replace_section"));
            }
        }
        record
    }

    fn process_fields(&self, field_map: &Value) -> ResultRecord<FieldMap> {
        let mut record = ResultRecord::new();
        match field_map {
            Value::Object(fields) => record.contents = Some(fields.clone()),
            Value::Null => record.contents = Some(FieldMap::new()),
            other => self.fail(
                &mut record,
                StoreError::InvalidFieldMap {
                    found: json_type(other).to_string(),
                },
                call_site!("process_fields"),
            ),
        }
        record
    }

    fn read_file(&self) -> Result<Option<Sections>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if bytes.is_empty() {
            return Ok(None);
        }

        let plaintext = cipher::unseal(&self.cipher, &bytes)?;
        let sections =
            serde_json::from_slice(&plaintext).map_err(|e| StoreError::MalformedData {
                reason: e.to_string(),
            })?;
        Ok(Some(sections))
    }

    /// Serialize, seal and atomically replace the backing file.
    fn write_file(&self, sections: &Sections) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(sections).map_err(|e| StoreError::MalformedData {
            reason: e.to_string(),
        })?;
        let sealed = cipher::seal(&self.cipher, &plaintext)?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        paths::create_private_dir(parent, paths::OWNER_ONLY)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(&sealed)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::from(e.error))?;
        paths::sync_dir(parent)?;

        debug!(bytes = sealed.len(), sections = sections.len(), "credential file rewritten");
        Ok(())
    }

    fn fail<T>(&self, record: &mut ResultRecord<T>, err: StoreError, site: CallSite) {
        record_failure(&self.reporter, record, err, site);
    }
}

fn record_failure<T>(reporter: &Reporter, record: &mut ResultRecord<T>, err: StoreError, site: CallSite) {
    let code = err.code();
    reporter.add_error_with(record, err.to_string(), site, 0, code);
}

fn not_found(section: &str) -> StoreError {
    StoreError::SectionNotFound {
        section: section.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use cask_core::{ErrorKind, OK};
    use serde_json::json;

    use super::*;

    // Test fixture only; real stores get their key from a KeyProvider.
    const FIXTURE_KEY: [u8; 32] = *b"cask-test-fixture-key-0123456789";

    fn key() -> KeyMaterial {
        KeyMaterial::new("fixture", FIXTURE_KEY)
    }

    fn open_at(path: &Path) -> CredentialStore {
        let record = CredentialStore::open(path, &key(), Reporter::named("test"));
        assert!(record.is_ok(), "open failed: {:?}", record.errors);
        record.into_contents().expect("store")
    }

    fn kind<T>(record: &ResultRecord<T>) -> Option<ErrorKind> {
        ErrorKind::from_status(record.status)
    }

    fn deferred() -> AddOptions {
        AddOptions {
            persist: Persist::Deferred,
            ..AddOptions::default()
        }
    }

    #[test]
    fn add_then_get_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_at(&dir.path().join("creds"));
        let fields = json!({
            "user": "admin",
            "port": 5432,
            "tls": true,
            "note": null,
            "replicas": [{"host": "a"}, {"host": "b"}],
        });

        let record = store.add("db", &fields, AddOptions::default());
        assert_eq!(record.status, OK);

        let got = store.get("db");
        assert!(got.is_ok());
        assert_eq!(Value::Object(got.into_contents().expect("contents")), fields);
    }

    #[test]
    fn modify_replaces_instead_of_merging() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_at(&dir.path().join("creds"));

        assert!(store
            .add("db", &json!({"user": "a", "pass": "b"}), AddOptions::default())
            .is_ok());
        assert_eq!(
            store.get("db").contents,
            Some(json!({"user": "a", "pass": "b"}).as_object().cloned().expect("object"))
        );

        assert!(store.modify("db", &json!({"user": "c"}), Persist::Immediately).is_ok());
        let fields = store.get("db").into_contents().expect("contents");
        assert_eq!(Value::Object(fields), json!({"user": "c"}));

        assert!(store.delete("db", Persist::Immediately).is_ok());
        let missing = store.get("db");
        assert_eq!(kind(&missing), Some(ErrorKind::SectionNotFound));
        assert!(missing.contents.is_none());
    }

    #[test]
    fn immediate_modify_and_delete_rewrite_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("creds");
        let store = open_at(&path);

        assert!(store
            .add("db", &json!({"user": "a", "pass": "b"}), AddOptions::default())
            .is_ok());
        assert!(store
            .add("mail", &json!({"host": "x"}), AddOptions::default())
            .is_ok());

        assert!(store.modify("db", &json!({"user": "c"}), Persist::Immediately).is_ok());
        let fields = open_at(&path).get("db").into_contents().expect("contents");
        assert_eq!(Value::Object(fields), json!({"user": "c"}));

        assert!(store.delete("db", Persist::Immediately).is_ok());
        let reopened = open_at(&path);
        assert!(!reopened.contains("db"));
        assert_eq!(reopened.list_sections(), vec!["mail".to_string()]);
    }

    #[test]
    fn duplicate_add_keeps_first_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_at(&dir.path().join("creds"));

        assert!(store.add("api", &json!({"token": "one"}), AddOptions::default()).is_ok());
        let second = store.add("api", &json!({"token": "two"}), AddOptions::default());

        assert_eq!(kind(&second), Some(ErrorKind::DuplicateSection));
        assert_eq!(second.errors.len(), 1);
        assert!(second.errors[0].message.contains("[api]"));
        assert_eq!(second.errors[0].call_site.function, Some("add"));
        let fields = store.get("api").into_contents().expect("contents");
        assert_eq!(fields["token"], "one");
    }

    #[test]
    fn overwrite_replaces_existing_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_at(&dir.path().join("creds"));

        assert!(store.add("api", &json!({"token": "one", "old": 1}), AddOptions::default()).is_ok());
        let options = AddOptions {
            overwrite: true,
            ..AddOptions::default()
        };
        assert!(store.add("api", &json!({"token": "two"}), options).is_ok());

        let fields = store.get("api").into_contents().expect("contents");
        assert_eq!(Value::Object(fields), json!({"token": "two"}));
    }

    #[test]
    fn missing_sections_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_at(&dir.path().join("creds"));

        let modified = store.modify("ghost", &json!({}), Persist::Immediately);
        assert_eq!(kind(&modified), Some(ErrorKind::SectionNotFound));
        assert_eq!(modified.errors[0].call_site.function, Some("modify"));
        assert!(!store.contains("ghost"));

        let deleted = store.delete("ghost", Persist::Immediately);
        assert_eq!(kind(&deleted), Some(ErrorKind::SectionNotFound));
        assert!(!dir.path().join("creds").exists(), "nothing should be written");
    }

    #[test]
    fn non_object_field_map_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_at(&dir.path().join("creds"));

        let record = store.add("bad", &json!(["not", "a", "map"]), AddOptions::default());
        assert_eq!(kind(&record), Some(ErrorKind::InvalidFieldMap));
        assert!(record.errors[0].message.contains("an array"));
        assert!(store.list_sections().is_empty());

        assert!(store.add("db", &json!({"user": "a"}), AddOptions::default()).is_ok());
        let record = store.modify("db", &json!("text"), Persist::Immediately);
        assert_eq!(kind(&record), Some(ErrorKind::InvalidFieldMap));
        let fields = store.get("db").into_contents().expect("contents");
        assert_eq!(fields["user"], "a");
    }

    #[test]
    fn null_field_map_creates_empty_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_at(&dir.path().join("creds"));

        assert!(store.add("empty", &Value::Null, AddOptions::default()).is_ok());
        assert_eq!(store.get("empty").contents, Some(FieldMap::new()));
    }

    #[test]
    fn get_returns_a_copy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_at(&dir.path().join("creds"));
        assert!(store.add("db", &json!({"user": "a"}), deferred()).is_ok());

        let mut copy = store.get("db").into_contents().expect("contents");
        copy.insert("user".into(), json!("mallory"));

        let fields = store.get("db").into_contents().expect("contents");
        assert_eq!(fields["user"], "a");
    }

    #[test]
    fn save_then_fresh_load_reconstructs_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("creds");
        let store = open_at(&path);

        assert!(store.add("db", &json!({"user": "a", "pass": "b"}), deferred()).is_ok());
        assert!(store.add("mail", &json!({"smtp": {"host": "x", "port": 25}}), deferred()).is_ok());
        assert!(store.save().is_ok());

        let reopened = open_at(&path);
        assert_eq!(*reopened.lock(), *store.lock());
        assert_eq!(reopened.list_sections(), vec!["db".to_string(), "mail".to_string()]);
    }

    #[test]
    fn deferred_writes_stay_in_memory_until_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("creds");
        let store = open_at(&path);

        assert!(store.add("db", &json!({"user": "a"}), deferred()).is_ok());
        assert!(open_at(&path).list_sections().is_empty());

        assert!(store.save().is_ok());
        assert_eq!(open_at(&path).list_sections(), vec!["db".to_string()]);

        assert!(store.delete("db", Persist::Deferred).is_ok());
        assert_eq!(open_at(&path).list_sections(), vec!["db".to_string()]);
    }

    #[test]
    fn missing_or_empty_file_means_no_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("creds");
        assert!(open_at(&path).list_sections().is_empty());

        fs::write(&path, b"").expect("write empty");
        let store = open_at(&path);
        assert!(store.list_sections().is_empty());
        assert!(store.load().is_ok());
    }

    #[test]
    fn corrupted_file_fails_decryption_and_leaves_store_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("creds");
        let store = open_at(&path);
        assert!(store.add("db", &json!({"user": "a"}), AddOptions::default()).is_ok());

        let mut bytes = fs::read(&path).expect("read");
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xFF;
        fs::write(&path, &bytes).expect("write corrupted");

        let record = store.load();
        assert_eq!(kind(&record), Some(ErrorKind::DecryptionFailed));
        assert!(store.list_sections().is_empty());

        let reopened = CredentialStore::open(&path, &key(), Reporter::named("test"));
        assert_eq!(kind(&reopened), Some(ErrorKind::DecryptionFailed));
        let reopened = reopened.into_contents().expect("store is still returned");
        assert!(reopened.list_sections().is_empty());
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("creds");
        let store = open_at(&path);
        assert!(store.add("db", &json!({"user": "a"}), AddOptions::default()).is_ok());

        let other = KeyMaterial::new("other", [9u8; 32]);
        let record = CredentialStore::open(&path, &other, Reporter::named("test"));
        assert_eq!(kind(&record), Some(ErrorKind::DecryptionFailed));
        assert!(record.contents.expect("store").list_sections().is_empty());
    }

    #[test]
    fn malformed_plaintext_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("creds");
        let cipher = cipher::build_cipher(&key());

        let payloads: [&[u8]; 3] = [b"[1, 2, 3]", br#"{"db": "not-a-map"}"#, b"not json"];
        for payload in payloads {
            fs::write(&path, cipher::seal(&cipher, payload).expect("seal")).expect("write");
            let record = CredentialStore::open(&path, &key(), Reporter::named("test"));
            assert_eq!(kind(&record), Some(ErrorKind::MalformedData));
            assert!(record.contents.expect("store").list_sections().is_empty());
        }
    }

    #[test]
    fn plaintext_is_not_stored_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("creds");
        let store = open_at(&path);
        assert!(store
            .add("db", &json!({"password": "hunter2-secret"}), AddOptions::default())
            .is_ok());

        let bytes = fs::read(&path).expect("read");
        let needle = b"hunter2-secret";
        assert!(!bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn saves_leave_no_temporary_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("creds");
        let store = open_at(&path);
        for i in 0..5 {
            assert!(store
                .add(&format!("s{i}"), &json!({"n": i}), AddOptions::default())
                .is_ok());
        }

        let entries: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("creds")]);
    }

    #[test]
    fn failed_persist_rolls_back_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        // a directory at the file path makes both read and rename fail
        let path = dir.path().join("creds");
        fs::create_dir(&path).expect("mkdir");

        let record = CredentialStore::open(&path, &key(), Reporter::named("test"));
        assert_eq!(kind(&record), Some(ErrorKind::Io));
        let store = record.into_contents().expect("store");

        let added = store.add("db", &json!({"user": "a"}), AddOptions::default());
        assert_eq!(kind(&added), Some(ErrorKind::Io));
        assert!(store.list_sections().is_empty());

        assert!(store.add("db", &json!({"user": "a"}), deferred()).is_ok());
        let deleted = store.delete("db", Persist::Immediately);
        assert_eq!(kind(&deleted), Some(ErrorKind::Io));
        assert!(store.contains("db"));
        assert_eq!(kind(&store.save()), Some(ErrorKind::Io));
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("creds");
        let store = open_at(&path);
        assert!(store.add("db", &json!({"user": "a"}), AddOptions::default()).is_ok());
        assert!(path.is_file());
        assert_eq!(open_at(&path).list_sections(), vec!["db".to_string()]);
    }

    #[test]
    fn concurrent_adds_are_all_persisted() {
        const THREADS: usize = 16;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("creds");
        let store = Arc::new(open_at(&path));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.add(
                        &format!("section-{i:02}"),
                        &json!({"user": format!("user-{i}"), "pass": i}),
                        AddOptions::default(),
                    )
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().expect("thread").is_ok());
        }

        assert_eq!(store.list_sections().len(), THREADS);

        let reopened = open_at(&path);
        assert_eq!(reopened.list_sections().len(), THREADS);
        for i in 0..THREADS {
            let fields = reopened
                .get(&format!("section-{i:02}"))
                .into_contents()
                .expect("contents");
            assert_eq!(fields["user"], format!("user-{i}"));
        }
    }

    #[test]
    fn lock_recovers_after_escalation_panic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reporter = Reporter::named("strict").with_raise_threshold(0);
        let record = CredentialStore::open(dir.path().join("creds"), &key(), reporter);
        let store = Arc::new(record.into_contents().expect("store"));

        let failing = Arc::clone(&store);
        let joined = thread::spawn(move || failing.get("missing")).join();
        assert!(joined.is_err(), "severity 0 reaches threshold 0 and panics");

        assert!(store.add("db", &json!({"user": "a"}), deferred()).is_ok());
        assert_eq!(store.list_sections(), vec!["db".to_string()]);
    }

    #[test]
    fn open_default_uses_resolver() {
        struct Home(Option<PathBuf>);
        impl FolderResolver for Home {
            fn home_directory(&self) -> Option<PathBuf> {
                self.0.clone()
            }
            fn ensure_directory(&self, path: &Path, mode: u32) -> std::io::Result<()> {
                paths::create_private_dir(path, mode)
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let record = CredentialStore::open_default(
            &Home(Some(dir.path().to_path_buf())),
            &key(),
            Reporter::named("test"),
        );
        assert!(record.is_ok());
        let store = record.into_contents().expect("store");
        assert_eq!(
            store.path(),
            dir.path().join(paths::FOLDER_NAME).join(paths::FILE_NAME)
        );
        assert_eq!(store.key_id(), "fixture");

        let record = CredentialStore::open_default(&Home(None), &key(), Reporter::named("test"));
        assert_eq!(kind(&record), Some(ErrorKind::Configuration));
        assert!(record.contents.is_none());
    }
}
