use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uvm_domain::{EnvironmentEntry, Result, UvmError};

pub const REGISTRY_VERSION: u64 = 1;

pub(crate) type Entries = IndexMap<String, EnvironmentEntry>;

/// On-disk registry file. Records stay raw JSON so a malformed record can be
/// reported against its key; field order keeps the rendered keys sorted.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryDocument {
    environments: BTreeMap<String, Value>,
    version: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LoadPhase {
    Unloaded,
    Loaded,
}

/// In-memory view of the registry file. Entries are only meaningful once the
/// phase is [`LoadPhase::Loaded`].
#[derive(Debug)]
pub(crate) struct RegistryState {
    pub(crate) phase: LoadPhase,
    pub(crate) entries: Entries,
}

impl RegistryState {
    pub(crate) fn unloaded() -> Self {
        Self {
            phase: LoadPhase::Unloaded,
            entries: Entries::new(),
        }
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.phase == LoadPhase::Loaded
    }

    pub(crate) fn replace(&mut self, entries: Entries) {
        self.entries = entries;
        self.phase = LoadPhase::Loaded;
    }

    pub(crate) fn reset(&mut self) {
        self.entries.clear();
        self.phase = LoadPhase::Unloaded;
    }
}

/// Full registry document: `{environments: {name -> record}, version}`,
/// names sorted, two-space indent, trailing newline.
pub(crate) fn encode(entries: &Entries) -> Result<String> {
    let environments = entries
        .iter()
        .map(|(name, entry)| {
            entry
                .to_record()
                .map(|record| (name.clone(), Value::Object(record)))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;
    let document = RegistryDocument {
        environments,
        version: REGISTRY_VERSION,
    };
    let mut rendered = serde_json::to_string_pretty(&document).map_err(|err| {
        UvmError::InvalidEntry(format!("registry cannot be serialized: {err}"))
    })?;
    rendered.push('\n');
    Ok(rendered)
}

pub(crate) fn decode(contents: &str) -> Result<Entries> {
    let document: RegistryDocument = serde_json::from_str(contents).map_err(|err| {
        UvmError::RegistryCorrupted(format!("registry file is malformed: {err}"))
    })?;
    if document.version != REGISTRY_VERSION {
        return Err(UvmError::RegistryCorrupted(format!(
            "unsupported registry version: {}",
            document.version
        )));
    }

    let mut entries = Entries::with_capacity(document.environments.len());
    for (key, raw) in document.environments {
        let Value::Object(mut record) = raw else {
            return Err(UvmError::RegistryCorrupted(format!(
                "registry entry '{key}' must be a mapping"
            )));
        };
        record
            .entry("name")
            .or_insert_with(|| Value::String(key.clone()));
        let entry = EnvironmentEntry::from_record(&record).map_err(|err| match err {
            UvmError::RegistryCorrupted(_) => err,
            other => UvmError::RegistryCorrupted(format!("registry entry '{key}': {other}")),
        })?;
        entries.insert(entry.name().to_string(), entry);
    }
    Ok(entries)
}
