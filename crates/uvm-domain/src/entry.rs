use std::path::{Path, PathBuf};

use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};

use crate::error::{Result, UvmError};
use crate::paths::{normalize_env_path, validate_safe_path};

/// Stored shape of one entry under `environments` in the registry file.
#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    name: String,
    location: String,
    #[serde(default, deserialize_with = "version_string")]
    python_version: Option<String>,
    #[serde(default, with = "timestamp")]
    created_at: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "flag_or_false")]
    is_project_local: bool,
    #[serde(default, deserialize_with = "metadata_map")]
    metadata: Map<String, Value>,
}

impl From<&EnvironmentEntry> for EntryRecord {
    fn from(entry: &EnvironmentEntry) -> Self {
        Self {
            name: entry.name.clone(),
            location: entry.location.display().to_string(),
            python_version: entry.python_version.clone(),
            created_at: entry.created_at,
            is_project_local: entry.is_project_local,
            metadata: entry.metadata.clone(),
        }
    }
}

impl From<EntryRecord> for EntryFields {
    fn from(record: EntryRecord) -> Self {
        Self {
            name: record.name,
            location: PathBuf::from(record.location),
            python_version: record.python_version,
            created_at: record.created_at,
            is_project_local: record.is_project_local,
            metadata: record.metadata,
        }
    }
}

/// Caller-supplied fields for a new [`EnvironmentEntry`].
#[derive(Clone, Debug, Default)]
pub struct EntryFields {
    pub name: String,
    pub location: PathBuf,
    pub python_version: Option<String>,
    pub created_at: Option<OffsetDateTime>,
    pub is_project_local: bool,
    pub metadata: Map<String, Value>,
}

impl EntryFields {
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn python_version(mut self, version: impl Into<String>) -> Self {
        self.python_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[must_use]
    pub fn project_local(mut self, is_project_local: bool) -> Self {
        self.is_project_local = is_project_local;
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Result<EnvironmentEntry> {
        EnvironmentEntry::new(self)
    }
}

/// One registered environment. Values are immutable once built; use
/// [`EnvironmentEntry::with_update`] to derive a modified copy.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentEntry {
    name: String,
    location: PathBuf,
    python_version: Option<String>,
    created_at: Option<OffsetDateTime>,
    is_project_local: bool,
    metadata: Map<String, Value>,
}

impl EnvironmentEntry {
    pub fn new(fields: EntryFields) -> Result<Self> {
        let name = fields.name.trim();
        if name.is_empty() {
            return Err(UvmError::InvalidEntry(
                "environment name cannot be blank".to_string(),
            ));
        }
        let location = normalize_env_path(&fields.location)?;
        if !location.exists() {
            validate_safe_path(&location, true)?;
        }
        let created_at = match fields.created_at {
            Some(created_at) => {
                let utc = created_at.to_offset(UtcOffset::UTC);
                // every stored timestamp must be representable in the record
                utc.format(&Rfc3339).map_err(|err| {
                    UvmError::InvalidEntry(format!("created_at cannot be serialized: {err}"))
                })?;
                Some(utc)
            }
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            location,
            python_version: fields.python_version,
            created_at,
            is_project_local: fields.is_project_local,
            metadata: fields.metadata,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn python_version(&self) -> Option<&str> {
        self.python_version.as_deref()
    }

    pub fn created_at(&self) -> Option<OffsetDateTime> {
        self.created_at
    }

    pub fn is_project_local(&self) -> bool {
        self.is_project_local
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Whether the backing directory is still present on disk. Checked live.
    pub fn location_exists(&self) -> bool {
        self.location.exists()
    }

    /// Plain JSON form of the entry: location as a string, `created_at` as
    /// RFC 3339 or null, everything else verbatim.
    pub fn to_record(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(EntryRecord::from(self)) {
            Ok(Value::Object(record)) => Ok(record),
            Ok(other) => Err(UvmError::InvalidEntry(format!(
                "entry '{}' serialized to a non-object: {other}",
                self.name
            ))),
            Err(err) => Err(UvmError::InvalidEntry(format!(
                "entry '{}' cannot be serialized: {err}",
                self.name
            ))),
        }
    }

    /// Rebuilds an entry from its stored record. Missing `name` or
    /// `location` is corruption; anything else malformed is an invalid entry.
    pub fn from_record(record: &Map<String, Value>) -> Result<Self> {
        for field in ["name", "location"] {
            if !record.contains_key(field) {
                return Err(UvmError::RegistryCorrupted(format!(
                    "registry entry missing required field '{field}'"
                )));
            }
        }
        let parsed: EntryRecord = serde_json::from_value(Value::Object(record.clone()))
            .map_err(|err| UvmError::InvalidEntry(err.to_string()))?;
        Self::new(parsed.into())
    }

    /// Derives a new entry from this one's record with `changes` merged in.
    /// The result goes through the same validation as any stored record.
    pub fn with_update(&self, changes: Map<String, Value>) -> Result<Self> {
        let mut record = self.to_record()?;
        record.extend(changes);
        Self::from_record(&record)
    }
}

/// Non-string versions (a bare `3.11` number) are kept as their JSON text.
fn version_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(version)) => Some(version),
        Some(other) => Some(other.to_string()),
    })
}

fn flag_or_false<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Any falsy value (`null`, `false`, `0`, `""`, `[]`) means no metadata.
fn metadata_map<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        value if is_falsy(&value) => Ok(Map::new()),
        other => Err(de::Error::custom(format!(
            "metadata must be a mapping with string keys (got {other})"
        ))),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

mod timestamp {
    use super::{
        de, parse_timestamp, ser, Deserialize, Deserializer, OffsetDateTime, Rfc3339, Serializer,
    };

    pub(super) fn serialize<S>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => {
                let text = ts.format(&Rfc3339).map_err(ser::Error::custom)?;
                serializer.serialize_str(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.is_empty() => {
                parse_timestamp(&raw).map(Some).map_err(de::Error::custom)
            }
            _ => Ok(None),
        }
    }
}

/// RFC 3339 first; naive `YYYY-MM-DDTHH:MM:SS[.ffffff]` values are taken
/// as UTC.
fn parse_timestamp(raw: &str) -> std::result::Result<OffsetDateTime, String> {
    if let Ok(aware) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(aware.to_offset(UtcOffset::UTC));
    }
    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(raw, naive)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|err| format!("invalid created_at '{raw}': {err}"))
}
