//! The workspace manifest (`model.yaml`): parsing, normalization and
//! round-trip-preserving serialization.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::spec::Name;

pub const MANIFEST_FILE_NAME: &str = "model.yaml";
const DEFAULT_ENTRY: &str = "index.dlang";

/// The `model:` block of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default = "default_entry")]
    pub entry: String,
}

fn default_entry() -> String {
    DEFAULT_ENTRY.to_owned()
}

/// A single dependency entry, normalized to its long form regardless of how
/// it was written in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    /// `owner/repo`, if it differs from the alias key. `None` means the
    /// alias itself is `owner/repo`.
    pub source: Option<Name>,
    pub reference: String,
    pub entry: Option<String>,
}

impl DependencyEntry {
    /// The `owner/repo` this dependency actually resolves to, given the
    /// alias it is keyed under in the manifest. Fails with a plain
    /// message (not yet attached to a manifest path) when the alias isn't
    /// a valid `owner/repo` and there's no explicit `source` to fall back
    /// on; callers attach the manifest path via [`Error::ManifestInvalid`].
    pub fn resolved_name(&self, alias: &str) -> Result<Name, String> {
        match &self.source {
            Some(name) => Ok(name.clone()),
            None => Name::parse(alias).map_err(|reason| {
                format!(
                    "dependency alias '{alias}' is not a valid owner/repo and has no explicit `source`: {reason}"
                )
            }),
        }
    }
}

/// The raw shape of a single dependency value as written in YAML: either a
/// bare ref string (short form) or a record (long form).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum DependencyValueRaw {
    Short(String),
    Long {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(rename = "ref")]
        reference: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entry: Option<String>,
    },
}

impl DependencyValueRaw {
    fn normalize(self, alias: &str) -> Result<DependencyEntry, Error> {
        match self {
            DependencyValueRaw::Short(reference) => Ok(DependencyEntry {
                source: None,
                reference,
                entry: None,
            }),
            DependencyValueRaw::Long {
                source,
                reference,
                entry,
            } => {
                let source = source
                    .map(|s| Name::parse(&s))
                    .transpose()
                    .map_err(|reason| Error::ManifestInvalid {
                        path: PathBuf::new(),
                        reason: format!("invalid `source` for dependency '{alias}': {reason}"),
                    })?;
                Ok(DependencyEntry {
                    source,
                    reference,
                    entry,
                })
            }
        }
    }

    fn from_entry(entry: &DependencyEntry) -> Self {
        match (&entry.source, &entry.entry) {
            (None, None) => DependencyValueRaw::Short(entry.reference.clone()),
            (source, entry_path) => DependencyValueRaw::Long {
                source: source.as_ref().map(|n| n.to_string()),
                reference: entry.reference.clone(),
                entry: entry_path.clone(),
            },
        }
    }
}

/// The YAML document shape, used only at the serde boundary. Unknown
/// top-level keys are preserved via `extra` so writes don't clobber fields
/// the core doesn't understand (invariant 5).
#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestRaw {
    model: Option<ModelInfo>,
    #[serde(default)]
    dependencies: BTreeMap<String, DependencyValueRaw>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    paths: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// An in-memory, normalized representation of `model.yaml`.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    pub path: PathBuf,
    pub model: ModelInfo,
    pub dependencies: BTreeMap<String, DependencyEntry>,
    pub paths: BTreeMap<String, String>,
    extra: BTreeMap<String, serde_yaml::Value>,
}

impl ManifestFile {
    /// The directory this manifest lives in; the workspace root.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|_| Error::ManifestNotFound {
            start: path.clone(),
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: PathBuf) -> Result<Self, Error> {
        let raw: ManifestRaw = serde_yaml::from_str(text).map_err(|e| Error::ManifestInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let model = raw.model.ok_or_else(|| Error::ManifestInvalid {
            path: path.clone(),
            reason: "missing required `model.name`".to_owned(),
        })?;
        if model.name.trim().is_empty() {
            return Err(Error::ManifestInvalid {
                path,
                reason: "missing required `model.name`".to_owned(),
            });
        }

        let mut dependencies = BTreeMap::new();
        for (alias, raw_dep) in raw.dependencies {
            let normalized = raw_dep.normalize(&alias).map_err(|e| match e {
                Error::ManifestInvalid { reason, .. } => Error::ManifestInvalid {
                    path: path.clone(),
                    reason,
                },
                other => other,
            })?;
            dependencies.insert(alias, normalized);
        }

        Ok(ManifestFile {
            path,
            model,
            dependencies,
            paths: raw.paths.unwrap_or_default(),
            extra: raw.extra,
        })
    }

    /// Serialize this manifest back to YAML text, ready to be written to
    /// disk: 2-space indent, no wrapping, and an empty `dependencies`
    /// mapping rendered as a bare key rather than `{}` or `null`.
    pub fn to_yaml_string(&self) -> Result<String, Error> {
        let dependencies: BTreeMap<String, DependencyValueRaw> = self
            .dependencies
            .iter()
            .map(|(alias, entry)| (alias.clone(), DependencyValueRaw::from_entry(entry)))
            .collect();

        let raw = ManifestRaw {
            model: Some(self.model.clone()),
            dependencies,
            paths: if self.paths.is_empty() {
                None
            } else {
                Some(self.paths.clone())
            },
            extra: self.extra.clone(),
        };

        let mut out = serde_yaml::to_string(&raw).map_err(|e| Error::ManifestInvalid {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        if self.dependencies.is_empty() {
            out = out.replace("dependencies: {}\n", "dependencies:\n");
        }
        Ok(out)
    }

    pub fn save(&self) -> Result<(), Error> {
        let text = self.to_yaml_string()?;
        crate::cache::atomic_write(&self.path, text.as_bytes())
            .map_err(|source| Error::CacheIoError {
                path: self.path.clone(),
                source,
            })
    }

    /// Walk upward from `start` looking for a directory containing
    /// `model.yaml`.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, Error> {
        let start = start.as_ref();
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE_NAME);
            if candidate.is_file() {
                return Self::load(candidate);
            }
            if !dir.pop() {
                return Err(Error::ManifestNotFound {
                    start: start.to_path_buf(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_path() -> PathBuf {
        PathBuf::from("/tmp/workspace/model.yaml")
    }

    #[test]
    fn parses_short_and_long_form_dependencies() {
        let text = r#"
model:
  name: my-workspace
dependencies:
  acme/core: v1.2.3
  utils:
    source: acme/utils
    ref: main
    entry: lib.dlang
"#;
        let manifest = ManifestFile::parse(text, sample_path()).unwrap();
        assert_eq!(manifest.model.entry, DEFAULT_ENTRY);
        assert_eq!(manifest.dependencies["acme/core"].reference, "v1.2.3");
        assert!(manifest.dependencies["acme/core"].source.is_none());
        assert_eq!(
            manifest.dependencies["utils"].source,
            Some(Name::parse("acme/utils").unwrap())
        );
        assert_eq!(
            manifest.dependencies["utils"].entry.as_deref(),
            Some("lib.dlang")
        );
    }

    #[test]
    fn missing_model_name_is_invalid() {
        let text = "dependencies: {}\n";
        let err = ManifestFile::parse(text, sample_path()).unwrap_err();
        assert!(matches!(err, Error::ManifestInvalid { .. }));
    }

    #[test]
    fn round_trips_through_yaml() {
        let text = r#"
model:
  name: my-workspace
  version: "1.0.0"
dependencies:
  acme/core: v1.2.3
"#;
        let manifest = ManifestFile::parse(text, sample_path()).unwrap();
        let written = manifest.to_yaml_string().unwrap();
        let reparsed = ManifestFile::parse(&written, sample_path()).unwrap();
        assert_eq!(manifest.model, reparsed.model);
        assert_eq!(manifest.dependencies, reparsed.dependencies);
    }

    #[test]
    fn empty_dependencies_serialize_as_bare_key() {
        let manifest = ManifestFile {
            path: sample_path(),
            model: ModelInfo {
                name: "my-workspace".to_owned(),
                version: None,
                entry: DEFAULT_ENTRY.to_owned(),
            },
            dependencies: BTreeMap::new(),
            paths: BTreeMap::new(),
            extra: BTreeMap::new(),
        };
        let text = manifest.to_yaml_string().unwrap();
        assert!(text.contains("dependencies:\n"));
        assert!(!text.contains("dependencies: {}"));
        assert!(!text.contains("dependencies: null"));
    }

    #[test]
    fn preserves_unknown_top_level_keys() {
        let text = "model:\n  name: ws\nextension:\n  custom: true\n";
        let manifest = ManifestFile::parse(text, sample_path()).unwrap();
        let written = manifest.to_yaml_string().unwrap();
        assert!(written.contains("extension"));
    }
}
