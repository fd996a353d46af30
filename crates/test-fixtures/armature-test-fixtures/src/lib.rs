//! Shared JSON fixtures (hierarchies, rigs, reference skeletons) for the
//! workspace's tests. Everything is looked up by name through
//! `fixtures/manifest.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Result<Manifest, String>> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).map_err(|err| err.to_string())
});

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    hierarchies: HashMap<String, String>,
    #[serde(default)]
    rigs: HashMap<String, RigEntry>,
    #[serde(default)]
    skeletons: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RigEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        skeleton: Option<String>,
    },
}

impl RigEntry {
    fn as_path(&self) -> &str {
        match self {
            RigEntry::Path(path) => path,
            RigEntry::Detailed { path, .. } => path,
        }
    }

    fn skeleton(&self) -> Option<&str> {
        match self {
            RigEntry::Path(_) => None,
            RigEntry::Detailed { skeleton, .. } => skeleton.as_deref(),
        }
    }
}

fn manifest() -> Result<&'static Manifest> {
    MANIFEST
        .as_ref()
        .map_err(|err| anyhow!("fixtures manifest failed to parse: {err}"))
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod hierarchies {
    use super::*;

    pub fn keys() -> Result<Vec<String>> {
        Ok(manifest()?.hierarchies.keys().cloned().collect())
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&manifest()?.hierarchies, "hierarchy", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&manifest()?.hierarchies, "hierarchy", name)?;
        super::load_json(rel)
    }
}

pub mod rigs {
    use super::*;

    pub fn keys() -> Result<Vec<String>> {
        Ok(manifest()?.rigs.keys().cloned().collect())
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&manifest()?.rigs, "rig", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&manifest()?.rigs, "rig", name)?;
        super::load_json(entry.as_path())
    }

    /// Name of the skeleton fixture the rig was authored against, if any.
    pub fn skeleton_name(name: &str) -> Result<Option<String>> {
        let entry = lookup(&manifest()?.rigs, "rig", name)?;
        Ok(entry.skeleton().map(str::to_string))
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&manifest()?.rigs, "rig", name)?;
        Ok(resolve_path(entry.as_path()))
    }
}

pub mod skeletons {
    use super::*;

    pub fn keys() -> Result<Vec<String>> {
        Ok(manifest()?.skeletons.keys().cloned().collect())
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&manifest()?.skeletons, "skeleton", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&manifest()?.skeletons, "skeleton", name)?;
        super::load_json(rel)
    }
}
