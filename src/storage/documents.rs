//! Document shapes consumed from the backing store.

use std::fmt;
use std::path::PathBuf;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::status::qc::StampSet;

/// Component name to raw status, in the order the store returned them.
///
/// Repeated names keep their first position and take the latest value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentStatuses {
    entries: Vec<(String, String)>,
}

impl ComponentStatuses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a component's raw status.
    pub fn insert(&mut self, component: String, raw: String) {
        match self.entries.iter_mut().find(|(name, _)| *name == component) {
            Some(entry) => entry.1 = raw,
            None => self.entries.push((component, raw)),
        }
    }

    pub fn get(&self, component: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == component)
            .map(|(_, raw)| raw.as_str())
    }

    /// Component names in store order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, raw)| (name.as_str(), raw.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ComponentStatuses {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, raw) in &self.entries {
            map.serialize_entry(name, raw)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ComponentStatuses {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusesVisitor;

        impl<'de> Visitor<'de> for StatusesVisitor {
            type Value = ComponentStatuses;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of component name to raw status")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut statuses = ComponentStatuses::new();
                while let Some((name, raw)) = access.next_entry::<String, String>()? {
                    statuses.insert(name, raw);
                }
                Ok(statuses)
            }
        }

        deserializer.deserialize_map(StatusesVisitor)
    }
}

/// Raw per-component statuses for one sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatusDoc {
    #[serde(alias = "_id")]
    pub sample_id: String,
    /// Raw statuses as written by the pipeline.
    #[serde(default, alias = "s_cs")]
    pub components: ComponentStatuses,
}

impl ComponentStatusDoc {
    pub fn new(sample_id: impl Into<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            components: ComponentStatuses::new(),
        }
    }

    pub fn with_component(mut self, component: impl Into<String>, raw: impl Into<String>) -> Self {
        self.components.insert(component.into(), raw.into());
        self
    }
}

/// Sample identity, priority, stamps and run location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleDoc {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub stamps: StampSet,
    /// Directory the sample's pipeline runs in.
    #[serde(default, alias = "path")]
    pub run_directory: PathBuf,
}

impl SampleDoc {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn with_stamps(mut self, stamps: StampSet) -> Self {
        self.stamps = stamps;
        self
    }

    pub fn with_run_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_directory = path.into();
        self
    }
}
