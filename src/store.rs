use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::{Activity, Category, DisplaySettings, Lesson, LessonPlan, Unit};

/// Whole-document persistence, one JSON string per key. Mirrors the
/// local-storage layout the presentation layer expects: every mutation
/// rewrites the full document for its key, synchronously.
pub trait StorageAdapter {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
    fn keys(&self) -> anyhow::Result<Vec<String>>;
}

/// File-per-key adapter under a workspace directory. Writes go through a
/// temp file and rename so a crash mid-save never leaves a torn document.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)?;
        Ok(Self {
            dir: workspace.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StorageAdapter for FileStorage {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{}.json.saving", key));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        if path.is_file() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn keys(&self) -> anyhow::Result<Vec<String>> {
        let mut out = Vec::new();
        for ent in std::fs::read_dir(&self.dir)? {
            let p = ent?.path();
            if !p.is_file() {
                continue;
            }
            let Some(name) = p.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(stem) = name.strip_suffix(".json") {
                out.push(stem.to_string());
            }
        }
        out.sort();
        Ok(out)
    }
}

/// In-memory adapter, used as the store fake in unit tests.
#[derive(Default)]
pub struct MemoryStorage {
    docs: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for MemoryStorage {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.docs.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.docs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.docs.remove(key);
        Ok(())
    }

    fn keys(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.docs.keys().cloned().collect())
    }
}

pub const KEY_ACTIVITIES: &str = "activities";
pub const KEY_PLANS: &str = "plans";
pub const KEY_SETTINGS: &str = "settings";

/// Class identifiers are free strings typed by the user; document keys need
/// something filename-safe and stable, so keys embed a slug, not the raw id.
pub fn class_slug(class_id: &str) -> String {
    let mut slug = String::with_capacity(class_id.len());
    let mut last_dash = true;
    for c in class_id.trim().to_ascii_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

pub fn categories_key(class_id: &str) -> String {
    format!("categories.{}", class_slug(class_id))
}

pub fn lessons_key(class_id: &str) -> String {
    format!("lessons.{}", class_slug(class_id))
}

pub fn units_key(class_id: &str) -> String {
    format!("units.{}", class_slug(class_id))
}

/// Typed access over the raw adapter. Repositories read a whole document,
/// mutate it in memory, and write it back; there is no partial update.
pub struct Store {
    adapter: Box<dyn StorageAdapter>,
}

impl Store {
    pub fn new(adapter: Box<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }

    pub fn load_raw(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.adapter.load(key)
    }

    pub fn save_raw(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.adapter.save(key, value)
    }

    pub fn keys(&self) -> anyhow::Result<Vec<String>> {
        self.adapter.keys()
    }

    fn load_doc<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.adapter.load(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_doc<T: Serialize>(&mut self, key: &str, doc: &T) -> anyhow::Result<()> {
        let raw = serde_json::to_string(doc)?;
        self.adapter.save(key, &raw)
    }

    pub fn activities(&self) -> anyhow::Result<Vec<Activity>> {
        Ok(self.load_doc(KEY_ACTIVITIES)?.unwrap_or_default())
    }

    pub fn save_activities(&mut self, catalog: &[Activity]) -> anyhow::Result<()> {
        self.save_doc(KEY_ACTIVITIES, &catalog)
    }

    /// Absent registries read as the default seed; the seed is only written
    /// back once the registry is first mutated.
    pub fn categories(&self, class_id: &str) -> anyhow::Result<Vec<Category>> {
        match self.load_doc(&categories_key(class_id))? {
            Some(v) => Ok(v),
            None => Ok(Category::defaults()),
        }
    }

    pub fn save_categories(
        &mut self,
        class_id: &str,
        registry: &[Category],
    ) -> anyhow::Result<()> {
        self.save_doc(&categories_key(class_id), &registry)
    }

    pub fn lessons(&self, class_id: &str) -> anyhow::Result<BTreeMap<String, Lesson>> {
        Ok(self.load_doc(&lessons_key(class_id))?.unwrap_or_default())
    }

    pub fn save_lessons(
        &mut self,
        class_id: &str,
        lessons: &BTreeMap<String, Lesson>,
    ) -> anyhow::Result<()> {
        self.save_doc(&lessons_key(class_id), lessons)
    }

    pub fn units(&self, class_id: &str) -> anyhow::Result<Vec<Unit>> {
        Ok(self.load_doc(&units_key(class_id))?.unwrap_or_default())
    }

    pub fn save_units(&mut self, class_id: &str, units: &[Unit]) -> anyhow::Result<()> {
        self.save_doc(&units_key(class_id), &units)
    }

    pub fn plans(&self) -> anyhow::Result<Vec<LessonPlan>> {
        Ok(self.load_doc(KEY_PLANS)?.unwrap_or_default())
    }

    pub fn save_plans(&mut self, plans: &[LessonPlan]) -> anyhow::Result<()> {
        self.save_doc(KEY_PLANS, &plans)
    }

    pub fn settings(&self) -> anyhow::Result<DisplaySettings> {
        Ok(self.load_doc(KEY_SETTINGS)?.unwrap_or_default())
    }

    pub fn save_settings(&mut self, settings: &DisplaySettings) -> anyhow::Result<()> {
        self.save_doc(KEY_SETTINGS, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlanStatus;

    #[test]
    fn class_slug_is_filename_safe_and_stable() {
        assert_eq!(class_slug("Year 3"), "year-3");
        assert_eq!(class_slug("  Reception / AM  "), "reception-am");
        assert_eq!(class_slug("year-3"), "year-3");
        assert_eq!(categories_key("Year 3"), "categories.year-3");
    }

    #[test]
    fn memory_store_round_trips_documents() {
        let mut store = Store::new(Box::new(MemoryStorage::new()));
        assert!(store.activities().expect("load").is_empty());

        let mut plan = LessonPlan::new_for_date("2024-09-02", "Year 3");
        plan.notes = "warm up first".to_string();
        store.save_plans(std::slice::from_ref(&plan)).expect("save");

        let loaded = store.plans().expect("reload");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].notes, "warm up first");
        assert_eq!(loaded[0].status, PlanStatus::Planned);
    }

    #[test]
    fn absent_registry_reads_as_default_seed() {
        let store = Store::new(Box::new(MemoryStorage::new()));
        let registry = store.categories("Year 1").expect("load");
        assert_eq!(registry, Category::defaults());
        assert!(!registry.is_empty());
    }

    #[test]
    fn file_storage_lists_saved_keys() {
        let dir = std::env::temp_dir().join(format!(
            "plannerd-store-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        let mut fs = FileStorage::open(&dir).expect("open");
        fs.save("plans", "[]").expect("save plans");
        fs.save("categories.year-3", "[]").expect("save categories");
        assert_eq!(
            fs.keys().expect("keys"),
            vec!["categories.year-3".to_string(), "plans".to_string()]
        );
        assert_eq!(fs.load("plans").expect("load"), Some("[]".to_string()));
        fs.remove("plans").expect("remove");
        assert_eq!(fs.load("plans").expect("load"), None);
    }
}
