use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{self, HalfTerm};

/// Colour returned for any category name the registry does not know.
/// Stale category references degrade to this, never to an error.
pub const FALLBACK_COLOR: &str = "#9E9E9E";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backing_track: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocals: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ResourceLinks {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A reusable teaching activity. Catalog identity is (name, category);
/// there is no surrogate key until a copy lands in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub name: String,
    pub category: String,
    /// Duration in minutes.
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "ResourceLinks::is_empty")]
    pub links: ResourceLinks,
}

impl Activity {
    pub fn identity_matches(&self, name: &str, category: &str) -> bool {
        self.name == name && self.category == category
    }
}

/// Patch applied to an activity in place; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityFields {
    pub name: Option<String>,
    pub category: Option<String>,
    pub time: Option<i64>,
    pub description: Option<String>,
    pub level: Option<String>,
    pub links: Option<ResourceLinks>,
}

impl Activity {
    pub fn apply_fields(&mut self, fields: &ActivityFields) {
        if let Some(ref v) = fields.name {
            self.name = v.clone();
        }
        if let Some(ref v) = fields.category {
            self.category = v.clone();
        }
        if let Some(v) = fields.time {
            self.time = v.max(0);
        }
        if let Some(ref v) = fields.description {
            self.description = v.clone();
        }
        if let Some(ref v) = fields.level {
            self.level = if v.trim().is_empty() {
                None
            } else {
                Some(v.clone())
            };
        }
        if let Some(ref v) = fields.links {
            self.links = v.clone();
        }
    }
}

/// Insert or replace by (name, category) identity.
pub fn catalog_upsert(catalog: &mut Vec<Activity>, activity: Activity) {
    if let Some(existing) = catalog
        .iter_mut()
        .find(|a| a.identity_matches(&activity.name, &activity.category))
    {
        *existing = activity;
    } else {
        catalog.push(activity);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Category,
    Time,
    Level,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "category" => Some(Self::Category),
            "time" => Some(Self::Time),
            "level" => Some(Self::Level),
            _ => None,
        }
    }
}

/// Case-insensitive substring match over name+description, exact match on
/// category/level unless "all", then a stable sort on the requested field.
/// Ties keep the catalog's original order.
pub fn filter_and_sort(
    catalog: &[Activity],
    query: &str,
    category: &str,
    level: &str,
    sort_by: SortField,
    descending: bool,
) -> Vec<Activity> {
    let needle = query.trim().to_lowercase();
    let mut out: Vec<Activity> = catalog
        .iter()
        .filter(|a| {
            if !needle.is_empty() {
                let hay = format!("{} {}", a.name, a.description).to_lowercase();
                if !hay.contains(&needle) {
                    return false;
                }
            }
            if category != "all" && a.category != category {
                return false;
            }
            if level != "all" && a.level.as_deref() != Some(level) {
                return false;
            }
            true
        })
        .cloned()
        .collect();

    out.sort_by(|a, b| {
        let ord = match sort_by {
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::Category => a.category.to_lowercase().cmp(&b.category.to_lowercase()),
            SortField::Time => a.time.cmp(&b.time),
            SortField::Level => a.level.cmp(&b.level),
        };
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub color: String,
    pub position: i64,
}

impl Category {
    /// Seed registry for a fresh class.
    pub fn defaults() -> Vec<Category> {
        let seed = [
            ("Warm Up", "#F59E0B"),
            ("Singing", "#3B82F6"),
            ("Rhythm", "#EF4444"),
            ("Listening", "#8B5CF6"),
            ("Instruments", "#10B981"),
            ("Games", "#EC4899"),
        ];
        seed.iter()
            .enumerate()
            .map(|(i, (name, color))| Category {
                name: name.to_string(),
                color: color.to_string(),
                position: i as i64,
            })
            .collect()
    }
}

/// Positions must read contiguous 0..n-1 after every registry mutation.
pub fn normalize_positions(registry: &mut [Category]) {
    registry.sort_by_key(|c| c.position);
    for (i, cat) in registry.iter_mut().enumerate() {
        cat.position = i as i64;
    }
}

#[derive(Debug, PartialEq)]
pub struct DuplicateNameError;

pub fn registry_add(
    registry: &mut Vec<Category>,
    name: &str,
    color: &str,
) -> Result<Category, DuplicateNameError> {
    let lowered = name.to_lowercase();
    if registry.iter().any(|c| c.name.to_lowercase() == lowered) {
        return Err(DuplicateNameError);
    }
    let cat = Category {
        name: name.to_string(),
        color: color.to_string(),
        position: registry.len() as i64,
    };
    registry.push(cat.clone());
    Ok(cat)
}

pub fn registry_remove(registry: &mut Vec<Category>, index: usize) -> Option<Category> {
    if index >= registry.len() {
        return None;
    }
    let removed = registry.remove(index);
    normalize_positions(registry);
    Some(removed)
}

/// Drag-reorder: pull the dragged entry out and reinsert it at the target's
/// slot. Self-drop and unknown names are no-ops.
pub fn registry_reorder(registry: &mut Vec<Category>, dragged: &str, target: &str) {
    if dragged == target {
        return;
    }
    let Some(from) = registry.iter().position(|c| c.name == dragged) else {
        return;
    };
    let moved = registry.remove(from);
    let Some(to) = registry.iter().position(|c| c.name == target) else {
        registry.insert(from, moved);
        return;
    };
    registry.insert(to, moved);
    normalize_positions(registry);
}

pub fn category_color<'a>(registry: &'a [Category], name: &str) -> &'a str {
    registry
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.color.as_str())
        .unwrap_or(FALLBACK_COLOR)
}

/// One teaching slot's content, keyed by lesson number in the per-class map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub total_time: i64,
    #[serde(default)]
    pub grouped: BTreeMap<String, Vec<Activity>>,
    #[serde(default)]
    pub category_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eyfs: Vec<String>,
}

impl Lesson {
    pub fn display_title(&self, number: &str) -> String {
        match self.title {
            Some(ref t) if !t.trim().is_empty() => t.clone(),
            _ => format!("Lesson {}", number),
        }
    }

    pub fn activity_count(&self) -> usize {
        self.grouped.values().map(|v| v.len()).sum()
    }

    /// Re-establish the lesson invariants: totalTime equals the duration sum
    /// and categoryOrder contains exactly the keys of grouped, keeping the
    /// existing relative order for categories that survive.
    pub fn recompute(&mut self) {
        self.grouped.retain(|_, acts| !acts.is_empty());
        self.total_time = self
            .grouped
            .values()
            .flat_map(|acts| acts.iter())
            .map(|a| a.time)
            .sum();
        let mut order: Vec<String> = self
            .category_order
            .iter()
            .filter(|c| self.grouped.contains_key(*c))
            .cloned()
            .collect();
        for key in self.grouped.keys() {
            if !order.contains(key) {
                order.push(key.clone());
            }
        }
        self.category_order = order;
    }

    /// Identity-match update inside one category. Returns false when the
    /// category or activity is not there; callers surface that as a warning,
    /// not a failure.
    pub fn update_activity(&mut self, category: &str, name: &str, fields: &ActivityFields) -> bool {
        let Some(acts) = self.grouped.get_mut(category) else {
            return false;
        };
        let Some(act) = acts.iter_mut().find(|a| a.identity_matches(name, category)) else {
            return false;
        };
        act.apply_fields(fields);
        self.recompute();
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub lesson_numbers: Vec<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<HalfTerm>,
    pub created_at: String,
    pub updated_at: String,
}

/// Numeric compare where both sides parse, string compare otherwise, so
/// "2" sorts before "10" but free-form numbers still order deterministically.
fn lesson_number_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

impl Unit {
    /// Union new numbers into the teaching sequence: existing entries keep
    /// their relative order, new ones are appended sorted numerically.
    pub fn add_lessons(&mut self, numbers: &[String]) {
        let mut fresh: Vec<String> = numbers
            .iter()
            .filter(|n| !self.lesson_numbers.contains(*n))
            .cloned()
            .collect();
        fresh.dedup();
        fresh.sort_by(|a, b| lesson_number_cmp(a, b));
        fresh.dedup();
        self.lesson_numbers.extend(fresh);
    }

    /// Swap a lesson with its neighbour; no-op at either boundary or when
    /// the number is not in the unit.
    pub fn move_lesson(&mut self, number: &str, up: bool) -> bool {
        let Some(idx) = self.lesson_numbers.iter().position(|n| n == number) else {
            return false;
        };
        if up {
            if idx == 0 {
                return false;
            }
            self.lesson_numbers.swap(idx, idx - 1);
        } else {
            if idx + 1 >= self.lesson_numbers.len() {
                return false;
            }
            self.lesson_numbers.swap(idx, idx + 1);
        }
        true
    }
}

/// Derived per-unit totals; missing lessons contribute zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStats {
    pub total_duration: i64,
    pub total_activities: i64,
}

pub fn unit_stats(lessons: &BTreeMap<String, Lesson>, numbers: &[String]) -> UnitStats {
    let mut stats = UnitStats::default();
    for number in numbers {
        if let Some(lesson) = lessons.get(number) {
            stats.total_duration += lesson.total_time;
            stats.total_activities += lesson.activity_count() as i64;
        }
    }
    stats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Planned,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(Self::Planned),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A catalog activity materialized into a plan. The instance id lets the
/// same catalog entry appear twice in one plan and be edited independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanActivity {
    pub instance_id: String,
    #[serde(flatten)]
    pub activity: Activity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub id: String,
    /// ISO date, `YYYY-MM-DD`. Callers may hand in a full timestamp; only
    /// the calendar day is kept for placement.
    pub date: String,
    pub week: i64,
    pub class_name: String,
    #[serde(default)]
    pub activities: Vec<PlanActivity>,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub notes: String,
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<HalfTerm>,
}

impl LessonPlan {
    pub fn new_for_date(date: &str, class_name: &str) -> Self {
        let date = calendar::date_part(date).to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            week: calendar::week_number_str(&date),
            date,
            class_name: class_name.to_string(),
            activities: Vec::new(),
            duration: 0,
            notes: String::new(),
            status: PlanStatus::Planned,
            unit_id: None,
            unit_name: None,
            lesson_number: None,
            title: None,
            term: None,
        }
    }

    pub fn matches_day(&self, date: &str, class_name: &str) -> bool {
        calendar::date_part(&self.date) == calendar::date_part(date)
            && self.class_name == class_name
    }

    /// Clone the activity in with a fresh instance id; duration moves with
    /// the activity list in the same call.
    pub fn add_activity(&mut self, activity: Activity) -> &PlanActivity {
        self.duration += activity.time;
        self.activities.push(PlanActivity {
            instance_id: Uuid::new_v4().to_string(),
            activity,
        });
        self.activities.last().expect("just pushed")
    }

    /// Remove by position. Decrements duration by the removed activity's own
    /// time so the invariant holds without a full recompute.
    pub fn remove_activity(&mut self, index: usize) -> Option<PlanActivity> {
        if index >= self.activities.len() {
            return None;
        }
        let removed = self.activities.remove(index);
        self.duration -= removed.activity.time;
        removed.into()
    }

    pub fn reorder_activity(&mut self, from: usize, to: usize) -> bool {
        reorder(&mut self.activities, from, to)
    }
}

/// Splice-style move: remove at `from`, reinsert at `to`. Out-of-range
/// indices are a no-op rather than a panic.
pub fn reorder<T>(list: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= list.len() || to >= list.len() {
        return false;
    }
    let item = list.remove(from);
    list.insert(to, item);
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplaySettings {
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub custom_theme: bool,
}
