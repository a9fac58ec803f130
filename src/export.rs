use std::collections::BTreeMap;

use serde::Serialize;

use crate::calendar::HalfTerm;
use crate::model::{category_color, Category, Lesson, ResourceLinks};

/// Rendered page height budget in layout units. The rasterizer owns real
/// measurement; these estimates only decide where page breaks fall.
pub const PAGE_HEIGHT: i64 = 760;

const COVER_HEIGHT: i64 = 120;
const LESSON_HEADER_HEIGHT: i64 = 48;
const CATEGORY_HEADER_HEIGHT: i64 = 28;
const ACTIVITY_BASE_HEIGHT: i64 = 22;
const ACTIVITY_LINE_HEIGHT: i64 = 12;
const CHARS_PER_LINE: usize = 80;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityBlock {
    pub name: String,
    pub time: i64,
    pub description: String,
    #[serde(skip_serializing_if = "ResourceLinks::is_empty")]
    pub links: ResourceLinks,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySection {
    pub name: String,
    pub color: String,
    pub activities: Vec<ActivityBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSection {
    pub lesson_number: String,
    pub title: String,
    pub total_time: i64,
    pub categories: Vec<CategorySection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverSection {
    pub title: String,
    pub subtitle: String,
    pub lesson_numbers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    Cover,
    LessonHeader,
    CategoryHeader,
    Activity,
}

/// One layout block in reading order, with its estimated height. The
/// paginator only looks at heights; labels are for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutBlock {
    pub kind: BlockKind,
    pub label: String,
    pub height: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportModel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<CoverSection>,
    pub lessons: Vec<LessonSection>,
    pub pages: Vec<Vec<LayoutBlock>>,
}

/// Drop tags and decode the handful of entities the rich-text editor emits.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn activity_height(description: &str) -> i64 {
    let lines = (description.chars().count() + CHARS_PER_LINE - 1) / CHARS_PER_LINE;
    ACTIVITY_BASE_HEIGHT + ACTIVITY_LINE_HEIGHT * lines as i64
}

pub fn lesson_section(number: &str, lesson: &Lesson, registry: &[Category]) -> LessonSection {
    let categories = lesson
        .category_order
        .iter()
        .filter_map(|cat| {
            let acts = lesson.grouped.get(cat)?;
            Some(CategorySection {
                name: cat.clone(),
                color: category_color(registry, cat).to_string(),
                activities: acts
                    .iter()
                    .map(|a| ActivityBlock {
                        name: a.name.clone(),
                        time: a.time,
                        description: strip_html(&a.description),
                        links: a.links.clone(),
                    })
                    .collect(),
            })
        })
        .collect();
    LessonSection {
        lesson_number: number.to_string(),
        title: lesson.display_title(number),
        total_time: lesson.total_time,
        categories,
    }
}

/// Running-Y watermark pagination: blocks flow down the page and a block
/// that would cross the bottom starts a new page. A block taller than a
/// whole page still gets a page to itself.
pub fn paginate(blocks: &[LayoutBlock], page_height: i64) -> Vec<Vec<LayoutBlock>> {
    let mut pages: Vec<Vec<LayoutBlock>> = Vec::new();
    let mut current: Vec<LayoutBlock> = Vec::new();
    let mut y = 0i64;
    for block in blocks {
        if y + block.height > page_height && !current.is_empty() {
            pages.push(std::mem::take(&mut current));
            y = 0;
        }
        y += block.height;
        current.push(block.clone());
    }
    if !current.is_empty() {
        pages.push(current);
    }
    pages
}

fn layout_blocks(cover: Option<&CoverSection>, lessons: &[LessonSection]) -> Vec<LayoutBlock> {
    let mut blocks = Vec::new();
    if let Some(cover) = cover {
        blocks.push(LayoutBlock {
            kind: BlockKind::Cover,
            label: cover.title.clone(),
            height: COVER_HEIGHT,
        });
    }
    for lesson in lessons {
        blocks.push(LayoutBlock {
            kind: BlockKind::LessonHeader,
            label: lesson.title.clone(),
            height: LESSON_HEADER_HEIGHT,
        });
        for cat in &lesson.categories {
            blocks.push(LayoutBlock {
                kind: BlockKind::CategoryHeader,
                label: cat.name.clone(),
                height: CATEGORY_HEADER_HEIGHT,
            });
            for act in &cat.activities {
                blocks.push(LayoutBlock {
                    kind: BlockKind::Activity,
                    label: act.name.clone(),
                    height: activity_height(&act.description),
                });
            }
        }
    }
    blocks
}

/// Single-lesson export: no cover section.
pub fn single_lesson_model(number: &str, lesson: &Lesson, registry: &[Category]) -> ExportModel {
    let section = lesson_section(number, lesson, registry);
    let pages = paginate(&layout_blocks(None, std::slice::from_ref(&section)), PAGE_HEIGHT);
    ExportModel {
        cover: None,
        lessons: vec![section],
        pages,
    }
}

/// Batch export for one half term: cover page, then the term's lessons that
/// actually exist in the repository, in scheme order.
pub fn half_term_model(
    term: HalfTerm,
    lessons: &BTreeMap<String, Lesson>,
    registry: &[Category],
) -> ExportModel {
    let mut sections = Vec::new();
    let mut numbers = Vec::new();
    for number in term.lesson_numbers() {
        if let Some(lesson) = lessons.get(&number) {
            sections.push(lesson_section(&number, lesson, registry));
            numbers.push(number);
        }
    }
    let cover = CoverSection {
        title: term.display_name().to_string(),
        subtitle: format!("{} lessons", sections.len()),
        lesson_numbers: numbers,
    };
    let pages = paginate(&layout_blocks(Some(&cover), &sections), PAGE_HEIGHT);
    ExportModel {
        cover: Some(cover),
        lessons: sections,
        pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Activity;

    fn act(name: &str, category: &str, time: i64, description: &str) -> Activity {
        Activity {
            name: name.to_string(),
            category: category.to_string(),
            time,
            description: description.to_string(),
            level: None,
            links: ResourceLinks::default(),
        }
    }

    fn lesson_with(categories: &[(&str, usize)]) -> Lesson {
        let mut lesson = Lesson::default();
        for (cat, count) in categories {
            let acts = (0..*count)
                .map(|i| act(&format!("{} act {}", cat, i), cat, 5, "<p>Step one.</p>"))
                .collect();
            lesson.grouped.insert(cat.to_string(), acts);
        }
        lesson.recompute();
        lesson
    }

    #[test]
    fn strip_html_flattens_markup() {
        assert_eq!(
            strip_html("<p>Clap <b>twice</b>,&nbsp;then rest.</p>"),
            "Clap twice, then rest."
        );
        assert_eq!(strip_html("plain"), "plain");
        assert_eq!(strip_html("a &amp; b"), "a & b");
    }

    #[test]
    fn sections_follow_category_order_with_registry_colors() {
        let mut lesson = lesson_with(&[("Rhythm", 1), ("Singing", 1)]);
        lesson.category_order = vec!["Singing".to_string(), "Rhythm".to_string()];
        let registry = Category::defaults();
        let section = lesson_section("4", &lesson, &registry);
        assert_eq!(section.title, "Lesson 4");
        assert_eq!(section.categories[0].name, "Singing");
        assert_eq!(section.categories[0].color, "#3B82F6");
        assert_eq!(section.categories[1].name, "Rhythm");
        assert_eq!(section.total_time, 10);
    }

    #[test]
    fn paginate_breaks_on_the_watermark() {
        let block = |h: i64| LayoutBlock {
            kind: BlockKind::Activity,
            label: "a".to_string(),
            height: h,
        };
        let blocks = vec![block(300), block(300), block(300)];
        let pages = paginate(&blocks, 760);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), 2);
        assert_eq!(pages[1].len(), 1);

        // Oversized block still lands on a page of its own.
        let pages = paginate(&[block(900)], 760);
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn half_term_model_has_cover_and_scheme_order() {
        let mut lessons = BTreeMap::new();
        lessons.insert("8".to_string(), lesson_with(&[("Singing", 2)]));
        lessons.insert("7".to_string(), lesson_with(&[("Rhythm", 1)]));
        lessons.insert("1".to_string(), lesson_with(&[("Games", 1)]));

        let registry = Category::defaults();
        let model = half_term_model(HalfTerm::A2, &lessons, &registry);
        let cover = model.cover.expect("cover");
        assert_eq!(cover.title, "Autumn 2");
        assert_eq!(cover.lesson_numbers, vec!["7", "8"]);
        assert_eq!(model.lessons.len(), 2);
        assert_eq!(model.lessons[0].lesson_number, "7");
        assert_eq!(model.pages[0][0].kind, BlockKind::Cover);

        let single = single_lesson_model("1", &lessons["1"], &registry);
        assert!(single.cover.is_none());
        assert_eq!(single.pages.len(), 1);
    }
}
