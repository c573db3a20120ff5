//! Prompt construction and response parsing for the daily summary.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::records::{Block, Entry};

/// Label for entries without a category
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Colour for entries without a category
pub const UNCATEGORIZED_COLOR: &str = "#6b7280";

const INSTRUCTIONS: &str = r##"You are a concise work-log summarizer. Given the following daily work entries grouped by category, produce a brief summary with highlights for each category.

Return a JSON object with this exact structure:
{
  "categories": [
    {
      "name": "Category Name",
      "color": "#hexcolor",
      "highlights": ["Brief highlight 1", "Brief highlight 2"]
    }
  ]
}

Rules:
- Keep each highlight to 1 short sentence
- Only include categories that have entries
- Preserve the original category names and colors
- Summarize, don't just repeat the entries verbatim
- Maximum 3-4 highlights per category

Here are today's entries:
"##;

/// Parsed model answer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Summary {
    /// One section per category
    pub categories: Vec<SummaryCategory>,
}

/// One category section of the summary
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SummaryCategory {
    /// Category name
    pub name: String,
    /// Category colour
    #[serde(default = "default_color")]
    pub color: String,
    /// Short sentences
    pub highlights: Vec<String>,
}

fn default_color() -> String {
    UNCATEGORIZED_COLOR.to_string()
}

struct Group<'a> {
    name: &'a str,
    color: &'a str,
    items: Vec<(Option<&'a str>, Vec<&'a str>)>,
}

/// Build the prompt for a set of user entries and their blocks
///
/// Entries are grouped by category in order of first appearance. Only
/// non-blank text blocks are included.
pub fn build_prompt(entries: &[(Entry, Vec<Block>)]) -> String {
    let mut groups: Vec<Group<'_>> = Vec::new();

    for (entry, blocks) in entries {
        let name = entry.category_name.as_deref().unwrap_or(UNCATEGORIZED);
        let color = entry.category_color.as_deref().unwrap_or(UNCATEGORIZED_COLOR);
        let texts: Vec<&str> = blocks
            .iter()
            .filter_map(|b| b.content.as_text())
            .filter(|t| !t.trim().is_empty())
            .collect();

        let index = match groups.iter().position(|g| g.name == name) {
            Some(i) => i,
            None => {
                groups.push(Group {
                    name,
                    color,
                    items: Vec::new(),
                });
                groups.len() - 1
            }
        };
        groups[index].items.push((entry.title.as_deref(), texts));
    }

    let mut body = String::new();
    for group in &groups {
        body.push_str(&format!("\n## {} (color: {})\n", group.name, group.color));
        for (title, texts) in &group.items {
            if let Some(title) = (*title).filter(|t| !t.is_empty()) {
                body.push_str(&format!("- **{}**\n", title));
            }
            for text in texts {
                body.push_str(&format!("  {}\n", text));
            }
        }
    }

    format!("{}{}", INSTRUCTIONS, body)
}

/// Parse the model's JSON answer
pub fn parse_summary(text: &str) -> Result<Summary> {
    let summary: Summary = serde_json::from_str(text.trim())
        .map_err(|e| Error::LlmInvalidResponse(format!("Invalid summary structure: {}", e)))?;

    if summary.categories.iter().any(|c| c.name.trim().is_empty()) {
        return Err(Error::LlmInvalidResponse(
            "Invalid category in summary response".to_string(),
        ));
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Author, BlockContent, ParentRef};
    use chrono::NaiveDate;

    fn ts() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn entry(id: i64, category: Option<(&str, &str)>, title: Option<&str>) -> Entry {
        Entry {
            id,
            daily_note_id: 1,
            category_id: category.map(|_| id),
            title: title.map(str::to_string),
            is_ai_generated: false,
            source_entry_ids: None,
            created_at: ts(),
            updated_at: ts(),
            category_name: category.map(|c| c.0.to_string()),
            category_color: category.map(|c| c.1.to_string()),
        }
    }

    fn block(parent: i64, content: BlockContent) -> Block {
        Block {
            id: 0,
            parent: ParentRef::entry(parent),
            content,
            position: 0,
            author: Author::User,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    #[test]
    fn test_prompt_groups_by_category() {
        let progress = Some(("Progress", "#22c55e"));
        let entries = vec![
            (
                entry(1, progress, Some("API")),
                vec![
                    block(1, BlockContent::text("wired auth")),
                    block(1, BlockContent::text("   ")),
                    block(
                        1,
                        BlockContent::CategoryHeading {
                            name: "x".into(),
                            color: "y".into(),
                        },
                    ),
                ],
            ),
            (entry(2, None, None), vec![block(2, BlockContent::text("misc"))]),
            (entry(3, progress, None), vec![block(3, BlockContent::text("docs"))]),
        ];

        let prompt = build_prompt(&entries);
        let body = prompt.split("Here are today's entries:").nth(1).unwrap();
        assert_eq!(
            body,
            "\n\n## Progress (color: #22c55e)\n- **API**\n  wired auth\n  docs\n\n## Uncategorized (color: #6b7280)\n  misc\n"
        );
    }

    #[test]
    fn test_parse_summary() {
        let summary = parse_summary(
            r##"{"categories":[{"name":"Progress","color":"#22c55e","highlights":["Shipped"]},{"name":"Idea","highlights":[]}]}"##,
        )
        .unwrap();
        assert_eq!(summary.categories.len(), 2);
        assert_eq!(summary.categories[0].highlights, vec!["Shipped"]);
        assert_eq!(summary.categories[1].color, UNCATEGORIZED_COLOR);
    }

    #[test]
    fn test_parse_summary_rejects_bad_shapes() {
        for bad in [
            "not json",
            r#"{"summary":"x"}"#,
            r#"{"categories":{"name":"x"}}"#,
            r#"{"categories":[{"name":"x","highlights":"one"}]}"#,
            r#"{"categories":[{"name":"","highlights":[]}]}"#,
        ] {
            assert!(
                matches!(parse_summary(bad), Err(Error::LlmInvalidResponse(_))),
                "accepted {bad}"
            );
        }
    }
}
