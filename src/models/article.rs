use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl FromStr for ArticleStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub body: String,
    pub category: String,
    pub author: String,
    pub author_id: Option<i64>,
    pub image_url: Option<String>,
    pub status: ArticleStatus,
    pub tags: Option<String>,
    pub featured: bool,
    pub source: Option<String>,
    pub views: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CreateArticle {
    #[serde(default)]
    pub title: String,
    pub slug: Option<String>,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub author: String,
    pub image_url: Option<String>,
    /// Defaults to published.
    pub status: Option<ArticleStatus>,
    pub tags: Option<String>,
    #[serde(default)]
    pub featured: bool,
    pub source: Option<String>,
}

/// Partial article update. For the nullable fields the outer `Option` records whether the
/// key was sent at all, so `"subtitle": null` clears the value while an absent key keeps it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateArticle {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub subtitle: Option<Option<String>>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
    pub status: Option<ArticleStatus>,
    #[serde(default, deserialize_with = "present")]
    pub tags: Option<Option<String>>,
    pub featured: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub source: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub category: Option<String>,
    pub status: Option<ArticleStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub total: i64,
}
