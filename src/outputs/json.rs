//! JSON output of ingested posts.
//!
//! Each source run is serialized to its own file, grouped by the local date
//! of the run:
//! ```text
//! json_output_dir/
//! └── 2025-05-12/
//!     ├── vecherka.json
//!     ├── omskregion.json
//!     └── rostof.json
//! ```
//!
//! Running the same source twice on one day overwrites its file.

use crate::models::Post;
use chrono::{Local, NaiveDate};
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write the posts of one source to `{json_output_dir}/{date}/{source_id}.json`.
///
/// Uses today's local date.
///
/// # Arguments
///
/// * `json_output_dir` - Base directory for JSON output
/// * `source_id` - Profile id, used as the file name
/// * `posts` - The posts to serialize, in feed order
///
/// # Returns
///
/// The path written, or an error if directory creation or file writing fails.
pub async fn write_posts(
    json_output_dir: &str,
    source_id: &str,
    posts: &[Post],
) -> Result<PathBuf, Box<dyn Error>> {
    write_posts_on(json_output_dir, Local::now().date_naive(), source_id, posts).await
}

#[instrument(level = "info", skip(posts), fields(count = posts.len()))]
async fn write_posts_on(
    json_output_dir: &str,
    date: NaiveDate,
    source_id: &str,
    posts: &[Post],
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(posts)?;

    let dir = PathBuf::from(json_output_dir).join(date.to_string());
    if let Err(e) = fs::create_dir_all(&dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = dir.join(format!("{source_id}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentItem;

    #[tokio::test]
    async fn test_write_posts_layout_and_content() {
        let base = std::env::temp_dir().join(format!("regional_news_json_{}", std::process::id()));
        let base_str = base.to_str().unwrap().to_string();
        let date = NaiveDate::from_ymd_opt(2025, 5, 12).unwrap();

        let mut post = Post::new(
            "vecherka",
            "Title",
            "Desc.",
            None,
            "https://vecherka.su/news/1",
            None,
        );
        post.items.push(ContentItem::Text {
            text: "Body".to_string(),
        });

        let path = write_posts_on(&base_str, date, "vecherka", &[post.clone()])
            .await
            .unwrap();
        assert_eq!(path, base.join("2025-05-12").join("vecherka.json"));

        let written = fs::read_to_string(&path).await.unwrap();
        let back: Vec<Post> = serde_json::from_str(&written).unwrap();
        assert_eq!(back, vec![post]);
        assert!(written.contains("\"type\": \"text\""));

        let _ = fs::remove_dir_all(&base).await;
    }
}
