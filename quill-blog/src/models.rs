use std::time::{SystemTime, UNIX_EPOCH};

use quill_orm::Model;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current unix time in seconds.
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

/// A 50-character id that sorts by creation time: 15-digit milliseconds, 32 hex
/// digits of a random uuid, then `000`.
pub fn next_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("{:015}{}000", millis, Uuid::new_v4().simple())
}

#[derive(Model, Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[quill(table = "users")]
pub struct User {
    #[field(string(50), primary_key, default_with = next_id)]
    pub id: Option<String>,
    #[field(string(50))]
    pub email: Option<String>,
    #[field(string(50))]
    pub passwd: Option<String>,
    #[field(boolean)]
    pub admin: Option<bool>,
    #[field(string(50))]
    pub name: Option<String>,
    #[field(string(500))]
    pub image: Option<String>,
    #[field(float, default_with = now)]
    pub created_at: Option<f64>,
}

#[derive(Model, Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[quill(table = "blogs")]
pub struct Blog {
    #[field(string(50), primary_key, default_with = next_id)]
    pub id: Option<String>,
    #[field(string(50))]
    pub user_id: Option<String>,
    #[field(string(50))]
    pub user_name: Option<String>,
    #[field(string(500))]
    pub user_image: Option<String>,
    #[field(string(50))]
    pub name: Option<String>,
    #[field(string(200))]
    pub summary: Option<String>,
    #[field(text)]
    pub content: Option<String>,
    #[field(float, default_with = now)]
    pub created_at: Option<f64>,
}

#[derive(Model, Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[quill(table = "comments")]
pub struct Comment {
    #[field(string(50), primary_key, default_with = next_id)]
    pub id: Option<String>,
    #[field(string(50))]
    pub blog_id: Option<String>,
    #[field(string(50))]
    pub user_id: Option<String>,
    #[field(string(50))]
    pub user_name: Option<String>,
    #[field(string(500))]
    pub user_image: Option<String>,
    #[field(text)]
    pub content: Option<String>,
    #[field(float, default_with = now)]
    pub created_at: Option<f64>,
}

#[cfg(test)]
mod tests {
    use quill_core::test_utils::memory_gateway;
    use quill_orm::prelude::*;

    use super::*;

    #[test]
    fn ids_are_fifty_chars_and_time_ordered() {
        let first = next_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = next_id();
        assert_eq!(first.len(), 50);
        assert!(first.ends_with("000"));
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(first < second);
    }

    #[test]
    fn schemas_match_the_tables() {
        let users = User::register().unwrap();
        assert_eq!(users.table_name(), "users");
        assert_eq!(users.primary_key(), "id");
        let blogs = Blog::register().unwrap();
        assert_eq!(blogs.field("content").unwrap().ddl(), "text");
        assert_eq!(blogs.field("summary").unwrap().ddl(), "varchar(200)");
        assert_eq!(Comment::register().unwrap().table_name(), "comments");
    }

    #[tokio::test]
    async fn save_fills_id_and_timestamp() {
        let db = memory_gateway().await.unwrap();
        Blog::create_table(&db).await.unwrap();
        let before = now();
        let mut blog = Blog {
            name: Some("First".into()),
            ..Default::default()
        };
        assert_eq!(blog.save(&db).await.unwrap(), 1);

        let id = blog.id.clone().unwrap();
        assert_eq!(id.len(), 50);
        assert!(blog.created_at.unwrap() >= before);
        let stored = Blog::find(&db, id.as_str()).await.unwrap().unwrap();
        assert_eq!(stored, blog);
    }
}
