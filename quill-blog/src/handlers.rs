use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use quill_orm::integrations::axum::{ApiError, Args, QuillState};
use quill_orm::prelude::*;
use quill_orm::sqlx::Sqlite;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::models::{Blog, Comment, User};
use crate::page::{Page, page_index};

type Db = State<Gateway<Sqlite>>;

pub fn router(db: Gateway<Sqlite>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/users", get(api_get_users))
        .route("/api/blogs", get(api_get_blogs).post(api_create_blog))
        .route("/api/blogs/{id}", get(api_get_blog))
        .route("/api/blogs/{id}/comments", get(api_get_comments))
        .with_state(QuillState::new(db))
}

#[derive(Debug, Deserialize)]
struct PageArgs {
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ById {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreateBlog {
    name: String,
    summary: String,
    content: String,
}

/// Counts the table and loads one page of it, newest first.
async fn paged<M: Model>(db: &Gateway<Sqlite>, raw_page: Option<&str>) -> OrmResult<(Page, Vec<M>)> {
    let total = match M::find_number(db, "count(id)", None, vec![]).await? {
        Some(value) => i64::from_value(value)?,
        None => 0,
    };
    let page = Page::new(
        u32::try_from(total).unwrap_or(u32::MAX),
        page_index(raw_page),
        Page::DEFAULT_SIZE,
    );
    if page.limit == 0 {
        return Ok((page, Vec::new()));
    }
    let items = M::find_all(
        db,
        FindAll::new()
            .order_by("created_at desc")
            .limit(Limit::range(page.offset, page.limit)),
    )
    .await?;
    Ok((page, items))
}

async fn blog_or_not_found(db: &Gateway<Sqlite>, id: &str) -> Result<Blog, ApiError> {
    Blog::find(db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog", "Blog not found."))
}

fn required(field: &str, value: String) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::value_invalid(field, format!("{} cannot be empty.", field)));
    }
    Ok(value.to_string())
}

async fn index(State(db): Db) -> Result<Json<JsonValue>, ApiError> {
    let blogs = Blog::find_all(
        &db,
        FindAll::new()
            .order_by("created_at desc")
            .limit(Limit::Count(Page::DEFAULT_SIZE)),
    )
    .await?;
    Ok(Json(json!({ "blogs": blogs })))
}

async fn api_get_users(State(db): Db, Args(args): Args<PageArgs>) -> Result<Json<JsonValue>, ApiError> {
    let (page, mut users) = paged::<User>(&db, args.page.as_deref()).await?;
    for user in &mut users {
        user.passwd = Some("******".to_string());
    }
    Ok(Json(json!({ "page": page, "users": users })))
}

async fn api_get_blogs(State(db): Db, Args(args): Args<PageArgs>) -> Result<Json<JsonValue>, ApiError> {
    let (page, blogs) = paged::<Blog>(&db, args.page.as_deref()).await?;
    Ok(Json(json!({ "page": page, "blogs": blogs })))
}

async fn api_get_blog(State(db): Db, Args(args): Args<ById>) -> Result<Json<Blog>, ApiError> {
    Ok(Json(blog_or_not_found(&db, &args.id).await?))
}

async fn api_create_blog(State(db): Db, Args(args): Args<CreateBlog>) -> Result<Json<Blog>, ApiError> {
    let mut blog = Blog {
        name: Some(required("name", args.name)?),
        summary: Some(required("summary", args.summary)?),
        content: Some(required("content", args.content)?),
        ..Default::default()
    };
    blog.save(&db).await?;
    tracing::info!("created blog {:?}", blog.id);
    Ok(Json(blog))
}

async fn api_get_comments(State(db): Db, Args(args): Args<ById>) -> Result<Json<JsonValue>, ApiError> {
    let blog = blog_or_not_found(&db, &args.id).await?;
    let comments = Comment::find_all(
        &db,
        FindAll::new()
            .filter_eq("blog_id", blog.id)
            .order_by("created_at desc"),
    )
    .await?;
    Ok(Json(json!({ "comments": comments })))
}
