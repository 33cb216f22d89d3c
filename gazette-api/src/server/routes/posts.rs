use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    cache::PageCache,
    render::{Json, RenderedPage, Template},
    routes::{PageQuery, post_url, profile_url},
};
use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::routing::{RouterExt, TypedPath};
use gazette_common::{
    form::{BoundForm, CleanedPost, CommentForm, PostForm},
    model::{
        Id,
        comment::{Comment, CreateComment},
        group::Group,
        media::{MediaPath, POST_IMAGE_DIRECTORY},
        post::{CreatePost, Post, PostContent, PostMarker},
    },
    page::{POSTS_PER_PAGE, Page, PageNumber, Paginator},
};
use gazette_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const POST_TITLE_LEN: usize = 30;
const POST_FORM_TEMPLATE: &str = "posts/create_post.html";

pub fn routes() -> ServerRouter {
    Router::new()
        .route("/", get(index))
        .route("/create/", get(create_form).post(create_post))
        .typed_get(post_detail)
        .typed_get(edit_form)
        .typed_post(edit_post)
        .typed_post(add_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(ServerError))]
struct PostDetailPath {
    id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/edit/", rejection(ServerError))]
struct EditPostPath {
    id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comment/", rejection(ServerError))]
struct AddCommentPath {
    id: Id<PostMarker>,
}

#[derive(Serialize)]
struct IndexContext {
    title: &'static str,
    page_obj: Page<Post>,
}

#[derive(Serialize)]
struct PostDetailContext {
    title: String,
    post: Post,
    comments: Vec<Comment>,
    form: BoundForm<CommentForm>,
    post_count: u64,
}

#[derive(Serialize)]
struct PostFormContext {
    form: BoundForm<PostForm>,
    groups: Vec<Group>,
    is_edit: bool,
    post_id: Option<Id<PostMarker>>,
}

async fn index(
    State(db): State<Arc<DbClient>>,
    State(cache): State<PageCache>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<RenderedPage> {
    let page = PageNumber::parse(page.as_deref());
    let key = format!("index?page={}", page.cache_key());

    let db = &*db;
    let rendered = cache
        .get_or_render(key, move || async move {
            let window = Paginator::new(db.count_posts().await?, POSTS_PER_PAGE).resolve(page);
            let posts = db.fetch_posts(window).await?;

            let context = IndexContext {
                title: "Latest updates",
                page_obj: window.into_page(posts),
            };
            Ok::<_, ServerError>(Template::new("posts/index.html", context).render()?)
        })
        .await?;

    Ok(RenderedPage(rendered))
}

async fn post_detail(
    PostDetailPath { id }: PostDetailPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Template<PostDetailContext>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    let comments = db.fetch_post_comments(id).await?;
    let post_count = db.count_user_posts(post.author.id).await?;

    let title = format!(
        "Post {}",
        post.text.chars().take(POST_TITLE_LEN).collect::<String>()
    );

    Ok(Template::new(
        "posts/post_detail.html",
        PostDetailContext {
            title,
            post,
            comments,
            form: BoundForm::default(),
            post_count,
        },
    ))
}

async fn create_form(
    State(db): State<Arc<DbClient>>,
    _user: AuthenticatedUser,
) -> Result<Template<PostFormContext>> {
    let groups = db.fetch_groups().await?;

    Ok(Template::new(
        POST_FORM_TEMPLATE,
        PostFormContext {
            form: BoundForm::default(),
            groups,
            is_edit: false,
            post_id: None,
        },
    ))
}

async fn create_post(
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Response> {
    let groups = db.fetch_groups().await?;

    let cleaned = match form.clean(&groups) {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            let context = PostFormContext {
                form: BoundForm::with_errors(form, errors),
                groups,
                is_edit: false,
                post_id: None,
            };
            return Ok(Template::new(POST_FORM_TEMPLATE, context).into_response());
        }
    };

    let image = store_image(&db, &cleaned).await?;
    let post = CreatePost {
        author: user.user_id(),
        content: PostContent {
            text: cleaned.text,
            group: cleaned.group,
            image,
        },
    };
    let id = db.create_post(&post).await?;
    info!(%id, author = %user.user(), "Post created");

    Ok(Redirect::to(&profile_url(&user.user().handle)).into_response())
}

async fn edit_form(
    EditPostPath { id }: EditPostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Response> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if post.author.id != user.user_id() {
        return Ok(Redirect::to(&post_url(id)).into_response());
    }

    let context = PostFormContext {
        form: BoundForm::unbound(PostForm::from_post(&post)),
        groups: db.fetch_groups().await?,
        is_edit: true,
        post_id: Some(id),
    };
    Ok(Template::new(POST_FORM_TEMPLATE, context).into_response())
}

async fn edit_post(
    EditPostPath { id }: EditPostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Response> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if post.author.id != user.user_id() {
        return Ok(Redirect::to(&post_url(id)).into_response());
    }

    let groups = db.fetch_groups().await?;
    let cleaned = match form.clean(&groups) {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            let context = PostFormContext {
                form: BoundForm::with_errors(form, errors),
                groups,
                is_edit: true,
                post_id: Some(id),
            };
            return Ok(Template::new(POST_FORM_TEMPLATE, context).into_response());
        }
    };

    let image = match store_image(&db, &cleaned).await? {
        Some(image) => Some(image),
        None => post.image,
    };
    let content = PostContent {
        text: cleaned.text,
        group: cleaned.group,
        image,
    };
    db.update_post(id, user.user_id(), &content).await?;
    info!(%id, author = %user.user(), "Post edited");

    Ok(Redirect::to(&post_url(id)).into_response())
}

async fn add_comment(
    AddCommentPath { id }: AddCommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    form: Result<Json<CommentForm>, ServerError>,
) -> Result<Redirect> {
    if db.fetch_post(id).await?.is_none() {
        return Err(ServerError::PostByIdNotFound(id));
    }

    let form = form.unwrap_or_else(|err| {
        debug!(error = %err, post = %id, "Unreadable comment body");
        Json(CommentForm::default())
    });

    if let Ok(text) = form.0.clean() {
        let comment = db
            .create_comment(&CreateComment {
                post: id,
                author: user.user_id(),
                text,
            })
            .await?;
        info!(id = %comment.id, post = %id, author = %user.user(), "Comment added");
    }

    Ok(Redirect::to(&post_url(id)))
}

async fn store_image(db: &DbClient, post: &CleanedPost) -> Result<Option<MediaPath>> {
    let Some(image) = &post.image else {
        return Ok(None);
    };

    let path = db
        .store_media(
            POST_IMAGE_DIRECTORY,
            &image.file_name,
            image.format.content_type(),
            &image.data,
        )
        .await?;
    Ok(Some(path))
}
