use crate::client::{DbClient, DbError};
use gazette_common::{
    model::{
        Id,
        auth::{AuthToken, Authentication},
        comment::CreateComment,
        group::{CreateGroup, Group, GroupSlug, GroupTitle},
        post::{CreatePost, PostContent, PostMarker},
        user::{CreateUser, User, UserHandle},
    },
    page::{POSTS_PER_PAGE, Paginator},
    util::PositiveDuration,
};
use time::{Duration, OffsetDateTime, UtcDateTime, macros::datetime};

async fn db() -> DbClient {
    let db = DbClient::connect_in_memory().await.unwrap();
    db.migrate().await.unwrap();
    db
}

async fn user(db: &DbClient, handle: &str) -> User {
    db.create_user(&CreateUser {
        handle: UserHandle::new(handle.to_owned()).unwrap(),
        password_hash: "not-a-real-hash".to_owned(),
    })
    .await
    .unwrap()
}

async fn group(db: &DbClient, slug: &str) -> Group {
    db.create_group(&CreateGroup {
        title: GroupTitle::new("Test group".to_owned()).unwrap(),
        slug: GroupSlug::new(slug.to_owned()).unwrap(),
        description: "Test description".to_owned(),
    })
    .await
    .unwrap()
}

async fn post(db: &DbClient, author: &User, text: &str, group: Option<&Group>) -> Id<PostMarker> {
    db.create_post(&CreatePost {
        author: author.id,
        content: PostContent {
            text: text.to_owned(),
            group: group.map(|group| group.id),
            image: None,
        },
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn post_round_trip() {
    let db = db().await;
    let author = user(&db, "tester").await;
    let group = group(&db, "test-slug").await;

    let id = post(&db, &author, "Test post", Some(&group)).await;
    let post = db.fetch_post(id).await.unwrap().unwrap();

    assert_eq!(post.id, id);
    assert_eq!(post.text, "Test post");
    assert_eq!(post.author, author);
    assert_eq!(post.group, Some(group));
    assert_eq!(post.image, None);
    assert!(db.fetch_post(Id::new(9999)).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_text_is_not_rejected_by_storage() {
    let db = db().await;
    let author = user(&db, "tester").await;

    let id = post(&db, &author, "", None).await;

    assert_eq!(db.fetch_post(id).await.unwrap().unwrap().text, "");
}

#[tokio::test]
async fn duplicate_handles_are_rejected() {
    let db = db().await;
    user(&db, "tester").await;

    let result = db
        .create_user(&CreateUser {
            handle: UserHandle::new("tester".to_owned()).unwrap(),
            password_hash: String::new(),
        })
        .await;

    assert!(matches!(result, Err(DbError::HandleTaken(_))));
}

#[tokio::test]
async fn posts_are_listed_newest_first() {
    let db = db().await;
    let author = user(&db, "tester").await;
    let start = datetime!(2025-10-24 10:00 UTC);

    for minutes in [5, 1, 3] {
        db.create_post_at(
            &CreatePost {
                author: author.id,
                content: PostContent {
                    text: format!("Posted at minute {minutes}"),
                    ..PostContent::default()
                },
            },
            start + Duration::minutes(minutes),
        )
        .await
        .unwrap();
    }

    let window = Paginator::new(3, POSTS_PER_PAGE).get_page(None);
    let texts: Vec<_> = db
        .fetch_posts(window)
        .await
        .unwrap()
        .into_iter()
        .map(|post| post.text)
        .collect();

    assert_eq!(
        texts,
        ["Posted at minute 5", "Posted at minute 3", "Posted at minute 1"]
    );
}

#[tokio::test]
async fn pages_of_thirteen_posts() {
    let db = db().await;
    let author = user(&db, "tester").await;
    for number in 0..13 {
        post(&db, &author, &format!("Test post number {number}"), None).await;
    }

    let paginator = Paginator::new(db.count_posts().await.unwrap(), POSTS_PER_PAGE);
    let first = db.fetch_posts(paginator.get_page(None)).await.unwrap();
    let second = db.fetch_posts(paginator.get_page(Some("2"))).await.unwrap();

    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 3);
    assert_eq!(first[0].text, "Test post number 12");
    assert_eq!(second[2].text, "Test post number 0");
}

#[tokio::test]
async fn user_and_group_listings() {
    let db = db().await;
    let tester = user(&db, "tester").await;
    let other = user(&db, "other").await;
    let group = group(&db, "test-slug").await;

    post(&db, &tester, "In group", Some(&group)).await;
    post(&db, &tester, "No group", None).await;
    post(&db, &other, "Other in group", Some(&group)).await;

    assert_eq!(db.count_user_posts(tester.id).await.unwrap(), 2);

    let window = Paginator::new(2, POSTS_PER_PAGE).get_page(None);
    let user_posts = db.fetch_user_posts(tester.id, window).await.unwrap();
    assert!(user_posts.iter().all(|post| post.author == tester));

    let group_posts = db.fetch_group_posts(group.id, window).await.unwrap();
    assert_eq!(group_posts.len(), 2);
    assert!(
        group_posts
            .iter()
            .all(|post| post.group.as_ref() == Some(&group))
    );
}

#[tokio::test]
async fn update_keeps_pub_date() {
    let db = db().await;
    let author = user(&db, "tester").await;
    let group = group(&db, "test-slug").await;
    let id = post(&db, &author, "Before", None).await;
    let before = db.fetch_post(id).await.unwrap().unwrap();

    let updated = db
        .update_post(
            id,
            author.id,
            &PostContent {
                text: "After".to_owned(),
                group: Some(group.id),
                image: None,
            },
        )
        .await
        .unwrap();
    assert!(updated);

    let after = db.fetch_post(id).await.unwrap().unwrap();
    assert_eq!(after.text, "After");
    assert_eq!(after.group, Some(group));
    assert_eq!(after.pub_date, before.pub_date);
    assert_eq!(db.count_posts().await.unwrap(), 1);
}

#[tokio::test]
async fn deleting_group_keeps_posts() {
    let db = db().await;
    let author = user(&db, "tester").await;
    let group = group(&db, "test-slug").await;
    let id = post(&db, &author, "In group", Some(&group)).await;

    assert!(db.delete_group(group.id).await.unwrap());

    let post = db.fetch_post(id).await.unwrap().unwrap();
    assert_eq!(post.group, None);
    assert!(db.fetch_group_by_slug(&group.slug).await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_user_cascades() {
    let db = db().await;
    let author = user(&db, "author").await;
    let reader = user(&db, "reader").await;
    let authored = post(&db, &author, "By author", None).await;
    let read = post(&db, &reader, "By reader", None).await;

    for (post, commenter) in [(authored, &reader), (read, &author)] {
        db.create_comment(&CreateComment {
            post,
            author: commenter.id,
            text: "A comment".to_owned(),
        })
        .await
        .unwrap();
    }
    db.follow(reader.id, author.id).await.unwrap();
    assert_eq!(db.count_comments().await.unwrap(), 2);

    assert!(db.delete_user(author.id).await.unwrap());

    assert!(db.fetch_post(authored).await.unwrap().is_none());
    assert!(db.fetch_post(read).await.unwrap().is_some());
    assert_eq!(db.count_comments().await.unwrap(), 0);
    assert_eq!(db.count_follows(reader.id, author.id).await.unwrap(), 0);
}

#[tokio::test]
async fn comments_newest_first() {
    let db = db().await;
    let author = user(&db, "tester").await;
    let id = post(&db, &author, "Commented", None).await;

    for text in ["first", "second", "third"] {
        db.create_comment(&CreateComment {
            post: id,
            author: author.id,
            text: text.to_owned(),
        })
        .await
        .unwrap();
    }

    let texts: Vec<_> = db
        .fetch_post_comments(id)
        .await
        .unwrap()
        .into_iter()
        .map(|comment| comment.text)
        .collect();
    assert_eq!(texts, ["third", "second", "first"]);

    assert!(db.delete_post(id).await.unwrap());
    assert_eq!(db.count_comments().await.unwrap(), 0);
}

#[tokio::test]
async fn follow_pairs_are_unique() {
    let db = db().await;
    let user_a = user(&db, "tester1").await;
    let user_b = user(&db, "tester2").await;

    db.create_follow(user_a.id, user_b.id).await.unwrap();
    let duplicate = db.create_follow(user_a.id, user_b.id).await;
    assert!(matches!(
        duplicate,
        Err(DbError::DuplicateFollow(follow)) if follow.user == user_a.id && follow.author == user_b.id
    ));

    assert!(!db.follow(user_a.id, user_b.id).await.unwrap());
    assert_eq!(db.count_follows(user_a.id, user_b.id).await.unwrap(), 1);

    assert!(db.unfollow(user_a.id, user_b.id).await.unwrap());
    assert!(!db.unfollow(user_a.id, user_b.id).await.unwrap());
    assert_eq!(db.count_follows(user_a.id, user_b.id).await.unwrap(), 0);

    // Only the view layer forbids following yourself.
    assert!(db.follow(user_a.id, user_a.id).await.unwrap());
    assert!(db.is_following(user_a.id, user_a.id).await.unwrap());
}

#[tokio::test]
async fn feed_contains_followed_authors_only() {
    let db = db().await;
    let author = user(&db, "tester1").await;
    let follower = user(&db, "tester2").await;
    let stranger = user(&db, "tester3").await;

    db.follow(follower.id, author.id).await.unwrap();
    post(&db, &stranger, "Unrelated", None).await;
    let followed = post(&db, &author, "Followed", None).await;

    let window = Paginator::new(10, POSTS_PER_PAGE).get_page(None);
    let feed = db.fetch_feed_posts(follower.id, window).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, followed);
    assert_eq!(db.count_feed_posts(follower.id).await.unwrap(), 1);

    assert!(db.fetch_feed_posts(stranger.id, window).await.unwrap().is_empty());
    assert_eq!(db.count_feed_posts(stranger.id).await.unwrap(), 0);
}

#[tokio::test]
async fn authentication_round_trip() {
    let db = db().await;
    let owner = user(&db, "tester").await;
    let token = AuthToken::generate_random(owner.id);
    let token_hash = token.hash().unwrap();
    let created_at = UtcDateTime::now();

    db.create_auth(&Authentication {
        user: owner.id,
        token_hash: token_hash.clone(),
        created_at,
        expires_after: PositiveDuration::new(Duration::hours(1)),
    })
    .await
    .unwrap();

    let authentication = db.fetch_auth(&token_hash).await.unwrap().unwrap();
    assert_eq!(authentication.user, owner.id);
    assert_eq!(authentication.token_hash, token_hash);
    assert_eq!(authentication.expires_after, PositiveDuration::new(Duration::hours(1)));
    assert!(!authentication.is_expired_at(created_at + Duration::minutes(30)));

    assert!(db.delete_auth(&token_hash).await.unwrap());
    assert!(db.fetch_auth(&token_hash).await.unwrap().is_none());
}

#[tokio::test]
async fn media_paths_get_suffixes() {
    let db = db().await;

    let first = db
        .store_media("posts", "small.gif", "image/gif", b"GIF89a first")
        .await
        .unwrap();
    let second = db
        .store_media("posts", "small.gif", "image/gif", b"GIF89a second")
        .await
        .unwrap();

    assert_eq!(first.get(), "posts/small.gif");
    assert_ne!(second, first);
    assert!(second.get().starts_with("posts/small_"));

    let media = db.fetch_media(&second).await.unwrap().unwrap();
    assert_eq!(media.content_type, "image/gif");
    assert_eq!(media.data, b"GIF89a second");
}

#[tokio::test]
async fn pub_date_is_recent() {
    let db = db().await;
    let author = user(&db, "tester").await;
    let before = OffsetDateTime::now_utc() - Duration::seconds(1);

    let id = post(&db, &author, "Now", None).await;

    let post = db.fetch_post(id).await.unwrap().unwrap();
    assert!(post.pub_date >= before);
    assert!(post.pub_date <= OffsetDateTime::now_utc() + Duration::seconds(1));
}
