mod common;

use axum::http::StatusCode;
use common::{TestApp, ADMIN};
use serde_json::json;

#[tokio::test]
async fn post_like_comment_lifecycle() {
    let app = TestApp::new().await;
    let asha = app.login("cs1200123@iitd.ac.in", "Asha").await;
    let ravi = app.login("ee1210001@iitd.ac.in", "Ravi").await;

    let empty = app.post("/api/posts", &asha, json!({ "content": "   " })).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let created = app
        .post("/api/posts", &asha, json!({ "content": "Fest is on *Friday* <script>x</script>" }))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let post_id = created.body["id"].as_str().unwrap().to_owned();
    assert_eq!(created.body["author"]["name"], "Asha");
    let html = created.body["content_html"].as_str().unwrap();
    assert!(html.contains("<em>Friday</em>"));
    assert!(!html.contains("<script>"));

    let like = app.post(&format!("/api/posts/{post_id}/like"), &ravi, json!({})).await;
    assert_eq!(like.status, StatusCode::OK);
    assert_eq!(like.body, json!({ "like_count": 1, "liked": true }));
    let again = app.post(&format!("/api/posts/{post_id}/like"), &ravi, json!({})).await;
    assert_eq!(again.body["like_count"], 1);

    let comment = app
        .post(&format!("/api/posts/{post_id}/comments"), &ravi, json!({ "content": "see you there" }))
        .await;
    assert_eq!(comment.status, StatusCode::CREATED);
    let comment_id = comment.body["id"].as_str().unwrap().to_owned();

    let feed = app.get("/api/posts", &ravi).await;
    assert_eq!(feed.status, StatusCode::OK);
    let first = &feed.body[0];
    assert_eq!(first["id"], post_id.as_str());
    assert_eq!(first["like_count"], 1);
    assert_eq!(first["comment_count"], 1);
    assert_eq!(first["liked_by_me"], true);

    let seen_by_author = app.get(&format!("/api/posts/{post_id}"), &asha).await;
    assert_eq!(seen_by_author.body["liked_by_me"], false);

    let unlike = app.delete(&format!("/api/posts/{post_id}/like"), &ravi).await;
    assert_eq!(unlike.body, json!({ "like_count": 0, "liked": false }));

    // The post author may remove comments on their post.
    let removed = app.delete(&format!("/api/posts/{post_id}/comments/{comment_id}"), &asha).await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let comments = app.get(&format!("/api/posts/{post_id}/comments"), &ravi).await;
    assert_eq!(comments.body, json!([]));
}

#[tokio::test]
async fn only_author_or_admin_deletes() {
    let app = TestApp::new().await;
    let asha = app.login("cs1200123@iitd.ac.in", "Asha").await;
    let ravi = app.login("ee1210001@iitd.ac.in", "Ravi").await;
    let admin = app.login(ADMIN, "Admin").await;

    let first = app.post("/api/posts", &asha, json!({ "content": "one" })).await.body["id"].as_str().unwrap().to_owned();
    let second = app.post("/api/posts", &asha, json!({ "content": "two" })).await.body["id"].as_str().unwrap().to_owned();
    app.post(&format!("/api/posts/{first}/like"), &ravi, json!({})).await;
    app.post(&format!("/api/posts/{first}/comments"), &ravi, json!({ "content": "nice" })).await;

    let forbidden = app.delete(&format!("/api/posts/{first}"), &ravi).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let deleted = app.delete(&format!("/api/posts/{first}"), &asha).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&format!("/api/posts/{first}"), &asha).await.status, StatusCode::NOT_FOUND);

    let (likes,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM likes").fetch_one(&app.db_pool).await.unwrap();
    let (comments,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments").fetch_one(&app.db_pool).await.unwrap();
    assert_eq!((likes, comments), (0, 0));

    let by_admin = app.delete(&format!("/api/posts/{second}"), &admin).await;
    assert_eq!(by_admin.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn feed_pages_backwards_and_filters_by_author() {
    let app = TestApp::new().await;
    let asha = app.login("cs1200123@iitd.ac.in", "Asha").await;
    let ravi = app.login("ee1210001@iitd.ac.in", "Ravi").await;
    let ravi_id = app.get("/api/users/me", &ravi).await.body["id"].as_str().unwrap().to_owned();

    app.post("/api/posts", &asha, json!({ "content": "from asha" })).await;
    app.post("/api/posts", &ravi, json!({ "content": "from ravi" })).await;

    let only_ravi = app.get(&format!("/api/posts?author={ravi_id}"), &asha).await;
    let posts = only_ravi.body.as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["content"], "from ravi");

    let page = app.get("/api/posts?limit=1", &asha).await;
    let newest = page.body.as_array().unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0]["content"], "from ravi");

    let older = app.get(&format!("/api/posts?limit=1&before={}", newest[0]["id"].as_str().unwrap()), &asha).await;
    assert_eq!(older.body.as_array().unwrap().len(), 1);
    assert_eq!(older.body[0]["content"], "from asha");

    let oldest = app.get(&format!("/api/posts?before={}", older.body[0]["id"].as_str().unwrap()), &asha).await;
    assert_eq!(oldest.body, json!([]));
}

#[tokio::test]
async fn unknown_post_is_not_found() {
    let app = TestApp::new().await;
    let asha = app.login("cs1200123@iitd.ac.in", "Asha").await;
    let id = uuid::Uuid::now_v7();

    assert_eq!(app.post(&format!("/api/posts/{id}/like"), &asha, json!({})).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/api/posts/{id}/comments"), &asha).await.status, StatusCode::NOT_FOUND);
}
