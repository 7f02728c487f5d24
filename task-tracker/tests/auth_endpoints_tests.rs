use axum::http::StatusCode;
use sea_orm::ConnectionTrait;
use task_tracker::auth::{AUTH_COOKIE, FLASH_COOKIE, encode_jwt};

mod common;

use common::{body_text, create_user, get, location, login, post_form, send, set_cookie, setup_app};

#[tokio::test]
async fn can_show_login_page() {
    let (app, _db) = setup_app().await;

    for uri in ["/", "/auth"] {
        let response = send(&app, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains(r#"name="login""#));
        assert!(body.contains(r#"name="remember_me""#));
    }
}

#[tokio::test]
async fn can_login_with_valid_credentials() {
    let (app, db) = setup_app().await;
    create_user(&db, "ivanov", "Иван Иванов").await;

    let response = send(
        &app,
        post_form("/auth", "login=ivanov&password=correct+horse", None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/open_tasks");
    let session_cookie = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(AUTH_COOKIE))
        .unwrap()
        .to_string();
    assert!(session_cookie.contains("HttpOnly"));
    assert!(!session_cookie.contains("Max-Age"));

    let cookie = set_cookie(&response, AUTH_COOKIE).unwrap();
    let response = send(&app, get("/open_tasks", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Иван Иванов"));
}

#[tokio::test]
async fn remember_me_makes_session_persistent() {
    let (app, db) = setup_app().await;
    create_user(&db, "ivanov", "Иван Иванов").await;

    let response = send(
        &app,
        post_form(
            "/auth",
            "login=ivanov&password=correct+horse&remember_me=on",
            None,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let session_cookie = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(AUTH_COOKIE))
        .unwrap()
        .to_string();
    assert!(session_cookie.contains("Max-Age=2592000"));
}

#[tokio::test]
async fn rejects_wrong_password_with_flash() {
    let (app, db) = setup_app().await;
    create_user(&db, "ivanov", "Иван Иванов").await;

    let response = send(&app, post_form("/auth", "login=ivanov&password=wrong", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth");
    assert_eq!(set_cookie(&response, AUTH_COOKIE), None);
    let flash = set_cookie(&response, FLASH_COOKIE).unwrap();

    let response = send(&app, get("/auth", Some(&flash))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookie(&response, FLASH_COOKIE).as_deref(), Some("flash="));
    assert!(
        body_text(response)
            .await
            .contains("Пожалуйста, проверьте свои данные для входа и попробуйте еще раз.")
    );
}

#[tokio::test]
async fn rejects_unknown_login() {
    let (app, _db) = setup_app().await;

    let response = send(&app, post_form("/auth", "login=ghost&password=x", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth");
    assert!(set_cookie(&response, FLASH_COOKIE).is_some());
}

#[tokio::test]
async fn login_page_without_flash_shows_no_notice() {
    let (app, _db) = setup_app().await;

    let response = send(&app, get("/auth", None)).await;

    assert_eq!(set_cookie(&response, FLASH_COOKIE), None);
    assert!(!body_text(response).await.contains("Пожалуйста"));
}

#[tokio::test]
async fn redirects_anonymous_visitors_to_login() {
    let (app, _db) = setup_app().await;

    for uri in [
        "/open_tasks",
        "/to-works",
        "/arh-tasks",
        "/create-task",
        "/stat",
        "/task/1/to_work",
        "/task/1/history",
    ] {
        let response = send(&app, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(location(&response), "/auth", "{}", uri);
    }
}

#[tokio::test]
async fn rejects_token_signed_with_other_secret() {
    let (app, db) = setup_app().await;
    let user = create_user(&db, "ivanov", "Иван Иванов").await;
    let token = encode_jwt(&user, "other_secret", chrono::Duration::hours(1)).unwrap();

    let response = send(
        &app,
        get("/open_tasks", Some(&format!("{}={}", AUTH_COOKIE, token))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth");
}

#[tokio::test]
async fn can_logout() {
    let (app, db) = setup_app().await;
    create_user(&db, "ivanov", "Иван Иванов").await;
    let cookie = login(&app, "ivanov").await;

    let response = send(&app, get("/logout", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth");
    assert_eq!(
        set_cookie(&response, AUTH_COOKIE).as_deref(),
        Some("auth_token=")
    );
}

#[tokio::test]
async fn logged_in_user_sees_link_on_login_page() {
    let (app, db) = setup_app().await;
    create_user(&db, "ivanov", "Иван Иванов").await;
    let cookie = login(&app, "ivanov").await;

    let response = send(&app, get("/auth", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Вы вошли как Иван Иванов"));
}

#[tokio::test]
async fn health_check_is_public() {
    let (app, _db) = setup_app().await;

    let response = send(&app, get("/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}

#[tokio::test]
async fn store_failure_during_session_lookup_is_server_error() {
    let (app, db) = setup_app().await;
    create_user(&db, "ivanov", "Иван Иванов").await;
    let cookie = login(&app, "ivanov").await;
    db.execute_unprepared("DROP TABLE users").await.unwrap();

    let response = send(&app, get("/open_tasks", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(location(&response), "");
}
