//! Admin site integration tests

mod common;

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use polls::admin::AdminSite;
use polls::app_config::AppConfig;
use polls::orm::{choices, questions};
use sea_orm::{EntityTrait, PaginatorTrait};
use serial_test::serial;

macro_rules! admin_app {
    ($db:expr, $site:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($db))
                .app_data(web::Data::new($site))
                .configure(polls::web::admin::configure),
        )
        .await
    };
}

async fn body_of<B: MessageBody>(resp: ServiceResponse<B>) -> String {
    let body = test::read_body(resp).await;
    String::from_utf8(body.to_vec()).unwrap()
}

fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

#[actix_rt::test]
#[serial]
async fn test_dashboard_counts() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let question = common::fixtures::create_question(&db, "Favourite colour", -1)
        .await
        .expect("Failed to create question");
    common::fixtures::create_choice(&db, question.id, "Red", 0)
        .await
        .expect("Failed to create choice");
    let app = admin_app!(db, AdminSite::default());

    let req = test::TestRequest::get().uri("/admin/").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_of(resp).await;
    assert!(body.contains("Site administration"));
    assert!(body.contains("<td>1</td>"));
}

#[actix_rt::test]
#[serial]
async fn test_question_list_search_is_case_insensitive() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    common::fixtures::create_question(&db, "Favourite colour", -1)
        .await
        .expect("Failed to create question");
    common::fixtures::create_question(&db, "Best food", -2)
        .await
        .expect("Failed to create question");
    let app = admin_app!(db, AdminSite::default());

    let req = test::TestRequest::get()
        .uri("/admin/questions/?q=COLOUR")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_of(resp).await;
    assert!(body.contains("Favourite colour"));
    assert!(!body.contains("Best food"));
}

#[actix_rt::test]
#[serial]
async fn test_question_list_recent_filter() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    common::fixtures::create_question_at(&db, "Fresh poll", -chrono::Duration::hours(1))
        .await
        .expect("Failed to create question");
    common::fixtures::create_question(&db, "Stale poll", -10)
        .await
        .expect("Failed to create question");
    let app = admin_app!(db, AdminSite::default());

    let req = test::TestRequest::get()
        .uri("/admin/questions/?recent=yes")
        .to_request();
    let body = body_of(test::call_service(&app, req).await).await;
    assert!(body.contains("Fresh poll"));
    assert!(!body.contains("Stale poll"));

    let req = test::TestRequest::get()
        .uri("/admin/questions/?recent=no")
        .to_request();
    let body = body_of(test::call_service(&app, req).await).await;
    assert!(!body.contains("Fresh poll"));
    assert!(body.contains("Stale poll"));
}

#[actix_rt::test]
#[serial]
async fn test_question_list_orders_by_total_votes() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let popular = common::fixtures::create_question(&db, "Popular poll", -1)
        .await
        .expect("Failed to create question");
    common::fixtures::create_choice(&db, popular.id, "Yes", 2)
        .await
        .expect("Failed to create choice");
    common::fixtures::create_choice(&db, popular.id, "No", 3)
        .await
        .expect("Failed to create choice");
    let quiet = common::fixtures::create_question(&db, "Quiet poll", -2)
        .await
        .expect("Failed to create question");
    common::fixtures::create_choice(&db, quiet.id, "Maybe", 1)
        .await
        .expect("Failed to create choice");
    let app = admin_app!(db, AdminSite::default());

    let req = test::TestRequest::get()
        .uri("/admin/questions/?o=total_votes")
        .to_request();
    let body = body_of(test::call_service(&app, req).await).await;
    assert!(body.find("Quiet poll").unwrap() < body.find("Popular poll").unwrap());

    let req = test::TestRequest::get()
        .uri("/admin/questions/?o=-total_votes")
        .to_request();
    let body = body_of(test::call_service(&app, req).await).await;
    assert!(body.find("Popular poll").unwrap() < body.find("Quiet poll").unwrap());
}

#[actix_rt::test]
#[serial]
async fn test_add_question_with_inline_choices() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let app = admin_app!(db.clone(), AdminSite::default());

    let req = test::TestRequest::get()
        .uri("/admin/questions/add/")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_of(resp).await;
    assert!(body.contains("name=\"choice-2-choice_text\""));
    assert!(!body.contains("name=\"choice-3-choice_text\""));

    let req = test::TestRequest::post()
        .uri("/admin/questions/add/")
        .set_form(&[
            ("question_text", "Favourite colour"),
            ("pub_date", "2024-05-01T10:00"),
            ("choice-TOTAL", "3"),
            ("choice-0-choice_text", "Red"),
            ("choice-0-votes", "0"),
            ("choice-1-choice_text", "Blue"),
            ("choice-1-votes", "2"),
            ("choice-2-choice_text", ""),
            ("choice-2-votes", "0"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin/questions/");

    let saved = questions::Entity::find()
        .all(&db)
        .await
        .expect("Failed to load questions");
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].question_text, "Favourite colour");
    assert_eq!(
        saved[0].pub_date.format("%Y-%m-%d %H:%M").to_string(),
        "2024-05-01 10:00"
    );

    let saved_choices = common::fixtures::choices_of(&db, saved[0].id)
        .await
        .expect("Failed to load choices");
    let summary: Vec<(String, i32)> = saved_choices
        .into_iter()
        .map(|c| (c.choice_text, c.votes))
        .collect();
    assert_eq!(
        summary,
        vec![("Red".to_string(), 0), ("Blue".to_string(), 2)]
    );
}

#[actix_rt::test]
#[serial]
async fn test_add_question_validation_errors() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let app = admin_app!(db.clone(), AdminSite::default());

    let req = test::TestRequest::post()
        .uri("/admin/questions/add/")
        .set_form(&[
            ("question_text", ""),
            ("pub_date", "not a date"),
            ("choice-TOTAL", "0"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_of(resp).await;
    assert!(body.contains("Question text is required"));
    assert!(body.contains("Enter a valid date"));
    assert_eq!(questions::Entity::find().count(&db).await.unwrap(), 0);
}

#[actix_rt::test]
#[serial]
async fn test_change_question_edits_adds_and_deletes_choices() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let question = common::fixtures::create_question(&db, "Favourite colour", -1)
        .await
        .expect("Failed to create question");
    let red = common::fixtures::create_choice(&db, question.id, "Red", 4)
        .await
        .expect("Failed to create choice");
    let blue = common::fixtures::create_choice(&db, question.id, "Blue", 1)
        .await
        .expect("Failed to create choice");
    let app = admin_app!(db.clone(), AdminSite::default());

    let uri = format!("/admin/questions/{}/change/", question.id);
    let req = test::TestRequest::get().uri(&uri).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_of(resp).await;
    assert!(body.contains("value=\"Favourite colour\""));
    assert!(body.contains(&format!("name=\"choice-0-id\" value=\"{}\"", red.id)));

    let red_id = red.id.to_string();
    let blue_id = blue.id.to_string();
    let req = test::TestRequest::post()
        .uri(&uri)
        .set_form(&[
            ("question_text", "Favourite color"),
            ("pub_date", "2024-05-01T10:00:00"),
            ("choice-TOTAL", "3"),
            ("choice-0-id", red_id.as_str()),
            ("choice-0-choice_text", "Crimson"),
            ("choice-0-votes", "4"),
            ("choice-1-id", blue_id.as_str()),
            ("choice-1-choice_text", "Blue"),
            ("choice-1-votes", "1"),
            ("choice-1-DELETE", "on"),
            ("choice-2-choice_text", "Green"),
            ("choice-2-votes", "0"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let saved = questions::Entity::find_by_id(question.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.question_text, "Favourite color");

    let summary: Vec<(String, i32)> = common::fixtures::choices_of(&db, question.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| (c.choice_text, c.votes))
        .collect();
    assert_eq!(
        summary,
        vec![("Crimson".to_string(), 4), ("Green".to_string(), 0)]
    );
}

#[actix_rt::test]
#[serial]
async fn test_readonly_votes_are_not_editable() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let question = common::fixtures::create_question(&db, "Favourite colour", -1)
        .await
        .expect("Failed to create question");
    let red = common::fixtures::create_choice(&db, question.id, "Red", 4)
        .await
        .expect("Failed to create choice");

    let mut config = AppConfig::default();
    config.admin.choice_votes_readonly = true;
    let app = admin_app!(db.clone(), AdminSite::from_config(&config));

    let uri = format!("/admin/questions/{}/change/", question.id);
    let req = test::TestRequest::get().uri(&uri).to_request();
    let body = body_of(test::call_service(&app, req).await).await;
    assert!(!body.contains("name=\"choice-0-votes\""));

    let red_id = red.id.to_string();
    let req = test::TestRequest::post()
        .uri(&uri)
        .set_form(&[
            ("question_text", "Favourite colour"),
            ("pub_date", "2024-05-01T10:00"),
            ("choice-TOTAL", "2"),
            ("choice-0-id", red_id.as_str()),
            ("choice-0-choice_text", "Red"),
            ("choice-0-votes", "999"),
            ("choice-1-choice_text", "Blue"),
            ("choice-1-votes", "50"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let summary: Vec<(String, i32)> = common::fixtures::choices_of(&db, question.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| (c.choice_text, c.votes))
        .collect();
    assert_eq!(
        summary,
        vec![("Red".to_string(), 4), ("Blue".to_string(), 0)]
    );
}

#[actix_rt::test]
#[serial]
async fn test_delete_question_removes_its_choices() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let question = common::fixtures::create_question(&db, "Favourite colour", -1)
        .await
        .expect("Failed to create question");
    common::fixtures::create_choice(&db, question.id, "Red", 4)
        .await
        .expect("Failed to create choice");
    let keep = common::fixtures::create_question(&db, "Best food", -1)
        .await
        .expect("Failed to create question");
    common::fixtures::create_choice(&db, keep.id, "Pizza", 1)
        .await
        .expect("Failed to create choice");
    let app = admin_app!(db.clone(), AdminSite::default());

    let uri = format!("/admin/questions/{}/delete/", question.id);
    let req = test::TestRequest::get().uri(&uri).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_of(resp).await.contains("Choice: Red (4 votes)"));

    let req = test::TestRequest::post().uri(&uri).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    assert!(questions::Entity::find_by_id(question.id)
        .one(&db)
        .await
        .unwrap()
        .is_none());
    assert!(common::fixtures::choices_of(&db, question.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(choices::Entity::find().count(&db).await.unwrap(), 1);
}

#[actix_rt::test]
#[serial]
async fn test_choice_list_filters_by_question() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let colour = common::fixtures::create_question(&db, "Favourite colour", -1)
        .await
        .expect("Failed to create question");
    common::fixtures::create_choice(&db, colour.id, "Red", 4)
        .await
        .expect("Failed to create choice");
    let food = common::fixtures::create_question(&db, "Best food", -1)
        .await
        .expect("Failed to create question");
    common::fixtures::create_choice(&db, food.id, "Pizza", 1)
        .await
        .expect("Failed to create choice");
    let app = admin_app!(db, AdminSite::default());

    let req = test::TestRequest::get()
        .uri(&format!("/admin/choices/?question={}", colour.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_of(resp).await;
    assert!(body.contains("Red"));
    assert!(!body.contains("Pizza"));

    let req = test::TestRequest::get()
        .uri("/admin/choices/?q=food")
        .to_request();
    let body = body_of(test::call_service(&app, req).await).await;
    assert!(body.contains("Pizza"));
    assert!(!body.contains("Red"));
}

#[actix_rt::test]
#[serial]
async fn test_add_choice_requires_existing_question() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let app = admin_app!(db.clone(), AdminSite::default());

    let req = test::TestRequest::post()
        .uri("/admin/choices/add/")
        .set_form(&[("question", "31337"), ("choice_text", "Orphan"), ("votes", "0")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_of(resp).await.contains("Select a valid question."));
    assert_eq!(choices::Entity::find().count(&db).await.unwrap(), 0);
}

#[actix_rt::test]
#[serial]
async fn test_change_choice_rejects_negative_votes() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let question = common::fixtures::create_question(&db, "Favourite colour", -1)
        .await
        .expect("Failed to create question");
    let red = common::fixtures::create_choice(&db, question.id, "Red", 4)
        .await
        .expect("Failed to create choice");
    let app = admin_app!(db.clone(), AdminSite::default());

    let question_id = question.id.to_string();
    let uri = format!("/admin/choices/{}/change/", red.id);
    let req = test::TestRequest::post()
        .uri(&uri)
        .set_form(&[
            ("question", question_id.as_str()),
            ("choice_text", "Red"),
            ("votes", "-3"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_of(resp).await.contains("Votes cannot be negative."));
    assert_eq!(common::fixtures::votes_of(&db, red.id).await.unwrap(), 4);

    let req = test::TestRequest::post()
        .uri(&uri)
        .set_form(&[
            ("question", question_id.as_str()),
            ("choice_text", "Scarlet"),
            ("votes", "7"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin/choices/");
    assert_eq!(common::fixtures::votes_of(&db, red.id).await.unwrap(), 7);
}

#[actix_rt::test]
#[serial]
async fn test_change_missing_question_is_not_found() {
    let db = common::database::setup_test_database()
        .await
        .expect("Failed to setup test database");
    let app = admin_app!(db, AdminSite::default());

    let req = test::TestRequest::get()
        .uri("/admin/questions/404/change/")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
