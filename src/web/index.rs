//! Index page, the latest published questions.

use crate::app_config;
use crate::orm::questions;
use crate::question::latest_published;
use crate::web::db_error;
use actix_web::{get, web, Error, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::DatabaseConnection;

pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub site_name: String,
    pub latest_question_list: Vec<questions::Model>,
}

#[get("/")]
pub async fn view_index(db: web::Data<DatabaseConnection>) -> Result<impl Responder, Error> {
    let now = Utc::now().naive_utc();
    let latest_question_list = latest_published(db.get_ref(), now, app_config::polls().latest_limit)
        .await
        .map_err(db_error("Failed to fetch latest questions"))?;

    Ok(IndexTemplate {
        site_name: app_config::site().name,
        latest_question_list,
    }
    .to_response())
}
