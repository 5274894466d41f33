//! Question detail, voting and results pages

use crate::app_config;
use crate::flash::{self, FlashMessage, Level};
use crate::orm::{choices, questions};
use crate::question::find_published;
use crate::results::{choices_for, poll_results, PollResults};
use crate::vote::{cast_vote, CastVoteError};
use crate::web::db_error;
use actix_session::Session;
use actix_web::http::header;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Deserialize;

pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_detail)
        .service(view_results)
        .service(vote);
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailTemplate {
    pub site_name: String,
    pub question: questions::Model,
    pub choices: Vec<choices::Model>,
    pub error_message: Option<String>,
}

#[derive(Template)]
#[template(path = "results.html")]
pub struct ResultsTemplate {
    pub site_name: String,
    pub question: questions::Model,
    pub results: PollResults,
    pub messages: Vec<FlashMessage>,
}

#[derive(Deserialize)]
pub struct VoteFormData {
    pub choice: Option<String>,
}

/// Voting form. Unpublished questions are indistinguishable from missing ones.
#[get("/{question_id:\\d+}/")]
pub async fn view_detail(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let db = db.get_ref();
    let question = find_published(db, path.into_inner(), Utc::now().naive_utc())
        .await
        .map_err(db_error("Failed to fetch question"))?
        .ok_or_else(|| error::ErrorNotFound("Question not found."))?;

    render_detail(db, question, None).await
}

/// Results are viewable for any existing question.
#[get("/{question_id:\\d+}/results/")]
pub async fn view_results(
    db: web::Data<DatabaseConnection>,
    session: Session,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let db = db.get_ref();
    let question = find_question(db, path.into_inner()).await?;

    let results = poll_results(db, question.id)
        .await
        .map_err(db_error("Failed to aggregate votes"))?;

    Ok(ResultsTemplate {
        site_name: app_config::site().name,
        question,
        results,
        messages: flash::take(&session),
    }
    .to_response())
}

/// A body that is missing or not a form counts as no choice selected.
#[post("/{question_id:\\d+}/vote/")]
pub async fn vote(
    db: web::Data<DatabaseConnection>,
    session: Session,
    path: web::Path<i32>,
    form: Option<web::Form<VoteFormData>>,
) -> Result<HttpResponse, Error> {
    let db = db.get_ref();
    let question = find_question(db, path.into_inner()).await?;
    let choice = form.as_ref().and_then(|f| f.choice.as_deref());

    match cast_vote(db, &question, choice).await {
        Ok(choice) => {
            log::info!(
                "Vote recorded for choice {} on question {}",
                choice.id,
                question.id
            );
            flash::push(
                &session,
                Level::Success,
                format!("Your vote for \"{}\" has been recorded!", choice.choice_text),
            );

            Ok(HttpResponse::Found()
                .append_header((header::LOCATION, question.get_results_url()))
                .finish())
        }
        Err(CastVoteError::Rejected(reason)) => {
            log::debug!("Vote on question {} rejected: {}", question.id, reason);
            render_detail(db, question, Some(reason.to_string())).await
        }
        Err(CastVoteError::Database(e)) => {
            log::error!("Failed to record vote on question {}: {}", question.id, e);
            Err(error::ErrorInternalServerError("Database error"))
        }
    }
}

async fn find_question(db: &DatabaseConnection, question_id: i32) -> Result<questions::Model, Error> {
    questions::Entity::find_by_id(question_id)
        .one(db)
        .await
        .map_err(db_error("Failed to fetch question"))?
        .ok_or_else(|| error::ErrorNotFound("Question not found."))
}

async fn render_detail(
    db: &DatabaseConnection,
    question: questions::Model,
    error_message: Option<String>,
) -> Result<HttpResponse, Error> {
    let choices = choices_for(db, question.id)
        .await
        .map_err(db_error("Failed to fetch choices"))?;

    Ok(DetailTemplate {
        site_name: app_config::site().name,
        question,
        choices,
        error_message,
    }
    .to_response())
}
