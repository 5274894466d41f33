//! Administration pages for questions and choices
//!
//! Everything shown here is described by `crate::admin::AdminSite`, which the
//! application registers as data at startup.

use crate::admin::{
    choice_rows, question_rows, AdminSite, ChoiceListParams, DateFilter, FormField, ModelAdmin,
    Page, QuestionListParams, SortKey,
};
use crate::flash::{self, FlashMessage, Level};
use crate::orm::{choices, questions, MAX_TEXT_LENGTH};
use crate::results::sort_choices;
use crate::web::db_error;
use actix_session::Session;
use actix_web::http::header;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    entity::*, query::*, sea_query::Expr, ActiveValue::Set, DatabaseConnection, DbErr,
    PaginatorTrait, TransactionTrait,
};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use url::form_urlencoded;
use validator::{Validate, ValidationError, ValidationErrors};

/// Upper bound on inline rows accepted from one submission.
const MAX_INLINE_ROWS: usize = 1000;

const PUB_DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_dashboard)
        .service(view_questions)
        .service(view_add_question)
        .service(add_question)
        .service(view_change_question)
        .service(change_question)
        .service(view_delete_question)
        .service(delete_question)
        .service(view_choices)
        .service(view_add_choice)
        .service(add_choice)
        .service(view_change_choice)
        .service(change_choice)
        .service(view_delete_choice)
        .service(delete_choice);
}

//
// Templates and view models
//

#[derive(Template)]
#[template(path = "admin/index.html")]
pub struct DashboardTemplate<'a> {
    pub site: &'a AdminSite,
    pub messages: Vec<FlashMessage>,
    pub question_count: usize,
    pub choice_count: usize,
}

#[derive(Template)]
#[template(path = "admin/change_list.html")]
pub struct ChangeListTemplate<'a> {
    pub site: &'a AdminSite,
    pub model: &'a ModelAdmin,
    pub messages: Vec<FlashMessage>,
    pub add_url: &'static str,
    pub list_url: &'static str,
    pub q: String,
    pub headers: Vec<HeaderView>,
    pub page: Page<ListRow>,
    pub filters: Vec<FilterView>,
    pub previous_url: Option<String>,
    pub next_url: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/question_form.html")]
pub struct QuestionFormTemplate<'a> {
    pub site: &'a AdminSite,
    pub messages: Vec<FlashMessage>,
    pub heading: String,
    pub action: String,
    pub delete_url: Option<String>,
    pub form: QuestionForm,
    pub errors: Vec<String>,
    pub votes_readonly: bool,
}

#[derive(Template)]
#[template(path = "admin/choice_form.html")]
pub struct ChoiceFormTemplate<'a> {
    pub site: &'a AdminSite,
    pub messages: Vec<FlashMessage>,
    pub heading: String,
    pub action: String,
    pub delete_url: Option<String>,
    pub form: ChoiceForm,
    pub question_options: Vec<SelectOption>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin/delete_confirmation.html")]
pub struct DeleteConfirmationTemplate<'a> {
    pub site: &'a AdminSite,
    pub messages: Vec<FlashMessage>,
    pub object_kind: &'static str,
    pub object_label: String,
    pub related_items: Vec<String>,
    pub action: String,
    pub cancel_url: String,
}

pub struct HeaderView {
    pub label: &'static str,
    pub sort_url: Option<String>,
    pub indicator: &'static str,
}

pub enum Cell {
    Text(String),
    Boolean(&'static str),
}

pub struct ListRow {
    pub change_url: String,
    pub cells: Vec<Cell>,
}

pub struct FilterView {
    pub title: &'static str,
    pub options: Vec<FilterOption>,
}

pub struct FilterOption {
    pub label: String,
    pub url: String,
    pub class: &'static str,
}

pub struct SelectOption {
    pub value: i32,
    pub label: String,
    pub selected: bool,
}

/// Submitted or prefilled state of the question form.
#[derive(Clone, Debug, Default)]
pub struct QuestionForm {
    pub question_text: String,
    pub pub_date: String,
    pub rows: Vec<ChoiceFormRow>,
}

/// One inline choice row.
#[derive(Clone, Debug, Default)]
pub struct ChoiceFormRow {
    pub index: usize,
    pub id: Option<i32>,
    pub choice_text: String,
    pub votes: String,
    pub delete: bool,
}

impl ChoiceFormRow {
    pub fn deletable(&self) -> bool {
        self.id.is_some()
    }

    /// A blank extra row nobody touched.
    fn is_untouched(&self) -> bool {
        self.id.is_none()
            && self.choice_text.trim().is_empty()
            && matches!(self.votes.trim(), "" | "0")
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChoiceForm {
    pub question: String,
    pub choice_text: String,
    pub votes: String,
}

#[derive(Debug, Validate)]
struct QuestionInput {
    #[validate(custom = "question_text_length")]
    question_text: String,
}

#[derive(Debug, Validate)]
struct ChoiceInput {
    #[validate(custom = "choice_text_length")]
    choice_text: String,
    #[validate(range(min = 0, message = "Votes cannot be negative."))]
    votes: i32,
}

fn text_length(label: &str, text: &str) -> Result<(), ValidationError> {
    let len = text.chars().count();
    if (1..=MAX_TEXT_LENGTH).contains(&len) {
        return Ok(());
    }
    let mut err = ValidationError::new("length");
    err.message = Some(Cow::Owned(format!(
        "{} is required and may be at most {} characters.",
        label, MAX_TEXT_LENGTH
    )));
    Err(err)
}

fn question_text_length(text: &str) -> Result<(), ValidationError> {
    text_length("Question text", text)
}

fn choice_text_length(text: &str) -> Result<(), ValidationError> {
    text_length("Choice text", text)
}

/// A validated inline row ready to be written.
#[derive(Debug, PartialEq)]
pub enum InlineChange {
    Create { choice_text: String, votes: i32 },
    Update { id: i32, choice_text: String, votes: Option<i32> },
    Delete { id: i32 },
}

#[derive(Debug)]
pub struct ValidQuestion {
    pub question_text: String,
    pub pub_date: NaiveDateTime,
    pub changes: Vec<InlineChange>,
}

//
// Form parsing and validation
//

fn messages_of(errors: &ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    for (field, errs) in errors.field_errors() {
        for e in errs {
            let message = e
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value for {}.", field));
            out.push(format!("{}{}", prefix, message));
        }
    }
}

pub fn parse_pub_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    PUB_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn format_pub_date(date: &NaiveDateTime) -> String {
    date.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn parse_votes(raw: &str) -> Result<i32, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<i32>()
        .map_err(|_| "Votes must be a whole number.".to_string())
}

impl QuestionForm {
    /// Prefill from a stored question, followed by `extra` blank rows.
    pub fn from_question(
        question: Option<&questions::Model>,
        mut choices: Vec<choices::Model>,
        extra: usize,
    ) -> Self {
        sort_choices(&mut choices);
        let mut rows: Vec<ChoiceFormRow> = choices
            .into_iter()
            .enumerate()
            .map(|(index, c)| ChoiceFormRow {
                index,
                id: Some(c.id),
                choice_text: c.choice_text,
                votes: c.votes.to_string(),
                delete: false,
            })
            .collect();
        let start = rows.len();
        rows.extend((start..start + extra).map(|index| ChoiceFormRow {
            index,
            votes: "0".to_string(),
            ..Default::default()
        }));

        Self {
            question_text: question
                .map(|q| q.question_text.clone())
                .unwrap_or_default(),
            pub_date: question
                .map(|q| format_pub_date(&q.pub_date))
                .unwrap_or_else(|| format_pub_date(&Utc::now().naive_utc())),
            rows,
        }
    }

    /// Read the flat `choice-N-field` keys of a submitted form.
    pub fn from_submission(data: &HashMap<String, String>) -> Self {
        let field = |key: &str| data.get(key).cloned().unwrap_or_default();
        let total = data
            .get("choice-TOTAL")
            .and_then(|t| t.trim().parse::<usize>().ok())
            .unwrap_or(0)
            .min(MAX_INLINE_ROWS);

        let rows = (0..total)
            .map(|index| ChoiceFormRow {
                index,
                id: data
                    .get(&format!("choice-{}-id", index))
                    .and_then(|id| id.trim().parse::<i32>().ok()),
                choice_text: field(&format!("choice-{}-choice_text", index)),
                votes: field(&format!("choice-{}-votes", index)),
                delete: data.contains_key(&format!("choice-{}-DELETE", index)),
            })
            .collect();

        Self {
            question_text: field("question_text"),
            pub_date: field("pub_date"),
            rows,
        }
    }

    /// Validate the form. With `votes_readonly`, submitted vote counts are
    /// ignored: existing rows keep theirs and new rows start at zero.
    pub fn validate(&self, votes_readonly: bool) -> Result<ValidQuestion, Vec<String>> {
        let mut errors = Vec::new();

        let question_text = self.question_text.trim().to_string();
        if let Err(e) = (QuestionInput {
            question_text: question_text.clone(),
        })
        .validate()
        {
            messages_of(&e, "", &mut errors);
        }

        let pub_date = if self.pub_date.trim().is_empty() {
            errors.push("Date published is required.".to_string());
            None
        } else {
            let parsed = parse_pub_date(&self.pub_date);
            if parsed.is_none() {
                errors.push("Enter a valid date/time.".to_string());
            }
            parsed
        };

        let mut changes = Vec::new();
        for row in &self.rows {
            if row.is_untouched() {
                continue;
            }
            let prefix = format!("Choice {}: ", row.index + 1);

            if row.delete {
                if let Some(id) = row.id {
                    changes.push(InlineChange::Delete { id });
                }
                continue;
            }

            let votes = if votes_readonly {
                0
            } else {
                match parse_votes(&row.votes) {
                    Ok(votes) => votes,
                    Err(message) => {
                        errors.push(format!("{}{}", prefix, message));
                        continue;
                    }
                }
            };

            let choice_text = row.choice_text.trim().to_string();
            if let Err(e) = (ChoiceInput {
                choice_text: choice_text.clone(),
                votes,
            })
            .validate()
            {
                messages_of(&e, &prefix, &mut errors);
                continue;
            }

            changes.push(match row.id {
                Some(id) => InlineChange::Update {
                    id,
                    choice_text,
                    votes: (!votes_readonly).then(|| votes),
                },
                None => InlineChange::Create { choice_text, votes },
            });
        }

        match (errors.is_empty(), pub_date) {
            (true, Some(pub_date)) => Ok(ValidQuestion {
                question_text,
                pub_date,
                changes,
            }),
            _ => Err(errors),
        }
    }
}

impl ChoiceForm {
    fn from_choice(choice: &choices::Model) -> Self {
        Self {
            question: choice.question_id.to_string(),
            choice_text: choice.choice_text.clone(),
            votes: choice.votes.to_string(),
        }
    }

    fn from_submission(data: &HashMap<String, String>) -> Self {
        let field = |key: &str| data.get(key).cloned().unwrap_or_default();
        Self {
            question: field("question"),
            choice_text: field("choice_text"),
            votes: field("votes"),
        }
    }

    fn validate(&self) -> Result<(i32, String, i32), Vec<String>> {
        let mut errors = Vec::new();

        let question_id = self.question.trim().parse::<i32>().ok();
        if question_id.is_none() {
            errors.push("Select a question.".to_string());
        }

        let votes = parse_votes(&self.votes).unwrap_or_else(|message| {
            errors.push(message);
            0
        });
        let choice_text = self.choice_text.trim().to_string();
        if let Err(e) = (ChoiceInput {
            choice_text: choice_text.clone(),
            votes,
        })
        .validate()
        {
            messages_of(&e, "", &mut errors);
        }

        match question_id {
            Some(question_id) if errors.is_empty() => Ok((question_id, choice_text, votes)),
            _ => Err(errors),
        }
    }
}

//
// List helpers
//

fn list_url(base: &str, pairs: &[(&str, Option<String>)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in pairs {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            serializer.append_pair(key, value);
            any = true;
        }
    }
    if any {
        format!("{}?{}", base, serializer.finish())
    } else {
        base.to_owned()
    }
}

/// `pairs` with `key` replaced by `value`.
fn with_param<'a>(
    pairs: &[(&'a str, Option<String>)],
    key: &'a str,
    value: Option<String>,
) -> Vec<(&'a str, Option<String>)> {
    let mut pairs: Vec<(&str, Option<String>)> = pairs
        .iter()
        .filter(|(k, _)| *k != key && *k != "page")
        .cloned()
        .collect();
    pairs.push((key, value));
    pairs
}

fn header_views(
    model: &ModelAdmin,
    sort: SortKey<'_>,
    base: &str,
    pairs: &[(&str, Option<String>)],
) -> Vec<HeaderView> {
    model
        .list_display
        .iter()
        .map(|column| {
            let current = sort.column == column.field;
            let next = if current && !sort.descending {
                format!("-{}", column.field)
            } else {
                column.field.to_string()
            };
            HeaderView {
                label: column.label,
                sort_url: column
                    .order_field
                    .map(|_| list_url(base, &with_param(pairs, "o", Some(next)))),
                indicator: match (current, sort.descending) {
                    (true, false) => " \u{25b2}",
                    (true, true) => " \u{25bc}",
                    _ => "",
                },
            }
        })
        .collect()
}

fn filter_option(
    label: impl Into<String>,
    base: &str,
    pairs: &[(&str, Option<String>)],
    param: &str,
    value: Option<String>,
    selected: bool,
) -> FilterOption {
    FilterOption {
        label: label.into(),
        url: list_url(base, &with_param(pairs, param, value)),
        class: if selected { "selected" } else { "" },
    }
}

fn page_links<T>(
    page: &Page<T>,
    base: &str,
    pairs: &[(&str, Option<String>)],
) -> (Option<String>, Option<String>) {
    let link = |number: u64| {
        let mut pairs = pairs.to_vec();
        pairs.push(("page", Some(number.to_string())));
        list_url(base, &pairs)
    };
    (
        page.has_previous().then(|| link(page.number - 1)),
        page.has_next().then(|| link(page.number + 1)),
    )
}

fn boolean_icon(value: bool) -> &'static str {
    if value {
        "\u{2714} yes"
    } else {
        "\u{2718} no"
    }
}

fn redirect(location: impl AsRef<str>) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location.as_ref()))
        .finish()
}

//
// Dashboard
//

#[get("/admin/")]
async fn view_dashboard(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
) -> Result<impl Responder, Error> {
    let db = db.get_ref();
    let question_count = questions::Entity::find()
        .count(db)
        .await
        .map_err(db_error("Failed to count questions"))?;
    let choice_count = choices::Entity::find()
        .count(db)
        .await
        .map_err(db_error("Failed to count choices"))?;

    Ok(DashboardTemplate {
        site: site.get_ref(),
        messages: flash::take(&session),
        question_count,
        choice_count,
    }
    .to_response())
}

//
// Questions
//

/// GET /admin/questions/ - List questions
#[get("/admin/questions/")]
async fn view_questions(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
    query: web::Query<QuestionListParams>,
) -> Result<impl Responder, Error> {
    let site = site.get_ref();
    let params = query.into_inner();
    let now = Utc::now().naive_utc();
    const BASE: &str = "/admin/questions/";

    let rows = question_rows(db.get_ref(), site, &params, now)
        .await
        .map_err(db_error("Failed to fetch questions"))?;

    let pairs = vec![
        ("q", params.q.clone()),
        ("pub_date", params.pub_date.clone()),
        ("recent", params.recent.clone()),
        ("o", params.o.clone()),
    ];
    let sort = site.questions.resolve_ordering(params.o.as_deref());
    let headers = header_views(&site.questions, sort, BASE, &pairs);

    let filters: Vec<FilterView> = site
        .questions
        .list_filter
        .iter()
        .map(|filter| {
            let current = match filter.param {
                "pub_date" => params.pub_date.as_deref(),
                "recent" => params.recent.as_deref(),
                _ => None,
            };
            let mut options = vec![filter_option(
                "Any",
                BASE,
                &pairs,
                filter.param,
                None,
                current.is_none(),
            )];
            match filter.param {
                "pub_date" => options.extend(DateFilter::ALL.iter().map(|f| {
                    filter_option(
                        f.label(),
                        BASE,
                        &pairs,
                        filter.param,
                        Some(f.param().to_string()),
                        current == Some(f.param()),
                    )
                })),
                _ => options.extend([("yes", "Yes"), ("no", "No")].iter().map(|(v, l)| {
                    filter_option(
                        *l,
                        BASE,
                        &pairs,
                        filter.param,
                        Some(v.to_string()),
                        current == Some(*v),
                    )
                })),
            }
            FilterView {
                title: filter.title,
                options,
            }
        })
        .collect();

    let list_rows: Vec<ListRow> = rows
        .into_iter()
        .map(|row| ListRow {
            change_url: format!("/admin/questions/{}/change/", row.question.id),
            cells: site
                .questions
                .list_display
                .iter()
                .map(|column| match column.field {
                    "question_text" => Cell::Text(row.question.question_text.clone()),
                    "pub_date" => Cell::Text(row.question.pub_date.format("%Y-%m-%d %H:%M").to_string()),
                    "was_published_recently" => Cell::Boolean(boolean_icon(row.published_recently)),
                    "total_votes" => Cell::Text(row.total_votes.to_string()),
                    _ => Cell::Text(String::new()),
                })
                .collect(),
        })
        .collect();

    let page = Page::slice(list_rows, params.page, site.per_page);
    let (previous_url, next_url) = page_links(&page, BASE, &pairs);

    Ok(ChangeListTemplate {
        site,
        model: &site.questions,
        messages: flash::take(&session),
        add_url: "/admin/questions/add/",
        list_url: BASE,
        q: params.q.unwrap_or_default(),
        headers,
        page,
        filters,
        previous_url,
        next_url,
    }
    .to_response())
}

async fn load_question(db: &DatabaseConnection, id: i32) -> Result<questions::Model, Error> {
    questions::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(db_error("Failed to fetch question"))?
        .ok_or_else(|| error::ErrorNotFound("Question not found"))
}

async fn load_choices(db: &DatabaseConnection, question_id: i32) -> Result<Vec<choices::Model>, Error> {
    choices::Entity::find()
        .filter(choices::Column::QuestionId.eq(question_id))
        .all(db)
        .await
        .map_err(db_error("Failed to fetch choices"))
}

fn question_form_page<'a>(
    site: &'a AdminSite,
    session: &Session,
    question: Option<&questions::Model>,
    form: QuestionForm,
    errors: Vec<String>,
) -> QuestionFormTemplate<'a> {
    let (heading, action, delete_url) = match question {
        Some(q) => (
            format!("Change {}", site.questions.verbose_name),
            format!("/admin/questions/{}/change/", q.id),
            Some(format!("/admin/questions/{}/delete/", q.id)),
        ),
        None => (
            format!("Add {}", site.questions.verbose_name),
            "/admin/questions/add/".to_string(),
            None,
        ),
    };

    QuestionFormTemplate {
        site,
        messages: flash::take(session),
        heading,
        action,
        delete_url,
        form,
        errors,
        votes_readonly: site.choice_inline.is_readonly("votes"),
    }
}

/// Write a validated question and its inline rows in one transaction.
async fn save_question(
    db: &DatabaseConnection,
    existing: Option<questions::Model>,
    valid: ValidQuestion,
) -> Result<questions::Model, DbErr> {
    let txn = db.begin().await?;

    let question = match existing {
        Some(existing) => {
            let mut active: questions::ActiveModel = existing.into();
            active.question_text = Set(valid.question_text);
            active.pub_date = Set(valid.pub_date);
            active.update(&txn).await?
        }
        None => {
            questions::ActiveModel {
                question_text: Set(valid.question_text),
                pub_date: Set(valid.pub_date),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    for change in valid.changes {
        match change {
            InlineChange::Create { choice_text, votes } => {
                choices::ActiveModel {
                    question_id: Set(question.id),
                    choice_text: Set(choice_text),
                    votes: Set(votes),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
            InlineChange::Update {
                id,
                choice_text,
                votes,
            } => {
                let mut update = choices::Entity::update_many()
                    .col_expr(choices::Column::ChoiceText, Expr::value(choice_text));
                if let Some(votes) = votes {
                    update = update.col_expr(choices::Column::Votes, Expr::value(votes));
                }
                update
                    .filter(choices::Column::Id.eq(id))
                    .filter(choices::Column::QuestionId.eq(question.id))
                    .exec(&txn)
                    .await?;
            }
            InlineChange::Delete { id } => {
                choices::Entity::delete_many()
                    .filter(choices::Column::Id.eq(id))
                    .filter(choices::Column::QuestionId.eq(question.id))
                    .exec(&txn)
                    .await?;
            }
        }
    }

    txn.commit().await?;
    Ok(question)
}

/// GET /admin/questions/add/ - Show question creation form
#[get("/admin/questions/add/")]
async fn view_add_question(
    site: web::Data<AdminSite>,
    session: Session,
) -> Result<impl Responder, Error> {
    let site = site.get_ref();
    let form = QuestionForm::from_question(None, Vec::new(), site.choice_inline.extra);
    Ok(question_form_page(site, &session, None, form, Vec::new()).to_response())
}

/// POST /admin/questions/add/ - Create a question with its inline choices
#[post("/admin/questions/add/")]
async fn add_question(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
    data: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse, Error> {
    let site = site.get_ref();
    let form = QuestionForm::from_submission(&data);

    let valid = match form.validate(site.choice_inline.is_readonly("votes")) {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(question_form_page(site, &session, None, form, errors).to_response())
        }
    };

    let question = save_question(db.get_ref(), None, valid)
        .await
        .map_err(db_error("Failed to create question"))?;

    log::info!("Question {} created", question.id);
    flash::push(
        &session,
        Level::Success,
        format!("The question \"{}\" was added successfully.", question.question_text),
    );
    Ok(redirect("/admin/questions/"))
}

/// GET /admin/questions/{id}/change/ - Show question edit form
#[get("/admin/questions/{id}/change/")]
async fn view_change_question(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let site = site.get_ref();
    let db = db.get_ref();
    let question = load_question(db, path.into_inner()).await?;
    let choices = load_choices(db, question.id).await?;

    let form = QuestionForm::from_question(Some(&question), choices, site.choice_inline.extra);
    Ok(question_form_page(site, &session, Some(&question), form, Vec::new()).to_response())
}

/// POST /admin/questions/{id}/change/ - Update a question and its inline choices
#[post("/admin/questions/{id}/change/")]
async fn change_question(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
    path: web::Path<i32>,
    data: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse, Error> {
    let site = site.get_ref();
    let db = db.get_ref();
    let question = load_question(db, path.into_inner()).await?;
    let form = QuestionForm::from_submission(&data);

    let valid = match form.validate(site.choice_inline.is_readonly("votes")) {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(
                question_form_page(site, &session, Some(&question), form, errors).to_response(),
            )
        }
    };

    let question = save_question(db, Some(question), valid)
        .await
        .map_err(db_error("Failed to update question"))?;

    log::info!("Question {} updated", question.id);
    flash::push(
        &session,
        Level::Success,
        format!("The question \"{}\" was changed successfully.", question.question_text),
    );
    Ok(redirect("/admin/questions/"))
}

/// GET /admin/questions/{id}/delete/ - Confirm question deletion
#[get("/admin/questions/{id}/delete/")]
async fn view_delete_question(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let db = db.get_ref();
    let question = load_question(db, path.into_inner()).await?;
    let mut choices = load_choices(db, question.id).await?;
    sort_choices(&mut choices);

    Ok(DeleteConfirmationTemplate {
        site: site.get_ref(),
        messages: flash::take(&session),
        object_kind: "question",
        object_label: question.question_text.clone(),
        related_items: choices.iter().map(|c| format!("Choice: {}", c)).collect(),
        action: format!("/admin/questions/{}/delete/", question.id),
        cancel_url: format!("/admin/questions/{}/change/", question.id),
    }
    .to_response())
}

/// POST /admin/questions/{id}/delete/ - Delete a question and its choices
#[post("/admin/questions/{id}/delete/")]
async fn delete_question(
    db: web::Data<DatabaseConnection>,
    session: Session,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let db = db.get_ref();
    let question = load_question(db, path.into_inner()).await?;

    let txn = db
        .begin()
        .await
        .map_err(db_error("Failed to begin transaction"))?;
    choices::Entity::delete_many()
        .filter(choices::Column::QuestionId.eq(question.id))
        .exec(&txn)
        .await
        .map_err(db_error("Failed to delete choices"))?;
    questions::Entity::delete_many()
        .filter(questions::Column::Id.eq(question.id))
        .exec(&txn)
        .await
        .map_err(db_error("Failed to delete question"))?;
    txn.commit()
        .await
        .map_err(db_error("Failed to commit question deletion"))?;

    log::info!("Question {} deleted", question.id);
    flash::push(
        &session,
        Level::Success,
        format!("The question \"{}\" was deleted successfully.", question.question_text),
    );
    Ok(redirect("/admin/questions/"))
}

//
// Choices
//

/// GET /admin/choices/ - List choices
#[get("/admin/choices/")]
async fn view_choices(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
    query: web::Query<ChoiceListParams>,
) -> Result<impl Responder, Error> {
    let site = site.get_ref();
    let db = db.get_ref();
    let params = query.into_inner();
    const BASE: &str = "/admin/choices/";

    let rows = choice_rows(db, site, &params)
        .await
        .map_err(db_error("Failed to fetch choices"))?;

    let all_questions = questions::Entity::find()
        .order_by_desc(questions::Column::PubDate)
        .all(db)
        .await
        .map_err(db_error("Failed to fetch questions"))?;
    let vote_values: BTreeSet<i32> = choices::Entity::find()
        .all(db)
        .await
        .map_err(db_error("Failed to fetch choices"))?
        .into_iter()
        .map(|c| c.votes)
        .collect();

    let pairs = vec![
        ("q", params.q.clone()),
        ("question", params.question.map(|q| q.to_string())),
        ("votes", params.votes.map(|v| v.to_string())),
        ("o", params.o.clone()),
    ];
    let sort = site.choices.resolve_ordering(params.o.as_deref());
    let headers = header_views(&site.choices, sort, BASE, &pairs);

    let filters: Vec<FilterView> = site
        .choices
        .list_filter
        .iter()
        .map(|filter| {
            let (current, values): (Option<i32>, Vec<(i32, String)>) = match filter.param {
                "question" => (
                    params.question,
                    all_questions
                        .iter()
                        .map(|q| (q.id, q.to_string()))
                        .collect(),
                ),
                _ => (
                    params.votes,
                    vote_values.iter().map(|v| (*v, v.to_string())).collect(),
                ),
            };
            let mut options = vec![filter_option(
                "All",
                BASE,
                &pairs,
                filter.param,
                None,
                current.is_none(),
            )];
            options.extend(values.into_iter().map(|(value, label)| {
                filter_option(
                    label,
                    BASE,
                    &pairs,
                    filter.param,
                    Some(value.to_string()),
                    current == Some(value),
                )
            }));
            FilterView {
                title: filter.title,
                options,
            }
        })
        .collect();

    let list_rows: Vec<ListRow> = rows
        .into_iter()
        .map(|row| ListRow {
            change_url: format!("/admin/choices/{}/change/", row.choice.id),
            cells: site
                .choices
                .list_display
                .iter()
                .map(|column| match column.field {
                    "choice_text" => Cell::Text(row.choice.choice_text.clone()),
                    "question" => Cell::Text(
                        row.question
                            .as_ref()
                            .map(|q| q.to_string())
                            .unwrap_or_default(),
                    ),
                    "votes" => Cell::Text(row.choice.votes.to_string()),
                    _ => Cell::Text(String::new()),
                })
                .collect(),
        })
        .collect();

    let page = Page::slice(list_rows, params.page, site.per_page);
    let (previous_url, next_url) = page_links(&page, BASE, &pairs);

    Ok(ChangeListTemplate {
        site,
        model: &site.choices,
        messages: flash::take(&session),
        add_url: "/admin/choices/add/",
        list_url: BASE,
        q: params.q.unwrap_or_default(),
        headers,
        page,
        filters,
        previous_url,
        next_url,
    }
    .to_response())
}

async fn question_options(
    db: &DatabaseConnection,
    selected: &str,
) -> Result<Vec<SelectOption>, Error> {
    let selected = selected.trim().parse::<i32>().ok();
    Ok(questions::Entity::find()
        .order_by_desc(questions::Column::PubDate)
        .all(db)
        .await
        .map_err(db_error("Failed to fetch questions"))?
        .into_iter()
        .map(|q| SelectOption {
            value: q.id,
            selected: selected == Some(q.id),
            label: q.to_string(),
        })
        .collect())
}

async fn choice_form_page<'a>(
    site: &'a AdminSite,
    db: &DatabaseConnection,
    session: &Session,
    choice: Option<&choices::Model>,
    form: ChoiceForm,
    errors: Vec<String>,
) -> Result<HttpResponse, Error> {
    let (heading, action, delete_url) = match choice {
        Some(c) => (
            format!("Change {}", site.choices.verbose_name),
            format!("/admin/choices/{}/change/", c.id),
            Some(format!("/admin/choices/{}/delete/", c.id)),
        ),
        None => (
            format!("Add {}", site.choices.verbose_name),
            "/admin/choices/add/".to_string(),
            None,
        ),
    };
    let question_options = question_options(db, &form.question).await?;

    Ok(ChoiceFormTemplate {
        site,
        messages: flash::take(session),
        heading,
        action,
        delete_url,
        form,
        question_options,
        errors,
    }
    .to_response())
}

async fn load_choice(db: &DatabaseConnection, id: i32) -> Result<choices::Model, Error> {
    choices::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(db_error("Failed to fetch choice"))?
        .ok_or_else(|| error::ErrorNotFound("Choice not found"))
}

async fn question_exists(db: &DatabaseConnection, id: i32) -> Result<bool, Error> {
    Ok(questions::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(db_error("Failed to fetch question"))?
        .is_some())
}

/// GET /admin/choices/add/ - Show choice creation form
#[get("/admin/choices/add/")]
async fn view_add_choice(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
) -> Result<HttpResponse, Error> {
    let form = ChoiceForm {
        votes: "0".to_string(),
        ..Default::default()
    };
    choice_form_page(site.get_ref(), db.get_ref(), &session, None, form, Vec::new()).await
}

/// POST /admin/choices/add/ - Create a choice
#[post("/admin/choices/add/")]
async fn add_choice(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
    data: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse, Error> {
    let site = site.get_ref();
    let db = db.get_ref();
    let form = ChoiceForm::from_submission(&data);

    let (question_id, choice_text, votes) = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return choice_form_page(site, db, &session, None, form, errors).await,
    };
    if !question_exists(db, question_id).await? {
        let errors = vec!["Select a valid question.".to_string()];
        return choice_form_page(site, db, &session, None, form, errors).await;
    }

    let choice = choices::ActiveModel {
        question_id: Set(question_id),
        choice_text: Set(choice_text),
        votes: Set(votes),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(db_error("Failed to create choice"))?;

    log::info!("Choice {} created on question {}", choice.id, question_id);
    flash::push(
        &session,
        Level::Success,
        format!("The choice \"{}\" was added successfully.", choice.choice_text),
    );
    Ok(redirect("/admin/choices/"))
}

/// GET /admin/choices/{id}/change/ - Show choice edit form
#[get("/admin/choices/{id}/change/")]
async fn view_change_choice(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let db = db.get_ref();
    let choice = load_choice(db, path.into_inner()).await?;
    let form = ChoiceForm::from_choice(&choice);
    choice_form_page(site.get_ref(), db, &session, Some(&choice), form, Vec::new()).await
}

/// POST /admin/choices/{id}/change/ - Update a choice
#[post("/admin/choices/{id}/change/")]
async fn change_choice(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
    path: web::Path<i32>,
    data: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse, Error> {
    let site = site.get_ref();
    let db = db.get_ref();
    let choice = load_choice(db, path.into_inner()).await?;
    let form = ChoiceForm::from_submission(&data);

    let (question_id, choice_text, votes) = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            return choice_form_page(site, db, &session, Some(&choice), form, errors).await
        }
    };
    if !question_exists(db, question_id).await? {
        let errors = vec!["Select a valid question.".to_string()];
        return choice_form_page(site, db, &session, Some(&choice), form, errors).await;
    }

    let mut active: choices::ActiveModel = choice.into();
    active.question_id = Set(question_id);
    active.choice_text = Set(choice_text);
    active.votes = Set(votes);
    let choice = active
        .update(db)
        .await
        .map_err(db_error("Failed to update choice"))?;

    log::info!("Choice {} updated", choice.id);
    flash::push(
        &session,
        Level::Success,
        format!("The choice \"{}\" was changed successfully.", choice.choice_text),
    );
    Ok(redirect("/admin/choices/"))
}

/// GET /admin/choices/{id}/delete/ - Confirm choice deletion
#[get("/admin/choices/{id}/delete/")]
async fn view_delete_choice(
    site: web::Data<AdminSite>,
    db: web::Data<DatabaseConnection>,
    session: Session,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let choice = load_choice(db.get_ref(), path.into_inner()).await?;

    Ok(DeleteConfirmationTemplate {
        site: site.get_ref(),
        messages: flash::take(&session),
        object_kind: "choice",
        object_label: choice.to_string(),
        related_items: Vec::new(),
        action: format!("/admin/choices/{}/delete/", choice.id),
        cancel_url: format!("/admin/choices/{}/change/", choice.id),
    }
    .to_response())
}

/// POST /admin/choices/{id}/delete/ - Delete a choice
#[post("/admin/choices/{id}/delete/")]
async fn delete_choice(
    db: web::Data<DatabaseConnection>,
    session: Session,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let db = db.get_ref();
    let choice = load_choice(db, path.into_inner()).await?;

    choices::Entity::delete_many()
        .filter(choices::Column::Id.eq(choice.id))
        .exec(db)
        .await
        .map_err(db_error("Failed to delete choice"))?;

    log::info!("Choice {} deleted", choice.id);
    flash::push(
        &session,
        Level::Success,
        format!("The choice \"{}\" was deleted successfully.", choice.choice_text),
    );
    Ok(redirect("/admin/choices/"))
}
