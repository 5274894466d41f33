//! Administrative site description
//!
//! The admin pages are driven by the static structure below: which columns
//! a list shows, how they are labelled and sorted, which filters and search
//! fields exist, and how choices are edited inline on a question. It is
//! built once at startup from `AppConfig` and handed to the web layer as
//! application data.

use crate::app_config::AppConfig;
use crate::orm::{choices, questions};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use sea_orm::{entity::*, ConnectionTrait, DbErr};
use serde::Deserialize;
use std::cmp::Ordering;
use std::str::FromStr;

/// Largest page size a change list will render.
pub const MAX_PER_PAGE: u64 = 10_000;

/// A list column and its display metadata.
#[derive(Clone, Debug)]
pub struct ColumnSpec {
    pub field: &'static str,
    pub label: &'static str,
    /// Rendered as a yes/no icon instead of text
    pub boolean: bool,
    /// Key the column sorts by, `None` when it cannot be sorted
    pub order_field: Option<&'static str>,
}

impl ColumnSpec {
    fn new(field: &'static str, label: &'static str) -> Self {
        Self {
            field,
            label,
            boolean: false,
            order_field: Some(field),
        }
    }

    fn boolean(mut self) -> Self {
        self.boolean = true;
        self
    }

    fn order_by(mut self, order_field: &'static str) -> Self {
        self.order_field = Some(order_field);
        self
    }
}

#[derive(Clone, Debug)]
pub struct FilterSpec {
    /// Query string parameter
    pub param: &'static str,
    pub title: &'static str,
}

/// Fields of the question change form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    QuestionText,
    PubDate,
}

#[derive(Clone, Debug)]
pub struct Fieldset {
    pub name: Option<&'static str>,
    pub fields: Vec<FormField>,
    pub collapsed: bool,
}

#[derive(Clone, Debug)]
pub struct ModelAdmin {
    pub name: &'static str,
    pub verbose_name: &'static str,
    pub verbose_name_plural: &'static str,
    pub list_display: Vec<ColumnSpec>,
    pub list_filter: Vec<FilterSpec>,
    pub search_fields: Vec<&'static str>,
    /// Default ordering, `-` prefix for descending
    pub ordering: &'static str,
    pub fieldsets: Vec<Fieldset>,
}

impl ModelAdmin {
    /// Resolve an `o=` parameter against the sortable columns.
    /// Unknown or unsortable columns fall back to the default ordering.
    pub fn resolve_ordering(&self, requested: Option<&str>) -> SortKey<'_> {
        requested
            .and_then(|o| {
                let (name, descending) = split_order(o);
                let column = self.list_display.iter().find(|c| c.field == name)?;
                Some(SortKey {
                    column: column.field,
                    key: column.order_field?,
                    descending,
                })
            })
            .unwrap_or_else(|| {
                let (key, descending) = split_order(self.ordering);
                SortKey {
                    column: key,
                    key,
                    descending,
                }
            })
    }
}

fn split_order(o: &str) -> (&str, bool) {
    match o.strip_prefix('-') {
        Some(name) => (name, true),
        None => (o, false),
    }
}

/// Resolved list ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey<'a> {
    /// Column the user clicked
    pub column: &'a str,
    /// Value actually sorted on
    pub key: &'a str,
    pub descending: bool,
}

impl SortKey<'_> {
    fn apply(&self, ordering: Ordering) -> Ordering {
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

#[derive(Clone, Debug)]
pub struct InlineAdmin {
    pub fields: Vec<&'static str>,
    pub readonly_fields: Vec<&'static str>,
    pub extra: usize,
}

impl InlineAdmin {
    pub fn is_readonly(&self, field: &str) -> bool {
        self.readonly_fields.iter().any(|f| *f == field)
    }
}

#[derive(Clone, Debug)]
pub struct AdminSite {
    pub site_name: String,
    pub questions: ModelAdmin,
    pub choices: ModelAdmin,
    pub choice_inline: InlineAdmin,
    pub per_page: u64,
    pub recent_window: Duration,
}

impl Default for AdminSite {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl AdminSite {
    pub fn from_config(config: &AppConfig) -> Self {
        let readonly_fields = if config.admin.choice_votes_readonly {
            vec!["votes"]
        } else {
            Vec::new()
        };

        Self {
            site_name: config.site.name.clone(),
            questions: ModelAdmin {
                name: "questions",
                verbose_name: "Question",
                verbose_name_plural: "Questions",
                list_display: vec![
                    ColumnSpec::new("question_text", "Question text"),
                    ColumnSpec::new("pub_date", "Date published"),
                    ColumnSpec::new("was_published_recently", "Published recently?")
                        .boolean()
                        .order_by("pub_date"),
                    ColumnSpec::new("total_votes", "Total Votes"),
                ],
                list_filter: vec![
                    FilterSpec {
                        param: "pub_date",
                        title: "Date published",
                    },
                    FilterSpec {
                        param: "recent",
                        title: "Published recently?",
                    },
                ],
                search_fields: vec!["question_text"],
                ordering: "-pub_date",
                fieldsets: vec![
                    Fieldset {
                        name: None,
                        fields: vec![FormField::QuestionText],
                        collapsed: false,
                    },
                    Fieldset {
                        name: Some("Date information"),
                        fields: vec![FormField::PubDate],
                        collapsed: true,
                    },
                ],
            },
            choices: ModelAdmin {
                name: "choices",
                verbose_name: "Choice",
                verbose_name_plural: "Choices",
                list_display: vec![
                    ColumnSpec::new("choice_text", "Choice text"),
                    ColumnSpec::new("question", "Question"),
                    ColumnSpec::new("votes", "Votes"),
                ],
                list_filter: vec![
                    FilterSpec {
                        param: "question",
                        title: "Question",
                    },
                    FilterSpec {
                        param: "votes",
                        title: "Votes",
                    },
                ],
                search_fields: vec!["choice_text", "question__question_text"],
                ordering: "-votes",
                fieldsets: Vec::new(),
            },
            choice_inline: InlineAdmin {
                fields: vec!["choice_text", "votes"],
                readonly_fields,
                extra: config.admin.extra_choices,
            },
            per_page: config.admin.per_page.clamp(1, MAX_PER_PAGE),
            recent_window: Duration::hours(config.polls.recent_window_hours),
        }
    }
}

/// Date hierarchy filter on `pub_date`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateFilter {
    Today,
    Past7Days,
    ThisMonth,
    ThisYear,
}

impl DateFilter {
    pub const ALL: [DateFilter; 4] = [
        DateFilter::Today,
        DateFilter::Past7Days,
        DateFilter::ThisMonth,
        DateFilter::ThisYear,
    ];

    pub fn param(&self) -> &'static str {
        match self {
            DateFilter::Today => "today",
            DateFilter::Past7Days => "past_7_days",
            DateFilter::ThisMonth => "this_month",
            DateFilter::ThisYear => "this_year",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DateFilter::Today => "Today",
            DateFilter::Past7Days => "Past 7 days",
            DateFilter::ThisMonth => "This month",
            DateFilter::ThisYear => "This year",
        }
    }

    /// Half-open `[start, end)` range relative to `now`.
    pub fn bounds(&self, now: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let today = now.date();
        let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0);
        let tomorrow = midnight(today.succ_opt()?)?;

        match self {
            DateFilter::Today => Some((midnight(today)?, tomorrow)),
            DateFilter::Past7Days => Some((midnight(today - Duration::days(7))?, tomorrow)),
            DateFilter::ThisMonth => {
                let start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?;
                let end = if today.month() == 12 {
                    NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)?
                };
                Some((midnight(start)?, midnight(end)?))
            }
            DateFilter::ThisYear => {
                let start = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
                let end = NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?;
                Some((midnight(start)?, midnight(end)?))
            }
        }
    }

    pub fn contains(&self, now: NaiveDateTime, date: NaiveDateTime) -> bool {
        self.bounds(now)
            .map(|(start, end)| start <= date && date < end)
            .unwrap_or(false)
    }
}

impl FromStr for DateFilter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateFilter::ALL
            .iter()
            .copied()
            .find(|f| f.param() == s)
            .ok_or(())
    }
}

/// Query string of the question list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QuestionListParams {
    pub q: Option<String>,
    pub pub_date: Option<String>,
    pub recent: Option<String>,
    pub o: Option<String>,
    pub page: Option<u64>,
}

/// Query string of the choice list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChoiceListParams {
    pub q: Option<String>,
    pub question: Option<i32>,
    pub votes: Option<i32>,
    pub o: Option<String>,
    pub page: Option<u64>,
}

/// Whitespace separated search terms, lowercased. Every term has to match.
pub fn search_terms(q: Option<&str>) -> Vec<String> {
    q.map(|q| q.split_whitespace().map(str::to_lowercase).collect())
        .unwrap_or_default()
}

fn matches_terms(terms: &[String], haystacks: &[&str]) -> bool {
    let haystacks: Vec<String> = haystacks.iter().map(|h| h.to_lowercase()).collect();
    terms
        .iter()
        .all(|term| haystacks.iter().any(|h| h.contains(term.as_str())))
}

#[derive(Clone, Debug)]
pub struct QuestionRow {
    pub question: questions::Model,
    pub total_votes: i64,
    pub published_recently: bool,
}

/// Filtered and ordered rows of the question list.
pub async fn question_rows<C>(
    db: &C,
    site: &AdminSite,
    params: &QuestionListParams,
    now: NaiveDateTime,
) -> Result<Vec<QuestionRow>, DbErr>
where
    C: ConnectionTrait,
{
    let loaded = questions::Entity::find()
        .find_with_related(choices::Entity)
        .all(db)
        .await?;

    let terms = search_terms(params.q.as_deref());
    let date_filter = params
        .pub_date
        .as_deref()
        .and_then(|p| p.parse::<DateFilter>().ok());
    let recent_filter = match params.recent.as_deref() {
        Some("yes") => Some(true),
        Some("no") => Some(false),
        _ => None,
    };

    let mut rows: Vec<QuestionRow> = loaded
        .into_iter()
        .map(|(question, choices)| QuestionRow {
            total_votes: choices.iter().map(|c| i64::from(c.votes)).sum(),
            published_recently: question.was_published_within(now, site.recent_window),
            question,
        })
        .filter(|row| {
            let haystacks: Vec<&str> = site
                .questions
                .search_fields
                .iter()
                .map(|field| match *field {
                    "question_text" => row.question.question_text.as_str(),
                    _ => "",
                })
                .collect();
            matches_terms(&terms, &haystacks)
        })
        .filter(|row| {
            date_filter
                .map(|f| f.contains(now, row.question.pub_date))
                .unwrap_or(true)
        })
        .filter(|row| {
            recent_filter
                .map(|want| row.published_recently == want)
                .unwrap_or(true)
        })
        .collect();

    let sort = site.questions.resolve_ordering(params.o.as_deref());
    rows.sort_by(|a, b| {
        let ordering = match sort.key {
            "question_text" => a.question.question_text.cmp(&b.question.question_text),
            "total_votes" => a.total_votes.cmp(&b.total_votes),
            _ => a.question.pub_date.cmp(&b.question.pub_date),
        };
        sort.apply(ordering)
            .then_with(|| b.question.id.cmp(&a.question.id))
    });

    Ok(rows)
}

#[derive(Clone, Debug)]
pub struct ChoiceRow {
    pub choice: choices::Model,
    pub question: Option<questions::Model>,
}

impl ChoiceRow {
    pub fn question_text(&self) -> &str {
        self.question
            .as_ref()
            .map(|q| q.question_text.as_str())
            .unwrap_or("")
    }
}

/// Filtered and ordered rows of the choice list.
pub async fn choice_rows<C>(
    db: &C,
    site: &AdminSite,
    params: &ChoiceListParams,
) -> Result<Vec<ChoiceRow>, DbErr>
where
    C: ConnectionTrait,
{
    let loaded = choices::Entity::find()
        .find_also_related(questions::Entity)
        .all(db)
        .await?;

    let terms = search_terms(params.q.as_deref());

    let mut rows: Vec<ChoiceRow> = loaded
        .into_iter()
        .map(|(choice, question)| ChoiceRow { choice, question })
        .filter(|row| {
            let haystacks: Vec<&str> = site
                .choices
                .search_fields
                .iter()
                .map(|field| match *field {
                    "choice_text" => row.choice.choice_text.as_str(),
                    "question__question_text" => row.question_text(),
                    _ => "",
                })
                .collect();
            matches_terms(&terms, &haystacks)
        })
        .filter(|row| {
            params
                .question
                .map(|id| row.choice.question_id == id)
                .unwrap_or(true)
        })
        .filter(|row| {
            params
                .votes
                .map(|votes| row.choice.votes == votes)
                .unwrap_or(true)
        })
        .collect();

    let sort = site.choices.resolve_ordering(params.o.as_deref());
    rows.sort_by(|a, b| {
        let ordering = match sort.key {
            "choice_text" => a.choice.choice_text.cmp(&b.choice.choice_text),
            "question" => a.question_text().cmp(b.question_text()),
            _ => a.choice.votes.cmp(&b.choice.votes),
        };
        sort.apply(ordering)
            .then_with(|| a.choice.id.cmp(&b.choice.id))
    });

    Ok(rows)
}

/// One page of a list.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub number: u64,
    pub num_pages: u64,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn slice(rows: Vec<T>, number: Option<u64>, per_page: u64) -> Self {
        let per_page = per_page.max(1);
        let total = rows.len();
        let rows_count = total as u64;
        let num_pages = (rows_count / per_page + u64::from(rows_count % per_page != 0)).max(1);
        let number = number.unwrap_or(1).clamp(1, num_pages);
        let skip = ((number - 1) * per_page) as usize;

        Self {
            items: rows.into_iter().skip(skip).take(per_page as usize).collect(),
            number,
            num_pages,
            total,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }
}
