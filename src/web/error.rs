//! HTML bodies for error responses, installed through `ErrorHandlers`.

use actix_web::dev::ServiceResponse;
use actix_web::http::header::{self, HeaderValue};
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::Result;
use askama_actix::Template;

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub site_name: String,
    pub status: u16,
    pub title: &'static str,
    pub message: &'static str,
}

pub fn render_400<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(
        res,
        "Bad Request",
        "The request could not be understood by the server.",
    )
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(
        res,
        "Not Found",
        "The poll you are looking for does not exist or has not been published yet.",
    )
}

pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_error(
        res,
        "Internal Server Error",
        "Something went wrong on our end. Please try again later.",
    )
}

fn render_error<B>(
    res: ServiceResponse<B>,
    title: &'static str,
    message: &'static str,
) -> Result<ErrorHandlerResponse<B>> {
    let status = res.status();
    let body = ErrorTemplate {
        site_name: crate::app_config::site().name,
        status: status.as_u16(),
        title,
        message,
    }
    .render()
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let (req, res) = res.into_parts();
    let mut res = res.set_body(body);
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );

    let res = ServiceResponse::new(req, res)
        .map_into_boxed_body()
        .map_into_right_body();

    Ok(ErrorHandlerResponse::Response(res))
}
