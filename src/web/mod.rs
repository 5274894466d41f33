pub mod admin;
pub mod error;
pub mod health;
pub mod index;
pub mod polls;

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Descending order. Order is important.
    // Route resolution will stop at the first match.
    health::configure(conf);
    index::configure(conf);
    polls::configure(conf);

    if crate::app_config::admin().enabled {
        admin::configure(conf);
    }
}

/// Map a database failure to a 500, logging the cause.
pub(crate) fn db_error(context: &'static str) -> impl Fn(sea_orm::DbErr) -> actix_web::Error {
    move |e| {
        log::error!("{}: {}", context, e);
        actix_web::error::ErrorInternalServerError("Database error")
    }
}
