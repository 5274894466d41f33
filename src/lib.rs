pub mod admin;
pub mod app_config;
pub mod db;
pub mod flash;
pub mod orm;
pub mod question;
pub mod results;
pub mod vote;
pub mod web;
