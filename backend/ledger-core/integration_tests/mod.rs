mod auth;
mod helpers;
mod http;
