mod auth;
mod hierarchy;
mod http;
