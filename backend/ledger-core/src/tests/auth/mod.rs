mod session;
mod token_store;
