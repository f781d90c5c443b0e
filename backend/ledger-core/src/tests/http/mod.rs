mod payload;
mod transport;
