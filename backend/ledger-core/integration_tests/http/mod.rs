mod executor;
mod single_flight;
