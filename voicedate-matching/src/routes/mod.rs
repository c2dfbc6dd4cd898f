pub mod decisions;
pub mod feed;
pub mod health;
pub mod internal;
pub mod matches;
