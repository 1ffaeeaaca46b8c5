pub mod answers;
pub mod questions;
pub mod responses;
pub mod sessions;
pub mod users;
