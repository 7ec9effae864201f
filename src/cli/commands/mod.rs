pub mod baseline;
pub mod jobs;
pub mod practice;
pub mod user;
