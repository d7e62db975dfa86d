pub mod activity;
pub mod digest;
pub mod meeting;
pub mod member;
