//! Application services layer.

pub mod error;
pub mod rate_limit;
pub mod render;
pub mod repos;
pub mod revalidate;
pub mod seo;
pub mod slugs;
pub mod validation;
