//! Small helpers shared by the application layer.

pub mod html;
