#[macro_use]
extern crate tracing;

pub mod daily;
pub mod error;
mod history;
mod meeting;
mod netlog;
pub mod pages;
pub mod router;

pub use router::{
    create_router,
    AppState,
};
