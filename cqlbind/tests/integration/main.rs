mod bind;
mod cache;
mod concurrency;
mod metadata;
mod routing;
pub(crate) mod utils;
