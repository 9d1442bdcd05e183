pub mod error;
pub mod events;
pub mod health;
pub mod posts;
pub mod sync;
pub mod tags;

pub use error::AppError;
