mod cursor;
mod error;
mod http_mapping;
mod traits;
mod types;

pub use cursor::{decode_cursor, encode_cursor};
pub use error::{RepositoryError, Result};
pub use http_mapping::repository_error_to_status_code;
pub use traits::PostRepository;
pub use types::ResumeKey;
