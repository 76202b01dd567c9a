pub mod phone_validation;
pub use phone_validation::validate_phone_number;
pub mod url_validation;
pub use url_validation::{UrlValidationError, validate_http_url};
