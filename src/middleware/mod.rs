mod guards;
mod json_error;
mod panic;
mod validated_json;

pub use guards::{AdminUser, AuthGuard, CurrentUser};
pub use json_error::json_error_middleware;
pub use panic::catch_panic_layer;
pub use validated_json::ValidatedJson;
