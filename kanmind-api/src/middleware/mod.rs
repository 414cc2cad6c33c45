/// Tower middleware for the API server
///
/// Authentication lives in `kanmind_shared::auth::middleware` so it can be
/// shared; this module holds HTTP concerns owned by the server itself.

pub mod security;
