/// Authentication and authorization for KanMind
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and registration password rules
/// - [`jwt`]: HS256 access and refresh tokens
/// - [`middleware`]: Bearer-token middleware and the `AuthContext` extractor
/// - [`authorization`]: access rules and the `Decision` type
/// - [`policy`]: store-backed evaluator handlers call before touching data
///
/// # Request flow
///
/// ```text
/// Authorization: Bearer <jwt>
///   → middleware::require_bearer   (401 on failure)
///   → AuthContext { user_id }
///   → AccessPolicy::resolve_principal
///   → AccessPolicy::{board, task, ...} → Decision::{Allow, Deny, NotFound}
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
