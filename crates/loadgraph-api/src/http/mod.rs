//! HTTP REST API endpoints.
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/health` | GET | Liveness |
//! | `/ready` | GET | Storage health |
//! | `/metrics` | GET | Prometheus text |
//! | `/hello` | GET | Greeting |
//! | `/users` | GET | Users with their posts |
//! | `/users` | POST | Create user |
//! | `/users/{id}` | GET | User with posts |
//! | `/users/{id}` | PATCH | Update user |
//! | `/users/{id}` | DELETE | Delete user and its posts |
//! | `/posts` | GET | Posts with their author |
//! | `/posts` | POST | Create post |
//! | `/posts/{id}` | GET | Post with author |
//! | `/posts/{id}` | PATCH | Update post |
//! | `/posts/{id}` | DELETE | Delete post |
//! | `/posts/by-users` | POST | Posts grouped per user id |
//! | `/overview` | GET | Users and posts in one pass |
//!
//! Queries answer `{ "data": ..., "errors": [...] }`. Mutations always answer
//! 200 with a result variant tagged by `kind`.

pub mod routes;
pub mod state;

pub use routes::{
    create_router, create_router_with_observability, ApiError, RouterOptions,
    DEFAULT_BODY_LIMIT,
};
pub use state::AppState;
