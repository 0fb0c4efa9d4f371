//! HTTP API module.
//!
//! Two routers: the chat relay and the robot control server.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::{ChatQuery, HealthResponse};
pub use routes::{chat_router, robot_router};
pub use state::{ChatState, RobotState};
