//! HTTP surface: `POST /trigger`, `GET /status`, `GET /` (SPEC_FULL.md §4.H,
//! §4.I, §6). Grounded on the teacher's `streaming::server`/`streaming::handlers`
//! axum split: one `ServerState` clone shared across handlers, one `Router`
//! built in `HttpServer::start`.

mod handlers;
mod server;

pub use server::{HttpServer, ServerState};
