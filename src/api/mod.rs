//! HTTP surface over the job orchestrator
//!
//! | Route | Purpose |
//! |---|---|
//! | `POST /downloads`, `GET /downloads` | submit a job, list active jobs |
//! | `DELETE /downloads/{job_id}` | cancel |
//! | `GET /events` | server-sent progress events |
//! | `GET /info?url=` | metadata and format list |
//! | `GET/DELETE /history` | history |
//! | `GET/PUT /settings`, `POST /settings/folder` | user settings |
//! | `GET /health` | liveness and counters |

mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
pub(crate) mod utils;
mod validation;

pub use error::ApiError;
pub use server::{router, run, shutdown_signal};
pub use state::AppState;
