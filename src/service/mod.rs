//! Stage services - handler registration, dispatch and delivery settlement.
//!
//! A `StageService<S>` maps message types to handlers backed by a shared
//! store. Deliveries are settled from the handler's result: success and
//! skips are acked, transient errors nacked for redelivery, anything else
//! rejected to the dead-letter list.
//!
//! ## Quick Start
//!
//! ```ignore
//! use rivalry::service::{StageService, StageWorker};
//! use rivalry::events::{queues, types};
//!
//! let rating = RatingStage::new(config.rating.clone(), 5);
//! let service = StageService::new(store.clone())
//!     .on(types::MATCH_COMPLETED, move |store, msg| rating.handle_message(store, msg));
//!
//! let worker = StageWorker::spawn(Arc::new(service), queues::RATING, queue.clone(), poll, budget);
//! // ...
//! let stats = worker.stop();
//! ```

mod error;
mod stage_service;
mod worker;

pub use error::StageError;
pub use stage_service::{Settlement, StageService};
pub use worker::{ServiceStats, StageWorker};
