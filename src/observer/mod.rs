// Observer system: every client write to a registered entity runs through
// ring-ordered observers before and after the SQL is executed.

pub mod context;
pub mod error;
pub mod implementations;
pub mod pipeline;
pub mod traits;

pub use context::{today, Actor, ObserverContext};
pub use error::{ObserverError, ObserverWarning};
pub use pipeline::{ObserverPipeline, PIPELINE};
pub use traits::{GenericObserver, Observer, ObserverRing};
