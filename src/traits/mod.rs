pub mod resolver;
pub mod spawner;

pub use resolver::{Candidate, CompilationContext, FunctionResolver, MarketDataAvailability};
pub use spawner::{BuildJob, JobSpawner};
