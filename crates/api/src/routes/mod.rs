pub mod health;
pub mod invoke;

use std::sync::Arc;

use engine::FunctionRuntime;
use handlers::StepHandler;

/// Shared by every request served by this process.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<FunctionRuntime>,
    pub handler: Arc<dyn StepHandler>,
}

impl AppState {
    pub fn new(runtime: FunctionRuntime, handler: impl StepHandler + 'static) -> Self {
        Self {
            runtime: Arc::new(runtime),
            handler: Arc::new(handler),
        }
    }
}
