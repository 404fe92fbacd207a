//! `providers` crate: outbound invocation of functions hosted by FaaS providers.
//!
//! Every provider adapter implements [`FunctionInvoker`]. The engine looks the
//! adapter up by [`Provider`] name in a [`ProviderRegistry`] and never talks
//! HTTP itself.

pub mod endpoint;
pub mod error;
pub mod traits;
pub mod http;
pub mod lambda;
pub mod openwhisk;
pub mod mock;

use std::collections::HashMap;
use std::sync::Arc;

pub use endpoint::{FunctionEndpoint, Provider};
pub use error::TransportError;
pub use lambda::LambdaInvoker;
pub use openwhisk::{OpenWhiskCredentials, OpenWhiskInvoker};
pub use traits::{ConnectTimings, FunctionInvoker, InvocationMode, InvokeResponse};

/// Maps provider names to their invoker implementations.
pub type ProviderRegistry = HashMap<Provider, Arc<dyn FunctionInvoker>>;
