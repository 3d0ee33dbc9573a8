//! Schema contract registry: declares, compiles, and enforces every route's
//! request and response shapes.

mod error;
mod registry;
pub mod routes;

pub use error::{
    ContractViolation, FieldViolation, RegistryError, RequestError, ResponseError, ValidationError,
};
pub use registry::{ApiDescription, ContractRegistry, RouteContract, RouteDescription};
