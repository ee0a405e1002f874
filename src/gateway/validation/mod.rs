//! Contract-driven request validation.
//!
//! The contract is an OpenAPI 3.0 document supplied at startup. Requests
//! that match a declared operation are checked before reaching a handler;
//! anything the contract does not describe passes through.

pub mod contract;
pub mod schema;
pub mod validator;

pub use contract::{Contract, ContractError};
pub use validator::{RequestValidator, ValidationError, validate_request};
