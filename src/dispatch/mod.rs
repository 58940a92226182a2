pub mod dispatcher;
pub mod service;

pub use dispatcher::{BatchDispatcher, DispatchError};
pub use service::{
    FilePart, HttpProcessingService, ProcessingRequest, ProcessingService, TransportError,
};
