//! Infrastructure layer - storage, selection and the split engine

pub mod experiment;
pub mod logging;
pub mod services;
pub mod storage;
