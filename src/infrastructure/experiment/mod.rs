//! Experiment infrastructure: weighted selection and storage-backed persistence

mod selector;
mod storage_backend;

pub use selector::{select_weighted, RandomSource, SeededRandomSource, ThreadRandomSource};
pub use storage_backend::{
    StorageExperimentBackend, CONVERSIONS_TABLE, EXPERIMENTS_TABLE, PARTICIPATIONS_TABLE,
};
