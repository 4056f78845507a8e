// EMV data structures
// EMV Book 1 sections 11 and 12
//
// FCI returned when selecting the PSE or an application, and records of
// the payment system directory.
//
pub mod directory;
pub mod fci;

pub use directory::{ApplicationTemplate, DirectoryDiscretionaryTemplate, DirectoryRecord};
pub use fci::{Fci, IssuerDiscretionaryData, ProprietaryTemplate};
