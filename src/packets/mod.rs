pub mod apdu;
pub mod class;
pub mod instruction;
pub mod read_record;
pub mod select;
pub mod status;
