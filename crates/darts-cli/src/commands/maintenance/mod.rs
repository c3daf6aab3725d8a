mod backup;
mod check;
mod doctor;
mod restore;

pub use backup::handle_backup;
pub use check::handle_check;
pub use doctor::handle_doctor;
pub use restore::handle_restore;
