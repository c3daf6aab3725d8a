mod init;
mod maintenance;
mod misc;
mod sync;

pub use init::handle_init;
pub use maintenance::{handle_backup, handle_check, handle_doctor, handle_restore};
pub use misc::handle_completions;
pub use sync::handle_sync;
