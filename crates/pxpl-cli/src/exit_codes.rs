//! Process exit codes. Part of the public contract for scripts wrapping `pxpl`.

pub const SUCCESS: i32 = 0;
pub const VALIDATION_FAILED: i32 = 1; // Archive rejected or a module failed verification
pub const INTERNAL_ERROR: i32 = 2; // I/O, configuration or usage error
pub const RESTORE_INCOMPLETE: i32 = 3; // Restore finished but at least one module failed
