pub const SUCCESS: i32 = 0;
/// The command ran but was refused or reported failure.
pub const COMMAND_FAILED: i32 = 1;
pub const CONFIG_ERROR: i32 = 2;
