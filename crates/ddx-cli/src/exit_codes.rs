//! Process exit codes. Part of the CLI contract.

use ddx_core::model::RunStatus;

pub const SUCCESS: i32 = 0;
pub const RUN_FAILED: i32 = 1; // At least one work unit failed
pub const CONFIG_ERROR: i32 = 2; // Bad config, unknown group/chat, rejected transition
pub const RUN_CANCELLED: i32 = 3;

pub fn for_status(status: RunStatus) -> i32 {
    match status {
        RunStatus::Failed => RUN_FAILED,
        RunStatus::Cancelled => RUN_CANCELLED,
        RunStatus::Completed | RunStatus::NotStarted | RunStatus::Started => SUCCESS,
    }
}
