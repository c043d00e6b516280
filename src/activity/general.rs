//! Free-form scripted activity: a single required callable, invoked with
//! the stand as scripting context.

use crate::constraints::is_truthy;
use crate::engine::ids::StandId;
use crate::error::ScriptError;
use crate::host::ScriptHost;

#[derive(Debug, Clone)]
pub struct GeneralConfig<H> {
    pub action: H,
}

impl<H: Clone + std::fmt::Debug> GeneralConfig<H> {
    /// Switches script context to `stand`, calls `action`, and returns its
    /// boolean result. Any script error is surfaced, not swallowed.
    pub fn execute<S: ScriptHost<Handle = H>>(
        &self,
        stand: StandId,
        activity_name: &str,
        host: &mut S,
    ) -> Result<bool, ScriptError> {
        let result = host
            .call(&self.action, stand)
            .map_err(|message| ScriptError::new(stand, activity_name, "onExecute", message))?;
        Ok(is_truthy(&result))
    }
}
