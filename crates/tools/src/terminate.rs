//! Terminate capability: ends the decision loop with a final message.

use taskweave_core::capability::CapabilityDescriptor;
use taskweave_core::error::RegistryError;

pub fn terminate() -> Result<CapabilityDescriptor, RegistryError> {
    CapabilityDescriptor::builder("terminate")
        .description(
            "Terminates the agent's execution with a final message. \
             No further actions are possible after this.",
        )
        .param::<String>("message")
        .describe_param("message", "The final message to return before terminating")
        .terminal()
        .sync_fn(|args| {
            let message: String = args.required("message")?;
            Ok(format!("{message}\nTerminating..."))
        })
        .build()
}
