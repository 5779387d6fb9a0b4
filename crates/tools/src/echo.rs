//! Echo capability: returns the text it was given.

use taskweave_core::capability::CapabilityDescriptor;
use taskweave_core::error::RegistryError;

pub fn echo() -> Result<CapabilityDescriptor, RegistryError> {
    CapabilityDescriptor::builder("echo")
        .description("Return the provided text unchanged.")
        .param::<String>("text")
        .sync_fn(|args| args.required::<String>("text"))
        .build()
}
