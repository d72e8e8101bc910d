//! Dispatch-only stubs for subcommands whose implementation lives outside
//! this coordination engine: the free-text memory store, the dashboard UI,
//! the tool-executor sandbox, the embedded LLM prompt/skill loaders, the
//! demo-scenario runner, and the external API surface. Each accepts its
//! slot in the argv dispatch and reports that the real implementation is
//! an external collaborator, per the message-schema-only contract.

use anyhow::{bail, Result};

pub fn execute(subcommand: &str) -> Result<()> {
    bail!(
        "`{subcommand}` is an external collaborator of this coordination engine; \
         only its message-schema and filesystem-layout contract is implemented here"
    )
}
