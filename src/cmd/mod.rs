/*!
Command dispatcher module.

Keeps only module declarations and re-exports. Each subcommand lives in its
own file and exposes one `execute_*` entry point returning the process exit
code.

Directory Layout:
  src/cmd/
    mod.rs          (this file)
    plantuml.rs     (PlantUmlArgs + execute_plantuml)
    redpen.rs       (RedPenArgs   + execute_redpen)
    compat.rs       (native PlantUML option rewriting, runs before clap)
    encoding.rs     (PlantUML text encoding for -encodeurl / -decodeurl)
    shared.rs       (Globals, input reading, request + relay helpers)
    format.rs       (stderr styling for error lines)

Conventions:
  - `execute_*` returns `anyhow::Result<i32>`; the integer is the exit code
    for a completed exchange, errors map to codes in `crate::error`.
  - Argument structs derive `clap::Args` and stay free of I/O.
  - Request translation is a pure function over the arguments so it can be
    tested without a server.
*/

pub mod compat;
pub mod encoding;
pub mod format;
pub mod plantuml;
pub mod redpen;
pub mod shared;

pub use plantuml::{PlantUmlArgs, execute_plantuml};
pub use redpen::{RedPenArgs, execute_redpen};
pub use shared::Globals;
