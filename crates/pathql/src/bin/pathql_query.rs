//! pathql-query - Query code-structure fact bases.

fn main() -> std::process::ExitCode {
    pathql::cmd::query::main()
}
