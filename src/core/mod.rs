/// Shared infrastructure for the library and the CLI
///
/// Holds the diagnostic event type that the register map code reports
/// through, plus logger setup for the binary.
pub mod logs;
