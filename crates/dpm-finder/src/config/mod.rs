mod cli;

pub use cli::Cli;
pub use cli::Commands;
pub use cli::ConnectionArgs;
pub use cli::ExporterArgs;
pub use cli::OutputFormat;
pub use cli::QueryKindArg;
pub use cli::ReportArgs;
