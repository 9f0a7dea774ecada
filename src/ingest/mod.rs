//! Body ingestion: streaming authentication, multipart materialization, and
//! per-request scratch workspaces.

pub mod multipart;
pub mod stream;
pub mod workspace;

pub use multipart::{FormData, StagedFile, boundary_from, materialize};
pub use stream::{BodyChunks, authenticate_stream, collect_body};
pub use workspace::{ScratchRoot, Workspace};
