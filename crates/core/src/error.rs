use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not a transcodable source file: {}", .0.display())]
    NotASource(PathBuf),
}
