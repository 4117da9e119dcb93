use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid pagination bounds: page={page}, limit={limit}")]
    InvalidPagination { page: u32, limit: u32 },
}
