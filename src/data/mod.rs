pub mod bar;
pub mod error;
pub mod feed;
pub mod loader;

pub use bar::{Bar, BarError, BarTuple};
pub use error::DataError;
pub use feed::DataFeed;
pub use loader::{load_csv, read_csv};
