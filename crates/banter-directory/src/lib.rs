pub mod error;
pub mod mock;
pub mod profile;
pub mod subject;

pub use error::DirectoryError;
pub use mock::{MockDirectory, MockSubjects};
pub use profile::{HttpProfileDirectory, ProfileDirectory};
pub use subject::{Credentials, HttpSubjectResolver, SubjectResolver};
