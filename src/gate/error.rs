use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A constraint names a scheme nothing is registered for.
    UnsupportedScheme(String),
    /// A registered scheme cannot be set up from the constraint it is bound to.
    Configuration(String),
    NotImplemented(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnsupportedScheme(scheme) => {
                write!(f, "Unknown authentication type {scheme}")
            }
            Error::Configuration(msg) => write!(f, "Authentication configuration error: {msg}"),
            Error::NotImplemented(what) => write!(f, "{what} is not implemented"),
        }
    }
}

impl std::error::Error for Error {}
