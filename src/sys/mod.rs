#[cfg(unix)]
pub(crate) use self::unix::*;

#[cfg(unix)]
pub(crate) mod unix;
