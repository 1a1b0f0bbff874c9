use std::ops::{Deref, DerefMut};

/// Associates readiness events with a [`event::Source`].
///
/// `Token` is a wrapper around `usize` and is used as an argument to
/// [`Registry::register`] and [`Registry::reregister`]. There are no
/// constraints on what value the `Token` can be, it is up to the user to
/// provide meaning to the token.
///
/// `Token` implements [`From`] for all the primitive integer types. So calls
/// to such as `Token::from(10)` or `10.into()` both work.
///
/// [`event::Source`]: crate::event::Source
/// [`Registry::register`]: crate::Registry::register
/// [`Registry::reregister`]: crate::Registry::reregister
///
/// # Example
///
/// ```
/// use mio::Token;
///
/// let token = Token::from(10);
/// assert_eq!(token, Token(10));
/// ```
///
/// Basic usage
///
/// ```
/// use mio::Token;
///
/// let token = Token(10);
/// ```
///
/// Example implementation of `From` for `Token`
///
/// ```
/// use mio::Token;
///
/// struct Id(u32);
///
/// impl From<Id> for Token {
///     fn from(id: Id) -> Token {
///         Token(id.0 as usize)
///     }
/// }
/// ```
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Token(pub usize);

macro_rules! from_usize {
    ($($t:ty)*) => {
        $(
            impl From<$t> for Token {
                fn from(val: $t) -> Token {
                    Token(val as usize)
                }
            }
        )*
    };
}

from_usize! { usize u8 u16 u32 i8 i16 i32 }

impl From<Token> for usize {
    fn from(val: Token) -> usize {
        val.0
    }
}

impl Deref for Token {
    type Target = usize;

    fn deref(&self) -> &usize {
        &self.0
    }
}

impl DerefMut for Token {
    fn deref_mut(&mut self) -> &mut usize {
        &mut self.0
    }
}
