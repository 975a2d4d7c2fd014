//! # Object Identity
//!
//! `{name, category}` names a remote object within a server.
//!
//! ## Invariants
//! - `("", "")` is the null identity, used by null proxies.
//! - An empty name with a non-empty category is never valid.
//!
//! ## String Form
//! `name` or `category/name`, each part escaped with `strings::escape` so a
//! literal `/` is written `\/`.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::error::Result;
use crate::stream::InputStream;
use crate::stream::OutputStream;
use crate::strings;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub name: String,
    pub category: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    /// The null identity `("", "")`.
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        self.name.is_empty() && self.category.is_empty()
    }

    /// Rejects an empty name paired with a non-empty category.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() && !self.category.is_empty() {
            return Err(Error::IdentityParse {
                input: self.to_string(),
                reason: "empty name with non-empty category".into(),
            });
        }
        Ok(())
    }

    /// Parses `name` or `category/name`.
    pub fn parse(s: &str) -> Result<Self> {
        let fail = |reason: &str| Error::IdentityParse {
            input: s.to_owned(),
            reason: reason.to_owned(),
        };

        let identity = match strings::find_unescaped(s, '/') {
            None => Identity::new(strings::unescape(s)?, ""),
            Some(slash) => {
                let (category, rest) = (&s[..slash], &s[slash + 1..]);
                if strings::find_unescaped(rest, '/').is_some() {
                    return Err(fail("more than one unescaped `/`"));
                }
                Identity::new(strings::unescape(rest)?, strings::unescape(category)?)
            }
        };

        if identity.name.is_empty() && !identity.category.is_empty() {
            return Err(fail("empty name with non-empty category"));
        }
        Ok(identity)
    }

    pub fn write_to(&self, out: &mut OutputStream) -> Result<()> {
        out.write_string(&self.name)?;
        out.write_string(&self.category)
    }

    pub fn read_from(input: &mut InputStream) -> Result<Self> {
        let name = input.read_string()?;
        let category = input.read_string()?;
        Ok(Self { name, category })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category.is_empty() {
            write!(f, "{}", strings::escape(&self.name, "/"))
        } else {
            write!(
                f,
                "{}/{}",
                strings::escape(&self.category, "/"),
                strings::escape(&self.name, "/")
            )
        }
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Identity::parse(s)
    }
}
