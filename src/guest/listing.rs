use std::fmt::{self, Display};

/// Result of asking the host for a directory listing.
///
/// `Entries(vec![])` is an empty directory and still renders (as an empty
/// line); only `Absent` selects the fallback message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Entries(Vec<String>),
    Absent,
}

impl Listing {
    /// Entries in file-name order, whatever order the directory yielded them.
    pub fn sorted(mut names: Vec<String>) -> Self {
        names.sort();
        Listing::Entries(names)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Listing::Absent)
    }
}

impl From<Option<Vec<String>>> for Listing {
    fn from(value: Option<Vec<String>>) -> Self {
        value.map_or(Listing::Absent, Listing::Entries)
    }
}

impl From<Listing> for Option<Vec<String>> {
    fn from(value: Listing) -> Self {
        match value {
            Listing::Entries(names) => Some(names),
            Listing::Absent => None,
        }
    }
}

impl Display for Listing {
    /// Comma-joined entry names in host order. `Absent` writes nothing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Listing::Entries(names) = self else {
            return Ok(());
        };

        for (idx, name) in names.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            f.write_str(name)?;
        }

        Ok(())
    }
}
