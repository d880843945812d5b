//! Course formats the pipelines read and write.

use std::fmt;
use std::str::FromStr;

use courseforge_shared::{CourseError, Result};

/// A named course representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// The on-disk directory layout with `index.yaml` files.
    Eocs,
    /// An Open edX OLX course archive rooted at `course.xml`.
    Olx,
    /// The denormalized document set as JSON files.
    Docs,
    /// The denormalized document set in a libSQL document store and search index.
    Store,
    /// A single `book.md` with every narrative block in course order.
    Book,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Eocs,
        Format::Olx,
        Format::Docs,
        Format::Store,
        Format::Book,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Format::Eocs => "eocs",
            Format::Olx => "olx",
            Format::Docs => "docs",
            Format::Store => "store",
            Format::Book => "book",
        }
    }

    pub fn can_import(self) -> bool {
        matches!(self, Format::Eocs | Format::Olx)
    }

    pub fn can_export(self) -> bool {
        true
    }

    /// Fail unless a course can be read from this format.
    pub fn check_import(self) -> Result<()> {
        if self.can_import() {
            Ok(())
        } else {
            Err(CourseError::validation(format!(
                "format '{self}' cannot be imported (importable: {})",
                names(Format::can_import)
            )))
        }
    }

    /// Fail unless a course can be written to this format.
    pub fn check_export(self) -> Result<()> {
        if self.can_export() {
            Ok(())
        } else {
            Err(CourseError::validation(format!(
                "format '{self}' cannot be exported (exportable: {})",
                names(Format::can_export)
            )))
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = CourseError;

    fn from_str(s: &str) -> Result<Self> {
        Format::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                CourseError::validation(format!(
                    "unknown format '{s}' (expected one of: {})",
                    names(|_| true)
                ))
            })
    }
}

fn names(filter: impl Fn(Format) -> bool) -> String {
    Format::ALL
        .into_iter()
        .filter(|f| filter(*f))
        .map(Format::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("eocs".parse::<Format>().unwrap(), Format::Eocs);
        assert_eq!("DOCS".parse::<Format>().unwrap(), Format::Docs);
        assert_eq!(" store ".parse::<Format>().unwrap(), Format::Store);
        assert_eq!("book".parse::<Format>().unwrap(), Format::Book);
        assert_eq!("OLX".parse::<Format>().unwrap(), Format::Olx);
    }

    #[test]
    fn unknown_format_lists_choices() {
        let err = "pdf".parse::<Format>().unwrap_err();
        assert!(err.to_string().contains("eocs, olx, docs, store, book"));
    }

    #[test]
    fn only_course_layouts_are_importable() {
        assert!(Format::Eocs.check_import().is_ok());
        assert!(Format::Olx.check_import().is_ok());
        for f in [Format::Docs, Format::Store, Format::Book] {
            let err = f.check_import().unwrap_err();
            assert!(err.to_string().contains("cannot be imported"));
        }
        assert!(Format::ALL.iter().all(|f| f.check_export().is_ok()));
    }
}
